//! The capture-and-replay engine.
//!
//! # Architecture
//!
//! ```text
//! log call ──▶ dispatch ──▶ CaptureBuffer ◀── drain timer (per destination)
//!              │  │                                 │
//!              │  └──live──▶ channel ◀──────────────┘ replay frames
//!              └──echo──▶ previous sink
//! ```
//!
//! Every line is captured, whatever the network state. Destinations that
//! already caught up get the line directly; destinations still replaying
//! only hear from their drain timer.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::capture::CaptureBuffer;
use crate::config::{CAPTURE_CAPACITY, LINE_CAPACITY};
use crate::drain::{drain_once, DrainStatus};
use crate::hook::{HookChain, LineSink};
use crate::line::{Level, LineBuffer};
use crate::registry::{
    DestinationKind, DestinationStats, LogChannel, Mode, Registry, DESTINATION_COUNT,
};

/// Engine-wide counters.
#[derive(Clone, Copy, Debug)]
pub struct NetLogStats {
    /// Bytes in the capture buffer (`W`).
    pub captured: usize,
    /// Bytes refused because the capture buffer was full.
    pub dropped: usize,
    /// Lines dispatched since boot.
    pub lines: u32,
    pub destinations: [DestinationStats; DESTINATION_COUNT],
}

/// Shared engine context.
///
/// One instance lives for the whole process and is handed by reference to
/// the log hook and to every drain timer.
pub struct NetLogger<'a, const C: usize = CAPTURE_CAPACITY> {
    capture: CaptureBuffer<C>,
    registry: Registry<'a>,
    hook: HookChain<'a>,
    id: AtomicU32,
    local_echo: AtomicBool,
    lines: AtomicU32,
}

impl<'a, const C: usize> NetLogger<'a, C> {
    /// Create an engine with an empty capture buffer and no destinations.
    pub const fn new() -> Self {
        Self {
            capture: CaptureBuffer::new(),
            registry: Registry::new(),
            hook: HookChain::new(),
            id: AtomicU32::new(0),
            local_echo: AtomicBool::new(true),
            lines: AtomicU32::new(0),
        }
    }

    /// One-time setup: install the engine as the active log sink.
    ///
    /// `register` swaps the platform sink and returns the previous one; it
    /// runs only on the first call. Repeated calls change nothing, including
    /// the echo flag, and return `false`.
    pub fn initialize<F>(&self, local_echo: bool, register: F) -> bool
    where
        F: FnOnce() -> Option<&'a dyn LineSink>,
    {
        if !self.hook.install(register) {
            return false;
        }
        self.local_echo.store(local_echo, Ordering::Release);
        true
    }

    /// Change the numeric tag prefixed to future lines.
    pub fn set_identifier(&self, id: u32) {
        self.id.store(id, Ordering::Relaxed);
    }

    /// Current line tag.
    pub fn identifier(&self) -> u32 {
        self.id.load(Ordering::Relaxed)
    }

    /// Toggle echo to the previous sink.
    pub fn set_local_echo(&self, on: bool) {
        self.local_echo.store(on, Ordering::Release);
    }

    /// Attach a ready channel; the destination starts replaying from byte 0.
    ///
    /// Returns `false` if `kind` is already active.
    pub fn activate_destination(&self, kind: DestinationKind, channel: &'a dyn LogChannel) -> bool {
        self.registry.activate(kind, channel)
    }

    /// Detach the channel of `kind`.
    pub fn deactivate_destination(&self, kind: DestinationKind) -> Option<&'a dyn LogChannel> {
        self.registry.deactivate(kind)
    }

    /// Resume network delivery.
    pub fn enable_dispatch(&self) {
        self.registry.enable_all();
    }

    /// Pause network delivery; capture and echo continue.
    pub fn disable_dispatch(&self) {
        self.registry.deactivate_all();
    }

    /// Global delivery switch state.
    pub fn is_enabled(&self) -> bool {
        self.registry.is_enabled()
    }

    /// Copy everything captured since boot into `dest`.
    pub fn retrieve_boot_log(&self, dest: &mut [u8]) -> usize {
        self.capture.snapshot(dest)
    }

    /// One firing of the drain timer for `kind`.
    pub fn drain_tick(&self, kind: DestinationKind) -> DrainStatus {
        drain_once(&self.capture, &self.registry, kind)
    }

    /// Mode of `kind`.
    pub fn mode(&self, kind: DestinationKind) -> Mode {
        self.registry.mode(kind)
    }

    pub fn capture(&self) -> &CaptureBuffer<C> {
        &self.capture
    }

    pub fn registry(&self) -> &Registry<'a> {
        &self.registry
    }

    /// Format, capture and deliver one log call.
    ///
    /// Echo goes to the sink remembered at [`initialize`](Self::initialize).
    /// Returns the bytes accepted by the echo path.
    pub fn dispatch(&self, level: Level, tag: &str, args: fmt::Arguments<'_>) -> usize {
        self.dispatch_with(level, tag, args, &self.hook)
    }

    /// Like [`dispatch`](Self::dispatch), echoing through `echo` instead.
    ///
    /// Platform hooks use this when they can forward the original call to
    /// the previous sink more faithfully than a formatted line.
    pub fn dispatch_with(
        &self,
        level: Level,
        tag: &str,
        args: fmt::Arguments<'_>,
        echo: &dyn LineSink,
    ) -> usize {
        let mut line = LineBuffer::<LINE_CAPACITY>::new();
        line.format(format_args!("{} ", self.identifier()));
        let body = line.len();
        if !tag.is_empty() {
            line.format(format_args!("{} {}: ", level.letter(), tag));
        }
        line.format(args);
        self.lines.fetch_add(1, Ordering::Relaxed);

        let bytes = line.as_bytes();
        let delivering = self.registry.is_any_active();
        let live = self.capture_line(bytes, delivering);

        for (kind, channel) in DestinationKind::ALL.iter().zip(live) {
            let Some(channel) = channel else { continue };
            let accepted = send_framed(channel, bytes);
            if accepted < bytes.len() {
                critical_section::with(|cs| {
                    let cell = self.registry.cell(cs, *kind);
                    let mut slot = cell.get();
                    slot.live_dropped += bytes.len() - accepted;
                    cell.set(slot);
                });
            }
        }

        // Nobody is listening: echo regardless of the flag.
        if self.local_echo.load(Ordering::Acquire) || !delivering {
            echo.consume(&bytes[body..])
        } else {
            0
        }
    }

    /// Append `bytes` and pick the Live channels that get it directly.
    ///
    /// Live cursors follow the reservation, so a line is never both drained
    /// and sent live.
    fn capture_line(
        &self,
        bytes: &[u8],
        delivering: bool,
    ) -> [Option<&'a dyn LogChannel>; DESTINATION_COUNT] {
        let mut live = [None; DESTINATION_COUNT];
        let range = critical_section::with(|cs| {
            let range = self.capture.reserve(cs, bytes.len());
            for kind in DestinationKind::ALL {
                let cell = self.registry.cell(cs, kind);
                let mut slot = cell.get();
                if slot.mode != Mode::Live {
                    continue;
                }
                slot.sent = range.end;
                cell.set(slot);
                if delivering {
                    live[kind.index()] = slot.channel;
                }
            }
            range
        });
        self.capture.fill(range, bytes);
        critical_section::with(|cs| self.capture.commit(cs));
        live
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> NetLogStats {
        NetLogStats {
            captured: self.capture.len(),
            dropped: self.capture.dropped(),
            lines: self.lines.load(Ordering::Relaxed),
            destinations: DestinationKind::ALL.map(|k| self.registry.stats(k)),
        }
    }
}

/// Push `bytes` in runs of at most one channel item.
///
/// Stops at the first short send; returns the bytes accepted.
fn send_framed(channel: &dyn LogChannel, bytes: &[u8]) -> usize {
    let frame = channel.max_item_size().max(1);
    let mut accepted = 0;
    for chunk in bytes.chunks(frame) {
        let n = channel.try_send(chunk).min(chunk.len());
        accepted += n;
        if n < chunk.len() {
            break;
        }
    }
    accepted
}

impl<const C: usize> Default for NetLogger<'_, C> {
    fn default() -> Self {
        Self::new()
    }
}
