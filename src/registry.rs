//! Destination registry.
//!
//! One slot per destination kind. Each slot keeps its own replay cursor into
//! the shared capture buffer, so destinations brought up at different times
//! replay the full history independently.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──activate──▶ Replaying ──caught up──▶ Live
//!       ▲                         │                      │
//!       └───────deactivate────────┴──────────────────────┘
//! ```
//!
//! Replaying never follows Live within one session. Deactivating ends the
//! session; the next activation replays from byte 0 again.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::{CriticalSection, Mutex};

/// Number of destination kinds.
pub const DESTINATION_COUNT: usize = 4;

/// Outbound route for replicated log bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DestinationKind {
    /// Datagram
    Udp = 0,
    /// Stream
    Tcp = 1,
    /// Publish/subscribe
    Mqtt = 2,
    /// Request-based
    Http = 3,
}

impl DestinationKind {
    /// All kinds, in slot order.
    pub const ALL: [DestinationKind; DESTINATION_COUNT] = [
        DestinationKind::Udp,
        DestinationKind::Tcp,
        DestinationKind::Mqtt,
        DestinationKind::Http,
    ];

    /// Slot index.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short name, also used as the worker task name.
    pub fn name(self) -> &'static str {
        match self {
            DestinationKind::Udp => "UDP",
            DestinationKind::Tcp => "TCP",
            DestinationKind::Mqtt => "MQTT",
            DestinationKind::Http => "HTTP",
        }
    }
}

/// Bounded outbound byte channel owned by one transport worker.
///
/// Both methods must be non-blocking and callable from interrupt context.
pub trait LogChannel: Sync {
    /// Offer `bytes`; returns how many were accepted (0 when full).
    fn try_send(&self, bytes: &[u8]) -> usize;

    /// Largest run accepted by a single send (one transport frame).
    fn max_item_size(&self) -> usize;
}

/// Single-writer gate for a channel's send path.
///
/// Channels whose backend tolerates one writer at a time take this instead
/// of the global critical section, which stays reserved for cursor updates.
pub struct SendGate {
    busy: AtomicBool,
}

/// Held while a send is in progress; releases the gate on drop.
pub struct SendGuard<'g>(&'g SendGate);

impl SendGate {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Take the gate, retrying up to `spins` times.
    ///
    /// `None` means the holder did not finish in time (it may be preempted
    /// on this core); callers refuse the send as if the channel were full.
    pub fn try_enter(&self, spins: u32) -> Option<SendGuard<'_>> {
        for _ in 0..=spins {
            if self
                .busy
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Some(SendGuard(self));
            }
            core::hint::spin_loop();
        }
        None
    }
}

impl Default for SendGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::Release);
    }
}

/// Delivery mode of one destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// No channel attached.
    Uninitialized,
    /// Drain timer is delivering backlog; live lines are not sent directly.
    Replaying,
    /// Caught up; live lines go straight to the channel.
    Live,
}

#[derive(Clone, Copy)]
pub(crate) struct Slot<'a> {
    pub channel: Option<&'a dyn LogChannel>,
    pub mode: Mode,
    /// Bytes of the capture buffer pushed to this destination.
    pub sent: usize,
    /// Bumped on every activation, so a drain started in an older
    /// session cannot move the cursor of a newer one.
    pub session: u32,
    /// Live bytes the channel refused.
    pub live_dropped: usize,
}

impl Slot<'_> {
    const EMPTY: Self = Self {
        channel: None,
        mode: Mode::Uninitialized,
        sent: 0,
        session: 0,
        live_dropped: 0,
    };
}

/// Per-destination snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestinationStats {
    pub kind: DestinationKind,
    pub mode: Mode,
    pub sent: usize,
    pub live_dropped: usize,
}

/// Fixed table of destinations plus the global dispatch switch.
pub struct Registry<'a> {
    slots: Mutex<[Cell<Slot<'a>>; DESTINATION_COUNT]>,
    enabled: AtomicBool,
}

impl<'a> Registry<'a> {
    /// Create a registry with no destinations; dispatch starts enabled.
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new([
                Cell::new(Slot::EMPTY),
                Cell::new(Slot::EMPTY),
                Cell::new(Slot::EMPTY),
                Cell::new(Slot::EMPTY),
            ]),
            enabled: AtomicBool::new(true),
        }
    }

    /// Attach `channel` and start replaying from byte 0.
    ///
    /// Returns `false` (and changes nothing) if the kind already has a channel.
    pub fn activate(&self, kind: DestinationKind, channel: &'a dyn LogChannel) -> bool {
        critical_section::with(|cs| {
            let cell = self.cell(cs, kind);
            let mut slot = cell.get();
            if slot.channel.is_some() {
                return false;
            }
            slot.channel = Some(channel);
            slot.mode = Mode::Replaying;
            slot.sent = 0;
            slot.session = slot.session.wrapping_add(1);
            cell.set(slot);
            true
        })
    }

    /// Detach the channel of `kind`, returning it.
    ///
    /// The cursor is reset; a later activation replays from byte 0.
    pub fn deactivate(&self, kind: DestinationKind) -> Option<&'a dyn LogChannel> {
        critical_section::with(|cs| {
            let cell = self.cell(cs, kind);
            let mut slot = cell.get();
            let channel = slot.channel.take();
            slot.mode = Mode::Uninitialized;
            slot.sent = 0;
            cell.set(slot);
            channel
        })
    }

    /// Does `kind` have a channel while dispatch is enabled?
    pub fn is_active(&self, kind: DestinationKind) -> bool {
        self.is_enabled() && critical_section::with(|cs| self.cell(cs, kind).get().channel.is_some())
    }

    /// Should dispatch attempt delivery at all?
    pub fn is_any_active(&self) -> bool {
        self.is_enabled()
            && critical_section::with(|cs| {
                self.slots.borrow(cs).iter().any(|c| c.get().channel.is_some())
            })
    }

    /// Global dispatch switch state.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Resume delivery.
    pub fn enable_all(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Pause delivery without detaching channels or touching cursors.
    pub fn deactivate_all(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Current mode of `kind`.
    pub fn mode(&self, kind: DestinationKind) -> Mode {
        critical_section::with(|cs| self.cell(cs, kind).get().mode)
    }

    /// Replay cursor of `kind`.
    pub fn sent_cursor(&self, kind: DestinationKind) -> usize {
        critical_section::with(|cs| self.cell(cs, kind).get().sent)
    }

    /// Snapshot of one destination.
    pub fn stats(&self, kind: DestinationKind) -> DestinationStats {
        let slot = critical_section::with(|cs| self.cell(cs, kind).get());
        DestinationStats {
            kind,
            mode: slot.mode,
            sent: slot.sent,
            live_dropped: slot.live_dropped,
        }
    }

    #[inline]
    pub(crate) fn cell<'cs>(&'cs self, cs: CriticalSection<'cs>, kind: DestinationKind) -> &'cs Cell<Slot<'a>> {
        &self.slots.borrow(cs)[kind.index()]
    }
}

impl Default for Registry<'_> {
    fn default() -> Self {
        Self::new()
    }
}
