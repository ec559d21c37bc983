//! Previous-sink chaining.
//!
//! The platform has exactly one active log sink. Installing the engine
//! replaces it; the old sink is remembered so lines can still be echoed to
//! the console.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

/// Something that consumes one formatted line.
///
/// Implementations must be callable from interrupt context.
pub trait LineSink: Sync {
    /// Consume `line`, returning the number of bytes accepted.
    fn consume(&self, line: &[u8]) -> usize;
}

/// Sink that discards everything.
pub struct NullSink;

impl LineSink for NullSink {
    fn consume(&self, _line: &[u8]) -> usize {
        0
    }
}

/// One-shot hook installation with a remembered previous sink.
pub struct HookChain<'a> {
    installed: AtomicBool,
    previous: Mutex<Cell<Option<&'a dyn LineSink>>>,
}

impl<'a> HookChain<'a> {
    pub const fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
            previous: Mutex::new(Cell::new(None)),
        }
    }

    /// Install the engine as the active sink, once.
    ///
    /// `register` performs the platform swap and returns whichever sink was
    /// active before. It only runs on the first call; later calls are no-ops
    /// and return `false`.
    pub fn install<F>(&self, register: F) -> bool
    where
        F: FnOnce() -> Option<&'a dyn LineSink>,
    {
        if self.installed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let previous = register();
        critical_section::with(|cs| self.previous.borrow(cs).set(previous));
        true
    }

    /// Has [`install`](Self::install) run?
    #[inline]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Is there a previous sink to forward to?
    pub fn has_previous(&self) -> bool {
        critical_section::with(|cs| self.previous.borrow(cs).get()).is_some()
    }

    /// Forward `line` to the previous sink; no-op without one.
    pub fn forward_to_previous(&self, line: &[u8]) -> usize {
        // Copy the reference out; the sink runs outside the critical section.
        let previous = critical_section::with(|cs| self.previous.borrow(cs).get());
        match previous {
            Some(sink) => sink.consume(line),
            None => 0,
        }
    }
}

// Lets the chain itself stand in as the echo path.
impl LineSink for HookChain<'_> {
    fn consume(&self, line: &[u8]) -> usize {
        self.forward_to_previous(line)
    }
}

impl Default for HookChain<'_> {
    fn default() -> Self {
        Self::new()
    }
}
