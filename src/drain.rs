//! Backlog drain for destinations in replay mode.
//!
//! Each replaying destination has a periodic, low-priority timer. One firing
//! pushes at most one transport frame from the destination's cursor and
//! reports whether the timer should keep running.
//!
//! # Rules
//!
//! - Cursors are read and updated inside the critical section; the channel
//!   send happens outside it.
//! - The cursor advances only by what the channel accepted.
//! - Replaying becomes Live only when the cursor equals `W` and no append is
//!   in flight. An append that saw the destination as Replaying is therefore
//!   always drained, never sent live as well.

use crate::capture::CaptureBuffer;
use crate::registry::{DestinationKind, Mode, Registry};

/// Outcome of one drain firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainStatus {
    /// Destination is not replaying; the timer has nothing to do.
    Idle,
    /// Dispatch is globally disabled; try again later.
    Paused,
    /// Backlog remains.
    Pending { sent: usize, remaining: usize },
    /// Cursor reached `W`; the destination is now Live.
    CaughtUp { sent: usize },
}

impl DrainStatus {
    /// Should the drain timer fire again?
    #[inline]
    pub fn keeps_timer(&self) -> bool {
        matches!(self, DrainStatus::Pending { .. } | DrainStatus::Paused)
    }
}

/// Run one drain step for `kind`.
pub fn drain_once<const C: usize>(
    capture: &CaptureBuffer<C>,
    registry: &Registry<'_>,
    kind: DestinationKind,
) -> DrainStatus {
    let plan = critical_section::with(|cs| {
        let slot = registry.cell(cs, kind).get();
        match (slot.mode, slot.channel) {
            (Mode::Replaying, Some(channel)) => {
                Some((channel, slot.sent, capture.committed_in(cs), slot.session))
            }
            _ => None,
        }
    });
    let Some((channel, sent, w, session)) = plan else {
        return DrainStatus::Idle;
    };
    if !registry.is_enabled() {
        return DrainStatus::Paused;
    }

    let left = w - sent;
    let accepted = if left > 0 {
        let frame = left.min(channel.max_item_size());
        channel.try_send(capture.committed(sent..sent + frame)).min(frame)
    } else {
        0
    };

    critical_section::with(|cs| {
        let cell = registry.cell(cs, kind);
        let mut slot = cell.get();
        if slot.session != session || slot.mode != Mode::Replaying {
            // Deactivated (and maybe reactivated) while we were sending.
            return DrainStatus::Idle;
        }
        slot.sent = sent + accepted;
        let status = match capture.settled_in(cs) {
            Some(w) if slot.sent == w => {
                slot.mode = Mode::Live;
                DrainStatus::CaughtUp { sent: slot.sent }
            }
            _ => DrainStatus::Pending {
                sent: slot.sent,
                remaining: capture.committed_in(cs) - slot.sent,
            },
        };
        cell.set(slot);
        status
    })
}
