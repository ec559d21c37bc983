//! Destination bring-up and drain timers.
//!
//! Bringing a destination online:
//! 1. allocate its message buffer channel
//! 2. start the transport worker with a one-shot [`ReadySignal`]
//! 3. block until the worker reports its connection is up
//! 4. activate the destination (replay from byte 0)
//! 5. arm a periodic drain timer that retires itself once caught up
//!
//! Step 3 waits indefinitely: reconnect policy belongs to the worker.
//!
//! A timer cannot free itself from inside its own callback, so a caught-up
//! timer is cancelled there and handed to a small retire task that drops it.

use std::boxed::Box;
use std::string::ToString;
use std::sync::mpsc::{channel, sync_channel, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};

use crate::config::{CHANNEL_CAPACITY, DRAIN_PERIOD, LINE_CAPACITY};
use crate::engine::NetLogger;
use crate::error::NetLogError;
use crate::registry::{DestinationKind, Mode, DESTINATION_COUNT};

use super::channel::MessageBufferChannel;

/// Worker task stack size.
const WORKER_STACK_SIZE: usize = 6 * 1024;

/// Retire task stack size.
const RETIRE_STACK_SIZE: usize = 2 * 1024;

/// One-shot "connection established" notification.
pub struct ReadySignal(SyncSender<()>);

impl ReadySignal {
    /// Tell the replicator the worker can take data.
    pub fn notify(self) {
        let _ = self.0.send(());
    }
}

type DrainSlot = Arc<Mutex<Option<EspTimer<'static>>>>;

/// Owns the drain timers of all destinations.
pub struct Replicator {
    engine: &'static NetLogger<'static>,
    timers: EspTaskTimerService,
    drains: [Option<DrainSlot>; DESTINATION_COUNT],
    retire: Sender<EspTimer<'static>>,
}

impl Replicator {
    pub fn new(engine: &'static NetLogger<'static>) -> Result<Self, NetLogError> {
        let (retire, retired) = channel::<EspTimer<'static>>();
        thread::Builder::new()
            .name("netlog-retire".to_string())
            .stack_size(RETIRE_STACK_SIZE)
            .spawn(move || {
                for timer in retired {
                    drop(timer);
                }
            })
            .map_err(|_| NetLogError::WorkerSpawn)?;

        Ok(Self {
            engine,
            timers: EspTaskTimerService::new()?,
            drains: Default::default(),
            retire,
        })
    }

    /// Start `worker` for `kind` and begin replaying to it.
    ///
    /// `worker` runs on its own thread; it must call [`ReadySignal::notify`]
    /// once connected and then loop on [`MessageBufferChannel::receive`].
    pub fn start_destination<W>(&mut self, kind: DestinationKind, worker: W) -> Result<(), NetLogError>
    where
        W: FnOnce(&'static MessageBufferChannel, ReadySignal) + Send + 'static,
    {
        if self.engine.mode(kind) != Mode::Uninitialized {
            return Err(NetLogError::AlreadyActive);
        }
        log::info!("start {} logging", kind.name());

        // Workers never stop, so the channel lives for the rest of the run.
        let channel: &'static MessageBufferChannel =
            Box::leak(Box::new(MessageBufferChannel::new(CHANNEL_CAPACITY, LINE_CAPACITY)?));

        let (tx, rx) = sync_channel(1);
        thread::Builder::new()
            .name(kind.name().to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || worker(channel, ReadySignal(tx)))
            .map_err(|_| NetLogError::WorkerSpawn)?;

        if rx.recv().is_err() {
            log::warn!("{} worker exited before it was ready", kind.name());
            return Err(NetLogError::ReadinessLost);
        }

        if !self.engine.activate_destination(kind, channel) {
            return Err(NetLogError::AlreadyActive);
        }
        self.arm_drain(kind)
    }

    /// Detach `kind` and stop its drain timer.
    ///
    /// The worker keeps its channel; a later start creates a fresh one.
    pub fn stop_destination(&mut self, kind: DestinationKind) -> bool {
        if let Some(slot) = self.drains[kind.index()].take() {
            if let Ok(mut timer) = slot.lock() {
                timer.take();
            }
        }
        self.engine.deactivate_destination(kind).is_some()
    }

    fn arm_drain(&mut self, kind: DestinationKind) -> Result<(), NetLogError> {
        let engine = self.engine;
        let slot: DrainSlot = Arc::default();
        let own = Arc::clone(&slot);
        let retire = self.retire.clone();

        let timer = self.timers.timer(move || {
            let status = engine.drain_tick(kind);
            if status.keeps_timer() {
                return;
            }
            // The timer may fire once before it is parked in the slot; the
            // next firing then reports Idle and retires it.
            let Ok(mut guard) = own.lock() else { return };
            let Some(timer) = guard.take() else { return };
            let _ = timer.cancel();
            if let Err(unsent) = retire.send(timer) {
                // Retire task gone: leak rather than drop inside the callback.
                core::mem::forget(unsent.0);
            }
            log::debug!("{} replay done: {:?}", kind.name(), status);
        })?;
        timer.every(DRAIN_PERIOD).map_err(|_| NetLogError::Timer)?;

        if let Ok(mut guard) = slot.lock() {
            *guard = Some(timer);
        }
        self.drains[kind.index()] = Some(slot);
        Ok(())
    }
}
