//! Drain scheduler tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use esp_net_logging::{DestinationKind, DrainStatus, Level, LogChannel, Mode, NetLogger};

/// Channel with a per-send cap and an on/off switch for back-pressure.
struct TestChannel {
    frame: usize,
    open: AtomicBool,
    received: Mutex<Vec<u8>>,
}

impl TestChannel {
    fn new(frame: usize) -> Self {
        Self {
            frame,
            open: AtomicBool::new(true),
            received: Mutex::new(Vec::new()),
        }
    }

    fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }
}

impl LogChannel for TestChannel {
    fn try_send(&self, bytes: &[u8]) -> usize {
        if !self.open.load(Ordering::Relaxed) {
            return 0;
        }
        self.received.lock().unwrap().extend_from_slice(bytes);
        bytes.len()
    }

    fn max_item_size(&self) -> usize {
        self.frame
    }
}

fn fill(engine: &NetLogger<'_, 1024>, bytes: usize) {
    // "0 " prefix + 8 chars = 10 bytes per line
    for _ in 0..bytes / 10 {
        engine.dispatch(Level::Info, "", format_args!("abcdefgh"));
    }
}

#[test]
fn test_cursor_progression_with_32_byte_frames() {
    let chan = TestChannel::new(32);
    let engine = NetLogger::<1024>::new();
    fill(&engine, 100);
    assert_eq!(engine.capture().len(), 100);

    engine.activate_destination(DestinationKind::Udp, &chan);

    let expected = [32, 64, 96, 100];
    for (firing, cursor) in expected.iter().enumerate() {
        let status = engine.drain_tick(DestinationKind::Udp);
        assert_eq!(engine.registry().sent_cursor(DestinationKind::Udp), *cursor);
        if firing < 3 {
            assert!(status.keeps_timer());
            assert_eq!(engine.mode(DestinationKind::Udp), Mode::Replaying);
        } else {
            assert_eq!(status, DrainStatus::CaughtUp { sent: 100 });
            assert_eq!(engine.mode(DestinationKind::Udp), Mode::Live);
        }
    }

    let mut boot = [0u8; 1024];
    let n = engine.retrieve_boot_log(&mut boot);
    assert_eq!(chan.received(), &boot[..n]);
}

#[test]
fn test_backpressure_holds_cursor() {
    let chan = TestChannel::new(64);
    let engine = NetLogger::<1024>::new();
    fill(&engine, 50);

    chan.open.store(false, Ordering::Relaxed);
    engine.activate_destination(DestinationKind::Tcp, &chan);

    for _ in 0..5 {
        let status = engine.drain_tick(DestinationKind::Tcp);
        assert_eq!(status, DrainStatus::Pending { sent: 0, remaining: 50 });
    }

    // Producer is never blocked by the stuck destination.
    fill(&engine, 20);
    assert_eq!(engine.capture().len(), 70);

    chan.open.store(true, Ordering::Relaxed);
    while engine.drain_tick(DestinationKind::Tcp).keeps_timer() {}
    assert_eq!(chan.received().len(), 70);
}

#[test]
fn test_lines_during_replay_are_drained_not_sent_live() {
    let chan = TestChannel::new(16);
    let engine = NetLogger::<1024>::new();
    fill(&engine, 40);

    engine.activate_destination(DestinationKind::Mqtt, &chan);
    engine.drain_tick(DestinationKind::Mqtt);
    assert_eq!(chan.received().len(), 16);

    // Arrives while replaying: must not jump the queue.
    engine.dispatch(Level::Info, "", format_args!("LATE"));
    assert_eq!(chan.received().len(), 16);

    while engine.drain_tick(DestinationKind::Mqtt).keeps_timer() {}

    let received = chan.received();
    assert_eq!(received.len(), 46);
    assert!(received.ends_with(b"0 LATE"));
}

#[test]
fn test_no_duplicate_after_going_live() {
    let chan = TestChannel::new(256);
    let engine = NetLogger::<1024>::new();
    fill(&engine, 30);

    engine.activate_destination(DestinationKind::Http, &chan);
    assert_eq!(
        engine.drain_tick(DestinationKind::Http),
        DrainStatus::CaughtUp { sent: 30 }
    );

    engine.dispatch(Level::Info, "", format_args!("next"));
    // Further firings have nothing to do.
    assert_eq!(engine.drain_tick(DestinationKind::Http), DrainStatus::Idle);

    let mut boot = [0u8; 1024];
    let n = engine.retrieve_boot_log(&mut boot);
    assert_eq!(chan.received(), &boot[..n]);
}

#[test]
fn test_live_stays_live_when_channel_saturates() {
    let chan = TestChannel::new(256);
    let engine = NetLogger::<1024>::new();

    engine.activate_destination(DestinationKind::Udp, &chan);
    engine.drain_tick(DestinationKind::Udp);
    assert_eq!(engine.mode(DestinationKind::Udp), Mode::Live);

    chan.open.store(false, Ordering::Relaxed);
    engine.dispatch(Level::Info, "", format_args!("lost"));

    assert_eq!(engine.mode(DestinationKind::Udp), Mode::Live);
    let stats = engine.stats();
    assert_eq!(stats.destinations[DestinationKind::Udp.index()].live_dropped, 6);
}

/// Message-buffer-like channel: whole items up to `frame` bytes or nothing.
struct ItemChannel {
    frame: usize,
    items: Mutex<Vec<Vec<u8>>>,
}

impl LogChannel for ItemChannel {
    fn try_send(&self, bytes: &[u8]) -> usize {
        if bytes.len() > self.frame {
            return 0;
        }
        self.items.lock().unwrap().push(bytes.to_vec());
        bytes.len()
    }

    fn max_item_size(&self) -> usize {
        self.frame
    }
}

#[test]
fn test_live_lines_respect_item_size() {
    let chan = ItemChannel { frame: 8, items: Mutex::new(Vec::new()) };
    let engine = NetLogger::<1024>::new();
    fill(&engine, 20);

    engine.activate_destination(DestinationKind::Udp, &chan);
    while engine.drain_tick(DestinationKind::Udp).keeps_timer() {}
    assert_eq!(engine.mode(DestinationKind::Udp), Mode::Live);

    engine.dispatch(Level::Info, "", format_args!("0123456789ABCDEF\n"));

    let items = chan.items.lock().unwrap();
    assert!(items.iter().all(|item| item.len() <= 8));

    let mut boot = [0u8; 1024];
    let n = engine.retrieve_boot_log(&mut boot);
    assert_eq!(items.concat(), &boot[..n]);
    assert_eq!(
        engine.stats().destinations[DestinationKind::Udp.index()].live_dropped,
        0
    );
}
