//! Producer/drain interleaving under real threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use esp_net_logging::{DestinationKind, Level, LogChannel, Mode, NetLogger};

const CAPACITY: usize = 64 * 1024;
const LINES: u32 = 2000;

/// Refuses every other frame longer than a single line.
///
/// Single lines (live sends) always go through, so the received stream
/// must match the capture buffer byte for byte.
struct ChoppyChannel {
    refuse_next: AtomicBool,
    received: Mutex<Vec<u8>>,
}

impl LogChannel for ChoppyChannel {
    fn try_send(&self, bytes: &[u8]) -> usize {
        if bytes.len() > 16 && self.refuse_next.fetch_xor(true, Ordering::Relaxed) {
            return 0;
        }
        self.received.lock().unwrap().extend_from_slice(bytes);
        bytes.len()
    }

    fn max_item_size(&self) -> usize {
        100
    }
}

static ENGINE: NetLogger<'static, CAPACITY> = NetLogger::new();
static CHANNEL: ChoppyChannel = ChoppyChannel {
    refuse_next: AtomicBool::new(false),
    received: Mutex::new(Vec::new()),
};

#[test]
fn test_replay_then_live_matches_boot_log_exactly() {
    let producer = thread::spawn(|| {
        for i in 0..LINES {
            ENGINE.dispatch(Level::Info, "", format_args!("line {}\n", i));
            if i % 64 == 0 {
                thread::yield_now();
            }
        }
    });

    // Attach somewhere in the middle of the boot sequence.
    while ENGINE.stats().lines < 500 {
        thread::yield_now();
    }
    assert!(ENGINE.activate_destination(DestinationKind::Udp, &CHANNEL));

    loop {
        ENGINE.drain_tick(DestinationKind::Udp);
        if ENGINE.mode(DestinationKind::Udp) == Mode::Live {
            break;
        }
        thread::yield_now();
    }
    producer.join().unwrap();

    let stats = ENGINE.stats();
    assert_eq!(stats.lines, LINES);
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.destinations[DestinationKind::Udp.index()].live_dropped, 0);

    let mut boot = vec![0u8; CAPACITY];
    let n = ENGINE.retrieve_boot_log(&mut boot);
    let received = CHANNEL.received.lock().unwrap();
    assert_eq!(received.len(), n);
    assert_eq!(received.as_slice(), &boot[..n]);
}
