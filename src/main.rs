//! netlog - demo entry point
//!
//! On the device:
//! 1. Hook ESP-IDF logging before anything else logs
//! 2. Bring up destinations as their transports connect
//! 3. Every destination replays the boot log, then goes live
//!
//! On the host it runs the same flow against an in-memory channel.

use esp_net_logging::{DestinationKind, NetLogger};

static NETLOG: NetLogger<'static> = NetLogger::new();

#[cfg(target_os = "espidf")]
fn main() {
    use esp_net_logging::config::{NetLogConfig, SocketTarget};
    use esp_net_logging::esp::{hook, Replicator};

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = NetLogConfig {
        id: 1,
        udp: Some(SocketTarget { host: "192.168.1.10", port: 6789 }),
        ..Default::default()
    };

    hook::install(&NETLOG, config.local_echo);
    NETLOG.set_identifier(config.id);
    log::info!("{}", env!("VERSION_STRING"));

    if let Err(e) = config.validate() {
        log::error!("bad config: {}", e);
        return;
    }

    // Network bring-up happens elsewhere; workers retry until it is up.
    let mut replicator = match Replicator::new(&NETLOG) {
        Ok(r) => r,
        Err(e) => {
            log::error!("replicator: {}", e);
            return;
        }
    };

    if let Some(target) = config.udp {
        let addr = std::format!("{}:{}", target.host, target.port);
        let started = replicator.start_destination(DestinationKind::Udp, move |channel, ready| {
            udp_worker(&addr, channel, ready)
        });
        if let Err(e) = started {
            log::error!("UDP logging: {}", e);
        }
    }

    loop {
        std::thread::sleep(std::time::Duration::from_secs(1));
    }
}

/// Minimal datagram transport: one message buffer item per datagram.
#[cfg(target_os = "espidf")]
fn udp_worker(
    addr: &str,
    channel: &'static esp_net_logging::esp::MessageBufferChannel,
    ready: esp_net_logging::esp::ReadySignal,
) {
    use esp_idf_svc::hal::delay::BLOCK;
    use esp_net_logging::config::LINE_CAPACITY;

    let socket = match std::net::UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => s,
        Err(_) => return,
    };
    ready.notify();

    let mut buf = [0u8; LINE_CAPACITY];
    loop {
        let n = channel.receive(&mut buf, BLOCK);
        if n > 0 {
            let _ = socket.send_to(&buf[..n], addr);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    use std::io::Write;
    use std::sync::Mutex;

    use esp_net_logging::config::LINE_CAPACITY;
    use esp_net_logging::{Level, LineSink, LogChannel};

    struct Stdout;

    impl LineSink for Stdout {
        fn consume(&self, line: &[u8]) -> usize {
            std::io::stdout().write(line).unwrap_or(0)
        }
    }

    struct Collect(Mutex<Vec<u8>>);

    impl LogChannel for Collect {
        fn try_send(&self, bytes: &[u8]) -> usize {
            match self.0.lock() {
                Ok(mut v) => {
                    v.extend_from_slice(bytes);
                    bytes.len()
                }
                Err(_) => 0,
            }
        }

        fn max_item_size(&self) -> usize {
            LINE_CAPACITY
        }
    }

    static STDOUT: Stdout = Stdout;
    static UDP: Collect = Collect(Mutex::new(Vec::new()));

    NETLOG.initialize(false, || Some(&STDOUT as &dyn LineSink));
    NETLOG.set_identifier(1);

    for i in 0..5 {
        NETLOG.dispatch(Level::Info, "boot", format_args!("step {}\n", i));
    }

    NETLOG.activate_destination(DestinationKind::Udp, &UDP);
    while NETLOG.drain_tick(DestinationKind::Udp).keeps_timer() {}
    NETLOG.dispatch(Level::Info, "main", format_args!("live\n"));

    let stats = NETLOG.stats();
    println!(
        "captured={} lines={} udp={:?}",
        stats.captured,
        stats.lines,
        stats.destinations[DestinationKind::Udp.index()]
    );
    if let Ok(udp) = UDP.0.lock() {
        print!("{}", String::from_utf8_lossy(&udp));
    }
}
