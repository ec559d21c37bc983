//! # esp-net-logging
//!
//! Early-boot log capture and replay to network destinations.
//!
//! ## Architecture
//!
//! Every log line lands in one append-only [`CaptureBuffer`] from the first
//! log call on, long before any network exists. Destinations (UDP, TCP,
//! MQTT, HTTP) come online later and each replays the buffer from byte 0 at
//! its own pace, then switches to receiving lines live:
//! - Producers (tasks or ISRs) only append, never wait on a destination
//! - Each destination owns its cursor; a stuck one never slows another
//! - Cursor updates run in a critical section, channel sends never do
//!
//! Platform glue for ESP-IDF lives in [`esp`] and is only built for
//! `target_os = "espidf"`.

#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "espidf")]
extern crate std;

pub mod capture;
pub mod config;
pub mod drain;
pub mod engine;
pub mod error;
pub mod facade;
pub mod hook;
pub mod line;
pub mod registry;

#[cfg(target_os = "espidf")]
pub mod esp;

pub use capture::CaptureBuffer;
pub use config::NetLogConfig;
pub use drain::DrainStatus;
pub use engine::{NetLogStats, NetLogger};
pub use error::NetLogError;
pub use facade::install_log_facade;
pub use hook::{HookChain, LineSink, NullSink};
pub use line::{Level, LineBuffer};
pub use registry::{DestinationKind, LogChannel, Mode, Registry, SendGate};
