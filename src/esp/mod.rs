//! ESP-IDF platform glue.
//!
//! - [`hook`]: routes `ESP_LOGx` output into the engine via `esp_log_set_vprintf`
//! - [`channel`]: FreeRTOS message buffer implementing [`LogChannel`](crate::LogChannel)
//! - [`replicator`]: worker start-up, readiness handshake and drain timers

pub mod channel;
pub mod hook;
pub mod replicator;

pub use channel::MessageBufferChannel;
pub use replicator::{ReadySignal, Replicator};
