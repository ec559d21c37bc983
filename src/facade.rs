//! `log` crate front end.
//!
//! Rust code logging through `log::info!` and friends reaches the engine
//! like any platform log call: level, target as tag, and the message.
//! Filtering stays with `log::set_max_level`.

use log::{LevelFilter, Log, Metadata, Record};

use crate::engine::NetLogger;

impl<const C: usize> Log for NetLogger<'_, C> {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.dispatch(
            record.level().into(),
            record.target(),
            format_args!("{}\n", record.args()),
        );
    }

    fn flush(&self) {}
}

/// Register `logger` as the global `log` backend.
///
/// Returns `false` if another logger was already set.
pub fn install_log_facade<const C: usize>(
    logger: &'static NetLogger<'static, C>,
    max_level: LevelFilter,
) -> bool {
    match log::set_logger(logger) {
        Ok(()) => {
            log::set_max_level(max_level);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_record_becomes_tagged_line() {
        let engine = NetLogger::<128>::new();
        engine.set_identifier(3);

        engine.log(
            &Record::builder()
                .level(Level::Error)
                .target("net")
                .args(format_args!("link down"))
                .build(),
        );

        let mut out = [0u8; 128];
        let n = engine.retrieve_boot_log(&mut out);
        assert_eq!(&out[..n], b"3 E net: link down\n");
    }
}
