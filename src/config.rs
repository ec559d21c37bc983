//! Module: config
//!
//! Purpose: Compile-time sizing and runtime destination parameters.
//!
//! Sizing constants are fixed at build time so the capture buffer and the
//! per-line scratch space are static and allocation-free. Destination
//! parameters are plain borrowed strings; parsing them is the caller's job.

use core::time::Duration;

use crate::error::NetLogError;
use crate::registry::DestinationKind;

/// Capture buffer size in bytes (boot-time history).
pub const CAPTURE_CAPACITY: usize = 2048;

/// Largest formatted line, and largest item a channel accepts in one send.
pub const LINE_CAPACITY: usize = 256;

/// Bytes each outbound channel can hold before the worker drains it.
pub const CHANNEL_CAPACITY: usize = 8 * LINE_CAPACITY;

/// Period of the per-destination drain timer.
pub const DRAIN_PERIOD: Duration = Duration::from_millis(100);

/// Host field limit (`xxx.xxx.xxx.xxx` plus terminator headroom).
pub const MAX_HOST_LEN: usize = 20;

/// URL and topic field limit.
pub const MAX_URL_LEN: usize = 64;

/// Datagram or stream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketTarget<'a> {
    pub host: &'a str,
    pub port: u16,
}

/// Publish/subscribe endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MqttTarget<'a> {
    pub url: &'a str,
    pub topic: &'a str,
}

/// Request-based endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTarget<'a> {
    pub url: &'a str,
}

/// Network logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetLogConfig<'a> {
    /// Numeric tag prefixed to every line.
    pub id: u32,
    /// Echo every line to the previous sink as well.
    pub local_echo: bool,
    pub udp: Option<SocketTarget<'a>>,
    pub tcp: Option<SocketTarget<'a>>,
    pub mqtt: Option<MqttTarget<'a>>,
    pub http: Option<HttpTarget<'a>>,
}

impl Default for NetLogConfig<'_> {
    fn default() -> Self {
        Self {
            id: 0,
            local_echo: true,
            udp: None,
            tcp: None,
            mqtt: None,
            http: None,
        }
    }
}

impl<'a> NetLogConfig<'a> {
    /// Is the given destination configured?
    pub fn has(&self, kind: DestinationKind) -> bool {
        match kind {
            DestinationKind::Udp => self.udp.is_some(),
            DestinationKind::Tcp => self.tcp.is_some(),
            DestinationKind::Mqtt => self.mqtt.is_some(),
            DestinationKind::Http => self.http.is_some(),
        }
    }

    /// Configured destination kinds, in registry order.
    pub fn destinations(&self) -> impl Iterator<Item = DestinationKind> + '_ {
        DestinationKind::ALL.into_iter().filter(move |k| self.has(*k))
    }

    /// Check field limits.
    pub fn validate(&self) -> Result<(), NetLogError> {
        for target in [self.udp, self.tcp].into_iter().flatten() {
            check_len(target.host, MAX_HOST_LEN)?;
            if target.port == 0 {
                return Err(NetLogError::InvalidPort);
            }
        }
        if let Some(mqtt) = self.mqtt {
            check_len(mqtt.url, MAX_URL_LEN)?;
            check_len(mqtt.topic, MAX_URL_LEN)?;
        }
        if let Some(http) = self.http {
            check_len(http.url, MAX_URL_LEN)?;
        }
        Ok(())
    }
}

// Limits leave room for a C terminator.
fn check_len(s: &str, max: usize) -> Result<(), NetLogError> {
    if s.is_empty() || s.len() >= max {
        Err(NetLogError::FieldTooLong)
    } else {
        Ok(())
    }
}
