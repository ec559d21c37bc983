//! Setup-time error types.
//!
//! The logging path itself never fails: appends report a byte count and
//! channel sends report what was accepted. These errors only surface from
//! configuration checks and from bringing a destination online.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;

/// Error with a short code and message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetLogError {
    /// N01: Destination kind already has a channel attached
    AlreadyActive,
    /// N02: Configuration field exceeds its limit
    FieldTooLong,
    /// N03: Port number is zero
    InvalidPort,
    /// N04: Outbound channel could not be allocated
    ChannelAlloc,
    /// N05: Transport worker could not be started
    WorkerSpawn,
    /// N06: Drain timer could not be created or armed
    Timer,
    /// N07: Worker dropped its readiness signal without connecting
    ReadinessLost,
    /// N08: ESP-IDF call failed
    #[cfg(target_os = "espidf")]
    Esp(EspError),
}

impl NetLogError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyActive => "N01",
            Self::FieldTooLong => "N02",
            Self::InvalidPort => "N03",
            Self::ChannelAlloc => "N04",
            Self::WorkerSpawn => "N05",
            Self::Timer => "N06",
            Self::ReadinessLost => "N07",
            #[cfg(target_os = "espidf")]
            Self::Esp(_) => "N08",
        }
    }

    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::AlreadyActive => "destination already active",
            Self::FieldTooLong => "field too long",
            Self::InvalidPort => "invalid port",
            Self::ChannelAlloc => "channel allocation failed",
            Self::WorkerSpawn => "worker spawn failed",
            Self::Timer => "drain timer failed",
            Self::ReadinessLost => "worker never became ready",
            #[cfg(target_os = "espidf")]
            Self::Esp(_) => "ESP-IDF error",
        }
    }
}

impl core::fmt::Display for NetLogError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())?;
        #[cfg(target_os = "espidf")]
        if let Self::Esp(e) = self {
            write!(f, " ({})", e)?;
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl From<EspError> for NetLogError {
    fn from(e: EspError) -> Self {
        NetLogError::Esp(e)
    }
}
