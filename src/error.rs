//! Error types shared by the driver core.

use thiserror::Error;

use crate::device::InterfaceId;
use crate::event::ChannelKind;
use crate::report::DecodeError;

/// Failures reported across the transport boundary.
///
/// Only attach-time failures are fatal for the interface being attached;
/// everything else drops a single report and leaves the session untouched.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not one of our devices; the caller should simply ignore it.
    #[error("unknown device {vendor:04x}:{product:04x}")]
    UnknownDevice { vendor: u16, product: u16 },

    #[error("malformed report: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not allocate {0} channel")]
    AllocationFailure(ChannelKind),

    #[error("{kind} channel registration rejected: {source}")]
    RegistrationFailure {
        kind: ChannelKind,
        #[source]
        source: BackendError,
    },

    #[error("no session for interface {0}")]
    NotAttached(InterfaceId),

    #[error("{0} channel is not registered yet")]
    ChannelUnavailable(ChannelKind),

    #[error("failed to emit on {kind} channel: {source}")]
    Emit {
        kind: ChannelKind,
        #[source]
        source: BackendError,
    },
}

impl CoreError {
    /// True for errors that abort an attach and must be propagated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::AllocationFailure(_) | CoreError::RegistrationFailure { .. }
        )
    }
}

/// Errors raised by an output backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("out of resources")]
    OutOfResources,

    #[error("rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Validation failures from the configuration setters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field}: width and height must both be positive unless the whole rect is zero")]
    DegenerateRect { field: &'static str },

    #[error("orientation {0} out of range (expected 0..=3)")]
    OrientationOutOfRange(u32),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
