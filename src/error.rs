//! Error types for XBee command mode operations.

use thiserror::Error;

/// Result type alias for XBee operations.
pub type Result<T> = std::result::Result<T, XBeeError>;

/// Platform faults raised while talking to a module.
///
/// Protocol failures (no acknowledgement, oversized reply, unknown rate) are
/// reported as values by the operation that detected them, never through
/// this type.
#[derive(Error, Debug)]
pub enum XBeeError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transmitter stayed busy for the whole retry budget
    #[error("Transmitter busy after {attempts} attempts")]
    TransmitStalled {
        /// Number of attempts made
        attempts: u32,
    },

    /// A configuration exchange was requested before the link was synchronized
    #[error("Link is not synchronized")]
    NotSynchronized,

    /// Data parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}
