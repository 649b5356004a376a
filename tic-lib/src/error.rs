use crate::constants::OperationState;
use crate::variables::ErrorStatus;
use nusb::transfer::TransferError;
use thiserror::Error;

/// The primary error type for the `tic-lib` library.
///
/// Any of these leaves the controller in an unknown state: re-query it with a
/// fresh status read before acting on it again.
#[derive(Error, Debug)]
pub enum TicError {
    #[error("Tic controller not found{}", serial.as_ref().map(|s| format!(" (serial {s})")).unwrap_or_default())]
    DeviceNotFound { serial: Option<String> },

    #[error("USB product id {0:#06x} is not a supported Tic controller")]
    UnsupportedProduct(u16),

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB control transfer for request {request:#04x} failed")]
    Transport {
        request: u8,
        #[source]
        source: TransferError,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("motion aborted: controller left normal operation ({state}), errors: {errors}")]
    MotionAborted { state: OperationState, errors: ErrorStatus },

    #[error("polling cancelled")]
    Cancelled,

    #[error("polling deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid transfer timeout {requested_ms} ms (allowed 1..={max_ms} ms)")]
    InvalidTimeout { requested_ms: u64, max_ms: u64 },
}

/// Failure to turn a status block into a [`StatusSnapshot`](crate::StatusSnapshot).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },

    #[error("Invalid value {value:#04x} for {field}")]
    InvalidValue { field: &'static str, value: u8 },
}

pub type Result<T, E = TicError> = std::result::Result<T, E>;
