pub mod command;
pub mod constants;
pub mod current_limit;
pub mod device;
pub mod error;
pub mod limit_switch;
pub mod poll;
pub mod transport;
pub mod variables;

#[cfg(test)]
mod tests;

// Re-export the session type and the common vocabulary for easy access
pub use command::{Command, CommandDescriptor, Direction, RequestKind};
pub use constants::{InputState, OperationState, Product};
pub use current_limit::CurrentLimitTable;
pub use device::{MoveOutcome, SessionConfig, Tic};
pub use error::{DecodeError, Result, TicError};
pub use poll::{CancelToken, POLL_INTERVAL, PollOptions};
pub use transport::{DeviceIdentity, FirmwareVersion, Transport, UsbTransport};
pub use variables::{ErrorStatus, StatusSnapshot};
