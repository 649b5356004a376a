//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use nusb::transfer::TransferError;
#[allow(unused_imports)]
pub use tic_lib::constants::{InputState, OperationState, Product, VARIABLES_SIZE, offsets};
#[allow(unused_imports)]
pub use tic_lib::{
    CancelToken, Command, CommandDescriptor, DeviceIdentity, Direction, FirmwareVersion, MoveOutcome, PollOptions,
    SessionConfig, StatusSnapshot, Tic, TicError, Transport,
};

use std::collections::VecDeque;
use std::time::Duration;

/// Builder for synthetic 90-byte status blocks.
#[allow(dead_code)]
#[derive(Clone)]
pub struct StatusBlock([u8; VARIABLES_SIZE]);

#[allow(dead_code)]
impl StatusBlock {
    /// Energized, in normal operation, holding position 0.
    pub fn normal() -> Self {
        let mut block = [0u8; VARIABLES_SIZE];
        block[offsets::OPERATION_STATE] = OperationState::Normal.into();
        block[offsets::MISC_FLAGS1] = 0x01;
        block[offsets::INPUT_STATE] = InputState::Position.into();
        block[offsets::VIN_VOLTAGE..offsets::VIN_VOLTAGE + 2].copy_from_slice(&12_000u16.to_le_bytes());
        Self(block)
    }

    pub fn state(mut self, state: OperationState) -> Self {
        self.0[offsets::OPERATION_STATE] = state.into();
        self
    }

    pub fn input(mut self, input: InputState) -> Self {
        self.0[offsets::INPUT_STATE] = input.into();
        self
    }

    pub fn errors(mut self, bits: u16) -> Self {
        self.0[offsets::ERROR_STATUS..offsets::ERROR_STATUS + 2].copy_from_slice(&bits.to_le_bytes());
        self
    }

    pub fn positions(mut self, current: i32, target: i32) -> Self {
        self.0[offsets::CURRENT_POSITION..offsets::CURRENT_POSITION + 4].copy_from_slice(&current.to_le_bytes());
        self.0[offsets::TARGET_POSITION..offsets::TARGET_POSITION + 4].copy_from_slice(&target.to_le_bytes());
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Scripted transport: records every descriptor and answers status reads from a queue.
///
/// Once the queue is down to its last block that block is repeated.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockTransport {
    pub sent: Vec<CommandDescriptor>,
    pub timeouts: Vec<Duration>,
    pub responses: VecDeque<Vec<u8>>,
    pub fail_request: Option<u8>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn with_blocks<I: IntoIterator<Item = StatusBlock>>(blocks: I) -> Self {
        Self {
            responses: blocks.into_iter().map(|b| b.bytes()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, request: u8) -> Self {
        self.fail_request = Some(request);
        self
    }

    pub fn requests(&self) -> Vec<u8> {
        self.sent.iter().map(|d| d.request).collect()
    }
}

impl Transport for MockTransport {
    fn execute(&mut self, descriptor: &CommandDescriptor, timeout: Duration) -> Result<Vec<u8>, TransferError> {
        self.sent.push(descriptor.clone());
        self.timeouts.push(timeout);
        if self.fail_request == Some(descriptor.request) {
            return Err(TransferError::Stall);
        }
        match descriptor.direction {
            Direction::Out => Ok(Vec::new()),
            Direction::In if self.responses.len() > 1 => Ok(self.responses.pop_front().unwrap_or_default()),
            Direction::In => Ok(self.responses.front().cloned().unwrap_or_default()),
        }
    }
}

#[allow(dead_code)]
pub fn identity(product: Product) -> DeviceIdentity {
    DeviceIdentity {
        vendor_id: 0x1FFB,
        product,
        serial: Some("00218293".to_string()),
        firmware_version: FirmwareVersion { bcd: 0x0106 },
    }
}

#[allow(dead_code)]
pub fn session(transport: MockTransport) -> Tic<MockTransport> {
    Tic::with_transport(transport, identity(Product::T500), SessionConfig::default())
}
