//! Command encoding: every device action becomes a [`CommandDescriptor`], the
//! complete description of one USB control transfer.
//!
//! Encoding is pure and cannot fail. Parameters are not range-checked here: the
//! firmware rejects magnitudes it does not accept.

use crate::constants::{
    DecayMode, FIRMWARE_MODIFICATION_STRING_INDEX, Opcode, StepMode, USB_DESCRIPTOR_TYPE_STRING,
    USB_REQUEST_GET_DESCRIPTOR, VARIABLES_SIZE,
};
use bytes::Bytes;

/// Represents the direction of a control transfer's data stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device (bmRequestType 0x40 for vendor requests)
    Out,
    /// Device to host (bmRequestType 0xC0 for vendor requests)
    In,
}

/// Request type of a control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Vendor,
    Standard,
}

/// One control transfer, ready for a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub kind: RequestKind,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub direction: Direction,
    /// Data stage for OUT transfers. None of the built-in [`Command`]s carry
    /// one; it is there for hand-built descriptors passed to a transport.
    pub payload: Option<Bytes>,
    /// Number of bytes requested by IN transfers (0 for OUT)
    pub length: u16,
}

impl CommandDescriptor {
    fn vendor_out(opcode: Opcode, value: u16, index: u16) -> Self {
        Self {
            kind: RequestKind::Vendor,
            request: opcode.into(),
            value,
            index,
            direction: Direction::Out,
            payload: None,
            length: 0,
        }
    }

    fn vendor_out_32(opcode: Opcode, data: u32) -> Self {
        let (value, index) = split_u32(data);
        Self::vendor_out(opcode, value, index)
    }

    fn vendor_in(opcode: Opcode, index: u16, length: u16) -> Self {
        Self {
            kind: RequestKind::Vendor,
            request: opcode.into(),
            value: 0,
            index,
            direction: Direction::In,
            payload: None,
            length,
        }
    }
}

/// Splits a 32-bit parameter into the (value, index) pair of a control transfer.
pub fn split_u32(data: u32) -> (u16, u16) {
    ((data & 0xFFFF) as u16, ((data >> 16) & 0xFFFF) as u16)
}

/// Inverse of [`split_u32`].
pub fn join_u32(value: u16, index: u16) -> u32 {
    u32::from(value) | (u32::from(index) << 16)
}

/// Every action the host can ask of a Tic controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Energize,
    Deenergize,
    Reset,
    ResetCommandTimeout,
    HaltAndHold,
    EnterSafeStart,
    ExitSafeStart,
    ClearDriverError,
    Reinitialize,
    StartBootloader,
    SetTargetPosition(i32),
    SetTargetVelocity(i32),
    HaltAndSetPosition(i32),
    SetMaxSpeed(u32),
    SetStartingSpeed(u32),
    SetMaxAccel(u32),
    SetMaxDecel(u32),
    SetStepMode(StepMode),
    SetDecayMode(DecayMode),
    SetCurrentLimitCode(u8),
    /// Writes one byte of the non-volatile settings.
    SetSetting { address: u8, byte: u8 },
    /// Reads `length` bytes of the settings block starting at `offset`.
    GetSettings { offset: u8, length: u8 },
    GetVariables,
    /// Reads the variables block and clears the latched "errors occurred" bits.
    GetVariablesAndClearErrorsOccurred,
    /// Reads the firmware modification string descriptor.
    GetFirmwareModification,
}

impl Command {
    /// Builds the control transfer for this command.
    pub fn descriptor(&self) -> CommandDescriptor {
        match *self {
            Command::Energize => CommandDescriptor::vendor_out(Opcode::Energize, 0, 0),
            Command::Deenergize => CommandDescriptor::vendor_out(Opcode::Deenergize, 0, 0),
            Command::Reset => CommandDescriptor::vendor_out(Opcode::Reset, 0, 0),
            Command::ResetCommandTimeout => CommandDescriptor::vendor_out(Opcode::ResetCommandTimeout, 0, 0),
            Command::HaltAndHold => CommandDescriptor::vendor_out(Opcode::HaltAndHold, 0, 0),
            Command::EnterSafeStart => CommandDescriptor::vendor_out(Opcode::EnterSafeStart, 0, 0),
            Command::ExitSafeStart => CommandDescriptor::vendor_out(Opcode::ExitSafeStart, 0, 0),
            Command::ClearDriverError => CommandDescriptor::vendor_out(Opcode::ClearDriverError, 0, 0),
            Command::Reinitialize => CommandDescriptor::vendor_out(Opcode::Reinitialize, 0, 0),
            Command::StartBootloader => CommandDescriptor::vendor_out(Opcode::StartBootloader, 0, 0),

            // Signed parameters travel as their two's-complement bit pattern.
            Command::SetTargetPosition(p) => CommandDescriptor::vendor_out_32(Opcode::SetTargetPosition, p as u32),
            Command::SetTargetVelocity(v) => CommandDescriptor::vendor_out_32(Opcode::SetTargetVelocity, v as u32),
            Command::HaltAndSetPosition(p) => CommandDescriptor::vendor_out_32(Opcode::HaltAndSetPosition, p as u32),

            Command::SetMaxSpeed(s) => CommandDescriptor::vendor_out_32(Opcode::SetMaxSpeed, s),
            Command::SetStartingSpeed(s) => CommandDescriptor::vendor_out_32(Opcode::SetStartingSpeed, s),
            Command::SetMaxAccel(a) => CommandDescriptor::vendor_out_32(Opcode::SetMaxAccel, a),
            Command::SetMaxDecel(d) => CommandDescriptor::vendor_out_32(Opcode::SetMaxDecel, d),

            Command::SetStepMode(mode) => {
                CommandDescriptor::vendor_out(Opcode::SetStepMode, u8::from(mode).into(), 0)
            }
            Command::SetDecayMode(mode) => {
                CommandDescriptor::vendor_out(Opcode::SetDecayMode, u8::from(mode).into(), 0)
            }
            Command::SetCurrentLimitCode(code) => {
                CommandDescriptor::vendor_out(Opcode::SetCurrentLimit, code.into(), 0)
            }

            Command::SetSetting { address, byte } => {
                CommandDescriptor::vendor_out(Opcode::SetSetting, address.into(), byte.into())
            }
            Command::GetSettings { offset, length } => {
                CommandDescriptor::vendor_in(Opcode::GetSetting, offset.into(), length.into())
            }
            Command::GetVariables => CommandDescriptor::vendor_in(Opcode::GetVariable, 0, VARIABLES_SIZE as u16),
            Command::GetVariablesAndClearErrorsOccurred => CommandDescriptor::vendor_in(
                Opcode::GetVariableAndClearErrorsOccurred,
                0,
                VARIABLES_SIZE as u16,
            ),
            Command::GetFirmwareModification => CommandDescriptor {
                kind: RequestKind::Standard,
                request: USB_REQUEST_GET_DESCRIPTOR,
                value: (u16::from(USB_DESCRIPTOR_TYPE_STRING) << 8) | u16::from(FIRMWARE_MODIFICATION_STRING_INDEX),
                index: 0,
                direction: Direction::In,
                payload: None,
                length: 255,
            },
        }
    }
}

impl From<Command> for CommandDescriptor {
    fn from(command: Command) -> Self {
        command.descriptor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_negative_position() {
        // -1650 * 8 steps, as used when homing against the far limit
        let d = Command::SetTargetPosition(-13_200).descriptor();
        assert_eq!(d.request, 0xE0);
        assert_eq!(d.value, 0xCC70);
        assert_eq!(d.index, 0xFFFF);
        assert_eq!(d.direction, Direction::Out);
        assert_eq!(join_u32(d.value, d.index) as i32, -13_200);
    }

    #[test]
    fn test_eight_bit_parameter_in_value() {
        let d = Command::SetCurrentLimitCode(21).descriptor();
        assert_eq!((d.request, d.value, d.index), (0x91, 21, 0));

        let d = Command::SetStepMode(StepMode::Microstep8).descriptor();
        assert_eq!((d.request, d.value, d.index), (0x94, 3, 0));
    }

    #[test]
    fn test_get_variables_requests_full_block() {
        let d = Command::GetVariables.descriptor();
        assert_eq!(d.kind, RequestKind::Vendor);
        assert_eq!(d.direction, Direction::In);
        assert_eq!(d.length, 90);

        let d = Command::GetVariablesAndClearErrorsOccurred.descriptor();
        assert_eq!(d.request, 0xA2);
        assert_eq!(d.length, 90);
    }

    #[test]
    fn test_firmware_modification_descriptor() {
        let d = Command::GetFirmwareModification.descriptor();
        assert_eq!(d.kind, RequestKind::Standard);
        assert_eq!(d.request, 6);
        assert_eq!(d.value, 0x0304);
    }
}
