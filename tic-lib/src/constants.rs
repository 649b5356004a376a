//! Protocol constants for the Pololu Tic USB interface.
//!
//! Every table in this module is immutable and shared by the whole crate: opcodes,
//! enumerations carried inside the variables block, byte offsets of that block, and
//! the per-product current limits.

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use std::time::Duration;
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::Serialize;

/// USB vendor id shared by every Tic controller.
pub const VENDOR_ID: u16 = 0x1FFB;

/// Size of the block returned by the "get variables" request (90 bytes)
pub const VARIABLES_SIZE: usize = 0x5A;

/// Default per-transfer timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Upper bound accepted for the per-transfer timeout
pub const MAX_COMMAND_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Milliamps represented by one current-limit code step on the T825/T834
pub const CURRENT_LIMIT_UNITS_MA: u32 = 32;

/// Highest current-limit code accepted by the T500
pub const MAX_CURRENT_CODE_T500: u8 = 32;

// Maximum current each product allows, in milliamps.
pub const MAX_CURRENT_T825_MA: u32 = 3968;
pub const MAX_CURRENT_T834_MA: u32 = 3456;
pub const MAX_CURRENT_T500_MA: u32 = 3093;

// Limits the firmware enforces on motion parameters. Speeds are in microsteps
// per 10000 s, accelerations in microsteps per 100 s^2.
pub const MIN_ALLOWED_ACCEL: u32 = 100;
pub const MAX_ALLOWED_ACCEL: u32 = 0x7FFF_FFFF;
pub const MAX_ALLOWED_SPEED: u32 = 500_000_000;

/// USB standard request: GET_DESCRIPTOR
pub const USB_REQUEST_GET_DESCRIPTOR: u8 = 6;

/// USB descriptor type: STRING
pub const USB_DESCRIPTOR_TYPE_STRING: u8 = 3;

/// String descriptor index holding the firmware modification string
pub const FIRMWARE_MODIFICATION_STRING_INDEX: u8 = 4;

/// Tic product families, numbered as the firmware numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum Product {
    T825 = 1,
    T834 = 2,
    T500 = 3,
}

impl Product {
    pub const ALL: [Product; 3] = [Product::T825, Product::T834, Product::T500];

    pub fn usb_product_id(self) -> u16 {
        match self {
            Product::T825 => 0x00B3,
            Product::T834 => 0x00B5,
            Product::T500 => 0x00BD,
        }
    }

    pub fn from_usb_product_id(product_id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.usb_product_id() == product_id)
    }

    /// Highest current the product is rated for, in milliamps.
    pub fn max_current_ma(self) -> u32 {
        match self {
            Product::T825 => MAX_CURRENT_T825_MA,
            Product::T834 => MAX_CURRENT_T834_MA,
            Product::T500 => MAX_CURRENT_T500_MA,
        }
    }
}

/// Request codes understood by the Tic firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Opcode {
    SetTargetPosition = 0xE0,
    SetTargetVelocity = 0xE3,
    HaltAndSetPosition = 0xEC,
    HaltAndHold = 0x89,
    ResetCommandTimeout = 0x8C,
    Deenergize = 0x86,
    Energize = 0x85,
    ExitSafeStart = 0x83,
    EnterSafeStart = 0x8F,
    Reset = 0xB0,
    ClearDriverError = 0x8A,
    SetMaxSpeed = 0xE6,
    SetStartingSpeed = 0xE5,
    SetMaxAccel = 0xEA,
    SetMaxDecel = 0xE9,
    SetStepMode = 0x94,
    SetCurrentLimit = 0x91,
    SetDecayMode = 0x92,
    GetVariable = 0xA1,
    GetVariableAndClearErrorsOccurred = 0xA2,
    GetSetting = 0xA8,
    SetSetting = 0x13,
    Reinitialize = 0x10,
    StartBootloader = 0xFF,
}

/// Top-level state of the controller. Only `Normal` accepts motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum OperationState {
    Reset = 0,
    Deenergized = 2,
    SoftError = 4,
    WaitingForErrLine = 6,
    StartingUp = 8,
    Normal = 10,
}

/// What the motion planner is currently targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum PlanningMode {
    Off = 0,
    TargetPosition = 1,
    TargetVelocity = 2,
}

/// Classification of the control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum InputState {
    NotReady = 0,
    Invalid = 1,
    Halt = 2,
    Position = 3,
    Velocity = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum StepMode {
    #[strum(to_string = "Full step")]
    Full = 0,
    #[strum(to_string = "1/2 step")]
    Half = 1,
    #[strum(to_string = "1/4 step")]
    Microstep4 = 2,
    #[strum(to_string = "1/8 step")]
    Microstep8 = 3,
    #[strum(to_string = "1/16 step")]
    Microstep16 = 4,
    #[strum(to_string = "1/32 step")]
    Microstep32 = 5,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Decay mode codes. Their meaning depends on the product: the T825 knows
/// `Mixed`/`Slow`/`Fast`, the T834 adds `Mixed25`/`Mixed75` (and calls `Mixed`
/// "mixed 50%"), and the T500 only has automatic decay (code 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum DecayMode {
    Mixed = 0,
    Slow = 1,
    Fast = 2,
    Mixed25 = 3,
    Mixed75 = 4,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl DecayMode {
    pub const T500_AUTO: DecayMode = DecayMode::Mixed;
}

/// Cause of the last controller reset, from the `device_reset` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum ResetCause {
    #[strum(to_string = "Power-on reset")]
    PowerUp = 0,
    #[strum(to_string = "Brown-out reset")]
    Brownout = 1,
    #[strum(to_string = "Reset pin driven low")]
    ResetLine = 2,
    #[strum(to_string = "Watchdog reset")]
    Watchdog = 4,
    #[strum(to_string = "Software reset")]
    Software = 8,
    #[strum(to_string = "Stack overflow")]
    StackOverflow = 16,
    #[strum(to_string = "Stack underflow")]
    StackUnderflow = 32,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Bit positions in the error status / errors occurred bitmasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum ErrorKind {
    #[strum(to_string = "Intentionally de-energized")]
    IntentionallyDeenergized = 0,
    #[strum(to_string = "Motor driver error")]
    MotorDriverError = 1,
    #[strum(to_string = "Low VIN")]
    LowVin = 2,
    #[strum(to_string = "Kill switch active")]
    KillSwitch = 3,
    #[strum(to_string = "Required input invalid")]
    RequiredInputInvalid = 4,
    #[strum(to_string = "Serial error")]
    SerialError = 5,
    #[strum(to_string = "Command timeout")]
    CommandTimeout = 6,
    #[strum(to_string = "Safe start violation")]
    SafeStartViolation = 7,
    #[strum(to_string = "ERR line high")]
    ErrLineHigh = 8,
    #[strum(to_string = "Serial framing")]
    SerialFraming = 16,
    #[strum(to_string = "Serial RX overrun")]
    SerialRxOverrun = 17,
    #[strum(to_string = "Serial format")]
    SerialFormat = 18,
    #[strum(to_string = "Serial CRC")]
    SerialCrc = 19,
    #[strum(to_string = "Encoder skip")]
    EncoderSkip = 20,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 14] = [
        ErrorKind::IntentionallyDeenergized,
        ErrorKind::MotorDriverError,
        ErrorKind::LowVin,
        ErrorKind::KillSwitch,
        ErrorKind::RequiredInputInvalid,
        ErrorKind::SerialError,
        ErrorKind::CommandTimeout,
        ErrorKind::SafeStartViolation,
        ErrorKind::ErrLineHigh,
        ErrorKind::SerialFraming,
        ErrorKind::SerialRxOverrun,
        ErrorKind::SerialFormat,
        ErrorKind::SerialCrc,
        ErrorKind::EncoderSkip,
    ];

    pub fn mask(self) -> u32 {
        1 << u8::from(self)
    }
}

/// Drive state of a control pin, two bits per pin in `pin_states`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum PinState {
    HighImpedance = 0,
    PulledUp = 1,
    OutputLow = 2,
    OutputHigh = 3,
}

/// Control pins, in the order the firmware reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive)]
#[repr(u8)]
pub enum Pin {
    Scl = 0,
    Sda = 1,
    Tx = 2,
    Rx = 3,
    Rc = 4,
}

/// Byte offsets of the variables inside the 90-byte status block.
pub mod offsets {
    pub const OPERATION_STATE: usize = 0x00;
    pub const MISC_FLAGS1: usize = 0x01;
    pub const ERROR_STATUS: usize = 0x02;
    pub const ERRORS_OCCURRED: usize = 0x04;
    pub const PLANNING_MODE: usize = 0x09;
    pub const TARGET_POSITION: usize = 0x0A;
    pub const TARGET_VELOCITY: usize = 0x0E;
    pub const STARTING_SPEED: usize = 0x12;
    pub const MAX_SPEED: usize = 0x16;
    pub const MAX_DECEL: usize = 0x1A;
    pub const MAX_ACCEL: usize = 0x1E;
    pub const CURRENT_POSITION: usize = 0x22;
    pub const CURRENT_VELOCITY: usize = 0x26;
    pub const ACTING_TARGET_POSITION: usize = 0x2A;
    pub const TIME_SINCE_LAST_STEP: usize = 0x2E;
    pub const DEVICE_RESET: usize = 0x32;
    pub const VIN_VOLTAGE: usize = 0x33;
    pub const UP_TIME: usize = 0x35;
    pub const ENCODER_POSITION: usize = 0x39;
    pub const RC_PULSE_WIDTH: usize = 0x3D;
    pub const ANALOG_READING_SCL: usize = 0x3F;
    pub const ANALOG_READING_SDA: usize = 0x41;
    pub const ANALOG_READING_TX: usize = 0x43;
    pub const ANALOG_READING_RX: usize = 0x45;
    pub const DIGITAL_READINGS: usize = 0x47;
    pub const PIN_STATES: usize = 0x48;
    pub const STEP_MODE: usize = 0x49;
    pub const CURRENT_LIMIT: usize = 0x4A;
    pub const DECAY_MODE: usize = 0x4B;
    pub const INPUT_STATE: usize = 0x4C;
    pub const INPUT_AFTER_AVERAGING: usize = 0x4D;
    pub const INPUT_AFTER_HYSTERESIS: usize = 0x4F;
    pub const INPUT_AFTER_SCALING: usize = 0x51;
    pub const LAST_MOTOR_DRIVER_ERROR: usize = 0x55;
    pub const AGC_MODE: usize = 0x56;
    pub const AGC_BOTTOM_CURRENT_LIMIT: usize = 0x57;
    pub const AGC_CURRENT_BOOST_STEPS: usize = 0x58;
    pub const AGC_FREQUENCY_LIMIT: usize = 0x59;
}
