//! The 90-byte variables block and its typed decoding.

use crate::constants::{
    DecayMode, ErrorKind, InputState, OperationState, Pin, PinState, PlanningMode, ResetCause, StepMode,
    VARIABLES_SIZE,
};
use crate::error::DecodeError;
use num_enum::TryFromPrimitive;
use std::fmt;
use zerocopy::byteorder::little_endian::{I16, I32, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Wire layout of the variables block, byte for byte.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct VariablesRaw {
    pub operation_state: u8,         // 0x00
    pub misc_flags1: u8,             // 0x01
    pub error_status: U16,           // 0x02
    pub errors_occurred: U32,        // 0x04
    pub reserved0: u8,               // 0x08
    pub planning_mode: u8,           // 0x09
    pub target_position: I32,        // 0x0A
    pub target_velocity: I32,        // 0x0E
    pub starting_speed: U32,         // 0x12
    pub max_speed: U32,              // 0x16
    pub max_decel: U32,              // 0x1A
    pub max_accel: U32,              // 0x1E
    pub current_position: I32,       // 0x22
    pub current_velocity: I32,       // 0x26
    pub acting_target_position: I32, // 0x2A
    pub time_since_last_step: U32,   // 0x2E
    pub device_reset: u8,            // 0x32
    pub vin_voltage_mv: U16,         // 0x33
    pub up_time_ms: U32,             // 0x35
    pub encoder_position: I32,       // 0x39
    pub rc_pulse_width: U16,         // 0x3D
    pub analog_reading_scl: U16,     // 0x3F
    pub analog_reading_sda: U16,     // 0x41
    pub analog_reading_tx: U16,      // 0x43
    pub analog_reading_rx: U16,      // 0x45
    pub digital_readings: u8,        // 0x47
    pub pin_states: u8,              // 0x48
    pub step_mode: u8,               // 0x49
    pub current_limit: u8,           // 0x4A
    pub decay_mode: u8,              // 0x4B
    pub input_state: u8,             // 0x4C
    pub input_after_averaging: U16,  // 0x4D
    pub input_after_hysteresis: U16, // 0x4F
    pub input_after_scaling: I16,    // 0x51
    pub reserved1: [u8; 2],          // 0x53
    pub last_motor_driver_error: u8, // 0x55
    pub agc_mode: u8,                // 0x56
    pub agc_bottom_current_limit: u8,
    pub agc_current_boost_steps: u8,
    pub agc_frequency_limit: u8,
}

const _: () = assert!(size_of::<VariablesRaw>() == VARIABLES_SIZE);

/// Bitmask of [`ErrorKind`]s. Any subset may be set at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct ErrorStatus(pub u32);

impl ErrorStatus {
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.0 & kind.mask() != 0
    }

    /// The known error kinds that are set, lowest bit first.
    pub fn iter(&self) -> impl Iterator<Item = ErrorKind> {
        let status = *self;
        ErrorKind::ALL.into_iter().filter(move |k| status.contains(*k))
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for kind in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", kind, u8::from(kind))?;
            first = false;
        }
        Ok(())
    }
}

/// The `misc_flags1` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct MiscFlags(pub u8);

impl MiscFlags {
    pub fn energized(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn position_uncertain(&self) -> bool {
        self.0 & 0x02 != 0
    }
}

/// Decoded copy of every variable the controller reports.
///
/// A snapshot always comes from one status read; a session replaces the whole
/// value on every poll.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StatusSnapshot {
    pub operation_state: OperationState,
    pub misc_flags: MiscFlags,
    pub error_status: ErrorStatus,
    pub errors_occurred: ErrorStatus,
    pub planning_mode: PlanningMode,
    pub target_position: i32,
    pub target_velocity: i32,
    pub starting_speed: u32,
    pub max_speed: u32,
    pub max_decel: u32,
    pub max_accel: u32,
    pub current_position: i32,
    pub current_velocity: i32,
    pub acting_target_position: i32,
    pub time_since_last_step: u32,
    pub device_reset: ResetCause,
    /// Input voltage in volts
    pub vin_voltage: f64,
    /// Milliseconds since the last reset
    pub up_time: u32,
    pub encoder_position: i32,
    pub rc_pulse_width: u16,
    pub analog_reading_scl: u16,
    pub analog_reading_sda: u16,
    pub analog_reading_tx: u16,
    pub analog_reading_rx: u16,
    pub digital_readings: u8,
    pub pin_states: u8,
    pub step_mode: StepMode,
    pub current_limit: u8,
    pub decay_mode: DecayMode,
    pub input_state: InputState,
    pub input_after_averaging: u16,
    pub input_after_hysteresis: u16,
    pub input_after_scaling: i16,
    pub last_motor_driver_error: u8,
    pub agc_mode: u8,
    pub agc_bottom_current_limit: u8,
    pub agc_current_boost_steps: u8,
    pub agc_frequency_limit: u8,
}

fn strict<E: TryFromPrimitive<Primitive = u8>>(field: &'static str, value: u8) -> Result<E, DecodeError> {
    E::try_from_primitive(value).map_err(|_| DecodeError::InvalidValue { field, value })
}

impl StatusSnapshot {
    /// Decodes a status block. Bytes past [`VARIABLES_SIZE`] are ignored.
    pub fn decode(buffer: &[u8]) -> Result<Self, DecodeError> {
        let (raw, _) = VariablesRaw::read_from_prefix(buffer).map_err(|_| DecodeError::ShortBuffer {
            expected: VARIABLES_SIZE,
            actual: buffer.len(),
        })?;
        Self::try_from(raw)
    }

    /// Whether the motor has reached the position it was sent to.
    pub fn at_target(&self) -> bool {
        self.current_position == self.target_position
    }

    /// Logic level of a control pin, when it is used as a digital input.
    pub fn digital_reading(&self, pin: Pin) -> bool {
        self.digital_readings & (1 << u8::from(pin)) != 0
    }

    /// Drive state of one of the four pins reported in `pin_states` (RC is input only).
    pub fn pin_state(&self, pin: Pin) -> Option<PinState> {
        let shift = u8::from(pin) * 2;
        if shift >= 8 {
            return None;
        }
        PinState::try_from((self.pin_states >> shift) & 0x03).ok()
    }
}

impl TryFrom<VariablesRaw> for StatusSnapshot {
    type Error = DecodeError;

    fn try_from(raw: VariablesRaw) -> Result<Self, Self::Error> {
        Ok(StatusSnapshot {
            operation_state: strict("operation_state", raw.operation_state)?,
            misc_flags: MiscFlags(raw.misc_flags1),
            error_status: ErrorStatus(raw.error_status.get().into()),
            errors_occurred: ErrorStatus(raw.errors_occurred.get()),
            planning_mode: strict("planning_mode", raw.planning_mode)?,
            target_position: raw.target_position.get(),
            target_velocity: raw.target_velocity.get(),
            starting_speed: raw.starting_speed.get(),
            max_speed: raw.max_speed.get(),
            max_decel: raw.max_decel.get(),
            max_accel: raw.max_accel.get(),
            current_position: raw.current_position.get(),
            current_velocity: raw.current_velocity.get(),
            acting_target_position: raw.acting_target_position.get(),
            time_since_last_step: raw.time_since_last_step.get(),
            device_reset: ResetCause::from(raw.device_reset),
            vin_voltage: f64::from(raw.vin_voltage_mv.get()) / 1000.0,
            up_time: raw.up_time_ms.get(),
            encoder_position: raw.encoder_position.get(),
            rc_pulse_width: raw.rc_pulse_width.get(),
            analog_reading_scl: raw.analog_reading_scl.get(),
            analog_reading_sda: raw.analog_reading_sda.get(),
            analog_reading_tx: raw.analog_reading_tx.get(),
            analog_reading_rx: raw.analog_reading_rx.get(),
            digital_readings: raw.digital_readings,
            pin_states: raw.pin_states,
            step_mode: StepMode::from(raw.step_mode),
            current_limit: raw.current_limit,
            decay_mode: DecayMode::from(raw.decay_mode),
            input_state: strict("input_state", raw.input_state)?,
            input_after_averaging: raw.input_after_averaging.get(),
            input_after_hysteresis: raw.input_after_hysteresis.get(),
            input_after_scaling: raw.input_after_scaling.get(),
            last_motor_driver_error: raw.last_motor_driver_error,
            agc_mode: raw.agc_mode,
            agc_bottom_current_limit: raw.agc_bottom_current_limit,
            agc_current_boost_steps: raw.agc_current_boost_steps,
            agc_frequency_limit: raw.agc_frequency_limit,
        })
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Operation state:    {}", self.operation_state)?;
        writeln!(f, "Energized:          {}", self.misc_flags.energized())?;
        writeln!(f, "Position uncertain: {}", self.misc_flags.position_uncertain())?;
        writeln!(f, "Errors:             {}", self.error_status)?;
        writeln!(f, "Errors occurred:    {}", self.errors_occurred)?;
        writeln!(f, "Planning mode:      {}", self.planning_mode)?;
        writeln!(f, "Target position:    {}", self.target_position)?;
        writeln!(f, "Current position:   {}", self.current_position)?;
        writeln!(f, "Target velocity:    {}", self.target_velocity)?;
        writeln!(f, "Current velocity:   {}", self.current_velocity)?;
        writeln!(f, "Max speed:          {}", self.max_speed)?;
        writeln!(f, "Starting speed:     {}", self.starting_speed)?;
        writeln!(f, "Max accel / decel:  {} / {}", self.max_accel, self.max_decel)?;
        writeln!(f, "Step mode:          {}", self.step_mode)?;
        writeln!(f, "Current limit code: {}", self.current_limit)?;
        writeln!(f, "Decay mode:         {}", self.decay_mode)?;
        writeln!(f, "Input state:        {}", self.input_state)?;
        writeln!(f, "VIN:                {:.3} V", self.vin_voltage)?;
        writeln!(f, "Up time:            {} ms", self.up_time)?;
        write!(f, "Last reset:         {}", self.device_reset)
    }
}
