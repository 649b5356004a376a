use crate::command::{Command, join_u32};
use crate::constants::{
    DecayMode, ErrorKind, InputState, OperationState, Pin, PinState, PlanningMode, ResetCause, StepMode,
    VARIABLES_SIZE, offsets,
};
use crate::error::DecodeError;
use crate::variables::StatusSnapshot;

// Captured while a T500 was moving towards -13200 with 1/8 stepping.
const MOVING_T500: &str = "0a010000c0000000000170ccffff000000000000000000d8b80500350c0000350c0020d1ffff00846dff70ccffff0000000000022f40e20100d6ffffffffffffffffffffffffff1b5503150003ffffffffd4fe00000000000000";

fn moving_block() -> Vec<u8> {
    hex::decode(MOVING_T500).expect("Failed to decode hex")
}

#[test]
fn test_decode_moving_block() {
    let bytes = moving_block();
    assert_eq!(bytes.len(), VARIABLES_SIZE);

    let status = StatusSnapshot::decode(&bytes).expect("Failed to decode status block");
    assert_eq!(status.operation_state, OperationState::Normal);
    assert!(status.misc_flags.energized());
    assert!(!status.misc_flags.position_uncertain());
    assert!(status.error_status.is_empty());
    assert!(status.errors_occurred.contains(ErrorKind::CommandTimeout));
    assert!(status.errors_occurred.contains(ErrorKind::SafeStartViolation));
    assert_eq!(status.planning_mode, PlanningMode::TargetPosition);
    assert_eq!(status.target_position, -13_200);
    assert_eq!(status.max_speed, 96_000_000);
    assert_eq!(status.max_decel, 800_000);
    assert_eq!(status.max_accel, 800_000);
    assert_eq!(status.current_position, -12_000);
    assert_eq!(status.current_velocity, -9_600_000);
    assert_eq!(status.acting_target_position, -13_200);
    assert_eq!(status.device_reset, ResetCause::PowerUp);
    assert!((status.vin_voltage - 12.034).abs() < 1e-9);
    assert_eq!(status.up_time, 123_456);
    assert_eq!(status.encoder_position, -42);
    assert_eq!(status.rc_pulse_width, 0xFFFF);
    assert_eq!(status.step_mode, StepMode::Microstep8);
    assert_eq!(status.current_limit, 21);
    assert_eq!(status.decay_mode, DecayMode::Mixed);
    assert_eq!(status.input_state, InputState::Position);
    assert_eq!(status.input_after_scaling, -300);
    assert!(!status.at_target());
}

#[test]
fn test_fields_follow_offset_table() {
    let bytes = moving_block();
    let status = StatusSnapshot::decode(&bytes).unwrap();

    let u32_at = |off: usize| u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    let i32_at = |off: usize| i32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());

    assert_eq!(u32_at(offsets::MAX_SPEED), status.max_speed);
    assert_eq!(u32_at(22), status.max_speed);
    assert_eq!(i32_at(offsets::TARGET_POSITION), status.target_position);
    assert_eq!(i32_at(offsets::CURRENT_POSITION), status.current_position);
    assert_eq!(i32_at(offsets::ENCODER_POSITION), status.encoder_position);
    assert_eq!(u32_at(offsets::UP_TIME), status.up_time);
    assert_eq!(bytes[offsets::CURRENT_LIMIT], status.current_limit);
    assert_eq!(bytes[offsets::INPUT_STATE], u8::from(status.input_state));
}

#[test]
fn test_every_field_follows_offset_table() {
    // Distinct byte at every position, so a field read from the wrong offset
    // cannot match by accident.
    let mut bytes: Vec<u8> = (0..VARIABLES_SIZE).map(|i| i as u8 + 1).collect();
    bytes[offsets::OPERATION_STATE] = OperationState::Normal.into();
    bytes[offsets::PLANNING_MODE] = PlanningMode::TargetVelocity.into();
    bytes[offsets::INPUT_STATE] = InputState::Velocity.into();
    let status = StatusSnapshot::decode(&bytes).unwrap();

    let u16_at = |off: usize| u16::from_le_bytes(bytes[off..off + 2].try_into().unwrap());
    let i16_at = |off: usize| i16::from_le_bytes(bytes[off..off + 2].try_into().unwrap());
    let u32_at = |off: usize| u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    let i32_at = |off: usize| i32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());

    assert_eq!(status.operation_state, OperationState::Normal);
    assert_eq!(status.misc_flags.0, bytes[offsets::MISC_FLAGS1]);
    assert_eq!(status.error_status.bits(), u32::from(u16_at(offsets::ERROR_STATUS)));
    assert_eq!(status.errors_occurred.bits(), u32_at(offsets::ERRORS_OCCURRED));
    assert_eq!(status.planning_mode, PlanningMode::TargetVelocity);
    assert_eq!(status.target_position, i32_at(offsets::TARGET_POSITION));
    assert_eq!(status.target_velocity, i32_at(offsets::TARGET_VELOCITY));
    assert_eq!(status.starting_speed, u32_at(offsets::STARTING_SPEED));
    assert_eq!(status.max_speed, u32_at(offsets::MAX_SPEED));
    assert_eq!(status.max_decel, u32_at(offsets::MAX_DECEL));
    assert_eq!(status.max_accel, u32_at(offsets::MAX_ACCEL));
    assert_ne!(status.max_decel, status.max_accel);
    assert_eq!(status.current_position, i32_at(offsets::CURRENT_POSITION));
    assert_eq!(status.current_velocity, i32_at(offsets::CURRENT_VELOCITY));
    assert_eq!(status.acting_target_position, i32_at(offsets::ACTING_TARGET_POSITION));
    assert_eq!(status.time_since_last_step, u32_at(offsets::TIME_SINCE_LAST_STEP));
    assert_eq!(u8::from(status.device_reset), bytes[offsets::DEVICE_RESET]);
    assert_eq!(status.vin_voltage, f64::from(u16_at(offsets::VIN_VOLTAGE)) / 1000.0);
    assert_eq!(status.up_time, u32_at(offsets::UP_TIME));
    assert_eq!(status.encoder_position, i32_at(offsets::ENCODER_POSITION));
    assert_eq!(status.rc_pulse_width, u16_at(offsets::RC_PULSE_WIDTH));
    assert_eq!(status.analog_reading_scl, u16_at(offsets::ANALOG_READING_SCL));
    assert_eq!(status.analog_reading_sda, u16_at(offsets::ANALOG_READING_SDA));
    assert_eq!(status.analog_reading_tx, u16_at(offsets::ANALOG_READING_TX));
    assert_eq!(status.analog_reading_rx, u16_at(offsets::ANALOG_READING_RX));
    assert_eq!(status.digital_readings, bytes[offsets::DIGITAL_READINGS]);
    assert_eq!(status.pin_states, bytes[offsets::PIN_STATES]);
    assert_eq!(u8::from(status.step_mode), bytes[offsets::STEP_MODE]);
    assert_eq!(status.current_limit, bytes[offsets::CURRENT_LIMIT]);
    assert_eq!(u8::from(status.decay_mode), bytes[offsets::DECAY_MODE]);
    assert_eq!(status.input_state, InputState::Velocity);
    assert_eq!(status.input_after_averaging, u16_at(offsets::INPUT_AFTER_AVERAGING));
    assert_eq!(status.input_after_hysteresis, u16_at(offsets::INPUT_AFTER_HYSTERESIS));
    assert_eq!(status.input_after_scaling, i16_at(offsets::INPUT_AFTER_SCALING));
    assert_eq!(status.last_motor_driver_error, bytes[offsets::LAST_MOTOR_DRIVER_ERROR]);
    assert_eq!(status.agc_mode, bytes[offsets::AGC_MODE]);
    assert_eq!(status.agc_bottom_current_limit, bytes[offsets::AGC_BOTTOM_CURRENT_LIMIT]);
    assert_eq!(status.agc_current_boost_steps, bytes[offsets::AGC_CURRENT_BOOST_STEPS]);
    assert_eq!(status.agc_frequency_limit, bytes[offsets::AGC_FREQUENCY_LIMIT]);

    // Spot checks against the literal layout.
    assert_eq!(offsets::TARGET_VELOCITY, 14);
    assert_eq!(offsets::STARTING_SPEED, 18);
    assert_eq!(offsets::INPUT_AFTER_AVERAGING, 77);
    assert_eq!(offsets::INPUT_AFTER_HYSTERESIS, 79);
    assert_eq!(offsets::INPUT_AFTER_SCALING, 81);
}

#[test]
fn test_pins() {
    let status = StatusSnapshot::decode(&moving_block()).unwrap();
    // digital_readings = 0b0001_1011
    assert!(status.digital_reading(Pin::Scl));
    assert!(status.digital_reading(Pin::Sda));
    assert!(!status.digital_reading(Pin::Tx));
    assert!(status.digital_reading(Pin::Rx));
    assert!(status.digital_reading(Pin::Rc));
    assert_eq!(status.pin_state(Pin::Scl), Some(PinState::PulledUp));
    assert_eq!(status.pin_state(Pin::Rx), Some(PinState::PulledUp));
    assert_eq!(status.pin_state(Pin::Rc), None);
}

#[test]
fn test_decode_rejects_short_block() {
    let bytes = moving_block();
    assert_eq!(
        StatusSnapshot::decode(&bytes[..89]),
        Err(DecodeError::ShortBuffer {
            expected: 90,
            actual: 89
        })
    );
    assert!(StatusSnapshot::decode(&[]).is_err());
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut bytes = moving_block();
    bytes.extend_from_slice(&[0xAA; 38]);
    let status = StatusSnapshot::decode(&bytes).unwrap();
    assert_eq!(status.target_position, -13_200);
}

#[test]
fn test_decode_rejects_unknown_operation_state() {
    let mut bytes = moving_block();
    bytes[offsets::OPERATION_STATE] = 3;
    assert_eq!(
        StatusSnapshot::decode(&bytes),
        Err(DecodeError::InvalidValue {
            field: "operation_state",
            value: 3
        })
    );
}

#[test]
fn test_error_status_display() {
    let mut bytes = moving_block();
    bytes[offsets::ERROR_STATUS] = 0b0000_0101;
    let status = StatusSnapshot::decode(&bytes).unwrap();
    assert_eq!(
        status.error_status.to_string(),
        "Intentionally de-energized(0), Low VIN(2)"
    );
}

#[test]
fn test_position_commands_roundtrip_through_block() {
    // What the encoder sends for a target position is what the block reports back.
    let bytes = moving_block();
    let status = StatusSnapshot::decode(&bytes).unwrap();
    let d = Command::SetTargetPosition(status.target_position).descriptor();
    assert_eq!(join_u32(d.value, d.index) as i32, status.target_position);
}

#[cfg(feature = "serde")]
#[test]
fn test_snapshot_serializes_decoded_values() {
    let status = StatusSnapshot::decode(&moving_block()).unwrap();
    let json = serde_json::to_value(status).unwrap();
    assert_eq!(json["operation_state"], "Normal");
    assert_eq!(json["target_position"], -13_200);
    assert_eq!(json["errors_occurred"], 0xC0);
}
