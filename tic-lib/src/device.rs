use crate::command::{Command, CommandDescriptor, Direction};
use crate::constants::{
    DEFAULT_COMMAND_TIMEOUT, DecayMode, InputState, MAX_COMMAND_TIMEOUT, OperationState, StepMode,
};
use crate::current_limit::CurrentLimitTable;
use crate::error::{Result, TicError};
use crate::poll::{POLL_INTERVAL, PollOptions};
use crate::transport::{DeviceIdentity, Transport, UsbTransport, find_device};
use crate::variables::StatusSnapshot;
use nusb::MaybeFuture;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on each individual control transfer, not on a whole poll.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn with_timeout_ms(mut self, ms: u64) -> Result<Self> {
        let max_ms = MAX_COMMAND_TIMEOUT.as_millis() as u64;
        if ms == 0 || ms > max_ms {
            return Err(TicError::InvalidTimeout {
                requested_ms: ms,
                max_ms,
            });
        }
        self.timeout = Duration::from_millis(ms);
        Ok(self)
    }
}

/// Why [`Tic::wait_for_move_complete`] stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Current position reached the target position.
    Reached,
    /// The control input reports halt.
    InputHalted,
    /// The control input is invalid. Motion stops here too, but the caller may
    /// want to treat it as a fault.
    InputInvalid,
}

/// A session with one Tic controller.
///
/// A session is used from one thread at a time; every call performs its
/// transfers in order and blocks until they complete.
pub struct Tic<T: Transport = UsbTransport> {
    transport: T,
    identity: DeviceIdentity,
    current_limits: CurrentLimitTable,
    config: SessionConfig,
    snapshot: Option<StatusSnapshot>,
}

impl Tic<UsbTransport> {
    /// Opens the first Tic controller found, or the one with the given serial number.
    pub fn open(serial: Option<&str>, config: SessionConfig) -> Result<Self> {
        let device_info = find_device(serial)?;
        let identity = DeviceIdentity::from_device_info(&device_info)?;
        let device = device_info.open().wait()?;
        info!("Opened {}", identity);
        Ok(Self::with_transport(UsbTransport::new(device), identity, config))
    }
}

impl<T: Transport> Tic<T> {
    pub fn with_transport(transport: T, identity: DeviceIdentity, config: SessionConfig) -> Self {
        let current_limits = CurrentLimitTable::for_product(identity.product);
        Self {
            transport,
            identity,
            current_limits,
            config,
            snapshot: None,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn current_limits(&self) -> &CurrentLimitTable {
        &self.current_limits
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Status from the last successful read; `None` before the first read or
    /// after a failed one.
    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn transfer(&mut self, descriptor: &CommandDescriptor) -> Result<Vec<u8>> {
        debug!(
            request = format_args!("{:#04x}", descriptor.request),
            value = descriptor.value,
            index = descriptor.index,
            "USB control {:?}",
            descriptor.direction
        );
        let data = self
            .transport
            .execute(descriptor, self.config.timeout)
            .map_err(|source| TicError::Transport {
                request: descriptor.request,
                source,
            })?;
        if descriptor.direction == Direction::In {
            debug!(bytes = hex::encode(&data), "USB Read");
        }
        Ok(data)
    }

    /// Sends a command and returns whatever the device answered.
    pub fn send(&mut self, command: Command) -> Result<Vec<u8>> {
        self.transfer(&command.descriptor())
    }

    fn send_discard(&mut self, command: Command) -> Result<()> {
        self.send(command)?;
        Ok(())
    }

    pub fn energize(&mut self) -> Result<()> {
        self.send_discard(Command::Energize)
    }

    pub fn deenergize(&mut self) -> Result<()> {
        self.send_discard(Command::Deenergize)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.send_discard(Command::Reset)
    }

    /// Keep-alive: restarts the controller's command timeout.
    pub fn reset_command_timeout(&mut self) -> Result<()> {
        self.send_discard(Command::ResetCommandTimeout)
    }

    pub fn halt_and_hold(&mut self) -> Result<()> {
        self.send_discard(Command::HaltAndHold)
    }

    pub fn halt_and_set_position(&mut self, position: i32) -> Result<()> {
        self.send_discard(Command::HaltAndSetPosition(position))
    }

    pub fn enter_safe_start(&mut self) -> Result<()> {
        self.send_discard(Command::EnterSafeStart)
    }

    pub fn exit_safe_start(&mut self) -> Result<()> {
        self.send_discard(Command::ExitSafeStart)
    }

    pub fn clear_driver_error(&mut self) -> Result<()> {
        self.send_discard(Command::ClearDriverError)
    }

    pub fn reinitialize(&mut self) -> Result<()> {
        self.send_discard(Command::Reinitialize)
    }

    pub fn start_bootloader(&mut self) -> Result<()> {
        self.send_discard(Command::StartBootloader)
    }

    pub fn set_target_position(&mut self, position: i32) -> Result<()> {
        self.send_discard(Command::SetTargetPosition(position))
    }

    pub fn set_target_velocity(&mut self, velocity: i32) -> Result<()> {
        self.send_discard(Command::SetTargetVelocity(velocity))
    }

    pub fn set_max_speed(&mut self, speed: u32) -> Result<()> {
        self.send_discard(Command::SetMaxSpeed(speed))
    }

    pub fn set_starting_speed(&mut self, speed: u32) -> Result<()> {
        self.send_discard(Command::SetStartingSpeed(speed))
    }

    pub fn set_max_accel(&mut self, accel: u32) -> Result<()> {
        self.send_discard(Command::SetMaxAccel(accel))
    }

    pub fn set_max_decel(&mut self, decel: u32) -> Result<()> {
        self.send_discard(Command::SetMaxDecel(decel))
    }

    pub fn set_step_mode(&mut self, mode: StepMode) -> Result<()> {
        self.send_discard(Command::SetStepMode(mode))
    }

    pub fn set_decay_mode(&mut self, mode: DecayMode) -> Result<()> {
        self.send_discard(Command::SetDecayMode(mode))
    }

    /// Sends a raw current-limit code. See [`set_current_limit_ma`](Self::set_current_limit_ma).
    pub fn set_current_limit_code(&mut self, code: u8) -> Result<()> {
        self.send_discard(Command::SetCurrentLimitCode(code))
    }

    /// Sets the highest current-limit code that does not exceed `ma`, returning
    /// the code sent.
    pub fn set_current_limit_ma(&mut self, ma: u32) -> Result<u8> {
        let code = self.current_limits.ma_to_code(ma);
        info!(
            "Current limit {} mA -> code {} ({} mA)",
            ma,
            code,
            self.current_limits.code_to_ma(code)
        );
        self.set_current_limit_code(code)?;
        Ok(code)
    }

    pub fn set_setting_byte(&mut self, address: u8, byte: u8) -> Result<()> {
        self.send_discard(Command::SetSetting { address, byte })
    }

    pub fn get_settings(&mut self, offset: u8, length: u8) -> Result<Vec<u8>> {
        self.send(Command::GetSettings { offset, length })
    }

    /// The firmware modification string, or `None` for stock firmware.
    pub fn firmware_modification(&mut self) -> Result<Option<String>> {
        let descriptor = self.send(Command::GetFirmwareModification)?;
        Ok(parse_string_descriptor(&descriptor).filter(|s| s != "-"))
    }

    fn refresh_with(&mut self, command: Command) -> Result<&StatusSnapshot> {
        // Drop the old snapshot first so a failed read never leaves stale data behind.
        self.snapshot = None;
        let buffer = self.send(command)?;
        let snapshot = StatusSnapshot::decode(&buffer)?;
        Ok(&*self.snapshot.insert(snapshot))
    }

    /// Reads the variables block and replaces the cached snapshot.
    pub fn refresh(&mut self) -> Result<&StatusSnapshot> {
        self.refresh_with(Command::GetVariables)
    }

    /// Like [`refresh`](Self::refresh), also clearing the latched "errors occurred" bits.
    pub fn refresh_and_clear_errors(&mut self) -> Result<&StatusSnapshot> {
        self.refresh_with(Command::GetVariablesAndClearErrorsOccurred)
    }

    /// One polling iteration: keep-alive then status read.
    fn poll_once(&mut self, options: &PollOptions) -> Result<StatusSnapshot> {
        options.check()?;
        self.reset_command_timeout()?;
        Ok(*self.refresh()?)
    }

    /// Polls until the controller reaches [`OperationState::Normal`].
    ///
    /// Without a token or deadline in `options` this never gives up.
    pub fn wait_for_device_ready(&mut self, options: &PollOptions) -> Result<StatusSnapshot> {
        loop {
            let status = self.poll_once(options)?;
            trace!(
                state = %status.operation_state,
                errors = %status.error_status,
                "Waiting for device ready"
            );
            if status.operation_state == OperationState::Normal {
                debug!("Device ready");
                return Ok(status);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Polls until the current move ends.
    ///
    /// The move ends when the current position equals the target position, or
    /// when the control input reports halt or invalid. Leaving
    /// [`OperationState::Normal`] while waiting is reported as
    /// [`TicError::MotionAborted`].
    pub fn wait_for_move_complete(&mut self, options: &PollOptions) -> Result<MoveOutcome> {
        loop {
            let status = self.poll_once(options)?;
            trace!(
                state = %status.operation_state,
                input = %status.input_state,
                current = status.current_position,
                target = status.target_position,
                velocity = status.current_velocity,
                "Waiting for move complete"
            );
            if status.operation_state != OperationState::Normal {
                warn!(
                    "Move aborted in state {} with errors: {}",
                    status.operation_state, status.error_status
                );
                return Err(TicError::MotionAborted {
                    state: status.operation_state,
                    errors: status.error_status,
                });
            }
            match status.input_state {
                InputState::Halt => return Ok(MoveOutcome::InputHalted),
                InputState::Invalid => {
                    warn!("Move ended on an invalid control input");
                    return Ok(MoveOutcome::InputInvalid);
                }
                _ => {}
            }
            if status.at_target() {
                debug!(position = status.current_position, "Move complete");
                return Ok(MoveOutcome::Reached);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Decodes a USB string descriptor (length, type, UTF-16LE body).
fn parse_string_descriptor(data: &[u8]) -> Option<String> {
    let length = usize::from(*data.first()?).min(data.len());
    let body = data.get(2..length)?;
    let units: Vec<u16> = body.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    Some(String::from_utf16_lossy(&units))
}
