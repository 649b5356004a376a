use anyhow::{Context, Result};
use clap::Parser;
use std::thread;
use std::time::Duration;
use tic_lib::{CancelToken, MoveOutcome, PollOptions, SessionConfig, Tic, TicError};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

// Largest microstep division any Tic supports; keeps the scaled speeds in range.
const MAX_STEP_FACTOR: i64 = 32;

/// Bring a Tic controller up and run it back and forth until Ctrl+C.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial number of the controller to use.
    #[arg(short, long)]
    serial: Option<String>,
    /// Microsteps per full step configured on the controller.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(i32).range(1..=MAX_STEP_FACTOR))]
    step_factor: i32,
    /// Raw current-limit code to apply before energizing.
    #[arg(long, default_value_t = 21)]
    current_code: u8,
    /// Number of back-and-forth cycles (default: until Ctrl+C).
    #[arg(short, long)]
    cycles: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let token = CancelToken::new();
    let mut demo = tokio::task::spawn_blocking({
        let token = token.clone();
        move || run(cli, token)
    });

    let result = tokio::select! {
        res = &mut demo => res,
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, stopping...");
            token.cancel();
            demo.await
        }
    };

    match result.context("Demo task panicked")? {
        Ok(()) | Err(TicError::Cancelled) => Ok(()),
        Err(e) => {
            error!("Demo failed: {}", e);
            Err(e.into())
        }
    }
}

fn move_to(tic: &mut Tic, options: &PollOptions, position: i32) -> tic_lib::Result<()> {
    tic.set_target_position(position)?;
    match tic.wait_for_move_complete(options)? {
        MoveOutcome::Reached => info!("At {}", position),
        outcome => warn!("Stopped short of {}: {:?}", position, outcome),
    }
    Ok(())
}

fn run(cli: Cli, token: CancelToken) -> tic_lib::Result<()> {
    let mut tic = Tic::open(cli.serial.as_deref(), SessionConfig::default())?;
    let options = PollOptions::default().with_token(token);
    let result = sequence(&mut tic, &cli, &options);
    if matches!(result, Err(TicError::Cancelled)) {
        tic.halt_and_hold()?;
    }
    info!("De-energizing");
    tic.deenergize()?;
    result
}

fn sequence(tic: &mut Tic, cli: &Cli, options: &PollOptions) -> tic_lib::Result<()> {
    let step = cli.step_factor;
    let step_u32 = step.unsigned_abs();

    let table = tic.current_limits();
    for (code, ma) in table.iter() {
        debug!("Current limit code {:>3}: {:>5} mA", code, ma);
    }
    info!(
        "Current limit code {} is {} mA",
        cli.current_code,
        table.code_to_ma(cli.current_code)
    );

    tic.reset()?;
    tic.reset_command_timeout()?;
    tic.clear_driver_error()?;
    tic.exit_safe_start()?;
    tic.halt_and_set_position(0)?;
    tic.set_current_limit_code(cli.current_code)?;
    tic.wait_for_device_ready(options)?;

    tic.exit_safe_start()?;
    tic.set_max_speed(12_000_000 * step_u32)?;
    tic.set_max_accel(100_000 * step_u32)?;
    tic.set_max_decel(100_000 * step_u32)?;
    tic.set_starting_speed(0)?;
    tic.wait_for_device_ready(options)?;
    tic.energize()?;
    tic.wait_for_device_ready(options)?;

    move_to(tic, options, -1650 * step)?;

    // Going quiet for longer than the command timeout stops the motor.
    thread::sleep(Duration::from_millis(1500));
    let status = tic.refresh()?;
    info!("After pause: state {}, errors: {}", status.operation_state, status.error_status);
    tic.exit_safe_start()?;
    tic.wait_for_device_ready(options)?;

    move_to(tic, options, -1550 * step)?;
    // Planning mode drops to off here, so there is no move left to wait for.
    tic.halt_and_set_position(0)?;
    tic.wait_for_device_ready(options)?;

    let mut cycle = 0;
    while cli.cycles.is_none_or(|n| cycle < n) {
        move_to(tic, options, 400 * step)?;
        move_to(tic, options, 0)?;
        cycle += 1;
        info!("Cycle {} done", cycle);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tic_lib::constants::MAX_ALLOWED_SPEED;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_step_factor_bounds() {
        let cli = Cli::try_parse_from(["tic-demo"]).unwrap();
        assert_eq!(cli.step_factor, 8);
        assert!(Cli::try_parse_from(["tic-demo", "--step-factor", "32"]).is_ok());
        assert!(Cli::try_parse_from(["tic-demo", "--step-factor", "358"]).is_err());
        assert!(Cli::try_parse_from(["tic-demo", "--step-factor", "0"]).is_err());
        assert!(Cli::try_parse_from(["tic-demo", "--step-factor", "-4"]).is_err());
        // The largest accepted factor stays within the firmware speed limit.
        assert!(12_000_000u32.checked_mul(MAX_STEP_FACTOR as u32).is_some_and(|s| s <= MAX_ALLOWED_SPEED));
    }
}
