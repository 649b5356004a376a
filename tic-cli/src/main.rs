use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;
use tic_lib::constants::{MAX_ALLOWED_ACCEL, MAX_ALLOWED_SPEED, MIN_ALLOWED_ACCEL};
use tic_lib::transport::list_devices;
use tic_lib::{CancelToken, DeviceIdentity, MoveOutcome, POLL_INTERVAL, PollOptions, SessionConfig, Tic, TicError};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line control for Pololu Tic stepper motor controllers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial number of the controller to use (default: the first one found).
    #[arg(short, long, global = true)]
    serial: Option<String>,
    /// Timeout for each USB control transfer, in milliseconds.
    #[arg(short, long, default_value_t = 1000, global = true)]
    timeout_ms: u64,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List connected Tic controllers.
    List,
    /// Read and print the controller status.
    Status {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Also clear the latched "errors occurred" bits.
        #[arg(long)]
        clear_errors: bool,
    },
    Energize,
    Deenergize,
    ExitSafeStart,
    /// Stop abruptly and hold the current position.
    Halt,
    Reset,
    ClearDriverError,
    /// Set the current limit, either in milliamps or as a raw code.
    Current {
        #[arg(long, conflicts_with = "code", required_unless_present = "code")]
        ma: Option<u32>,
        #[arg(long)]
        code: Option<u8>,
    },
    /// Print the current-limit table of the connected product.
    Limits,
    /// Move to a position and wait until the move completes.
    Move {
        #[arg(allow_hyphen_values = true)]
        position: i32,
        /// Maximum speed in microsteps per 10000 s.
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_ALLOWED_SPEED)))]
        max_speed: Option<u32>,
        /// Acceleration and deceleration in microsteps per 100 s^2.
        #[arg(
            long,
            value_parser = clap::value_parser!(u32).range(i64::from(MIN_ALLOWED_ACCEL)..=i64::from(MAX_ALLOWED_ACCEL))
        )]
        accel: Option<u32>,
        /// Give up waiting after this many seconds.
        #[arg(long)]
        wait_s: Option<u64>,
    },
    /// Run at a velocity (microsteps per 10000 s) until Ctrl+C.
    Velocity {
        #[arg(allow_hyphen_values = true)]
        velocity: i32,
    },
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv. RUST_LOG overrides.
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let token = CancelToken::new();
    let mut session = tokio::task::spawn_blocking({
        let token = token.clone();
        move || run(cli, token)
    });

    let result = tokio::select! {
        res = &mut session => res,
        _ = signal::ctrl_c() => {
            warn!("Ctrl+C received, stopping...");
            token.cancel();
            session.await
        }
    };

    if let Err(e) = result.context("Session task panicked")? {
        error!("{:#}", e);
        process::exit(1);
    }
    Ok(())
}

fn open(cli: &Cli) -> Result<Tic> {
    let config = SessionConfig::default().with_timeout_ms(cli.timeout_ms)?;
    Tic::open(cli.serial.as_deref(), config).context("Failed to open Tic controller")
}

fn run(cli: Cli, token: CancelToken) -> Result<()> {
    match cli.command {
        Commands::List => {
            let devices = list_devices()?;
            if devices.is_empty() {
                println!("No Tic controllers found.");
            }
            for info in devices {
                let identity = DeviceIdentity::from_device_info(&info)?;
                println!(
                    "{:<10} {:<5} firmware {}  bus {:03} address {:03}",
                    identity.serial.as_deref().unwrap_or("-"),
                    identity.product,
                    identity.firmware_version,
                    info.busnum(),
                    info.device_address()
                );
            }
        }
        Commands::Status { json, clear_errors } => {
            let mut tic = open(&cli)?;
            let status = if clear_errors {
                *tic.refresh_and_clear_errors()?
            } else {
                *tic.refresh()?
            };
            if json {
                let output = serde_json::json!({
                    "identity": tic.identity(),
                    "status": status,
                    "current_limit_ma": tic.current_limits().code_to_ma(status.current_limit),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", tic.identity());
                println!("{}", status);
                println!(
                    "Current limit:       {} mA",
                    tic.current_limits().code_to_ma(status.current_limit)
                );
            }
        }
        Commands::Energize => open(&cli)?.energize()?,
        Commands::Deenergize => open(&cli)?.deenergize()?,
        Commands::ExitSafeStart => open(&cli)?.exit_safe_start()?,
        Commands::Halt => open(&cli)?.halt_and_hold()?,
        Commands::Reset => open(&cli)?.reset()?,
        Commands::ClearDriverError => open(&cli)?.clear_driver_error()?,
        Commands::Current { ma, code } => {
            let mut tic = open(&cli)?;
            match (ma, code) {
                (Some(ma), _) => {
                    let code = tic.set_current_limit_ma(ma)?;
                    println!("Current limit code {} ({} mA)", code, tic.current_limits().code_to_ma(code));
                }
                (None, Some(code)) => {
                    if code > tic.current_limits().max_code() {
                        bail!("Code {} is above the maximum {}", code, tic.current_limits().max_code());
                    }
                    tic.set_current_limit_code(code)?;
                    println!("Current limit code {} ({} mA)", code, tic.current_limits().code_to_ma(code));
                }
                (None, None) => bail!("Either --ma or --code is required"),
            }
        }
        Commands::Limits => {
            let tic = open(&cli)?;
            let table = tic.current_limits();
            println!("{} current limits (code: mA)", table.product());
            for &code in table.recommended_codes() {
                println!("  {:>3}: {:>5}", code, table.code_to_ma(code));
            }
        }
        Commands::Move {
            position,
            max_speed,
            accel,
            wait_s,
        } => {
            let mut tic = open(&cli)?;
            let mut options = PollOptions::default().with_token(token);
            if let Some(secs) = wait_s {
                options = options.with_timeout(Duration::from_secs(secs));
            }
            tic.wait_for_device_ready(&options)?;
            if let Some(speed) = max_speed {
                tic.set_max_speed(speed)?;
            }
            if let Some(accel) = accel {
                tic.set_max_accel(accel)?;
                tic.set_max_decel(accel)?;
            }
            tic.set_target_position(position)?;
            info!("Moving to {}", position);
            match tic.wait_for_move_complete(&options) {
                Ok(MoveOutcome::Reached) => println!("Reached {}", position),
                Ok(outcome) => println!("Move stopped early: {:?}", outcome),
                Err(e @ (TicError::Cancelled | TicError::DeadlineExceeded)) => {
                    warn!("{}, halting motor", e);
                    tic.halt_and_hold()?;
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Velocity { velocity } => {
            let mut tic = open(&cli)?;
            tic.wait_for_device_ready(&PollOptions::default().with_token(token.clone()))?;
            tic.set_target_velocity(velocity)?;
            info!("Running at {} until Ctrl+C", velocity);
            while !token.is_cancelled() {
                tic.reset_command_timeout()?;
                thread::sleep(POLL_INTERVAL * 10);
            }
            tic.halt_and_hold()?;
            info!("Halted at {}", tic.refresh()?.current_position);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_move_limits() {
        let cli = Cli::try_parse_from(["tic", "move", "-3200", "--max-speed", "500000000", "--accel", "100"]).unwrap();
        match cli.command {
            Commands::Move {
                position,
                max_speed,
                accel,
                ..
            } => {
                assert_eq!(position, -3200);
                assert_eq!(max_speed, Some(MAX_ALLOWED_SPEED));
                assert_eq!(accel, Some(MIN_ALLOWED_ACCEL));
            }
            other => panic!("Expected move, got: {:?}", other),
        }
        assert!(Cli::try_parse_from(["tic", "move", "0", "--max-speed", "500000001"]).is_err());
        assert!(Cli::try_parse_from(["tic", "move", "0", "--accel", "99"]).is_err());
    }
}
