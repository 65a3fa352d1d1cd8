// paramlink console -- drive a parameter-firmware board from the command
// line, against real hardware or a scripted mock board.
//
// Usage:
//   paramlink --port /dev/ttyUSB0 list
//   paramlink --port /dev/ttyACM0 update gain 7
//   paramlink --mock read-pin analog A2
//   paramlink --port /dev/ttyUSB0 monitor --duration 30
//   paramlink ports

mod mock;
mod telemetry;

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use paramlink::api::{
    AddParameterRequest, CommandAccepted, RawCommandRequest, SoftwareRequest,
    UpdateParameterRequest,
};
use paramlink::{Api, Command, Engine, EngineBuilder, PinKind, SerialTransport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// paramlink console -- list, read and change parameters on a board.
#[derive(Parser)]
#[command(name = "paramlink", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, env = "PARAMLINK_PORT", default_value = "/dev/ttyUSB0")]
    port: String,

    /// Baud rate.
    #[arg(long, env = "PARAMLINK_BAUD", default_value_t = 9600)]
    baud: u32,

    /// Milliseconds to wait after opening the port for the board to reset.
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Milliseconds to wait for the board's reply after sending a command.
    #[arg(long, default_value_t = 500)]
    wait_ms: u64,

    /// Use a scripted mock board instead of a serial port.
    #[arg(long)]
    mock: bool,

    /// Tracing filter directive (overrides RUST_LOG), e.g. "paramlink=debug".
    #[arg(long)]
    log_filter: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Ask the board for every parameter and print them.
    List,
    /// Ask the board for one parameter's current value.
    Get { name: String },
    /// Register a new parameter on the board.
    Add {
        name: String,
        min: String,
        max: String,
        current: String,
    },
    /// Change a parameter's current value ("true"/"false" send 1/0).
    Update { name: String, value: String },
    /// Read a digital pin (e.g. 7) or an analog input (e.g. A2).
    ReadPin {
        #[arg(value_enum)]
        kind: PinArg,
        designator: String,
    },
    /// Set the software name shown by the board.
    Software { name: String },
    /// Send a line verbatim.
    Raw { text: String },
    /// Print notifications as they arrive.
    Monitor {
        /// Seconds to monitor (0 = until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },
    /// Listen for the reply window and print the operator log.
    Log,
    /// List serial ports present on this machine.
    Ports,
}

#[derive(Clone, Copy, ValueEnum)]
enum PinArg {
    Digital,
    Analog,
}

impl From<PinArg> for PinKind {
    fn from(arg: PinArg) -> Self {
        match arg {
            PinArg::Digital => PinKind::Digital,
            PinArg::Analog => PinKind::Analog,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Interpret a console argument the way a JSON client would send it.
fn json_value(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = text.parse::<i64>() {
                Value::from(n)
            } else if let Some(x) = text.parse::<f64>().ok().filter(|x| x.is_finite()) {
                Value::from(x)
            } else {
                Value::String(text.to_string())
            }
        }
    }
}

/// The command an action will send, for scripting the mock board.
fn planned_command(action: &Action) -> Option<Command> {
    match action {
        Action::List => Some(Command::ListAllParams),
        Action::Get { name } => Some(Command::GetParam { name: name.clone() }),
        Action::Add {
            name,
            min,
            max,
            current,
        } => Some(Command::AddParam {
            name: name.clone(),
            min: min.clone(),
            max: max.clone(),
            current: current.clone(),
        }),
        Action::Update { name, value } => {
            let new_value = match json_value(value) {
                Value::Bool(b) => b.into(),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => i.into(),
                    None => n.to_string().into(),
                },
                _ => value.as_str().into(),
            };
            Some(Command::UpdateParam {
                name: name.clone(),
                new_value,
            })
        }
        Action::ReadPin { kind, designator } => Some(Command::ReadPin {
            kind: (*kind).into(),
            designator: designator.clone(),
        }),
        Action::Software { name } => Some(Command::SetSoftware { name: name.clone() }),
        Action::Raw { text } => Some(Command::Raw { text: text.clone() }),
        Action::Monitor { .. } | Action::Log | Action::Ports => None,
    }
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_accepted(accepted: &CommandAccepted) {
    if accepted.delivered {
        println!("{}: {}", accepted.status, accepted.command);
    } else {
        println!("Write failed: {}", accepted.command);
    }
}

async fn connect(cli: &Cli) -> Result<Engine> {
    let builder = EngineBuilder::new();

    if cli.mock {
        let mock = mock::scripted(planned_command(&cli.action).as_ref());
        let engine = builder
            .build_with_transport(Box::new(mock))
            .await
            .context("failed to start engine with mock transport")?;
        println!("Connected (mock board)");
        return Ok(engine);
    }

    let engine = builder
        .serial_port(&cli.port)
        .baud_rate(cli.baud)
        .settle_delay(Duration::from_millis(cli.settle_ms))
        .build()
        .await
        .with_context(|| format!("failed to open {} at {} baud", cli.port, cli.baud))?;
    println!("Connected to {} at {} baud", cli.port, cli.baud);
    Ok(engine)
}

/// Give the board time to answer, then print what it logged since `from`.
async fn settle_and_print_log(engine: &Engine, wait: Duration, from: usize) {
    tokio::time::sleep(wait).await;
    for line in engine.log().lines().into_iter().skip(from) {
        println!("  {line}");
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_list(engine: &Engine, api: &Api, wait: Duration) -> Result<()> {
    api.refresh_parameters().await?;
    tokio::time::sleep(wait).await;

    let params = engine.store().snapshot();
    if params.is_empty() {
        println!("No parameters reported.");
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:>8} {:>8} {:>8}",
        "Index", "Name", "Min", "Max", "Current"
    );
    println!("{}", "-".repeat(54));
    for p in &params {
        println!(
            "{:<6} {:<20} {:>8} {:>8} {:>8}",
            or_dash(p.index),
            p.name,
            or_dash(p.min.as_deref()),
            or_dash(p.max.as_deref()),
            or_dash(p.current.as_deref()),
        );
    }
    println!("\n{} parameter(s), software: {}", params.len(), engine.status().software_name());
    Ok(())
}

async fn cmd_get(api: &Api, name: &str, wait: Duration) -> Result<()> {
    api.request_parameter(name).await?;
    tokio::time::sleep(wait).await;

    match api.get_parameter(name) {
        Ok(listing) => println!("{}", serde_json::to_string_pretty(&listing)?),
        Err(e) => println!("{e}"),
    }
    Ok(())
}

async fn cmd_read_pin(engine: &Engine, api: &Api, kind: PinKind, designator: &str, wait: Duration) -> Result<()> {
    api.read_pin(kind, designator).await?;
    tokio::time::sleep(wait).await;

    match engine.status().reading(kind, designator) {
        Some(reading) => println!("{reading}"),
        None => println!("No {kind} reading for {designator} yet."),
    }
    Ok(())
}

async fn cmd_monitor(engine: &Engine, duration_secs: u64) -> Result<()> {
    let mut rx = engine.subscribe();

    println!("Monitoring board traffic (Ctrl-C to stop)...");

    let deadline = if duration_secs > 0 {
        Some(Instant::now() + Duration::from_secs(duration_secs))
    } else {
        None
    };

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Monitor duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                break;
            }
            received = tokio::time::timeout(timeout, rx.recv()) => match received {
                Ok(Ok(notification)) => println!("{notification}"),
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(n))) => {
                    println!("[warning] missed {n} notifications (consumer too slow)");
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                    println!("Notification channel closed.");
                    break;
                }
                Err(_) => {
                    if deadline.is_some() {
                        println!("Monitor duration elapsed.");
                        break;
                    }
                }
            },
        }
    }

    Ok(())
}

fn cmd_ports() -> Result<()> {
    let ports = SerialTransport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

async fn run(cli: &Cli, engine: &Engine) -> Result<()> {
    let api = engine.api();
    let wait = Duration::from_millis(cli.wait_ms);
    let before = engine.log().len();

    match &cli.action {
        Action::List => cmd_list(engine, &api, wait).await,
        Action::Get { name } => cmd_get(&api, name, wait).await,
        Action::Add {
            name,
            min,
            max,
            current,
        } => {
            let request = AddParameterRequest {
                name: Some(Value::String(name.clone())),
                min: Some(json_value(min)),
                max: Some(json_value(max)),
                current: Some(json_value(current)),
            };
            print_accepted(&api.add_parameter(request).await?);
            settle_and_print_log(engine, wait, before).await;
            Ok(())
        }
        Action::Update { name, value } => {
            let request = UpdateParameterRequest {
                new_value: Some(json_value(value)),
            };
            print_accepted(&api.update_parameter(name, request).await?);
            settle_and_print_log(engine, wait, before).await;
            Ok(())
        }
        Action::ReadPin { kind, designator } => {
            cmd_read_pin(engine, &api, (*kind).into(), designator, wait).await
        }
        Action::Software { name } => {
            let request = SoftwareRequest {
                software_name: Some(name.clone()),
            };
            print_accepted(&api.set_software(request).await?);
            settle_and_print_log(engine, wait, before).await;
            Ok(())
        }
        Action::Raw { text } => {
            let request = RawCommandRequest {
                command: Some(text.clone()),
            };
            print_accepted(&api.send_raw(request).await?);
            settle_and_print_log(engine, wait, before).await;
            Ok(())
        }
        Action::Monitor { duration } => cmd_monitor(engine, *duration).await,
        Action::Log => {
            tokio::time::sleep(wait).await;
            print!("{}", api.read_log().log);
            Ok(())
        }
        Action::Ports => bail!("ports does not need a connection"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_filter.as_deref())?;

    // The `ports` command does not require a board connection.
    if matches!(cli.action, Action::Ports) {
        return cmd_ports();
    }

    let engine = connect(&cli).await?;
    let result = run(&cli, &engine).await;
    if let Err(e) = engine.shutdown().await {
        tracing::warn!(error = %e, "shutdown did not complete cleanly");
    }
    result
}
