//! `devctl` – headless client for the device command bridge.
//!
//! Talks to the host over the same channel the desktop UI uses, and can
//! also run the reference host itself (`devctl serve`).

mod config;
mod logging;
mod serve;

use anyhow::Context;
use bridge::scenario::{load_scenario, run_scenario};
use bridge::{
    Args, ChannelError, CommandChannel, Device, DeviceInventory, InventoryError, SocketChannel,
    Status, TimeoutChannel,
};
use clap::{Parser, Subcommand};
use crate::config::CliConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "devctl",
    version,
    about = "Client for the device command bridge"
)]
struct Cli {
    /// Host socket path (overrides config).
    #[arg(long, global = true)]
    socket: Option<PathBuf>,
    /// Give up on a call after this many milliseconds (overrides config).
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    /// Extra YAML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke a host command by name with JSON args.
    Call {
        /// Command name (e.g. "ping", "list_devices").
        cmd: String,
        /// JSON object of args to pass to the command.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Query the device inventory.
    Devices {
        #[command(subcommand)]
        action: DevicesAction,
    },

    /// Run the reference host over a Unix socket.
    Serve {
        /// YAML inventory file (overrides config).
        #[arg(long)]
        inventory: Option<PathBuf>,
    },

    /// Run a scripted scenario from a YAML file.
    RunScenario {
        /// Path to the scenario YAML file.
        file: PathBuf,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DevicesAction {
    /// List every device the host reports.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one device by id.
    Get {
        id: String,
        #[arg(long)]
        json: bool,
    },
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: cannot load configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    logging::init_logging(&config.logging);

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli, config: CliConfig) -> anyhow::Result<ExitCode> {
    let socket = cli.socket.unwrap_or(config.socket_path);
    let timeout_ms = cli.timeout_ms.or(config.timeout_ms);

    match cli.command {
        Commands::Call { cmd, args, json } => {
            cmd_call(build_channel(&socket, timeout_ms), &cmd, &args, json).await
        }
        Commands::Devices { action } => {
            let inventory = DeviceInventory::new(build_channel(&socket, timeout_ms));
            match action {
                DevicesAction::List { json } => Ok(cmd_devices_list(&inventory, json).await),
                DevicesAction::Get { id, json } => Ok(cmd_devices_get(&inventory, &id, json).await),
            }
        }
        Commands::Serve { inventory } => {
            serve::run_daemon(&socket, inventory.or(config.inventory_path)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::RunScenario { file, json } => {
            // Scenario steps carry their own timeouts.
            cmd_run_scenario(build_channel(&socket, None), &file, json).await
        }
    }
}

fn build_channel(socket: &Path, timeout_ms: Option<u64>) -> Arc<dyn CommandChannel> {
    let channel = SocketChannel::new(socket);
    match timeout_ms {
        Some(ms) => Arc::new(TimeoutChannel::new(channel, Duration::from_millis(ms))),
        None => Arc::new(channel),
    }
}

// ===========================================================================
// Subcommand implementations
// ===========================================================================

async fn cmd_call(
    channel: Arc<dyn CommandChannel>,
    cmd: &str,
    args_str: &str,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let args: Args = serde_json::from_str(args_str)
        .with_context(|| format!("invalid JSON args (expected an object): {}", args_str))?;

    match channel.invoke(cmd, args).await {
        Ok(value) => {
            if json {
                print_json(&serde_json::json!({ "status": Status::Pass, "data": value }));
            } else {
                print_json(&value);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report_channel_error(&e, json)),
    }
}

async fn cmd_devices_list(
    inventory: &DeviceInventory<Arc<dyn CommandChannel>>,
    json: bool,
) -> ExitCode {
    match inventory.list().await {
        Ok(devices) => {
            if json {
                print_json(&devices);
            } else if devices.is_empty() {
                println!("no devices");
            } else {
                for device in &devices {
                    print_device_line(device);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_inventory_error(&e, json),
    }
}

async fn cmd_devices_get(
    inventory: &DeviceInventory<Arc<dyn CommandChannel>>,
    id: &str,
    json: bool,
) -> ExitCode {
    match inventory.get(id).await {
        Ok(device) => {
            if json {
                print_json(&device);
            } else {
                print_device_line(&device);
                for (key, value) in &device.extra {
                    println!("  {}: {}", key, value);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_inventory_error(&e, json),
    }
}

async fn cmd_run_scenario(
    channel: Arc<dyn CommandChannel>,
    file: &Path,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let yaml = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read scenario file {}", file.display()))?;
    let scenario = load_scenario(&yaml).map_err(anyhow::Error::msg)?;

    let result = run_scenario(&scenario, &channel).await;

    if json {
        print_json(&result);
    } else {
        println!("Scenario: {}", result.name.as_deref().unwrap_or("<unnamed>"));
        println!("Overall: {}", result.overall_status);
        for sr in &result.step_results {
            println!(
                "  Step {}: {} -> {} ({}ms)",
                sr.step, sr.target, sr.status, sr.elapsed_ms
            );
            if let Some(ref err) = sr.error {
                println!("    {}: {}", err.kind, err.message);
            }
        }
    }

    Ok(match result.overall_status {
        Status::Pass => ExitCode::SUCCESS,
        Status::Fail => ExitCode::from(1),
        Status::Error => ExitCode::from(2),
    })
}

// ===========================================================================
// Output helpers
// ===========================================================================

fn print_json<T: serde::Serialize>(value: &T) {
    let j = serde_json::to_string_pretty(value).unwrap_or_default();
    println!("{}", j);
}

fn print_device_line(device: &Device) {
    println!("{:<24} {}", device.id, device.label);
}

fn report_channel_error(err: &ChannelError, json: bool) -> ExitCode {
    let code = err.code().map(|c| c.to_string());
    report_error(&err.kind().to_string(), code.as_deref(), &err.to_string(), json)
}

fn report_inventory_error(err: &InventoryError, json: bool) -> ExitCode {
    match err {
        InventoryError::Channel(e) => report_channel_error(e, json),
        other => report_error(&other.kind().to_string(), None, &other.to_string(), json),
    }
}

fn report_error(kind: &str, code: Option<&str>, message: &str, json: bool) -> ExitCode {
    tracing::debug!(kind, code = code.unwrap_or("-"), message, "call failed");
    if json {
        print_json(&serde_json::json!({
            "status": Status::Error,
            "error": { "kind": kind, "code": code, "message": message },
        }));
    } else {
        match code {
            Some(code) => eprintln!("error [{} {}]: {}", kind, code, message),
            None => eprintln!("error [{}]: {}", kind, message),
        }
    }
    ExitCode::from(2)
}
