use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wican_core::{
    Engine, EngineConfig, GatewayClient, GatewayData, HttpGatewayClient, JsonFileStore, PidReading,
    SnapshotStore, STATUS_FIELDS,
};

mod exporter;
mod viewer;
#[cfg(test)]
mod exporter_tests;

#[derive(Debug, Parser)]
#[command(name = "wicand")]
#[command(about = "WiCAN gateway monitor (status + CAN PID telemetry)")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Gateway IP address or mDNS hostname.
    #[arg(long)]
    host: String,

    /// Directory holding the per-device recovery snapshots.
    #[arg(long, default_value = "./data")]
    state_dir: PathBuf,

    #[arg(long, default_value_t = 30)]
    interval_secs: u64,

    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    persist_min_secs: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check reachability and that the device protocol is auto_pid.
    Probe,
    /// Run a single poll cycle and print the result.
    Once {
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    Run {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Watch {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Live terminal charts of the numeric PID values.
    View {
        #[arg(long, default_value_t = 300.0)]
        window_sec: f64,
    },
    /// Append one NDJSON record per poll cycle, with daily rotation.
    Export {
        #[arg(long, default_value = "./data/history")]
        output_dir: String,
        #[arg(long, default_value_t = 90)]
        retention_days: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = EngineConfig {
        poll_interval: Duration::from_secs(cli.interval_secs),
        request_timeout: Duration::from_secs(cli.timeout_secs),
        persist_min_interval: Duration::from_secs(cli.persist_min_secs),
    };

    let mut client = HttpGatewayClient::new(cli.host.clone(), config.request_timeout);
    let store = JsonFileStore::for_device(&cli.state_dir, &cli.host);

    match cli.command {
        Command::Probe => {
            let auto_pid = client.probe().await;
            let status = client.fetch_status().await;
            let out = serde_json::json!({
                "host": cli.host,
                "auto_pid": auto_pid,
                "status": status.map_err(|e| e.to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Once { format } => {
            let mut engine = Engine::new(client, store, config);
            let data = engine.poll().await?;
            print_data(&engine, &data, format)?;
        }
        Command::Run { format } | Command::Watch { format } => {
            let mut engine = Engine::new(client, store, config);
            stream_loop(&mut engine, format).await?;
        }
        Command::View { window_sec } => {
            let mut engine = Engine::new(client, store, config);
            viewer::run_viewer(&mut engine, window_sec).await?;
        }
        Command::Export {
            output_dir,
            retention_days,
        } => {
            let mut engine = Engine::new(client, store, config);
            exporter::run_exporter(&mut engine, &output_dir, retention_days).await?;
        }
    }

    Ok(())
}

async fn stream_loop<C: GatewayClient, S: SnapshotStore>(
    engine: &mut Engine<C, S>,
    format: OutputFormat,
) -> Result<()> {
    let interval = engine.config().poll_interval;
    let start = Instant::now() + Duration::from_millis(50);
    let mut ticker = interval_at(start, interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping");
                break;
            }
            _ = ticker.tick() => {
                match engine.poll().await {
                    Ok(data) => {
                        print_data(engine, &data, format)?;
                        info!(
                            available=%engine.is_available(),
                            stale=%engine.is_stale(),
                            ecu=%engine.ecu_online(),
                            "poll"
                        );
                    }
                    // Setup has never seen this device; keep retrying on
                    // the normal schedule.
                    Err(err) => warn!("gateway not ready: {err}"),
                }
            }
        }
    }

    Ok(())
}

fn print_data<C: GatewayClient, S: SnapshotStore>(
    engine: &Engine<C, S>,
    data: &GatewayData,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Ndjson => {
            println!("{}", serde_json::to_string(data)?);
        }
        OutputFormat::Human => {
            println!("=== WiCAN {} ===", data.device_id().unwrap_or("unknown"));
            println!(
                "State:      available={} stale={} ecu_link={}",
                engine.is_available(),
                engine.is_stale(),
                if data.ecu_link_online() { "online" } else { "offline" },
            );
            if let Some(ts) = engine.last_successful_update() {
                println!("Last live:  {}", ts.to_rfc3339());
            }

            for descriptor in STATUS_FIELDS {
                let Some(raw) = engine.status_field(descriptor.key) else {
                    continue;
                };
                let rendered = descriptor.transform.apply(raw).unwrap_or_else(|| raw.clone());
                println!("{:<11} {rendered}", format!("{}:", descriptor.label));
            }

            if !data.pid.is_empty() {
                println!("PIDs:");
                for (key, entry) in &data.pid {
                    let value = match engine.pid_value(key) {
                        PidReading::Present(value) => value.to_string(),
                        PidReading::NoData | PidReading::Unavailable => "-".to_string(),
                    };
                    let unit = if entry.unit == "none" { "" } else { entry.unit.as_str() };
                    println!("  {key:<20} {value} {unit}");
                }
            }
        }
    }

    Ok(())
}
