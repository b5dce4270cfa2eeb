use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;
use wican_core::{Engine, GatewayClient, GatewayData, PidReading, SnapshotStore, Transform};

const LOG_PREFIX: &str = "wican-";
const LOG_SUFFIX: &str = ".jsonl";
const PRUNE_EVERY: Duration = Duration::from_secs(1800);

pub async fn run_exporter<C: GatewayClient, S: SnapshotStore>(
    engine: &mut Engine<C, S>,
    output_dir: &str,
    retention_days: u64,
) -> Result<()> {
    let out_dir = PathBuf::from(output_dir);
    fs::create_dir_all(&out_dir)?;

    let mut state = ExportState::new(out_dir, retention_days)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sleep(engine.config().poll_interval) => {
                match engine.poll().await {
                    Ok(data) => {
                        let ts = Utc::now();
                        let record = export_record(engine, &data, ts);
                        state.write_record(&record, ts)?;
                        state.maybe_prune()?;
                    }
                    Err(err) => warn!("gateway not ready, skipping export cycle: {err}"),
                }
            }
        }
    }

    Ok(())
}

/// Flat record for one poll cycle: engine availability bookkeeping, the
/// diagnostic status fields, and every PID reading.
fn export_record<C: GatewayClient, S: SnapshotStore>(
    engine: &Engine<C, S>,
    data: &GatewayData,
    ts: DateTime<Utc>,
) -> Value {
    let batt_voltage = data
        .status
        .get("batt_voltage")
        .and_then(|raw| Transform::VoltageStringToFloat.apply(raw));

    let pid: serde_json::Map<String, Value> = data
        .pid
        .keys()
        .map(|key| {
            let value = match engine.pid_value(key) {
                PidReading::Present(value) => value,
                PidReading::NoData | PidReading::Unavailable => Value::Null,
            };
            (key.clone(), value)
        })
        .collect();

    serde_json::json!({
        "ts": ts,
        "unix_ms": ts.timestamp_millis(),
        "device_id": data.device_id(),
        "available": engine.is_available(),
        "stale": engine.is_stale(),
        "ecu_link": data.ecu_link_online(),
        "last_successful_update": engine.last_successful_update(),
        "status": {
            "fw_version": data.status.get("fw_version"),
            "hw_version": data.status.get("hw_version"),
            "sta_ip": data.status.get("sta_ip"),
            "protocol": data.status.get("protocol"),
            "batt_voltage": batt_voltage,
        },
        "pid": pid,
    })
}

struct ExportState {
    out_dir: PathBuf,
    retention_days: u64,
    current_day: String,
    writer: BufWriter<File>,
    last_prune: Instant,
}

impl ExportState {
    fn new(out_dir: PathBuf, retention_days: u64) -> Result<Self> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let writer = Self::open_writer(&out_dir, &day)?;

        Ok(Self {
            out_dir,
            retention_days,
            current_day: day,
            writer,
            // First prune runs on the first cycle.
            last_prune: Instant::now() - PRUNE_EVERY,
        })
    }

    fn open_writer(out_dir: &Path, day: &str) -> Result<BufWriter<File>> {
        let path = out_dir.join(format!("{LOG_PREFIX}{day}{LOG_SUFFIX}"));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    fn write_record(&mut self, record: &Value, ts: DateTime<Utc>) -> Result<()> {
        let day = ts.format("%Y-%m-%d").to_string();
        if day != self.current_day {
            self.writer.flush()?;
            self.writer = Self::open_writer(&self.out_dir, &day)?;
            self.current_day = day;
        }

        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let latest_path = self.out_dir.join("latest.json");
        fs::write(latest_path, serde_json::to_vec_pretty(record)?)?;

        Ok(())
    }

    fn maybe_prune(&mut self) -> Result<()> {
        if self.last_prune.elapsed() < PRUNE_EVERY {
            return Ok(());
        }
        self.last_prune = Instant::now();

        prune_old_log_files(&self.out_dir, self.retention_days, SystemTime::now())
    }
}

/// Capture date of a rotated log file, by name.
pub(crate) fn log_file_date(file_name: &str) -> Option<NaiveDate> {
    let date_part = file_name
        .strip_prefix(LOG_PREFIX)?
        .strip_suffix(LOG_SUFFIX)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub(crate) fn prune_old_log_files(
    out_dir: &Path,
    retention_days: u64,
    now: SystemTime,
) -> Result<()> {
    let today = DateTime::<Utc>::from(now).date_naive();
    let cutoff = today
        .checked_sub_days(Days::new(retention_days))
        .unwrap_or(today);

    for entry in fs::read_dir(out_dir)? {
        let path = entry?.path();
        let Some(file_date) = path
            .file_name()
            .and_then(|v| v.to_str())
            .and_then(log_file_date)
        else {
            continue;
        };

        if file_date < cutoff {
            let _ = fs::remove_file(path);
        }
    }

    Ok(())
}
