use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, SubsecRound};
use clap::{Args, Subcommand};
use sync_latency_store::{HistoryWindow, ResultStore, summarize_window};
use tabled::{Table, Tabled, settings::Style};
use tracing::info;

use crate::{
    client::{ChainClient, RpcChainClient},
    probe::{AttemptOutcome, LatencyProbe, RunReport},
    schedule::{ScheduleOption, run_on_schedule},
    settings::Settings,
    signer::Credential,
};

#[derive(Debug, Subcommand)]
pub enum ProbeCommand {
    /// Send a burst of transactions, print the latency percentiles and persist them.
    Measure(MeasureCommand),

    /// Print the persisted latest snapshot and a history summary.
    Report {
        /// History window to summarize: 24h, 7d or 30d.
        #[arg(long, default_value_t = HistoryWindow::Week)]
        window: HistoryWindow,
        /// Directory holding latest.json and history.json.
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct MeasureCommand {
    /// Transactions per run.
    #[arg(long)]
    pub attempts: Option<usize>,
    /// Delay between transactions in milliseconds.
    #[arg(long, value_name = "MS")]
    pub pacing_ms: Option<u64>,
    /// Directory for latest.json and history.json.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    #[command(flatten)]
    pub schedule: ScheduleOption,
}

impl ProbeCommand {
    pub async fn try_into_execute(self, settings: Settings) -> Result<()> {
        match self {
            ProbeCommand::Measure(cmd) => cmd.execute(settings).await,
            ProbeCommand::Report { window, data_dir } => {
                execute_report(settings, window, data_dir)
            }
        }
    }
}

impl MeasureCommand {
    pub fn apply(&self, mut settings: Settings) -> Result<Settings> {
        if let Some(attempts) = self.attempts {
            settings.probe.attempts = attempts;
        }
        if let Some(pacing_ms) = self.pacing_ms {
            settings.probe.pacing_ms = pacing_ms;
        }
        if let Some(data_dir) = &self.data_dir {
            settings.store.data_dir = data_dir.clone();
        }
        settings.validate()?;
        Ok(settings)
    }

    pub async fn execute(self, settings: Settings) -> Result<()> {
        let settings = self.apply(settings)?;

        match self.schedule.schedule.as_deref() {
            Some(interval) => {
                run_on_schedule(interval, move || {
                    let settings = settings.clone();
                    async move { measure_once(&settings).await }
                })
                .await
            }
            None => measure_once(&settings).await,
        }
    }
}

/// One run end to end against the configured endpoint.
pub async fn measure_once(settings: &Settings) -> Result<()> {
    let credential = Credential::from_env(&settings.probe.credential_env);
    let chain = RpcChainClient::new(settings.rpc_url()?, settings.rpc.sync_method.clone());
    let mut probe = LatencyProbe::new(chain, settings.probe_config()?);

    info!(
        endpoint = %settings.rpc.url,
        attempts = settings.probe.attempts,
        pacing_ms = settings.probe.pacing_ms,
        "starting measurement run"
    );
    measure_and_record(&mut probe, &credential, &settings.result_store()).await
}

/// Runs `probe`, prints the attempts and persists the rounded percentiles.
///
/// Nothing is written when the run fails.
pub async fn measure_and_record<C: ChainClient>(
    probe: &mut LatencyProbe<C>,
    credential: &Credential,
    store: &ResultStore,
) -> Result<()> {
    let report = probe.run(credential).await?;
    print_run(&report);

    // latest.json carries microsecond precision
    let now = Local::now().naive_local().trunc_subsecs(6);
    let history_len = store
        .record(report.stats.rounded(), now)
        .with_context(|| format!("Failed to persist results to {}", store.data_dir().display()))?;

    println!(
        "Saved {} and {} ({history_len} entries)",
        store.latest_path().display(),
        store.history_path().display()
    );
    Ok(())
}

#[derive(Tabled)]
struct AttemptRow {
    #[tabled(rename = "Tx")]
    attempt: usize,
    #[tabled(rename = "Nonce")]
    nonce: u64,
    #[tabled(rename = "Latency (ms)")]
    latency: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl From<&AttemptOutcome> for AttemptRow {
    fn from(outcome: &AttemptOutcome) -> Self {
        match outcome {
            AttemptOutcome::Confirmed {
                attempt,
                nonce,
                latency_ms,
                receipt,
            } => AttemptRow {
                attempt: *attempt,
                nonce: *nonce,
                latency: format!("{latency_ms:.0}"),
                result: match receipt.block_number {
                    Some(block) => format!("included in block {block}"),
                    None => "included".to_string(),
                },
            },
            AttemptOutcome::Failed {
                attempt,
                nonce,
                reason,
            } => AttemptRow {
                attempt: *attempt,
                nonce: *nonce,
                latency: "-".to_string(),
                result: reason.to_string(),
            },
        }
    }
}

fn print_run(report: &RunReport) {
    let rows: Vec<AttemptRow> = report.outcomes.iter().map(AttemptRow::from).collect();
    println!("{}", Table::new(rows).with(Style::psql().remove_horizontals()));

    let stats = &report.stats;
    let rounded = stats.rounded();
    println!(
        "Confirmed {}/{} ({} failed)",
        stats.succeeded, stats.attempted, stats.failed
    );
    println!(
        "P50: {}ms | P95: {}ms | P99: {}ms",
        rounded.p50, rounded.p95, rounded.p99
    );
}

fn execute_report(settings: Settings, window: HistoryWindow, data_dir: Option<PathBuf>) -> Result<()> {
    let store = match data_dir {
        Some(dir) => ResultStore::new(dir, settings.store.history_cap),
        None => settings.result_store(),
    };

    match store.load_latest()? {
        Some(latest) => println!(
            "Latest ({}): P50: {}ms | P95: {}ms | P99: {}ms",
            latest.updated.format("%Y-%m-%d %H:%M:%S"),
            latest.p50,
            latest.p95,
            latest.p99
        ),
        None => println!("No runs recorded in {}", store.data_dir().display()),
    }

    let history = store.load_history()?;
    match summarize_window(&history, window) {
        Some(summary) => println!(
            "{}",
            Table::new([summary]).with(Style::psql().remove_horizontals())
        ),
        None => println!("No history to summarize"),
    }
    Ok(())
}
