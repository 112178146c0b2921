//! Repeats a measurement run on a fixed cron cadence until Ctrl+C.

use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Result, bail};
use clap::Args;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Schedule flag that can be flattened into command structs.
#[derive(Debug, Args, Clone, Default)]
pub struct ScheduleOption {
    /// Repeat interval (e.g. "30s", "5m", "1h"). Runs once when omitted.
    #[arg(long, help = "Schedule interval (e.g. '30s', '5m', '1h')")]
    pub schedule: Option<String>,
}

impl ScheduleOption {
    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }
}

/// Parses "30s", "5m", "2h" or a bare number of seconds.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, unit) = if let Some(num_str) = s.strip_suffix('s') {
        (num_str, 1)
    } else if let Some(num_str) = s.strip_suffix('m') {
        (num_str, 60)
    } else if let Some(num_str) = s.strip_suffix('h') {
        (num_str, 3600)
    } else {
        (s.as_str(), 1)
    };
    let Some(secs) = num_str.trim().parse::<u64>()?.checked_mul(unit) else {
        bail!("Schedule interval '{s}' is too long. Maximum allowed is less than 24 hours.");
    };

    if secs == 0 {
        bail!("Schedule interval must be greater than zero");
    }
    if secs >= 24 * 3600 {
        bail!("Schedule interval '{s}' is too long. Maximum allowed is less than 24 hours.");
    }
    Ok(Duration::from_secs(secs))
}

/// Converts an interval to a six-field cron expression.
///
/// The interval has to divide its unit evenly, otherwise the cron step
/// would reset at each minute, hour or day boundary.
pub fn interval_to_cron(s: &str) -> Result<String> {
    let secs = parse_interval(s)?.as_secs();

    if secs < 60 {
        if 60 % secs != 0 {
            bail!("Schedule interval of {secs}s does not divide a minute evenly");
        }
        Ok(format!("*/{secs} * * * * *"))
    } else if secs < 3600 {
        if secs % 60 != 0 || 60 % (secs / 60) != 0 {
            bail!("Schedule interval of {secs}s does not divide an hour into whole minutes");
        }
        Ok(format!("0 */{} * * * *", secs / 60))
    } else {
        if secs % 3600 != 0 || 24 % (secs / 3600) != 0 {
            bail!("Schedule interval of {secs}s does not divide a day into whole hours");
        }
        Ok(format!("0 0 */{} * * *", secs / 3600))
    }
}

/// Runs `task` on every tick of `interval` until Ctrl+C.
///
/// A failed run is logged and the schedule continues. A tick that fires while
/// the previous run is still going is skipped.
pub async fn run_on_schedule<F, Fut>(interval: &str, task: F) -> Result<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let cron_expr = interval_to_cron(interval)?;
    let task = Arc::new(task);
    let in_flight = Arc::new(Mutex::new(()));

    let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
        let task = task.clone();
        let in_flight = in_flight.clone();
        Box::pin(async move {
            let Ok(_guard) = in_flight.try_lock() else {
                warn!("Previous run still in progress, skipping this tick");
                return;
            };
            if let Err(e) = (*task)().await {
                error!("Scheduled run failed: {e:#}");
            }
        })
    })?;

    let sched = JobScheduler::new().await?;
    sched.add(job).await?;
    sched.start().await?;

    info!("Scheduler started. Measuring every {interval} ({cron_expr})");
    info!("Press Ctrl+C to stop...");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_to_cron() {
        assert_eq!(interval_to_cron("30s").unwrap(), "*/30 * * * * *");
        assert_eq!(interval_to_cron("5m").unwrap(), "0 */5 * * * *");
        assert_eq!(interval_to_cron("2h").unwrap(), "0 0 */2 * * *");

        // bare numbers are seconds
        assert_eq!(interval_to_cron("15").unwrap(), "*/15 * * * * *");
        assert_eq!(interval_to_cron("120").unwrap(), "0 */2 * * * *");

        assert_eq!(interval_to_cron(" 10M ").unwrap(), "0 */10 * * * *");
    }

    #[test]
    fn test_interval_limits() {
        assert!(interval_to_cron("24h").is_err());
        assert!(interval_to_cron("86400").is_err());
        assert!(interval_to_cron("0s").is_err());
        assert!(interval_to_cron("soon").is_err());
        assert!(interval_to_cron("12h").is_ok());
    }

    #[test]
    fn test_interval_overflow_is_rejected() {
        // u64::MAX / 60 + 1 and u64::MAX / 3600 + 1
        for huge in ["307445734561825861m", "5124095576030432h", "18446744073709551615h"] {
            let err = parse_interval(huge).unwrap_err();
            assert!(err.to_string().contains("too long"), "{huge}: {err}");
        }
        assert!(parse_interval("18446744073709551616s").is_err());
    }

    #[test]
    fn test_uneven_intervals_rejected() {
        assert!(interval_to_cron("7s").is_err());
        assert!(interval_to_cron("90s").is_err());
        assert!(interval_to_cron("7m").is_err());
        assert!(interval_to_cron("5h").is_err());
    }

    #[test]
    fn test_schedule_option() {
        assert!(!ScheduleOption::default().is_scheduled());
        let scheduled = ScheduleOption {
            schedule: Some("1m".to_string()),
        };
        assert!(scheduled.is_scheduled());
    }
}
