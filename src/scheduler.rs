use crate::error::Result;
use crate::ftp::{DestinationConnector, SourceConnector};
use crate::transfer::{CycleReport, Transfer};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub collection_interval_seconds: u64,
    /// Shift applied to interval boundaries; may be negative
    pub offset_seconds: i64,
    /// Stop after the first cycle
    pub single_run: bool,
}

/// Next run time aligned to multiples of `interval_secs` shifted by
/// `offset_secs`, strictly after `now`, with the time left until it.
pub fn next_wake(now: DateTime<Utc>, interval_secs: u64, offset_secs: i64) -> (DateTime<Utc>, Duration) {
    let interval = interval_secs.max(1) as i64;
    let now_secs = now.timestamp();

    let mut wake = now_secs.div_euclid(interval) * interval + offset_secs.rem_euclid(interval);
    if wake <= now_secs {
        wake += interval;
    }

    let wake_at = Utc.timestamp_opt(wake, 0).single().unwrap_or(now);
    let remaining = (wake_at - now).to_std().unwrap_or_default();
    (wake_at, remaining)
}

pub struct Scheduler<S, D> {
    transfer: Transfer<S, D>,
    settings: SchedulerSettings,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S, D> Scheduler<S, D>
where
    S: SourceConnector + Clone + Send + 'static,
    D: DestinationConnector + Clone + Send + 'static,
{
    pub fn new(
        transfer: Transfer<S, D>,
        settings: SchedulerSettings,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transfer,
            settings,
            shutdown_rx,
        }
    }

    /// Run scan cycles until shutdown, or once in single-run mode.
    /// Returns the number of cycles completed.
    pub async fn run(&mut self) -> Result<u32> {
        info!(
            "Scheduler starting with {}s interval, {}s offset{}",
            self.settings.collection_interval_seconds,
            self.settings.offset_seconds,
            if self.transfer.is_dry_run() { " (dry run)" } else { "" }
        );

        let mut cycles = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                info!("Shutdown requested, not starting another cycle");
                break;
            }

            let report = self.run_cycle().await?;
            cycles += 1;
            log_report(&report);

            if self.settings.single_run {
                info!("Single run requested, exiting after one cycle");
                break;
            }

            let (wake_at, remaining) = next_wake(
                Utc::now(),
                self.settings.collection_interval_seconds,
                self.settings.offset_seconds,
            );
            info!("Next run at {}", wake_at.format("%Y-%m-%d %H:%M:%S UTC"));

            tokio::select! {
                _ = tokio::time::sleep(remaining) => {},
                _ = self.shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        Ok(cycles)
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        let transfer = self.transfer.clone();
        let report = tokio::task::spawn_blocking(move || transfer.run_cycle()).await?;
        Ok(report)
    }
}

fn log_report(report: &CycleReport) {
    if report.abandoned {
        error!(
            "Scan cycle abandoned after {} attempts: {} converted, {} uploaded",
            report.attempts, report.converted, report.uploaded
        );
    } else if report.failed > 0 {
        warn!(
            "Scan cycle complete: {} candidates, {} converted, {} failed, {} uploaded",
            report.candidates, report.converted, report.failed, report.uploaded
        );
    } else {
        info!(
            "Scan cycle complete: {} candidates, {} converted, {} uploaded",
            report.candidates, report.converted, report.uploaded
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 5, 8, h, m, s).unwrap()
    }

    #[test]
    fn test_next_wake_with_offset() {
        let (wake, remaining) = next_wake(at(14, 25, 30), 3600, 600);
        assert_eq!(wake, at(15, 10, 0));
        assert_eq!(remaining, Duration::from_secs(44 * 60 + 30));
    }

    #[test]
    fn test_next_wake_on_the_hour() {
        let (wake, _) = next_wake(at(14, 25, 30), 3600, 0);
        assert_eq!(wake, at(15, 0, 0));
    }

    #[test]
    fn test_next_wake_negative_offset() {
        let (wake, _) = next_wake(at(14, 25, 30), 3600, -3600);
        assert_eq!(wake, at(15, 0, 0));

        let (wake, _) = next_wake(at(14, 25, 30), 3600, -300);
        assert_eq!(wake, at(14, 55, 0));
    }

    #[test]
    fn test_next_wake_is_strictly_future() {
        let (wake, remaining) = next_wake(at(15, 10, 0), 3600, 600);
        assert_eq!(wake, at(16, 10, 0));
        assert_eq!(remaining, Duration::from_secs(3600));
    }

    #[test]
    fn test_next_wake_later_in_interval() {
        let (wake, _) = next_wake(at(14, 5, 0), 3600, 600);
        assert_eq!(wake, at(14, 10, 0));
    }
}
