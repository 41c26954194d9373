use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use tbtc_common::error::AppError;

use crate::report::{self, ReportOptions, ScanReport};
use crate::snapshot::Snapshot;

/// Polls a snapshot file and re-ranks deposits on every tick.
///
/// The snapshot is replaced only when the file content changes, but the report
/// is rebuilt each tick so time-dependent fields (phase progress, notifiable,
/// at-term redemption) stay current.
pub struct SnapshotWatcher {
    path: PathBuf,
    poll_interval: Duration,
    options: ReportOptions,
    /// Raw content of the current snapshot.
    last_raw: Option<String>,
    current: Option<Snapshot>,
}

impl SnapshotWatcher {
    pub fn new(path: impl Into<PathBuf>, poll_interval_ms: u64, options: ReportOptions) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            options,
            last_raw: None,
            current: None,
        }
    }

    /// Snapshot currently being ranked, if one has been loaded.
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Start the polling loop. Runs indefinitely until the task is cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            path = %self.path.display(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            top_n = self.options.top_n,
            "Snapshot watcher started"
        );

        let mut ticks = tokio::time::interval(self.poll_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;

            match self.reload().await {
                Ok(true) => {}
                Ok(false) => tracing::trace!("Snapshot unchanged"),
                Err(e) => {
                    // The file may be mid-write or not produced yet; keep the previous snapshot.
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to load snapshot");
                }
            }

            if let Some(report) = self.report_at(Utc::now()) {
                report::log_report(&report);
            }
        }
    }

    /// Re-read the snapshot file and replace the current snapshot wholesale if
    /// its content changed. Returns whether it was replaced.
    ///
    /// On error the previously loaded snapshot stays current.
    pub async fn reload(&mut self) -> Result<bool, AppError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        if self.last_raw.as_deref() == Some(raw.as_str()) {
            return Ok(false);
        }

        let snapshot = Snapshot::from_json(&raw)?;
        tracing::info!(
            deposits = snapshot.deposits.len(),
            has_price = snapshot.price.is_some(),
            "Loaded new snapshot"
        );

        self.last_raw = Some(raw);
        self.current = Some(snapshot);
        Ok(true)
    }

    /// Rank the current snapshot at `now`. `None` until a snapshot has loaded.
    pub fn report_at(&self, now: DateTime<Utc>) -> Option<ScanReport> {
        self.current
            .as_ref()
            .map(|snapshot| report::build_report(snapshot, &self.options, now))
    }
}
