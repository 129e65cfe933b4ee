use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{info, warn};
use serde::Serialize;

use crate::lib::bigquery::{BigQuery, LoadTarget, TableStats};
use crate::lib::gcloud::{CommandRunner, DataflowJob, Gcloud};
use crate::Result;

/// One monitoring tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    pub clock: String,
    pub elapsed_secs: u64,
    pub job_id: Option<String>,
    pub job_state: Option<String>,
    pub rows: Option<u64>,
    /// Only set when the row count grew since the previous sample
    pub rows_added: Option<u64>,
    pub size_gib: Option<f64>,
    pub rows_per_second: Option<f64>,
}

impl ProgressSample {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        let job = match (&self.job_id, &self.job_state) {
            (Some(id), state) => format!(
                "job {}... | state {}",
                id.chars().take(8).collect::<String>(),
                state.as_deref().unwrap_or("N/A")
            ),
            (None, _) => "no Dataflow job found".to_string(),
        };
        lines.push(format!("{} | {}", self.clock, job));

        if let Some(added) = self.rows_added {
            lines.push(format!(
                "   rows in BigQuery: {} (+{})",
                self.rows.unwrap_or_default(),
                added
            ));
            if let Some(size) = self.size_gib {
                lines.push(format!("   size: {size:.2} GB"));
            }
        }
        if let Some(rate) = self.rows_per_second {
            lines.push(format!("   speed: {rate:.0} rows/second"));
        }
        lines.push(format!(
            "   elapsed: {}",
            format_elapsed(Duration::from_secs(self.elapsed_secs))
        ));
        lines.join("\n")
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Turns raw observations into samples, remembering the last row count
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last_rows: u64,
}

impl ProgressTracker {
    pub fn record(
        &mut self,
        elapsed: Duration,
        job: Option<&DataflowJob>,
        stats: Option<TableStats>,
    ) -> ProgressSample {
        let mut sample = ProgressSample {
            clock: Local::now().format("%H:%M:%S").to_string(),
            elapsed_secs: elapsed.as_secs(),
            job_id: job.map(|j| j.id.clone()),
            job_state: job.and_then(|j| j.state.clone()),
            rows: None,
            rows_added: None,
            size_gib: None,
            rows_per_second: None,
        };

        if let Some(stats) = stats {
            sample.rows = Some(stats.num_rows);
            sample.size_gib = Some(stats.size_gib());
            if stats.num_rows > self.last_rows {
                sample.rows_added = Some(stats.num_rows - self.last_rows);
                self.last_rows = stats.num_rows;
            }
            let secs = elapsed.as_secs_f64();
            if secs > 0.0 {
                sample.rows_per_second = Some(stats.num_rows as f64 / secs);
            }
        }

        sample
    }
}

/// Polls Dataflow and BigQuery until interrupted
pub struct Monitor<R> {
    gcloud: Gcloud<R>,
    bigquery: BigQuery<R>,
    project: String,
    region: Option<String>,
    job_id: Option<String>,
    target: LoadTarget,
}

impl<R: CommandRunner> Monitor<R> {
    pub fn new(
        runner: Arc<R>,
        target: LoadTarget,
        region: Option<String>,
        job_id: Option<String>,
    ) -> Self {
        Self {
            gcloud: Gcloud::new(Arc::clone(&runner)),
            bigquery: BigQuery::new(runner),
            project: target.project.clone(),
            region,
            job_id,
            target,
        }
    }

    async fn current_job(&self) -> Option<DataflowJob> {
        let job = match &self.job_id {
            Some(id) => self
                .gcloud
                .describe_dataflow_job(&self.project, self.region.as_deref(), id)
                .await
                .map(Some),
            None => self
                .gcloud
                .list_dataflow_jobs(&self.project, self.region.as_deref(), 5)
                .await
                .map(|jobs| jobs.into_iter().next()),
        };
        job.unwrap_or_else(|e| {
            warn!("Failed to read pipeline status: {e}");
            None
        })
    }

    /// Take one sample. Failures of either source are logged, never fatal.
    pub async fn sample(&self, tracker: &mut ProgressTracker, started: Instant) -> ProgressSample {
        let job = self.current_job().await;
        let stats = match &job {
            Some(_) => match self.bigquery.table_stats(&self.target).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!("Failed to read BigQuery stats: {e}");
                    None
                }
            },
            None => None,
        };
        tracker.record(started.elapsed(), job.as_ref(), stats)
    }

    pub async fn run(&self, interval: Duration, once: bool) -> Result<()> {
        info!("Monitoring project {}", self.project);
        info!("Table: {}", self.target);
        info!("Interval: {} seconds", interval.as_secs());

        let started = Instant::now();
        let mut tracker = ProgressTracker::default();

        if once {
            println!("{}", self.sample(&mut tracker, started).await.render());
            return Ok(());
        }

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    println!("{}", self.sample(&mut tracker, started).await.render());
                    println!("{}", "-".repeat(60));
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("Monitoring stopped by user");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::gcloud::testing::{FakeRunner, Reply};

    fn stats(rows: u64) -> Option<TableStats> {
        Some(TableStats {
            num_rows: rows,
            num_bytes: rows * 1024,
        })
    }

    #[test]
    fn rows_added_only_when_growing() {
        let mut tracker = ProgressTracker::default();

        let first = tracker.record(Duration::from_secs(10), None, stats(1_000));
        assert_eq!(first.rows_added, Some(1_000));
        assert_eq!(first.rows_per_second, Some(100.0));

        let same = tracker.record(Duration::from_secs(20), None, stats(1_000));
        assert_eq!(same.rows_added, None);
        assert_eq!(same.rows_per_second, Some(50.0));

        let more = tracker.record(Duration::from_secs(40), None, stats(3_000));
        assert_eq!(more.rows_added, Some(2_000));
    }

    #[test]
    fn zero_elapsed_has_no_rate() {
        let sample = ProgressTracker::default().record(Duration::ZERO, None, stats(5));
        assert!(sample.rows_per_second.is_none());
    }

    #[test]
    fn elapsed_formats_as_clock() {
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1:02:05");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "0:00:59");
    }

    #[test]
    fn render_mentions_job_and_growth() {
        let job = DataflowJob {
            id: "2025-06-01_12_00_00-42".into(),
            name: None,
            state: Some("JOB_STATE_RUNNING".into()),
            creation_time: None,
        };
        let sample =
            ProgressTracker::default().record(Duration::from_secs(60), Some(&job), stats(600));
        let text = sample.render();
        assert!(text.contains("job 2025-06-..."));
        assert!(text.contains("JOB_STATE_RUNNING"));
        assert!(text.contains("(+600)"));
        assert!(text.contains("10 rows/second"));
    }

    #[tokio::test]
    async fn sample_survives_failing_sources() {
        let runner = FakeRunner::default()
            .on("jobs list", Reply::Ok(r#"[{"id":"abc","state":"Running"}]"#.into()))
            .on("bq show", Reply::Fail("Not found: Table".into()));
        let monitor = Monitor::new(
            Arc::new(runner),
            LoadTarget::new("p", "d", "t"),
            None,
            None,
        );
        let mut tracker = ProgressTracker::default();
        let sample = monitor.sample(&mut tracker, Instant::now()).await;
        assert_eq!(sample.job_state.as_deref(), Some("Running"));
        assert!(sample.rows.is_none());
    }

    #[tokio::test]
    async fn explicit_job_is_described() {
        let runner = Arc::new(
            FakeRunner::default()
                .on(
                    "jobs describe job-1",
                    Reply::Ok(r#"{"id":"job-1","currentState":"JOB_STATE_DONE"}"#.into()),
                )
                .on("bq show", Reply::Ok(r#"{"numRows":"10","numBytes":"0"}"#.into())),
        );
        let monitor = Monitor::new(
            Arc::clone(&runner),
            LoadTarget::new("p", "d", "t"),
            Some("us-central1".into()),
            Some("job-1".into()),
        );
        let sample = monitor
            .sample(&mut ProgressTracker::default(), Instant::now())
            .await;
        assert_eq!(sample.job_state.as_deref(), Some("JOB_STATE_DONE"));
        assert_eq!(sample.rows, Some(10));
        assert!(runner.calls().iter().all(|c| !c.contains("jobs list")));
    }
}
