use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::lib::gcloud::{CommandRunner, args, render_command, run_checked};
use crate::{BigQueryError, Result};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Fully-qualified BigQuery table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadTarget {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl LoadTarget {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// `project:dataset`
    pub fn dataset_ref(&self) -> String {
        format!("{}:{}", self.project, self.dataset)
    }
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project, self.dataset, self.table)
    }
}

/// Flags passed to `bq load`
#[derive(Debug, Clone, PartialEq)]
pub struct DirectLoadOptions {
    pub field_delimiter: char,
    pub max_bad_records: u32,
    pub skip_leading_rows: u32,
    /// Replace the table instead of appending
    pub replace: bool,
}

impl Default for DirectLoadOptions {
    fn default() -> Self {
        Self {
            field_delimiter: ',',
            max_bad_records: 10_000,
            skip_leading_rows: 1,
            replace: true,
        }
    }
}

/// Row and byte counts reported by `bq show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    #[serde(default, deserialize_with = "count_from_string_or_number")]
    pub num_rows: u64,
    #[serde(default, deserialize_with = "count_from_string_or_number")]
    pub num_bytes: u64,
}

impl TableStats {
    pub fn size_gib(&self) -> f64 {
        self.num_bytes as f64 / GIB
    }
}

// bq emits int64 fields as JSON strings
fn count_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub fn mk_dataset_args(target: &LoadTarget) -> Vec<String> {
    vec![
        "mk".to_string(),
        "--dataset".to_string(),
        target.dataset_ref(),
    ]
}

pub fn load_args(
    target: &LoadTarget,
    source_uri: &str,
    options: &DirectLoadOptions,
) -> Vec<String> {
    let mut cmd = vec![
        "load".to_string(),
        "--source_format=CSV".to_string(),
        "--autodetect".to_string(),
        "--ignore_unknown_values".to_string(),
        format!("--max_bad_records={}", options.max_bad_records),
    ];
    if options.replace {
        cmd.push("--replace".to_string());
    }
    cmd.extend([
        format!("--field_delimiter={}", options.field_delimiter),
        format!("--skip_leading_rows={}", options.skip_leading_rows),
        "--allow_quoted_newlines".to_string(),
        "--allow_jagged_rows".to_string(),
        target.to_string(),
        source_uri.to_string(),
    ]);
    cmd
}

pub fn show_args(target: &LoadTarget) -> Vec<String> {
    vec![
        "show".to_string(),
        "--format=json".to_string(),
        target.to_string(),
    ]
}

/// Typed access to the bq CLI
pub struct BigQuery<R> {
    runner: Arc<R>,
}

impl<R: CommandRunner> BigQuery<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    pub async fn check_available(&self) -> Result<()> {
        match self.runner.run("bq", &args(&["version"])).await {
            Ok(output) if output.success => {
                info!("BigQuery CLI available");
                Ok(())
            }
            Ok(output) => {
                debug!("bq version failed: {}", output.stderr.trim());
                Err(BigQueryError::Unavailable.into())
            }
            Err(e) => {
                debug!("bq version failed: {e}");
                Err(BigQueryError::Unavailable.into())
            }
        }
    }

    /// Create the dataset, tolerating one that already exists
    pub async fn ensure_dataset(&self, target: &LoadTarget) -> Result<()> {
        info!("Creating dataset: {}", target.dataset_ref());
        let output = self.runner.run("bq", &mk_dataset_args(target)).await?;
        if output.success {
            info!("Dataset created");
            return Ok(());
        }

        let message = format!("{}{}", output.stdout, output.stderr);
        if message.contains("already exists") {
            warn!("Dataset {} already exists, reusing it", target.dataset_ref());
            Ok(())
        } else {
            Err(BigQueryError::DatasetFailed(message.trim().to_string()).into())
        }
    }

    pub async fn load(
        &self,
        target: &LoadTarget,
        source_uri: &str,
        options: &DirectLoadOptions,
    ) -> Result<()> {
        let cmd = load_args(target, source_uri, options);
        info!("Starting load: {}", render_command("bq", &cmd));
        let output = self.runner.run_to_completion("bq", &cmd).await?;
        if !output.success {
            return Err(BigQueryError::LoadFailed(output.stderr.trim().to_string()).into());
        }
        Ok(())
    }

    pub async fn table_stats(&self, target: &LoadTarget) -> Result<TableStats> {
        let stdout = run_checked(self.runner.as_ref(), "bq", &show_args(target))
            .await
            .map_err(|e| BigQueryError::StatsUnavailable(e.to_string()))?;
        serde_json::from_str(&stdout)
            .map_err(|e| BigQueryError::StatsUnavailable(format!("{target}: {e}")).into())
    }
}
