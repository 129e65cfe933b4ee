//! BigQuery Bulk Loader Library
//!
//! This library drives the `gcloud` and `bq` tools to load a large gzip CSV
//! object from Cloud Storage into BigQuery, and ranks GCP regions by whether
//! their compute quotas can sustain a Dataflow pipeline.

pub mod lib {
    pub mod advisor;
    pub mod bigquery;
    pub mod cli;
    pub mod commands;
    pub mod config;
    pub mod error;
    pub mod gcloud;
    pub mod gcp_region;
    pub mod loader;
    pub mod logger;
    pub mod monitor;
    pub mod output;
    pub mod pipeline;
    pub mod preflight;
    pub mod quota;
    pub mod tui;
}

// Re-export commonly used types at the root level for convenience
pub use lib::advisor::{
    QuotaRule, RankOutcome, RegionAssessment, RegionQuotaAdvisor, SkippedRegion, Verdict,
};
pub use lib::bigquery::{BigQuery, DirectLoadOptions, LoadTarget, TableStats};
pub use lib::cli::{Cli, Command, OutputFormat, TargetArgs};
pub use lib::commands::execute;
pub use lib::config::{ConfigOverrides, LoaderConfig};
pub use lib::error::{
    BigQueryError, ConfigError, GcloudError, LoaderError, PipelineError, Result,
};
pub use lib::gcloud::{CommandOutput, CommandRunner, DataflowJob, Gcloud, ProcessRunner};
pub use lib::gcp_region::GcpRegion;
pub use lib::loader::{DirectLoader, LoadReport};
pub use lib::logger::init_logger;
pub use lib::monitor::{Monitor, ProgressSample, ProgressTracker};
pub use lib::output::{QuotaReport, ReportMetadata};
pub use lib::pipeline::{
    PipelineJob, PipelineLauncher, TemplateParams, WorkerProfile, bigquery_schema, column_names,
    preview, split_record, transform_udf,
};
pub use lib::preflight::{PreflightReport, run_preflight};
pub use lib::quota::{FetchError, QuotaMetric, QuotaUsage, RegionSnapshot};
pub use lib::tui::display_assessments_table;
