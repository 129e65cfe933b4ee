use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::lib::config::ConfigOverrides;
use crate::lib::pipeline::WorkerProfile;
use crate::GcpRegion;

/// BigQuery Bulk Loader
///
/// Loads a large compressed CSV object from Cloud Storage into BigQuery,
/// either through Dataflow or with a direct `bq load`, and helps pick a
/// region whose quotas can sustain the pipeline.
#[derive(Parser, Debug)]
#[command(name = "bulkloader", author, version, about, styles=get_styles())]
pub struct Cli {
    /// YAML config file (default: platform config dir, if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output to stderr (logs still written to file)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// GCP project (default: gcloud's configured project)
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// GCP region for Dataflow jobs
    #[arg(short, long, global = true)]
    pub region: Option<GcpRegion>,

    /// Timeout in seconds for short gcloud/bq commands
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check region quotas and recommend a region for Dataflow
    Quotas {
        /// Candidate region, repeatable (default: built-in candidate list)
        #[arg(long = "candidate", value_name = "REGION")]
        candidates: Vec<GcpRegion>,

        /// Output format: table (default) or json
        #[arg(long, value_name = "FORMAT", default_value = "table")]
        output: OutputFormat,
    },

    /// Load directly with `bq load`, without Dataflow
    Load {
        #[command(flatten)]
        target: TargetArgs,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Append to the table instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Submit the Dataflow pipeline
    Pipeline {
        #[command(flatten)]
        target: TargetArgs,

        /// Bucket for temp and staging files
        #[arg(long)]
        bucket: Option<String>,

        /// gs:// URI of the BigQuery schema file (see `preview --write-schema`)
        #[arg(long, value_name = "URI")]
        schema: Option<String>,

        /// gs:// URI of the line transform UDF (see `preview --write-udf`)
        #[arg(long, value_name = "URI")]
        udf: Option<String>,

        /// Worker sizing
        #[arg(long, value_enum, default_value = "standard")]
        profile: WorkerProfile,

        /// Print the gcloud command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Follow pipeline state and table growth
    Monitor {
        #[command(flatten)]
        target: TargetArgs,

        /// Dataflow job id (default: most recent job)
        #[arg(long)]
        job: Option<String>,

        /// Polling interval in seconds
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,

        /// Take a single sample and exit
        #[arg(long)]
        once: bool,
    },

    /// Verify cloud tools and gcloud configuration
    Preflight {
        /// Output format: table (default) or json
        #[arg(long, value_name = "FORMAT", default_value = "table")]
        output: OutputFormat,
    },

    /// Show how local sample lines would be split
    Preview {
        /// Local, uncompressed sample of the CSV
        #[arg(long)]
        file: PathBuf,

        /// Number of lines to split
        #[arg(long, default_value = "10")]
        lines: usize,

        /// Header lines to skip (default: config skip_leading_rows)
        #[arg(long)]
        skip: Option<usize>,

        /// Field delimiter (default: config delimiter)
        #[arg(long)]
        delimiter: Option<char>,

        /// Write the Dataflow line transform UDF for this sample's columns
        #[arg(long, value_name = "FILE")]
        write_udf: Option<PathBuf>,

        /// Write the BigQuery schema file for this sample's columns
        #[arg(long, value_name = "FILE")]
        write_schema: Option<PathBuf>,
    },
}

/// Dataset, table and source shared by load, pipeline and monitor
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// BigQuery dataset
    #[arg(long)]
    pub dataset: Option<String>,

    /// BigQuery table
    #[arg(long)]
    pub table: Option<String>,

    /// gs:// URI of the compressed CSV
    #[arg(long, value_name = "URI")]
    pub source: Option<String>,
}

impl Cli {
    /// Flags that override config file values
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            project: self.project.clone(),
            region: self.region,
            command_timeout_secs: self.timeout_secs,
            ..Default::default()
        };

        let target = match &self.command {
            Command::Load { target, .. } | Command::Monitor { target, .. } => Some(target),
            Command::Pipeline {
                target,
                bucket,
                schema,
                udf,
                ..
            } => {
                overrides.bucket = bucket.clone();
                overrides.schema_path = schema.clone();
                overrides.udf_path = udf.clone();
                Some(target)
            }
            _ => None,
        };
        if let Some(target) = target {
            overrides.dataset = target.dataset.clone();
            overrides.table = target.table.clone();
            overrides.source_uri = target.source.clone();
        }
        overrides
    }
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output (interactive table for quotas)
    Table,
    /// Output results as JSON
    Json,
}

/// Set color and variants for help description
///
/// Thanks to [Praveen Perera](https://stackoverflow.com/a/76916424)
fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn quotas_accepts_repeated_candidates() {
        let cli = Cli::try_parse_from([
            "bulkloader",
            "quotas",
            "--candidate",
            "us-east1",
            "--candidate",
            "europe-west4",
            "--output",
            "json",
        ])
        .unwrap();
        match cli.command {
            Command::Quotas { candidates, output } => {
                assert_eq!(candidates, vec![GcpRegion::UsEast1, GcpRegion::EuropeWest4]);
                assert_eq!(output, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn pipeline_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "bulkloader",
            "pipeline",
            "--profile",
            "constrained",
            "--bucket",
            "scratch",
            "--udf",
            "gs://scratch/transform.js",
            "--table",
            "events",
            "--region",
            "us-east4",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.bucket.as_deref(), Some("scratch"));
        assert_eq!(overrides.table.as_deref(), Some("events"));
        assert_eq!(overrides.region, Some(GcpRegion::UsEast4));
        assert_eq!(overrides.udf_path.as_deref(), Some("gs://scratch/transform.js"));
        assert!(overrides.schema_path.is_none());
        assert!(overrides.dataset.is_none());
    }

    #[test]
    fn invalid_region_is_rejected() {
        assert!(Cli::try_parse_from(["bulkloader", "-r", "moon-1", "preflight"]).is_err());
    }
}
