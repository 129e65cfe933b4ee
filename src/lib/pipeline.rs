//! Dataflow pipeline strategy.
//!
//! The runner does the actual work: this module only sizes the workers,
//! describes the per-line transform and submits the job.

use std::io::BufRead;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use url::Url;

use crate::lib::bigquery::LoadTarget;
use crate::lib::gcloud::{CommandRunner, render_command};
use crate::{PipelineError, Result};

/// Worker sizing presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WorkerProfile {
    /// Many mid-size workers, needs a generous IP address quota
    Standard,
    /// At most 8 large workers, fits projects limited to 8 in-use IPs
    Constrained,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSizing {
    pub num_workers: u32,
    pub max_num_workers: u32,
    pub machine_type: &'static str,
    pub disk_size_gb: u32,
    pub autoscaling_algorithm: Option<&'static str>,
}

impl WorkerProfile {
    pub fn sizing(&self) -> WorkerSizing {
        match self {
            WorkerProfile::Standard => WorkerSizing {
                num_workers: 50,
                max_num_workers: 100,
                machine_type: "n1-standard-4",
                disk_size_gb: 100,
                autoscaling_algorithm: None,
            },
            WorkerProfile::Constrained => WorkerSizing {
                num_workers: 7,
                max_num_workers: 8,
                machine_type: "n1-standard-16",
                disk_size_gb: 500,
                autoscaling_algorithm: Some("THROUGHPUT_BASED"),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerProfile::Standard => "standard",
            WorkerProfile::Constrained => "constrained",
        }
    }
}

/// Naive CSV split applied to every line: trim, drop blanks, split on the
/// delimiter. Quoted fields are not supported.
pub fn split_record(line: &str, delimiter: char) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(line.split(delimiter).map(str::to_string).collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitStats {
    pub processed: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub rows: Vec<Vec<String>>,
    pub stats: SplitStats,
}

/// Apply [`split_record`] to the first `limit` lines of a local sample,
/// after skipping `skip_header` lines
pub fn preview<B: BufRead>(
    reader: B,
    delimiter: char,
    skip_header: usize,
    limit: usize,
) -> Result<Preview> {
    let mut rows = Vec::new();
    let mut stats = SplitStats::default();

    for line in reader.lines().skip(skip_header).take(limit) {
        let line = line?;
        match split_record(&line, delimiter) {
            Some(fields) => {
                stats.processed += 1;
                rows.push(fields);
            }
            None => stats.skipped += 1,
        }
    }

    debug!(
        "Preview split {} lines, skipped {}",
        stats.processed, stats.skipped
    );
    Ok(Preview { rows, stats })
}

/// Column names for the transform and schema files.
///
/// With a header the names come from `first_line`, otherwise they are
/// `col_1..col_n`. Names are reduced to what BigQuery accepts.
pub fn column_names(first_line: &str, delimiter: char, has_header: bool) -> Vec<String> {
    let fields = split_record(first_line, delimiter).unwrap_or_default();
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let mut name: String = field
                .trim()
                .trim_matches('"')
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            if !has_header || name.trim_matches('_').is_empty() {
                name = format!("col_{}", i + 1);
            } else if name.starts_with(|c: char| c.is_ascii_digit()) {
                name.insert(0, '_');
            }
            name
        })
        .collect()
}

/// JavaScript UDF running [`split_record`] inside the Dataflow workers.
///
/// Blank lines return `null` and produce no row; missing trailing fields
/// become `null`.
pub fn transform_udf(function: &str, delimiter: char, columns: &[String]) -> Result<String> {
    let delimiter = serde_json::to_string(&delimiter.to_string())?;
    let columns = serde_json::to_string(columns)?;
    Ok(format!(
        r#"function {function}(line) {{
  var trimmed = line.trim();
  if (trimmed.length === 0) {{
    return null;
  }}
  var values = trimmed.split({delimiter});
  var columns = {columns};
  var row = {{}};
  for (var i = 0; i < columns.length; i++) {{
    row[columns[i]] = i < values.length ? values[i] : null;
  }}
  return JSON.stringify(row);
}}
"#
    ))
}

/// `JSONPath` schema file for the text-to-BigQuery template, all `STRING`
pub fn bigquery_schema(columns: &[String]) -> Result<String> {
    let fields: Vec<serde_json::Value> = columns
        .iter()
        .map(|name| serde_json::json!({ "name": name, "type": "STRING" }))
        .collect();
    Ok(serde_json::to_string_pretty(
        &serde_json::json!({ "BigQuery Schema": fields }),
    )?)
}

fn validate_gcs(location: &str) -> Result<()> {
    match Url::parse(location) {
        Ok(url) if url.scheme() == "gs" && url.host_str().is_some_and(|h| !h.is_empty()) => Ok(()),
        _ => Err(PipelineError::InvalidLocation(location.to_string()).into()),
    }
}

/// Separator for `--parameters`, announced with gcloud's `^~^` escape so
/// values may contain commas
const PARAM_SEP: char = '~';

/// Schema and UDF the text-to-BigQuery template needs to split each line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateParams {
    /// gs:// URI of the `JSONPath` schema file
    pub schema_path: String,
    /// gs:// URI of the JavaScript UDF
    pub udf_path: String,
    pub udf_function: String,
}

/// A Dataflow flex-template job ready for submission
#[derive(Debug, Clone, Serialize)]
pub struct PipelineJob {
    pub job_name: String,
    pub project: String,
    pub region: String,
    pub template_path: String,
    pub source_uri: String,
    pub output: String,
    pub temp_location: String,
    pub staging_location: String,
    pub template: TemplateParams,
    pub profile: WorkerProfile,
}

impl PipelineJob {
    pub fn new(
        target: &LoadTarget,
        region: &str,
        template_path: &str,
        source_uri: &str,
        bucket: &str,
        template: &TemplateParams,
        profile: WorkerProfile,
    ) -> Result<Self> {
        let bucket = bucket.trim_start_matches("gs://").trim_end_matches('/');
        let job = Self {
            job_name: format!(
                "bulkload-{}-{}",
                profile.as_str(),
                Utc::now().format("%Y%m%d-%H%M%S")
            ),
            project: target.project.clone(),
            region: region.to_string(),
            template_path: template_path.to_string(),
            source_uri: source_uri.to_string(),
            output: target.to_string(),
            temp_location: format!("gs://{bucket}/temp"),
            staging_location: format!("gs://{bucket}/staging"),
            template: template.clone(),
            profile,
        };

        for location in [
            &job.template_path,
            &job.source_uri,
            &job.temp_location,
            &job.staging_location,
            &job.template.schema_path,
            &job.template.udf_path,
        ] {
            validate_gcs(location)?;
        }
        for (key, value) in job.parameters() {
            if value.contains(PARAM_SEP) {
                return Err(PipelineError::InvalidParameter(format!(
                    "{key} must not contain '{PARAM_SEP}': {value}"
                ))
                .into());
            }
        }
        Ok(job)
    }

    /// Parameters declared by the text-to-BigQuery flex template
    pub fn parameters(&self) -> [(&'static str, &str); 6] {
        [
            ("inputFilePattern", self.source_uri.as_str()),
            ("JSONPath", self.template.schema_path.as_str()),
            ("outputTable", self.output.as_str()),
            ("javascriptTextTransformGcsPath", self.template.udf_path.as_str()),
            ("javascriptTextTransformFunctionName", self.template.udf_function.as_str()),
            ("bigQueryLoadingTemporaryDirectory", self.temp_location.as_str()),
        ]
    }

    /// Arguments for `gcloud dataflow flex-template run`
    pub fn submit_args(&self) -> Vec<String> {
        let sizing = self.profile.sizing();
        let mut pipeline_options = vec![format!("disk_size_gb={}", sizing.disk_size_gb)];
        if let Some(algorithm) = sizing.autoscaling_algorithm {
            pipeline_options.push(format!("autoscaling_algorithm={algorithm}"));
        }
        let parameters: Vec<String> = self
            .parameters()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        vec![
            "dataflow".to_string(),
            "flex-template".to_string(),
            "run".to_string(),
            self.job_name.clone(),
            format!("--template-file-gcs-location={}", self.template_path),
            format!("--project={}", self.project),
            format!("--region={}", self.region),
            format!("--worker-region={}", self.region),
            format!("--num-workers={}", sizing.num_workers),
            format!("--max-workers={}", sizing.max_num_workers),
            format!("--worker-machine-type={}", sizing.machine_type),
            format!("--temp-location={}", self.temp_location),
            format!("--staging-location={}", self.staging_location),
            format!("--additional-pipeline-options={}", pipeline_options.join(",")),
            format!(
                "--parameters=^{PARAM_SEP}^{}",
                parameters.join(&PARAM_SEP.to_string())
            ),
        ]
    }
}

/// Submits [`PipelineJob`]s through gcloud
pub struct PipelineLauncher<R> {
    runner: Arc<R>,
}

impl<R: CommandRunner> PipelineLauncher<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// Submit the job and return gcloud's response (job id and state)
    pub async fn submit(&self, job: &PipelineJob) -> Result<String> {
        let sizing = job.profile.sizing();
        info!(
            "Submitting {} with {}-{} workers, {} machines, {}GB disk",
            job.job_name,
            sizing.num_workers,
            sizing.max_num_workers,
            sizing.machine_type,
            sizing.disk_size_gb
        );

        let cmd = job.submit_args();
        debug!("{}", render_command("gcloud", &cmd));
        let output = self.runner.run("gcloud", &cmd).await?;
        if !output.success {
            return Err(PipelineError::SubmitFailed(output.stderr.trim().to_string()).into());
        }

        info!("Job submitted: {}", job.job_name);
        Ok(output.stdout)
    }
}
