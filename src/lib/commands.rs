use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::lib::advisor::RegionQuotaAdvisor;
use crate::lib::bigquery::{DirectLoadOptions, LoadTarget};
use crate::lib::cli::{Cli, Command, OutputFormat};
use crate::lib::config::LoaderConfig;
use crate::lib::gcloud::{CommandRunner, Gcloud, ProcessRunner, render_command};
use crate::lib::loader::DirectLoader;
use crate::lib::monitor::Monitor;
use crate::lib::output::{QuotaReport, render_assessment, render_preflight, to_json};
use crate::lib::pipeline::{
    PipelineJob, PipelineLauncher, WorkerProfile, bigquery_schema, column_names, preview,
    transform_udf,
};
use crate::lib::preflight::run_preflight;
use crate::lib::tui::display_assessments_table;
use crate::{GcpRegion, LoaderError, Result};

/// Run the parsed command line. `Ok(false)` means the command ran but
/// reported a failed check.
pub async fn execute(cli: Cli) -> Result<bool> {
    let mut config = LoaderConfig::load(cli.config.as_deref())?;
    config.apply(cli.overrides())?;
    let runner = Arc::new(ProcessRunner::new(Duration::from_secs(
        config.command_timeout_secs,
    )));

    match cli.command {
        Command::Quotas { candidates, output } => {
            let report = quota_report(runner, &config, candidates).await?;
            print_quota_report(&report, output)?;
            Ok(true)
        }
        Command::Load { yes, append, .. } => {
            if !yes && !confirm("Start the direct BigQuery load? This can take hours. [y/N]: ")? {
                info!("Load cancelled by user");
                return Ok(true);
            }
            direct_load(runner, &config, append).await?;
            Ok(true)
        }
        Command::Pipeline {
            profile, dry_run, ..
        } => {
            submit_pipeline(runner, &config, profile, dry_run).await?;
            Ok(true)
        }
        Command::Monitor {
            job,
            interval,
            once,
            ..
        } => {
            let project = Gcloud::new(Arc::clone(&runner))
                .resolve_project(config.project.as_deref())
                .await?;
            let target = LoadTarget::new(project, &config.dataset, &config.table);
            let interval = Duration::from_secs(interval.unwrap_or(config.monitor_interval_secs));
            Monitor::new(runner, target, Some(config.region.to_string()), job)
                .run(interval, once)
                .await?;
            Ok(true)
        }
        Command::Preflight { output } => {
            let report = run_preflight(runner).await;
            match output {
                OutputFormat::Json => println!("{}", to_json(&report)?),
                OutputFormat::Table => println!("{}", render_preflight(&report)),
            }
            Ok(report.all_ok())
        }
        Command::Preview {
            file,
            lines,
            skip,
            delimiter,
            write_udf,
            write_schema,
        } => {
            let reader = BufReader::new(File::open(&file)?);
            let delimiter = delimiter.unwrap_or(config.delimiter);
            let skip = skip.unwrap_or(config.skip_leading_rows as usize);
            if write_udf.is_some() || write_schema.is_some() {
                let columns = sample_columns(&file, delimiter, skip > 0)?;
                if let Some(path) = &write_udf {
                    fs::write(path, transform_udf(&config.udf_function, delimiter, &columns)?)?;
                    info!("Wrote UDF to {}", path.display());
                }
                if let Some(path) = &write_schema {
                    fs::write(path, bigquery_schema(&columns)?)?;
                    info!("Wrote schema to {}", path.display());
                }
            }
            let preview = preview(reader, delimiter, skip, lines)?;
            for (i, row) in preview.rows.iter().enumerate() {
                println!("[{:>3}] {} fields: {}", i + 1, row.len(), row.join(" | "));
            }
            println!(
                "processed {} lines, skipped {} blank lines",
                preview.stats.processed, preview.stats.skipped
            );
            Ok(true)
        }
    }
}

/// Fetch quotas for the candidate regions and rank them
pub async fn quota_report<R: CommandRunner>(
    runner: Arc<R>,
    config: &LoaderConfig,
    candidates: Vec<GcpRegion>,
) -> Result<QuotaReport> {
    let gcloud = Gcloud::new(runner);
    let project = gcloud.resolve_project(config.project.as_deref()).await?;

    let regions = if candidates.is_empty() {
        config.candidate_regions.clone()
    } else {
        candidates
    };
    if regions.is_empty() {
        return Err(LoaderError::InvalidInput(
            "no candidate regions to check".into(),
        ));
    }

    info!("Project: {project}");
    let snapshots = gcloud.fetch_all_quotas(&project, &regions).await;
    let outcome = RegionQuotaAdvisor::default().rank(snapshots);

    Ok(QuotaReport::new(
        project,
        regions.iter().map(|r| r.to_string()).collect(),
        outcome,
    ))
}

/// Column names from the first non-blank line of a local sample
fn sample_columns(file: &Path, delimiter: char, has_header: bool) -> Result<Vec<String>> {
    for line in BufReader::new(File::open(file)?).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            return Ok(column_names(&line, delimiter, has_header));
        }
    }
    Err(LoaderError::InvalidInput(format!(
        "{} has no data lines",
        file.display()
    )))
}

fn print_quota_report(report: &QuotaReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Table => {
            if io::stdout().is_terminal() && !report.assessments.is_empty() {
                display_assessments_table(report)?;
            } else {
                for assessment in &report.assessments {
                    println!("{}\n", render_assessment(assessment));
                }
                for skipped in &report.skipped {
                    println!("Region: {} skipped ({})\n", skipped.region, skipped.reason);
                }
            }
            println!("{}", report.summary());
        }
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn direct_load<R: CommandRunner>(
    runner: Arc<R>,
    config: &LoaderConfig,
    append: bool,
) -> Result<()> {
    let project = Gcloud::new(Arc::clone(&runner))
        .resolve_project(config.project.as_deref())
        .await?;
    let source_uri = config.require_source_uri()?;
    let target = LoadTarget::new(project, &config.dataset, &config.table);
    let options = DirectLoadOptions {
        field_delimiter: config.delimiter,
        max_bad_records: config.max_bad_records,
        skip_leading_rows: config.skip_leading_rows,
        replace: !append,
    };

    match DirectLoader::new(runner).run(&target, source_uri, &options).await {
        Ok(report) => {
            info!("Data available in {}", report.target);
            Ok(())
        }
        Err(e) => {
            error!("The load failed: {e}");
            error!("Check permissions on the project and the source object,");
            error!("or try the Dataflow pipeline: bulkloader pipeline --profile constrained");
            Err(e)
        }
    }
}

async fn submit_pipeline<R: CommandRunner>(
    runner: Arc<R>,
    config: &LoaderConfig,
    profile: WorkerProfile,
    dry_run: bool,
) -> Result<()> {
    let project = Gcloud::new(Arc::clone(&runner))
        .resolve_project(config.project.as_deref())
        .await?;
    let target = LoadTarget::new(project, &config.dataset, &config.table);
    let job = PipelineJob::new(
        &target,
        config.region.as_str(),
        &config.template_path,
        config.require_source_uri()?,
        config.require_bucket()?,
        &config.template_params()?,
        profile,
    )?;

    if dry_run {
        println!("{}", render_command("gcloud", &job.submit_args()));
        return Ok(());
    }

    let response = PipelineLauncher::new(runner).submit(&job).await?;
    println!("{}", response.trim());
    info!("Follow progress with: bulkloader monitor");
    Ok(())
}
