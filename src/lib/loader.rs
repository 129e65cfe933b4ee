use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use serde::Serialize;

use crate::lib::bigquery::{BigQuery, DirectLoadOptions, LoadTarget, TableStats};
use crate::lib::gcloud::CommandRunner;
use crate::Result;

/// Outcome of a direct `bq load`
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub target: String,
    pub source_uri: String,
    pub duration_secs: f64,
    pub stats: Option<TableStats>,
}

/// Warehouse-native bulk load, used when Dataflow quotas are too tight
pub struct DirectLoader<R> {
    bigquery: BigQuery<R>,
}

impl<R: CommandRunner> DirectLoader<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            bigquery: BigQuery::new(runner),
        }
    }

    pub async fn run(
        &self,
        target: &LoadTarget,
        source_uri: &str,
        options: &DirectLoadOptions,
    ) -> Result<LoadReport> {
        self.bigquery.check_available().await?;

        let started = Instant::now();
        self.bigquery.ensure_dataset(target).await?;

        info!("Source: {source_uri}");
        info!("Table: {target}");
        self.bigquery.load(target, source_uri, options).await?;

        let duration_secs = started.elapsed().as_secs_f64();
        info!(
            "Load completed in {:.2} seconds ({:.2} minutes)",
            duration_secs,
            duration_secs / 60.0
        );

        let stats = match self.bigquery.table_stats(target).await {
            Ok(stats) => {
                info!("Rows loaded: {}", stats.num_rows);
                info!("Size: {:.2} GB", stats.size_gib());
                Some(stats)
            }
            Err(e) => {
                warn!("Could not read table statistics: {e}");
                None
            }
        };

        Ok(LoadReport {
            target: target.to_string(),
            source_uri: source_uri.to_string(),
            duration_secs,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::gcloud::testing::{FakeRunner, Reply};

    fn target() -> LoadTarget {
        LoadTarget::new("p", "cdo_challenge", "raw_data")
    }

    #[tokio::test]
    async fn runs_mk_load_show_in_order() {
        let runner = Arc::new(
            FakeRunner::default()
                .on("bq version", Reply::Ok("This is BigQuery CLI 2.1.4".into()))
                .on("bq mk", Reply::Ok(String::new()))
                .on("bq load", Reply::Ok(String::new()))
                .on("bq show", Reply::Ok(r#"{"numRows":"42","numBytes":"1024"}"#.into())),
        );
        let loader = DirectLoader::new(Arc::clone(&runner));

        let report = loader
            .run(&target(), "gs://b/data.csv.gz", &DirectLoadOptions::default())
            .await
            .unwrap();

        assert_eq!(report.target, "p:cdo_challenge.raw_data");
        assert_eq!(report.stats.map(|s| s.num_rows), Some(42));

        let calls = runner.calls();
        let verbs: Vec<&str> = calls
            .iter()
            .map(|c| c.split_whitespace().nth(1).unwrap_or_default())
            .collect();
        assert_eq!(verbs, vec!["version", "mk", "load", "show"]);
    }

    #[tokio::test]
    async fn missing_stats_do_not_fail_the_load() {
        let runner = FakeRunner::default()
            .on("bq version", Reply::Ok(String::new()))
            .on("bq mk", Reply::Ok(String::new()))
            .on("bq load", Reply::Ok(String::new()))
            .on("bq show", Reply::Fail("Not found".into()));
        let report = DirectLoader::new(Arc::new(runner))
            .run(&target(), "gs://b/o", &DirectLoadOptions::default())
            .await
            .unwrap();
        assert!(report.stats.is_none());
    }

    #[tokio::test]
    async fn stops_before_loading_without_bq() {
        let runner = Arc::new(FakeRunner::default().on("bq version", Reply::Fail(String::new())));
        let result = DirectLoader::new(Arc::clone(&runner))
            .run(&target(), "gs://b/o", &DirectLoadOptions::default())
            .await;
        assert!(result.is_err());
        assert_eq!(runner.calls().len(), 1);
    }
}
