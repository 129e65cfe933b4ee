use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::lib::gcp_region::GcpRegion;
use crate::lib::pipeline::TemplateParams;
use crate::{ConfigError, Result};

/// Settings shared by every subcommand.
///
/// Loaded from an optional YAML file, then overridden by command-line flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// GCP project. Falls back to `gcloud config get-value project` when unset.
    pub project: Option<String>,
    pub region: GcpRegion,
    pub dataset: String,
    pub table: String,
    /// gs:// URI of the compressed CSV object
    pub source_uri: Option<String>,
    /// Bucket used for Dataflow temp and staging files
    pub bucket: Option<String>,
    pub delimiter: char,
    pub max_bad_records: u32,
    pub skip_leading_rows: u32,
    pub candidate_regions: Vec<GcpRegion>,
    pub template_path: String,
    /// gs:// URI of the template's `JSONPath` schema file
    pub schema_path: Option<String>,
    /// gs:// URI of the JavaScript UDF that splits each line
    pub udf_path: Option<String>,
    pub udf_function: String,
    pub monitor_interval_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            project: None,
            region: GcpRegion::UsCentral1,
            dataset: "cdo_challenge".to_string(),
            table: "raw_data".to_string(),
            source_uri: None,
            bucket: None,
            delimiter: ',',
            max_bad_records: 10_000,
            skip_leading_rows: 1,
            candidate_regions: GcpRegion::default_candidates(),
            template_path:
                "gs://dataflow-templates-us-central1/latest/flex/Cloud_Storage_Text_to_BigQuery_Flex"
                    .to_string(),
            schema_path: None,
            udf_path: None,
            udf_function: "transform".to_string(),
            monitor_interval_secs: 30,
            command_timeout_secs: 30,
        }
    }
}

/// Values given on the command line; `None` keeps the file/default value
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub project: Option<String>,
    pub region: Option<GcpRegion>,
    pub dataset: Option<String>,
    pub table: Option<String>,
    pub source_uri: Option<String>,
    pub bucket: Option<String>,
    pub schema_path: Option<String>,
    pub udf_path: Option<String>,
    pub command_timeout_secs: Option<u64>,
}

impl LoaderConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform config file
    /// (`config.yaml` in the project config dir) is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::FileError(format!(
                        "Config file not found: {}",
                        p.display()
                    ))
                    .into());
                }
                p.to_path_buf()
            }
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| {
            ConfigError::FileError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: LoaderConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "bulkloader", "bulkloader")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(project) = overrides.project {
            self.project = Some(project);
        }
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(dataset) = overrides.dataset {
            self.dataset = dataset;
        }
        if let Some(table) = overrides.table {
            self.table = table;
        }
        if let Some(source_uri) = overrides.source_uri {
            self.source_uri = Some(source_uri);
        }
        if let Some(bucket) = overrides.bucket {
            self.bucket = Some(bucket);
        }
        if let Some(schema_path) = overrides.schema_path {
            self.schema_path = Some(schema_path);
        }
        if let Some(udf_path) = overrides.udf_path {
            self.udf_path = Some(udf_path);
        }
        if let Some(secs) = overrides.command_timeout_secs {
            self.command_timeout_secs = secs;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(ConfigError::InvalidValue("dataset must not be empty".into()).into());
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::InvalidValue("table must not be empty".into()).into());
        }
        if self.command_timeout_secs == 0 {
            return Err(
                ConfigError::InvalidValue("command_timeout_secs must be positive".into()).into(),
            );
        }
        if !is_js_identifier(&self.udf_function) {
            return Err(ConfigError::InvalidValue(format!(
                "udf_function is not a JavaScript identifier: {}",
                self.udf_function
            ))
            .into());
        }
        if self.monitor_interval_secs == 0 {
            return Err(
                ConfigError::InvalidValue("monitor_interval_secs must be positive".into()).into(),
            );
        }
        Ok(())
    }

    pub fn require_source_uri(&self) -> Result<&str> {
        self.source_uri.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired(
                "source_uri (set it in the config file or pass --source)".into(),
            )
            .into()
        })
    }

    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired(
                "bucket (set it in the config file or pass --bucket)".into(),
            )
            .into()
        })
    }

    /// Schema and UDF for the Dataflow template; both paths are required
    pub fn template_params(&self) -> Result<TemplateParams> {
        let schema_path = self.schema_path.clone().ok_or_else(|| {
            ConfigError::MissingRequired(
                "schema_path (set it in the config file or pass --schema)".into(),
            )
        })?;
        let udf_path = self.udf_path.clone().ok_or_else(|| {
            ConfigError::MissingRequired(
                "udf_path (set it in the config file or pass --udf)".into(),
            )
        })?;
        Ok(TemplateParams {
            schema_path,
            udf_path,
            udf_function: self.udf_function.clone(),
        })
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = LoaderConfig::from_yaml(
            "project: my-project\nregion: europe-west4\nsource_uri: gs://data/input.csv.gz\n",
        )
        .unwrap();
        assert_eq!(config.project.as_deref(), Some("my-project"));
        assert_eq!(config.region, GcpRegion::EuropeWest4);
        assert_eq!(config.dataset, "cdo_challenge");
        assert_eq!(config.max_bad_records, 10_000);
        assert_eq!(config.candidate_regions.len(), 7);
    }

    #[test]
    fn unknown_region_is_rejected() {
        assert!(LoaderConfig::from_yaml("region: mars-north1\n").is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = LoaderConfig::from_yaml("dataset: staging\ntable: events\n").unwrap();
        config
            .apply(ConfigOverrides {
                table: Some("events_v2".into()),
                region: Some(GcpRegion::UsEast1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.dataset, "staging");
        assert_eq!(config.table, "events_v2");
        assert_eq!(config.region, GcpRegion::UsEast1);
    }

    #[test]
    fn empty_table_override_is_invalid() {
        let mut config = LoaderConfig::default();
        let err = config
            .apply(ConfigOverrides {
                table: Some("  ".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("table"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoaderConfig::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bucket: loader-scratch\nmonitor_interval_secs: 10").unwrap();
        let config = LoaderConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.require_bucket().unwrap(), "loader-scratch");
        assert_eq!(config.monitor_interval_secs, 10);
        assert!(config.require_source_uri().is_err());
    }

    #[test]
    fn template_params_need_schema_and_udf() {
        let mut config = LoaderConfig::from_yaml("schema_path: gs://b/schema.json\n").unwrap();
        let err = config.template_params().unwrap_err();
        assert!(err.to_string().contains("udf_path"));

        config
            .apply(ConfigOverrides {
                udf_path: Some("gs://b/transform.js".into()),
                ..Default::default()
            })
            .unwrap();
        let params = config.template_params().unwrap();
        assert_eq!(params.udf_path, "gs://b/transform.js");
        assert_eq!(params.udf_function, "transform");
    }

    #[test]
    fn udf_function_must_be_an_identifier() {
        assert!(LoaderConfig::from_yaml("udf_function: split_line\n").is_ok());
        assert!(LoaderConfig::from_yaml("udf_function: 1st-pass\n").is_err());
    }
}
