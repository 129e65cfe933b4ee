use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::lib::gcloud::{CommandRunner, Gcloud};

/// Tools invoked by the loaders, with the arguments that print their version
const TOOLS: [(&str, &[&str]); 3] = [
    ("gcloud", &["--version"]),
    ("bq", &["version"]),
    ("gsutil", &["version"]),
];

/// gcloud configuration keys the loaders rely on
const CONFIG_KEYS: [&str; 3] = ["project", "account", "compute/region"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreflightReport {
    pub tools: Vec<Check>,
    pub config: Vec<Check>,
}

impl PreflightReport {
    pub fn all_ok(&self) -> bool {
        self.tools.iter().chain(self.config.iter()).all(|c| c.ok)
    }

    /// Remediation hints for the failed checks
    pub fn hints(&self) -> Vec<&'static str> {
        let mut hints = Vec::new();
        if self.tools.iter().any(|c| !c.ok) {
            hints.push("Install the Google Cloud SDK: https://cloud.google.com/sdk/docs/install");
        }
        if self.config.iter().any(|c| !c.ok) {
            hints.push("Set your project: gcloud config set project <PROJECT_ID>");
            hints.push("Authenticate: gcloud auth login");
        }
        hints
    }
}

/// Verify the local environment before starting a load
pub async fn run_preflight<R: CommandRunner>(runner: Arc<R>) -> PreflightReport {
    let gcloud = Gcloud::new(runner);

    let mut tools = Vec::new();
    for (tool, version_args) in TOOLS {
        let check = match gcloud.tool_version(tool, version_args).await {
            Some(version) => Check {
                name: tool.to_string(),
                ok: true,
                detail: if version.is_empty() {
                    "available".to_string()
                } else {
                    version
                },
            },
            None => Check {
                name: tool.to_string(),
                ok: false,
                detail: "not available".to_string(),
            },
        };
        debug!("{}: {}", check.name, check.detail);
        tools.push(check);
    }

    let mut config = Vec::new();
    for key in CONFIG_KEYS {
        let check = match gcloud.config_value(key).await {
            Ok(Some(value)) => Check {
                name: key.to_string(),
                ok: true,
                detail: value,
            },
            Ok(None) => Check {
                name: key.to_string(),
                ok: false,
                detail: "not configured".to_string(),
            },
            Err(e) => {
                warn!("Could not read gcloud config {key}: {e}");
                Check {
                    name: key.to_string(),
                    ok: false,
                    detail: "unavailable".to_string(),
                }
            }
        };
        config.push(check);
    }

    PreflightReport { tools, config }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::gcloud::testing::{FakeRunner, Reply};

    fn healthy() -> FakeRunner {
        FakeRunner::default()
            .on("gcloud --version", Reply::Ok("Google Cloud SDK 480.0.0\n".into()))
            .on("bq version", Reply::Ok("This is BigQuery CLI 2.1.4\n".into()))
            .on("gsutil version", Reply::Ok("gsutil version: 5.27\n".into()))
            .on("get-value project", Reply::Ok("my-project\n".into()))
            .on("get-value account", Reply::Ok("ops@example.com\n".into()))
            .on("get-value compute/region", Reply::Ok("us-central1\n".into()))
    }

    #[tokio::test]
    async fn healthy_environment_passes() {
        let report = run_preflight(Arc::new(healthy())).await;
        assert!(report.all_ok());
        assert!(report.hints().is_empty());
        assert_eq!(report.tools[0].detail, "Google Cloud SDK 480.0.0");
    }

    #[tokio::test]
    async fn unset_region_fails_config_checks() {
        let runner = FakeRunner::default()
            .on("--version", Reply::Ok("Google Cloud SDK\n".into()))
            .on("version", Reply::Ok("ok\n".into()))
            .on("get-value compute/region", Reply::Ok("\n".into()))
            .on("get-value", Reply::Ok("value\n".into()));
        let report = run_preflight(Arc::new(runner)).await;
        assert!(!report.all_ok());
        let region = report.config.iter().find(|c| c.name == "compute/region").unwrap();
        assert!(!region.ok);
        assert_eq!(report.hints().len(), 2);
    }

    #[tokio::test]
    async fn missing_tools_suggest_sdk_install() {
        let runner = FakeRunner::default()
            .on("gcloud --version", Reply::Ok("Google Cloud SDK\n".into()))
            .on("bq version", Reply::Fail("not found".into()))
            .on("gsutil version", Reply::Fail("not found".into()))
            .on("get-value", Reply::Ok("value\n".into()));
        let report = run_preflight(Arc::new(runner)).await;
        assert!(!report.all_ok());
        assert_eq!(report.tools.iter().filter(|c| !c.ok).count(), 2);
        assert_eq!(report.hints(), vec![
            "Install the Google Cloud SDK: https://cloud.google.com/sdk/docs/install"
        ]);
    }
}
