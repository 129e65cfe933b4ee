use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::task::JoinSet;

use crate::lib::gcp_region::GcpRegion;
use crate::lib::quota::{FetchError, RegionSnapshot};
use crate::{ConfigError, GcloudError, LoaderError, Result};

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external CLI tools (`gcloud`, `bq`, `gsutil`)
pub trait CommandRunner: Send + Sync + 'static {
    /// Run a short command, bounded by the runner's timeout
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Run a command that may legitimately take hours, such as a load job
    fn run_to_completion(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<CommandOutput>> + Send {
        self.run(program, args)
    }
}

/// [`CommandRunner`] backed by real child processes
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn spawn(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let command_line = render_command(program, args);
        debug!("Running: {command_line}");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    LoaderError::from(GcloudError::NotInstalled(program.to_string()))
                }
                _ => LoaderError::Io(e),
            })?;

        let output = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => {
                    return Err(GcloudError::Timeout {
                        command: command_line,
                        secs: limit.as_secs(),
                    }
                    .into());
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.spawn(program, args, Some(self.timeout)).await
    }

    async fn run_to_completion(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.spawn(program, args, None).await
    }
}

pub fn render_command(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

pub(crate) fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Run a command and return its stdout, failing on a non-zero exit
pub(crate) async fn run_checked<R: CommandRunner>(
    runner: &R,
    program: &str,
    args: &[String],
) -> Result<String> {
    let output = runner.run(program, args).await?;
    if !output.success {
        return Err(GcloudError::CommandFailed {
            command: render_command(program, args),
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }
    Ok(output.stdout)
}

/// Active gcloud configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInfo {
    pub project_id: String,
    pub account: Option<String>,
    pub region: Option<String>,
}

/// Subset of a Dataflow job resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataflowJob {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "currentState")]
    pub state: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
}

impl DataflowJob {
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

/// Typed access to the gcloud CLI
pub struct Gcloud<R> {
    runner: Arc<R>,
}

impl<R: CommandRunner> Gcloud<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// `gcloud config get-value <key>`; unset values come back as `None`
    pub async fn config_value(&self, key: &str) -> Result<Option<String>> {
        let stdout = run_checked(
            self.runner.as_ref(),
            "gcloud",
            &args(&["config", "get-value", key]),
        )
        .await?;
        let value = stdout.trim();
        if value.is_empty() || value == "(unset)" {
            Ok(None)
        } else {
            Ok(Some(value.to_string()))
        }
    }

    pub async fn project_info(&self) -> Result<ProjectInfo> {
        let project_id = self.default_project().await?;
        let account = self.config_value("account").await?;
        let region = self.config_value("compute/region").await?;

        Ok(ProjectInfo {
            project_id,
            account,
            region,
        })
    }

    async fn default_project(&self) -> Result<String> {
        self.config_value("project").await?.ok_or_else(|| {
            ConfigError::MissingRequired(
                "gcloud project (run: gcloud config set project <PROJECT_ID>)".into(),
            )
            .into()
        })
    }

    /// Resolve the project from config, falling back to the gcloud default.
    /// Only the project key is read.
    pub async fn resolve_project(&self, configured: Option<&str>) -> Result<String> {
        match configured {
            Some(project) => Ok(project.to_string()),
            None => self.default_project().await,
        }
    }

    pub async fn fetch_region_quotas(
        &self,
        project: &str,
        region: &str,
    ) -> std::result::Result<RegionSnapshot, FetchError> {
        fetch_quotas(self.runner.as_ref(), project, region).await
    }

    /// Fetch quotas of every region concurrently.
    ///
    /// Results come back in the order of `regions`, whatever the completion
    /// order of the individual commands.
    pub async fn fetch_all_quotas(
        &self,
        project: &str,
        regions: &[GcpRegion],
    ) -> Vec<(String, std::result::Result<RegionSnapshot, FetchError>)> {
        let mut results: Vec<(String, std::result::Result<RegionSnapshot, FetchError>)> = regions
            .iter()
            .map(|r| {
                (
                    r.to_string(),
                    Err(FetchError::Command("fetch task aborted".into())),
                )
            })
            .collect();

        let mut set = JoinSet::new();
        for (idx, region) in regions.iter().enumerate() {
            let runner = Arc::clone(&self.runner);
            let project = project.to_string();
            let region = region.as_str();
            set.spawn(async move {
                info!("Checking quotas in region: {region}");
                (idx, fetch_quotas(runner.as_ref(), &project, region).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, fetched)) => results[idx].1 = fetched,
                Err(e) => warn!("Quota fetch task failed: {e}"),
            }
        }

        results
    }

    pub async fn list_dataflow_jobs(
        &self,
        project: &str,
        region: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DataflowJob>> {
        let mut cmd = args(&["dataflow", "jobs", "list", "--format=json"]);
        cmd.push(format!("--project={project}"));
        cmd.push(format!("--limit={limit}"));
        if let Some(region) = region {
            cmd.push(format!("--region={region}"));
        }

        let stdout = run_checked(self.runner.as_ref(), "gcloud", &cmd).await?;
        serde_json::from_str(&stdout)
            .map_err(|e| GcloudError::InvalidResponse(format!("dataflow jobs list: {e}")).into())
    }

    pub async fn describe_dataflow_job(
        &self,
        project: &str,
        region: Option<&str>,
        job_id: &str,
    ) -> Result<DataflowJob> {
        let mut cmd = args(&["dataflow", "jobs", "describe", job_id, "--format=json"]);
        cmd.push(format!("--project={project}"));
        if let Some(region) = region {
            cmd.push(format!("--region={region}"));
        }

        let stdout = run_checked(self.runner.as_ref(), "gcloud", &cmd).await?;
        serde_json::from_str(&stdout).map_err(|e| {
            GcloudError::InvalidResponse(format!("dataflow jobs describe: {e}")).into()
        })
    }

    /// First line of a tool's version output, or `None` when unavailable
    pub async fn tool_version(&self, program: &str, version_args: &[&str]) -> Option<String> {
        match run_checked(self.runner.as_ref(), program, &args(version_args)).await {
            Ok(stdout) => Some(stdout.lines().next().unwrap_or_default().trim().to_string()),
            Err(e) => {
                debug!("{program} not available: {e}");
                None
            }
        }
    }
}

async fn fetch_quotas<R: CommandRunner>(
    runner: &R,
    project: &str,
    region: &str,
) -> std::result::Result<RegionSnapshot, FetchError> {
    let cmd = vec![
        "compute".to_string(),
        "regions".to_string(),
        "describe".to_string(),
        region.to_string(),
        format!("--project={project}"),
        "--format=json".to_string(),
    ];

    let output = match runner.run("gcloud", &cmd).await {
        Ok(output) => output,
        Err(LoaderError::Gcloud(GcloudError::Timeout { secs, .. })) => {
            return Err(FetchError::Timeout(secs));
        }
        Err(e) => return Err(FetchError::Command(e.to_string())),
    };

    if !output.success {
        return Err(FetchError::Command(output.stderr.trim().to_string()));
    }

    RegionSnapshot::from_describe_json(region, &output.stdout)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Scripted runner: the first matcher contained in the command line wins.
    ///
    /// Each rule replies with its queue of outputs; the last one repeats.
    #[derive(Default)]
    pub struct FakeRunner {
        rules: Mutex<Vec<(String, VecDeque<Reply>)>>,
        pub calls: Mutex<Vec<String>>,
    }

    #[derive(Clone)]
    pub enum Reply {
        Ok(String),
        Fail(String),
        Timeout,
        Delayed(u64, String),
    }

    impl FakeRunner {
        pub fn on(self, needle: &str, reply: Reply) -> Self {
            {
                let mut rules = self.rules.lock().unwrap();
                match rules.iter_mut().find(|(n, _)| n == needle) {
                    Some((_, replies)) => replies.push_back(reply),
                    None => rules.push((needle.to_string(), VecDeque::from(vec![reply]))),
                }
            }
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn reply_for(&self, line: &str) -> Reply {
            let mut rules = self.rules.lock().unwrap();
            for (needle, replies) in rules.iter_mut() {
                if line.contains(needle.as_str()) {
                    if replies.len() > 1 {
                        return replies.pop_front().unwrap();
                    }
                    return replies.front().cloned().unwrap();
                }
            }
            Reply::Fail(format!("unexpected command: {line}"))
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            let line = render_command(program, args);
            self.calls.lock().unwrap().push(line.clone());
            let reply = self.reply_for(&line);
            match reply {
                Reply::Ok(stdout) => Ok(CommandOutput {
                    success: true,
                    stdout,
                    stderr: String::new(),
                }),
                Reply::Fail(stderr) => Ok(CommandOutput {
                    success: false,
                    stdout: String::new(),
                    stderr,
                }),
                Reply::Timeout => Err(GcloudError::Timeout {
                    command: line,
                    secs: 30,
                }
                .into()),
                Reply::Delayed(ms, stdout) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(CommandOutput {
                        success: true,
                        stdout,
                        stderr: String::new(),
                    })
                }
            }
        }
    }
}
