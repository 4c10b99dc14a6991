use std::collections::BTreeMap;
use std::path::Path;

use crate::executor::{GcloudExecutor, RealExecutor};
use crate::gcloud::GcloudError;

/// Container port the generated images listen on.
pub const CONTAINER_PORT: u16 = 8080;

/// APIs a Cloud Run deployment from source needs.
pub const REQUIRED_APIS: &[&str] = &[
    "artifactregistry.googleapis.com",
    "cloudbuild.googleapis.com",
    "run.googleapis.com",
];

/// Google Cloud operations, parameterized over the executor for testability.
pub struct GcloudClient<E: GcloudExecutor = RealExecutor> {
    executor: E,
}

impl GcloudClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for GcloudClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: GcloudExecutor> GcloudClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Preflight ──

    /// CLI installed, credentials present, project reachable. Disabled APIs
    /// are reported, not fatal, so the caller can name all of them at once.
    pub async fn check_prerequisites(
        &self,
        project: &str,
    ) -> Result<PreflightReport, PreflightError> {
        let mut report = PreflightReport::default();

        let version = self
            .executor
            .exec(&args(["version", "--format", "value(version)"]))
            .await
            .map_err(|_| PreflightError::GcloudNotInstalled)?;
        report.gcloud_version = Some(version.trim().to_owned());

        self.executor
            .exec(&args(["auth", "print-access-token", "--quiet"]))
            .await
            .map_err(|_| PreflightError::NotAuthenticated)?;
        report.authenticated = true;

        let name = self
            .executor
            .exec(&args([
                "projects",
                "describe",
                project,
                "--format",
                "value(name)",
            ]))
            .await
            .map_err(|_| PreflightError::ProjectNotAccessible(project.to_owned()))?;
        report.project_name = Some(name.trim().to_owned());

        for api in REQUIRED_APIS {
            let enabled = self
                .executor
                .exec(&args([
                    "services",
                    "list",
                    "--enabled",
                    "--project",
                    project,
                    "--filter",
                    &format!("config.name={api}"),
                    "--format",
                    "value(config.name)",
                ]))
                .await
                .map(|out| !out.trim().is_empty())
                .unwrap_or(false);
            if !enabled {
                report.disabled_apis.push((*api).to_owned());
            }
        }

        tracing::debug!(?report, "preflight finished");
        Ok(report)
    }

    // ── Artifact Registry ──

    /// Create the Docker repository unless it already exists. Returns
    /// whether it was created.
    pub async fn ensure_artifact_repo(
        &self,
        project: &str,
        region: &str,
        repository: &str,
    ) -> Result<bool, DeployError> {
        let exists = self
            .executor
            .exec(&args([
                "artifacts",
                "repositories",
                "describe",
                repository,
                "--project",
                project,
                "--location",
                region,
            ]))
            .await
            .is_ok();
        if exists {
            return Ok(false);
        }

        self.executor
            .exec(&args([
                "artifacts",
                "repositories",
                "create",
                repository,
                "--project",
                project,
                "--location",
                region,
                "--repository-format",
                "docker",
                "--quiet",
            ]))
            .await
            .map_err(|e| DeployError::ArtifactRepository { source: e })?;
        tracing::info!(repository, region, "created Artifact Registry repository");
        Ok(true)
    }

    // ── Cloud Build ──

    pub async fn submit_build(
        &self,
        bundle_dir: &Path,
        project: &str,
        region: &str,
        image: &str,
    ) -> Result<(), CloudBuildError> {
        let bundle = bundle_dir
            .to_str()
            .ok_or_else(|| CloudBuildError::InvalidPath(bundle_dir.to_path_buf()))?;

        self.executor
            .exec_streaming(&args([
                "builds",
                "submit",
                bundle,
                "--project",
                project,
                "--region",
                region,
                "--tag",
                image,
                "--quiet",
            ]))
            .await
            .map_err(|e| CloudBuildError::Submit { source: e })
    }

    // ── Cloud Run ──

    /// Deploy `image` as `service` and return the service URL.
    pub async fn deploy_service(
        &self,
        service: &str,
        image: &str,
        project: &str,
        region: &str,
        environment: Option<&BTreeMap<String, String>>,
    ) -> Result<String, DeployError> {
        let port = CONTAINER_PORT.to_string();
        let mut cmd = args([
            "run",
            "deploy",
            service,
            "--image",
            image,
            "--project",
            project,
            "--region",
            region,
            "--platform",
            "managed",
            "--port",
            &port,
            "--allow-unauthenticated",
            "--quiet",
            "--format",
            "value(status.url)",
        ]);
        if let Some(flag) = environment.and_then(env_vars_flag) {
            cmd.push("--set-env-vars".to_owned());
            cmd.push(flag);
        }

        let url = self
            .executor
            .exec(&cmd)
            .await
            .map_err(|e| DeployError::Deploy { source: e })?;
        let url = url.trim();
        if url.is_empty() {
            return Err(DeployError::MissingUrl(service.to_owned()));
        }
        Ok(url.to_owned())
    }
}

/// `--set-env-vars` value. Switches gcloud's list delimiter (`^D^` prefix)
/// when a value contains a comma.
pub fn env_vars_flag(vars: &BTreeMap<String, String>) -> Option<String> {
    if vars.is_empty() {
        return None;
    }
    let pairs: Vec<String> = vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
    if !pairs.iter().any(|p| p.contains(',')) {
        return Some(pairs.join(","));
    }
    let delimiter = ["@", "|", "#", ";", "~"]
        .into_iter()
        .find(|d| !pairs.iter().any(|p| p.contains(d)))
        .unwrap_or("\u{1f}");
    Some(format!("^{delimiter}^{}", pairs.join(delimiter)))
}

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

// ── Report and error types ──

#[derive(Debug, Default)]
pub struct PreflightReport {
    pub gcloud_version: Option<String>,
    pub authenticated: bool,
    pub project_name: Option<String>,
    pub disabled_apis: Vec<String>,
}

impl PreflightReport {
    pub fn has_warnings(&self) -> bool {
        !self.disabled_apis.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("gcloud CLI not installed; see https://cloud.google.com/sdk/docs/install")]
    GcloudNotInstalled,

    #[error("gcloud is not authenticated; run: gcloud auth login")]
    NotAuthenticated,

    #[error("Google Cloud project '{0}' is not accessible; check providers.google.project and your permissions")]
    ProjectNotAccessible(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CloudBuildError {
    #[error("bundle path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("Cloud Build submission failed")]
    Submit { source: GcloudError },
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to create Artifact Registry repository")]
    ArtifactRepository { source: GcloudError },

    #[error("Cloud Run deployment failed")]
    Deploy { source: GcloudError },

    #[error("Cloud Run did not report a URL for service '{0}'")]
    MissingUrl(String),
}
