use std::path::Path;

use emsipi_core::provider;
use emsipi_core::{GoogleProviderConfig, ProviderConfig, ResolvedConfig};

use crate::client::{CloudBuildError, DeployError, GcloudClient, PreflightError};
use crate::executor::GcloudExecutor;

/// Result of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub url: String,
    pub image: String,
    pub steps: Vec<String>,
}

/// Deploy the bundled build context to the provider named `provider_name`
/// (canonical name or alias).
pub async fn deploy<E: GcloudExecutor>(
    client: &GcloudClient<E>,
    config: &ResolvedConfig,
    provider_name: &str,
    bundle_dir: &Path,
) -> Result<DeployOutcome, DriverError> {
    let entry = provider::lookup(provider_name).map_err(DriverError::Provider)?;
    let resolved = config
        .provider(entry.name)
        .ok_or_else(|| DriverError::NotResolved(entry.name.to_owned()))?;

    match resolved {
        ProviderConfig::Google(google) => deploy_google(client, config, google, bundle_dir).await,
    }
}

/// `{region}-docker.pkg.dev/{project}/{repository}/{server}:latest`
pub fn image_reference(google: &GoogleProviderConfig, server_name: &str) -> String {
    format!(
        "{region}-docker.pkg.dev/{project}/{repo}/{server_name}:latest",
        region = google.region,
        project = google.project,
        repo = google.artifact_registry,
    )
}

async fn deploy_google<E: GcloudExecutor>(
    client: &GcloudClient<E>,
    config: &ResolvedConfig,
    google: &GoogleProviderConfig,
    bundle_dir: &Path,
) -> Result<DeployOutcome, DriverError> {
    let mut steps = Vec::new();
    let project = google.project.as_str();
    let region = google.region.as_str();

    let report = client.check_prerequisites(project).await?;
    if report.has_warnings() {
        return Err(DriverError::ApisDisabled {
            project: project.to_owned(),
            apis: report.disabled_apis,
        });
    }
    steps.push("Pre-flight checks passed".to_owned());

    let created = client
        .ensure_artifact_repo(project, region, &google.artifact_registry)
        .await?;
    steps.push(if created {
        format!("Artifact Registry repository '{}' created", google.artifact_registry)
    } else {
        format!("Artifact Registry repository '{}' found", google.artifact_registry)
    });

    let image = image_reference(google, &config.server_name);
    tracing::info!(%image, "submitting Cloud Build");
    client.submit_build(bundle_dir, project, region, &image).await?;
    steps.push(format!("Image built: {image}"));

    let url = client
        .deploy_service(
            &google.service_name,
            &image,
            project,
            region,
            config.environment_variables.as_ref(),
        )
        .await?;
    steps.push(format!("Deployed: {url}"));
    tracing::info!(%url, service = %google.service_name, "Cloud Run service deployed");

    Ok(DeployOutcome { url, image, steps })
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Provider(emsipi_core::Error),

    #[error("provider '{0}' has no resolved configuration")]
    NotResolved(String),

    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(
        "required APIs not enabled: {}; enable them with: gcloud services enable {} --project {project}",
        apis.join(", "),
        apis.join(" ")
    )]
    ApisDisabled { project: String, apis: Vec<String> },

    #[error(transparent)]
    Build(#[from] CloudBuildError),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}
