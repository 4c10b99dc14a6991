use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use emsipi_cloud::client::{CloudBuildError, DeployError, GcloudClient, PreflightError};
use emsipi_cloud::driver::{self, DriverError};
use emsipi_cloud::executor::GcloudExecutor;
use emsipi_cloud::gcloud::GcloudError;
use emsipi_core::{NonInteractive, ResolveRequest, ResolvedConfig, resolve};
use mockall::mock;
use tempfile::TempDir;

mock! {
    Executor {}

    impl GcloudExecutor for Executor {
        async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;
        async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError>;
    }
}

fn has(args: &[String], word: &str) -> bool {
    args.iter().any(|a| a == word)
}

fn failed(stderr: &str) -> GcloudError {
    GcloudError::CommandFailed {
        args: vec![],
        stderr: stderr.to_owned(),
    }
}

/// version, auth and project checks succeed; APIs listed in `disabled` are off.
fn expect_preflight(mock: &mut MockExecutor, disabled: &'static [&'static str]) {
    mock.expect_exec()
        .withf(|args| has(args, "version"))
        .returning(|_| Ok("502.0.0\n".to_owned()));
    mock.expect_exec()
        .withf(|args| has(args, "print-access-token"))
        .returning(|_| Ok("ya29.token\n".to_owned()));
    mock.expect_exec()
        .withf(|args| has(args, "projects") && has(args, "describe"))
        .returning(|_| Ok("My Project\n".to_owned()));
    mock.expect_exec()
        .withf(|args| has(args, "services") && has(args, "list"))
        .returning(move |args| {
            let api = args
                .iter()
                .find_map(|a| a.strip_prefix("config.name="))
                .unwrap_or_default();
            if disabled.iter().any(|d| *d == api) {
                Ok(String::new())
            } else {
                Ok(format!("{api}\n"))
            }
        });
}

fn resolved(dir: &Path, extra: &str) -> ResolvedConfig {
    std::fs::write(
        dir.join("emsipi.yaml"),
        format!("server-name: weather\npython-version: \"3.12\"\n{extra}providers:\n  google:\n    project: test-project\n    region: europe-west1\n"),
    )
    .unwrap();
    std::fs::write(dir.join("requirements.txt"), "fastmcp\n").unwrap();
    let request = ResolveRequest::new(dir).server_file_or_command("server.py");
    resolve(&request, &mut NonInteractive).unwrap().config
}

// ── Preflight Tests ──

#[tokio::test]
async fn preflight_all_checks_pass() {
    let mut mock = MockExecutor::new();
    expect_preflight(&mut mock, &[]);

    let client = GcloudClient::with_executor(mock);
    let report = client.check_prerequisites("test-project").await.unwrap();

    assert_eq!(report.gcloud_version.as_deref(), Some("502.0.0"));
    assert!(report.authenticated);
    assert_eq!(report.project_name.as_deref(), Some("My Project"));
    assert!(!report.has_warnings());
}

#[tokio::test]
async fn preflight_reports_disabled_apis() {
    let mut mock = MockExecutor::new();
    expect_preflight(&mut mock, &["run.googleapis.com"]);

    let client = GcloudClient::with_executor(mock);
    let report = client.check_prerequisites("test-project").await.unwrap();

    assert_eq!(report.disabled_apis, vec!["run.googleapis.com".to_owned()]);
}

#[tokio::test]
async fn preflight_gcloud_not_installed() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "version"))
        .returning(|_| {
            Err(GcloudError::NotFound {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        });

    let client = GcloudClient::with_executor(mock);
    let result = client.check_prerequisites("test-project").await;

    assert!(matches!(result, Err(PreflightError::GcloudNotInstalled)));
}

#[tokio::test]
async fn preflight_not_authenticated() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "version"))
        .returning(|_| Ok("502.0.0\n".to_owned()));
    mock.expect_exec()
        .withf(|args| has(args, "print-access-token"))
        .returning(|_| Err(failed("not logged in")));

    let client = GcloudClient::with_executor(mock);
    let result = client.check_prerequisites("test-project").await;

    assert!(matches!(result, Err(PreflightError::NotAuthenticated)));
}

#[tokio::test]
async fn preflight_project_not_accessible() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "version"))
        .returning(|_| Ok("502.0.0\n".to_owned()));
    mock.expect_exec()
        .withf(|args| has(args, "print-access-token"))
        .returning(|_| Ok("ya29.token\n".to_owned()));
    mock.expect_exec()
        .withf(|args| has(args, "projects"))
        .returning(|_| Err(failed("not found")));

    let client = GcloudClient::with_executor(mock);
    let result = client.check_prerequisites("bad-project").await;

    assert!(matches!(result, Err(PreflightError::ProjectNotAccessible(ref p)) if p == "bad-project"));
}

// ── Artifact Registry Tests ──

#[tokio::test]
async fn artifact_repo_is_created_when_missing() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "repositories") && has(args, "describe"))
        .times(1)
        .returning(|_| Err(failed("NOT_FOUND")));
    mock.expect_exec()
        .withf(|args| {
            has(args, "create")
                && has(args, "weather-repo")
                && has(args, "europe-west1")
                && has(args, "docker")
        })
        .times(1)
        .returning(|_| Ok(String::new()));

    let client = GcloudClient::with_executor(mock);
    let created = client
        .ensure_artifact_repo("p", "europe-west1", "weather-repo")
        .await
        .unwrap();

    assert!(created);
}

#[tokio::test]
async fn existing_artifact_repo_is_left_alone() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "describe"))
        .times(1)
        .returning(|_| Ok("name: weather-repo\n".to_owned()));
    mock.expect_exec().withf(|args| has(args, "create")).never();

    let client = GcloudClient::with_executor(mock);
    assert!(!client.ensure_artifact_repo("p", "r", "weather-repo").await.unwrap());
}

#[tokio::test]
async fn artifact_repo_creation_failure_is_reported() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "describe"))
        .returning(|_| Err(failed("NOT_FOUND")));
    mock.expect_exec()
        .withf(|args| has(args, "create"))
        .returning(|_| Err(failed("PERMISSION_DENIED")));

    let client = GcloudClient::with_executor(mock);
    let result = client.ensure_artifact_repo("p", "r", "repo").await;

    assert!(matches!(result, Err(DeployError::ArtifactRepository { .. })));
}

// ── Cloud Build / Cloud Run Tests ──

#[tokio::test]
async fn build_failure_is_reported() {
    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming()
        .withf(|args| has(args, "builds") && has(args, "submit"))
        .returning(|_| Err(failed("exit status: 1")));

    let client = GcloudClient::with_executor(mock);
    let result = client
        .submit_build(&PathBuf::from("/tmp/bundle"), "p", "r", "img")
        .await;

    assert!(matches!(result, Err(CloudBuildError::Submit { .. })));
}

#[tokio::test]
async fn deploy_passes_environment_and_returns_url() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| {
            has(args, "deploy")
                && has(args, "weather-service")
                && has(args, "--set-env-vars")
                && has(args, "LOG_LEVEL=debug,MODE=prod")
                && has(args, "8080")
        })
        .returning(|_| Ok("https://weather-service-abc.a.run.app\n".to_owned()));

    let env = BTreeMap::from([
        ("MODE".to_owned(), "prod".to_owned()),
        ("LOG_LEVEL".to_owned(), "debug".to_owned()),
    ]);
    let client = GcloudClient::with_executor(mock);
    let url = client
        .deploy_service("weather-service", "img", "p", "r", Some(&env))
        .await
        .unwrap();

    assert_eq!(url, "https://weather-service-abc.a.run.app");
}

#[tokio::test]
async fn deploy_without_environment_omits_flag() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "deploy") && !has(args, "--set-env-vars"))
        .returning(|_| Ok("https://svc.a.run.app\n".to_owned()));

    let client = GcloudClient::with_executor(mock);
    let url = client.deploy_service("svc", "img", "p", "r", None).await.unwrap();
    assert_eq!(url, "https://svc.a.run.app");
}

#[tokio::test]
async fn deploy_without_url_is_an_error() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| has(args, "deploy"))
        .returning(|_| Ok("\n".to_owned()));

    let client = GcloudClient::with_executor(mock);
    let result = client.deploy_service("svc", "img", "p", "r", None).await;
    assert!(matches!(result, Err(DeployError::MissingUrl(ref s)) if s == "svc"));
}

// ── Driver Tests ──

#[tokio::test]
async fn driver_runs_full_google_pipeline() {
    let tmp = TempDir::new().unwrap();
    let config = resolved(tmp.path(), "environment-variables:\n  MODE: prod\n");
    let image = "europe-west1-docker.pkg.dev/test-project/weather-repo/weather:latest";

    let mut mock = MockExecutor::new();
    expect_preflight(&mut mock, &[]);
    mock.expect_exec()
        .withf(|args| has(args, "repositories") && has(args, "describe"))
        .returning(|_| Ok("name: weather-repo\n".to_owned()));
    mock.expect_exec_streaming()
        .withf(move |args| has(args, "submit") && has(args, image) && has(args, "/bundle"))
        .times(1)
        .returning(|_| Ok(()));
    mock.expect_exec()
        .withf(|args| {
            has(args, "run")
                && has(args, "deploy")
                && has(args, "weather-service")
                && has(args, "MODE=prod")
        })
        .times(1)
        .returning(|_| Ok("https://weather-service.a.run.app\n".to_owned()));

    let client = GcloudClient::with_executor(mock);
    let outcome = driver::deploy(&client, &config, "gcp", Path::new("/bundle"))
        .await
        .unwrap();

    assert_eq!(outcome.url, "https://weather-service.a.run.app");
    assert_eq!(outcome.image, image);
    assert_eq!(outcome.steps.len(), 4);
}

#[tokio::test]
async fn driver_stops_on_disabled_apis() {
    let tmp = TempDir::new().unwrap();
    let config = resolved(tmp.path(), "");

    let mut mock = MockExecutor::new();
    expect_preflight(&mut mock, &["cloudbuild.googleapis.com"]);
    mock.expect_exec_streaming().never();

    let client = GcloudClient::with_executor(mock);
    let err = driver::deploy(&client, &config, "google", Path::new("/bundle"))
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::ApisDisabled { ref apis, .. } if apis == &["cloudbuild.googleapis.com"]));
    assert!(err.to_string().contains("gcloud services enable cloudbuild.googleapis.com"));
}

#[tokio::test]
async fn driver_rejects_unknown_provider() {
    let tmp = TempDir::new().unwrap();
    let config = resolved(tmp.path(), "");

    let client = GcloudClient::with_executor(MockExecutor::new());
    let err = driver::deploy(&client, &config, "azure", Path::new("/bundle"))
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::Provider(_)));
}
