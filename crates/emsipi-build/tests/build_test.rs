use std::path::Path;
use std::process::Command;

use emsipi_build::bundle::create_bundle;
use emsipi_build::dockerfile::{DockerfileGenerator, load_dockerfile, write_dockerfile};
use emsipi_build::scaffold::{ScaffoldError, private_document, write_config_files};
use emsipi_core::{NonInteractive, ResolveRequest, ResolvedConfig, resolve};
use tempfile::TempDir;

const GOOGLE: &str = "providers:\n  google:\n    project: test-project\n";

fn project(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (name, content) in files {
        let path = tmp.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    tmp
}

fn resolved(dir: &Path, target: &str) -> ResolvedConfig {
    let request = ResolveRequest::new(dir).server_file_or_command(target);
    resolve(&request, &mut NonInteractive).unwrap().config
}

fn render(config: &ResolvedConfig) -> String {
    DockerfileGenerator::new(config).render().unwrap()
}

fn git(dir: &Path, args: &[&str]) {
    Command::new("git").args(args).current_dir(dir).output().unwrap();
}

fn init_git_project(dir: &Path) {
    git(dir, &["init"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "init"]);
}

// ── Dockerfile Rendering Tests ──

#[test]
fn python_uv_lock_dockerfile() {
    let tmp = project(&[
        ("emsipi.yaml", format!("server-name: weather\n{GOOGLE}").as_str()),
        ("uv.lock", "requires-python = \">=3.12\"\n"),
        ("server.py", ""),
    ]);
    let output = render(&resolved(tmp.path(), "server.py"));

    assert!(output.starts_with("# OVERWRITE:OK\n"));
    assert!(output.contains("FROM python:3.12.0-slim"));
    assert!(output.contains("COPY --from=ghcr.io/astral-sh/uv:latest /uv /usr/local/bin/uv"));
    assert!(output.contains("COPY uv.lock ./"));
    assert!(!output.contains("pyproject.toml"));
    assert!(output.contains("RUN uv sync --frozen"));
    assert!(output.contains("EXPOSE 8080"));
    assert!(output.contains(r#"CMD ["uv","run","server.py"]"#));
    assert!(!output.contains("ENV "));
}

#[test]
fn python_dockerfile_copies_every_present_manifest() {
    let tmp = project(&[
        ("emsipi.yaml", format!("server-name: weather\n{GOOGLE}").as_str()),
        (
            "pyproject.toml",
            "[project]\nname = \"weather\"\nrequires-python = \">=3.12\"\ndependencies = [\"fastmcp\"]\n",
        ),
        ("uv.lock", "requires-python = \">=3.12\"\n"),
        ("requirements.txt", "fastmcp\n"),
    ]);
    let output = render(&resolved(tmp.path(), "server.py"));

    assert!(output.contains("COPY pyproject.toml uv.lock requirements.txt ./"));
    assert!(output.contains("RUN uv sync --frozen"));
}

#[test]
fn python_requirements_dockerfile_with_command() {
    let tmp = project(&[
        (
            "emsipi.yaml",
            format!("server-name: weather\npython-version: \"3.13\"\n{GOOGLE}").as_str(),
        ),
        ("requirements.txt", "fastmcp\n"),
    ]);
    let output = render(&resolved(tmp.path(), "python -m 'my server'"));

    assert!(output.contains("FROM python:3.13-slim"));
    assert!(output.contains("COPY requirements.txt ./"));
    assert!(output.contains("RUN uv pip install --system -r requirements.txt"));
    assert!(output.contains(r#"CMD ["python","-m","my server"]"#));
}

#[test]
fn node_dockerfile_with_build_and_env() {
    let tmp = project(&[
        (
            "emsipi.yaml",
            format!(
                "server-name: web\nnode-version: 22\nrun-npm-build: true\nenvironment-variables:\n  LOG_LEVEL: debug\n  WORKERS: 4\n{GOOGLE}"
            ).as_str(),
        ),
        ("package.json", "{}"),
        ("dist/index.js", ""),
    ]);
    let output = render(&resolved(tmp.path(), "dist/index.js"));

    assert!(output.starts_with("# OVERWRITE:OK\n"));
    assert!(output.contains("FROM node:22-alpine AS builder"));
    assert!(output.contains("FROM node:22-alpine AS runner"));
    assert!(output.contains("RUN npm run build"));
    assert!(output.contains("ENV LOG_LEVEL=\"debug\"\nENV WORKERS=\"4\""));
    assert!(output.contains(r#"CMD ["node","dist/index.js"]"#));
}

#[test]
fn node_dockerfile_without_build() {
    let tmp = project(&[
        ("emsipi.yaml", format!("server-name: web\nnode-version: \"20\"\n{GOOGLE}").as_str()),
        ("package.json", "{}"),
    ]);
    let output = render(&resolved(tmp.path(), "npm run start"));

    assert!(!output.contains("npm run build"));
    assert!(output.contains(r#"CMD ["npm","run","start"]"#));
}

// ── Write Policy Tests ──

#[test]
fn writes_dockerfile_when_absent() {
    let tmp = project(&[
        ("emsipi.yaml", format!("server-name: weather\npython-version: \"3.12\"\n{GOOGLE}").as_str()),
        ("requirements.txt", "fastmcp\n"),
    ]);
    let config = resolved(tmp.path(), "app.py");

    let written = write_dockerfile(&config).unwrap();

    assert_eq!(written.as_deref(), Some(config.dockerfile.as_path()));
    let content = load_dockerfile(&config).unwrap();
    assert!(content.starts_with("# OVERWRITE:OK\n"));
}

#[test]
fn overwrites_marked_dockerfile_into_custom_path() {
    let tmp = project(&[
        (
            "emsipi.yaml",
            format!("server-name: weather\npython-version: \"3.12\"\ndockerfile: docker/Dockerfile\n{GOOGLE}").as_str(),
        ),
        ("requirements.txt", "fastmcp\n"),
        ("docker/Dockerfile", "# OVERWRITE:OK\nFROM stale\n"),
    ]);
    let config = resolved(tmp.path(), "app.py");

    assert!(write_dockerfile(&config).unwrap().is_some());
    let content = std::fs::read_to_string(tmp.path().join("docker/Dockerfile")).unwrap();
    assert!(!content.contains("FROM stale"));
}

#[test]
fn keeps_hand_edited_dockerfile() {
    let hand_written = "FROM python:3.12\nCMD [\"python\", \"app.py\"]\n";
    let tmp = project(&[
        ("emsipi.yaml", format!("server-name: weather\npython-version: \"3.12\"\n{GOOGLE}").as_str()),
        ("requirements.txt", "fastmcp\n"),
        ("Dockerfile", hand_written),
    ]);
    let config = resolved(tmp.path(), "app.py");

    assert_eq!(write_dockerfile(&config).unwrap(), None);
    assert_eq!(load_dockerfile(&config).unwrap(), hand_written);
}

// ── Scaffold Tests ──

#[test]
fn scaffold_refuses_to_overwrite_existing_config() {
    let tmp = project(&[
        ("emsipi.yaml", format!("server-name: weather\npython-version: \"3.12\"\n{GOOGLE}").as_str()),
        ("requirements.txt", "fastmcp\n"),
    ]);
    let config = resolved(tmp.path(), "app.py");

    let err = write_config_files(&config).unwrap_err();
    assert!(matches!(err, ScaffoldError::AlreadyExists(_)));
}

#[test]
fn scaffolded_files_resolve_to_the_same_config() {
    let source = project(&[
        (
            "emsipi.yaml",
            format!(
                "server-name: weather\nenvironment-variables:\n  MODE: prod\n{GOOGLE}"
            ).as_str(),
        ),
        ("uv.lock", "requires-python = \">=3.11\"\n"),
    ]);
    let original = resolved(source.path(), "server.py");

    let target = project(&[("uv.lock", "requires-python = \">=3.11\"\n")]);
    let target_dir = target.path().canonicalize().unwrap();
    let mut moved = original.clone();
    moved.working_directory = target_dir.clone();
    moved.dockerfile = target_dir.join("Dockerfile");

    let written = write_config_files(&moved).unwrap();
    assert!(written.public.is_file());
    assert!(written.private.is_file());

    let public = std::fs::read_to_string(&written.public).unwrap();
    assert!(!public.contains("test-project"), "provider data leaked: {public}");

    let reloaded = resolved(&target_dir, "server.py");
    assert_eq!(reloaded.server_name, original.server_name);
    assert_eq!(reloaded.target, original.target);
    assert_eq!(reloaded.runtime, original.runtime);
    assert_eq!(reloaded.python_version, original.python_version);
    assert_eq!(reloaded.python_dependencies_file, original.python_dependencies_file);
    assert_eq!(reloaded.environment_variables, original.environment_variables);
    assert_eq!(reloaded.providers, original.providers);
    assert!(!reloaded.do_generate_config_files());
}

#[test]
fn private_document_holds_provider_defaults() {
    let tmp = project(&[
        ("emsipi.yaml", format!("server-name: weather\npython-version: \"3.12\"\n{GOOGLE}").as_str()),
        ("requirements.txt", "fastmcp\n"),
    ]);
    let config = resolved(tmp.path(), "app.py");

    let yaml = serde_yaml_ng::to_string(&private_document(&config)).unwrap();
    assert!(yaml.contains("artifact-registry: weather-repo"), "{yaml}");
    assert!(yaml.contains("service-name: weather-service"), "{yaml}");
    assert!(yaml.contains("region: us-central1"), "{yaml}");
}

// ── Bundle Tests ──

#[test]
fn bundle_mirrors_git_files_and_puts_dockerfile_at_root() {
    let tmp = project(&[
        ("server.py", "print('hi')\n"),
        ("pkg/tools.py", ""),
        ("emsipi.private.yaml", "providers: {}\n"),
        (".gitignore", "*.log\n"),
        ("debug.log", "noise"),
    ]);
    init_git_project(tmp.path());

    let bundle_dir = create_bundle(tmp.path(), "FROM python:3.12-slim\n").unwrap();

    assert!(bundle_dir.join("server.py").exists());
    assert!(bundle_dir.join("pkg/tools.py").exists());
    assert!(!bundle_dir.join("debug.log").exists());
    assert!(!bundle_dir.join("emsipi.private.yaml").exists());
    assert_eq!(
        std::fs::read_to_string(bundle_dir.join("Dockerfile")).unwrap(),
        "FROM python:3.12-slim\n"
    );
}

#[test]
fn bundle_includes_untracked_files_and_replaces_previous_bundle() {
    let tmp = project(&[("server.py", "")]);
    init_git_project(tmp.path());
    std::fs::write(tmp.path().join("new_tool.py"), "").unwrap();

    let first = create_bundle(tmp.path(), "FROM a\n").unwrap();
    std::fs::write(first.join("stale.txt"), "").unwrap();
    let second = create_bundle(tmp.path(), "FROM b\n").unwrap();

    assert!(second.join("new_tool.py").exists());
    assert!(!second.join("stale.txt").exists());
    assert!(!second.join(".emsipi-bundle").exists());
}

#[test]
fn bundle_outside_git_repository_fails() {
    let tmp = project(&[("server.py", "")]);
    let result = create_bundle(tmp.path(), "FROM a\n");
    // TempDir may sit inside a repository on some hosts; only assert when it does not.
    if Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(tmp.path())
        .output()
        .map(|o| !o.status.success())
        .unwrap_or(true)
    {
        assert!(result.is_err());
    }
}
