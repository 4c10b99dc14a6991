use std::collections::BTreeMap;
use std::path::PathBuf;

use emsipi_core::{CommandTarget, OVERWRITE_MARKER, PythonDependencySource, ResolvedConfig, Runtime};

const HEADER: &str = "# Automatically generated by emsipi.";
const UV_IMAGE: &str = "ghcr.io/astral-sh/uv:latest";
const PORT: u16 = 8080;

/// Renders the Dockerfile for a resolved configuration.
pub struct DockerfileGenerator<'a> {
    config: &'a ResolvedConfig,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn render(&self) -> Result<String, DockerfileError> {
        match self.config.runtime {
            Runtime::Python => self.render_python(),
            Runtime::Node => self.render_node(),
        }
    }

    fn render_python(&self) -> Result<String, DockerfileError> {
        let version = self
            .config
            .python_version
            .as_deref()
            .ok_or(DockerfileError::MissingField("python_version"))?;
        let source = self
            .config
            .python_dependencies_file
            .ok_or(DockerfileError::MissingField("python_dependencies_file"))?;

        let install = match source {
            PythonDependencySource::UvLock => "uv sync --frozen",
            PythonDependencySource::PyprojectToml => "uv sync",
            PythonDependencySource::RequirementsTxt => "uv pip install --system -r requirements.txt",
        };
        let manifests = self.python_manifests(source).join(" ");
        let cmd = self.exec_form(|file| vec!["uv".into(), "run".into(), file])?;

        Ok(format!(
            r#"{OVERWRITE_MARKER}
{HEADER}

FROM python:{version}-slim

COPY --from={UV_IMAGE} /uv /usr/local/bin/uv

WORKDIR /app
{env}
COPY {manifests} ./
RUN {install}

COPY . .

EXPOSE {PORT}
CMD {cmd}
"#,
            env = env_directives(self.config.environment_variables.as_ref()),
        ))
    }

    fn render_node(&self) -> Result<String, DockerfileError> {
        let version = self
            .config
            .node_version
            .as_deref()
            .ok_or(DockerfileError::MissingField("node_version"))?;
        let build = if self.config.run_npm_build == Some(true) {
            "RUN npm run build\n"
        } else {
            ""
        };
        let cmd = self.exec_form(|file| vec!["node".into(), file])?;

        Ok(format!(
            r#"{OVERWRITE_MARKER}
{HEADER}

# === Stage 1: Builder ===
FROM node:{version}-alpine AS builder
WORKDIR /app
COPY package*.json ./
RUN npm install
COPY . .
{build}
# === Stage 2: Runner ===
FROM node:{version}-alpine AS runner
WORKDIR /app
{env}
COPY --from=builder /app ./

EXPOSE {PORT}
CMD {cmd}
"#,
            env = env_directives(self.config.environment_variables.as_ref()),
        ))
    }

    /// Dependency manifests present in the project. The selected source is
    /// always listed.
    fn python_manifests(&self, source: PythonDependencySource) -> Vec<&'static str> {
        let signals = &self.config.signals;
        let pyproject_present = signals.deps_in_pyproject
            || self.config.working_directory.join("pyproject.toml").is_file();
        [
            (
                "pyproject.toml",
                pyproject_present || source == PythonDependencySource::PyprojectToml,
            ),
            (
                "uv.lock",
                signals.uv_lock_present || source == PythonDependencySource::UvLock,
            ),
            (
                "requirements.txt",
                signals.requirements_txt_present
                    || source == PythonDependencySource::RequirementsTxt,
            ),
        ]
        .into_iter()
        .filter_map(|(name, copied)| copied.then_some(name))
        .collect()
    }

    /// `CMD` in JSON exec form: the launcher for a script file, the split
    /// words for a shell command.
    fn exec_form(&self, launcher: impl Fn(String) -> Vec<String>) -> Result<String, DockerfileError> {
        let args = match &self.config.target {
            CommandTarget::File { path, .. } => launcher(path.to_string_lossy().replace('\\', "/")),
            CommandTarget::Command(command) => split_command(command)?,
        };
        serde_json::to_string(&args).map_err(DockerfileError::Encode)
    }
}

fn env_directives(vars: Option<&BTreeMap<String, String>>) -> String {
    let Some(vars) = vars.filter(|v| !v.is_empty()) else {
        return String::new();
    };
    let mut out = String::from("\n");
    for (name, value) in vars {
        // JSON string quoting is valid Dockerfile double-quote syntax
        let quoted = serde_json::Value::String(value.clone()).to_string();
        out.push_str(&format!("ENV {name}={quoted}\n"));
    }
    out
}

/// Split a command line into words with POSIX shell quoting rules
/// (single quotes, double quotes, backslash escapes). No expansion.
pub fn split_command(command: &str) -> Result<Vec<String>, DockerfileError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(unbalanced(command)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(unbalanced(command)),
                        },
                        Some(c) => current.push(c),
                        None => return Err(unbalanced(command)),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some('\n') => {}
                    Some(c) => current.push(c),
                    None => return Err(unbalanced(command)),
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    if words.is_empty() {
        return Err(DockerfileError::EmptyCommand);
    }
    Ok(words)
}

fn unbalanced(command: &str) -> DockerfileError {
    DockerfileError::UnbalancedQuotes(command.to_owned())
}

/// Write the rendered Dockerfile to `config.dockerfile` unless the file on
/// disk is user-owned. Returns the written path, or `None` when skipped.
pub fn write_dockerfile(config: &ResolvedConfig) -> Result<Option<PathBuf>, DockerfileError> {
    let path = config.dockerfile.clone();
    if !config.do_generate_dockerfile() {
        tracing::info!(path = %path.display(), "keeping user-owned Dockerfile");
        return Ok(None);
    }

    let content = DockerfileGenerator::new(config).render()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DockerfileError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(&path, content).map_err(|e| DockerfileError::Write {
        path: path.clone(),
        source: e,
    })?;

    tracing::info!(path = %path.display(), runtime = %config.runtime, "generated Dockerfile");
    Ok(Some(path))
}

/// Read the Dockerfile the build will use, generated or hand-written.
pub fn load_dockerfile(config: &ResolvedConfig) -> Result<String, DockerfileError> {
    std::fs::read_to_string(&config.dockerfile).map_err(|e| DockerfileError::Read {
        path: config.dockerfile.clone(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum DockerfileError {
    #[error("cannot render Dockerfile: {0} is not resolved")]
    MissingField(&'static str),
    #[error("server command has unbalanced quotes: {0}")]
    UnbalancedQuotes(String),
    #[error("server command is empty")]
    EmptyCommand,
    #[error("failed to encode CMD")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read Dockerfile at {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
