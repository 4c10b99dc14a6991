use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Error;
use crate::probe::ProbedSignals;
use crate::provider::ProviderConfig;

/// Language runtime of the deployed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Python,
    Node,
}

impl Runtime {
    pub const CHOICES: [&'static str; 2] = ["python", "node"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "python" => Some(Self::Python),
            "node" => Some(Self::Node),
            _ => None,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the server is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Python,
    Node,
    Shell,
}

impl CommandType {
    /// The runtime a file target forces, if any.
    pub fn forced_runtime(self) -> Option<Runtime> {
        match self {
            Self::Python => Some(Runtime::Python),
            Self::Node => Some(Runtime::Node),
            Self::Shell => None,
        }
    }
}

/// Which Python dependency manifest drives the image build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PythonDependencySource {
    #[serde(rename = "requirements.txt")]
    RequirementsTxt,
    #[serde(rename = "pyproject.toml")]
    PyprojectToml,
    #[serde(rename = "uv.lock")]
    UvLock,
}

impl PythonDependencySource {
    pub const CHOICES: [&'static str; 3] = ["requirements.txt", "pyproject.toml", "uv.lock"];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::RequirementsTxt => "requirements.txt",
            Self::PyprojectToml => "pyproject.toml",
            Self::UvLock => "uv.lock",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "requirements.txt" => Some(Self::RequirementsTxt),
            "pyproject.toml" => Some(Self::PyprojectToml),
            "uv.lock" => Some(Self::UvLock),
            _ => None,
        }
    }
}

impl fmt::Display for PythonDependencySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Script flavour of a file target, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Python,
    JavaScript,
}

impl ScriptKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Some(Self::Python),
            Some("js") => Some(Self::JavaScript),
            _ => None,
        }
    }
}

/// The single run target: a script file or a shell command, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    /// Script path relative to the working directory.
    File { path: PathBuf, kind: ScriptKind },
    Command(String),
}

impl CommandTarget {
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::File {
                kind: ScriptKind::Python,
                ..
            } => CommandType::Python,
            Self::File {
                kind: ScriptKind::JavaScript,
                ..
            } => CommandType::Node,
            Self::Command(_) => CommandType::Shell,
        }
    }

    pub fn server_file(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Command(_) => None,
        }
    }

    pub fn server_command(&self) -> Option<&str> {
        match self {
            Self::File { .. } => None,
            Self::Command(cmd) => Some(cmd),
        }
    }
}

impl fmt::Display for CommandTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path, .. } => write!(f, "{}", path.display()),
            Self::Command(cmd) => f.write_str(cmd),
        }
    }
}

/// Fully resolved, internally consistent deployment configuration.
///
/// Built once at the end of a successful resolution pass and consumed
/// read-only by the Dockerfile emitter and the deployment driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub server_name: String,
    /// Canonical absolute working directory.
    pub working_directory: PathBuf,
    pub target: CommandTarget,
    pub command_type: CommandType,
    pub runtime: Runtime,
    /// Set iff `runtime` is python.
    pub python_version: Option<String>,
    /// Set iff `runtime` is python.
    pub python_dependencies_file: Option<PythonDependencySource>,
    /// Set iff `runtime` is node.
    pub node_version: Option<String>,
    /// Set iff `runtime` is node.
    pub run_npm_build: Option<bool>,
    /// Absolute Dockerfile path.
    pub dockerfile: PathBuf,
    pub environment_variables: Option<BTreeMap<String, String>>,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub signals: ProbedSignals,
}

/// Field values gathered by the resolver chain, before assembly.
#[derive(Debug, Default)]
pub(crate) struct ConfigParts {
    pub server_name: Option<String>,
    pub working_directory: PathBuf,
    pub server_file: Option<(PathBuf, ScriptKind)>,
    pub server_command: Option<String>,
    pub command_type: Option<CommandType>,
    pub runtime: Option<Runtime>,
    pub python_version: Option<String>,
    pub python_dependencies_file: Option<PythonDependencySource>,
    pub node_version: Option<String>,
    pub run_npm_build: Option<bool>,
    pub dockerfile: PathBuf,
    pub environment_variables: Option<BTreeMap<String, String>>,
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl ResolvedConfig {
    /// Package resolved parts, re-checking the run target invariant.
    pub(crate) fn assemble(parts: ConfigParts, signals: ProbedSignals) -> crate::Result<Self> {
        let target = match (parts.server_file, parts.server_command) {
            (Some((path, kind)), None) => CommandTarget::File { path, kind },
            (None, Some(command)) => CommandTarget::Command(command),
            (Some(_), Some(_)) => {
                return Err(Error::InconsistentConfiguration {
                    fields: vec!["server_file".to_owned(), "server_command".to_owned()],
                    reason: "both a server file and a server command are set".to_owned(),
                });
            }
            (None, None) => {
                return Err(Error::InconsistentConfiguration {
                    fields: vec!["server_file".to_owned(), "server_command".to_owned()],
                    reason: "no run target is set".to_owned(),
                });
            }
        };

        let (Some(server_name), Some(runtime)) = (parts.server_name, parts.runtime) else {
            return Err(Error::InconsistentConfiguration {
                fields: vec!["server_name".to_owned(), "runtime".to_owned()],
                reason: "resolution finished without a server name or runtime".to_owned(),
            });
        };

        Ok(Self {
            server_name,
            working_directory: parts.working_directory,
            command_type: target.command_type(),
            target,
            runtime,
            python_version: parts.python_version,
            python_dependencies_file: parts.python_dependencies_file,
            node_version: parts.node_version,
            run_npm_build: parts.run_npm_build,
            dockerfile: parts.dockerfile,
            environment_variables: parts.environment_variables,
            providers: parts.providers,
            signals,
        })
    }

    /// The file path if a server file is set, else the command string.
    pub fn effective_target(&self) -> String {
        self.target.to_string()
    }

    pub fn do_generate_dockerfile(&self) -> bool {
        self.signals.do_generate_dockerfile
    }

    pub fn do_generate_config_files(&self) -> bool {
        self.signals.do_generate_config_files
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Dockerfile path relative to the working directory when it lives inside it.
    pub fn dockerfile_relative(&self) -> PathBuf {
        self.dockerfile
            .strip_prefix(&self.working_directory)
            .map_or_else(|_| self.dockerfile.clone(), Path::to_path_buf)
    }

    pub fn to_document(&self) -> ConfigDocument<'_> {
        ConfigDocument {
            server_name: &self.server_name,
            server_file: self
                .target
                .server_file()
                .map(|p| p.to_string_lossy().into_owned()),
            server_command: self.target.server_command(),
            effective_target: self.effective_target(),
            command_type: self.command_type,
            runtime: self.runtime,
            python_version: self.python_version.as_deref(),
            python_dependencies_file: self.python_dependencies_file,
            node_version: self.node_version.as_deref(),
            run_npm_build: self.run_npm_build,
            dockerfile: self.dockerfile_relative().to_string_lossy().into_owned(),
            environment_variables: self.environment_variables.as_ref(),
            providers: &self.providers,
            signals: self.signals,
        }
    }

    /// Pretty JSON with snake_case field names, for machine consumption.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(&self.to_document())
            .map_err(|e| Error::Serialize { source: e })
    }
}

/// Serializable view of [`ResolvedConfig`]: internal-only fields are left
/// out and the Dockerfile path is relative to the working directory.
#[derive(Debug, Serialize)]
pub struct ConfigDocument<'a> {
    pub server_name: &'a str,
    pub server_file: Option<String>,
    pub server_command: Option<&'a str>,
    pub effective_target: String,
    pub command_type: CommandType,
    pub runtime: Runtime,
    pub python_version: Option<&'a str>,
    pub python_dependencies_file: Option<PythonDependencySource>,
    pub node_version: Option<&'a str>,
    pub run_npm_build: Option<bool>,
    pub dockerfile: String,
    pub environment_variables: Option<&'a BTreeMap<String, String>>,
    pub providers: &'a BTreeMap<String, ProviderConfig>,
    #[serde(flatten)]
    pub signals: ProbedSignals,
}

/// Outcome of a resolution pass: the configuration plus non-fatal warnings.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: ResolvedConfig,
    pub warnings: Vec<String>,
}
