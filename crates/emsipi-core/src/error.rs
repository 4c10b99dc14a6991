use std::path::PathBuf;

use crate::config::Runtime;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`], used by callers to decide how to
/// render a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing user/file input.
    Input,
    /// Contradictory combination of individually valid fields.
    Consistency,
    /// Insufficient or conflicting filesystem signals.
    Inference,
    /// Unreadable or unparsable files, terminal I/O.
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Config files ──
    #[error("config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("failed to read config file {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },

    #[error("config file {path} must contain a mapping at the top level, found {found}")]
    ConfigShape { path: PathBuf, found: &'static str },

    #[error("unknown config key '{key}'; accepted keys: {}", known.join(", "))]
    UnknownField {
        key: String,
        known: Vec<&'static str>,
    },

    #[error("failed to resolve working directory {path}")]
    WorkingDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Input ──
    #[error("{field} is required but not provided; {action}")]
    MissingRequiredField { field: String, action: String },

    #[error("invalid {field}: {expected}. Got: {value}")]
    InvalidFormat {
        field: String,
        value: String,
        expected: String,
    },

    #[error("invalid runtime '{value}' (expected python, node or auto)")]
    InvalidRuntimeValue { value: String },

    #[error("{field} cannot be empty")]
    EmptyField { field: String },

    #[error("server_command cannot be empty")]
    EmptyCommand,

    #[error("server_file must end with .py or .js. Got '{extension}' for {path}")]
    UnsupportedExtension { path: PathBuf, extension: String },

    #[error("invalid version specifier '{specifier}': {reason}")]
    InvalidVersionSpecifier { specifier: String, reason: String },

    // ── Consistency ──
    #[error("{first} and {second} are mutually exclusive; provide only one")]
    MutualExclusionViolation {
        first: &'static str,
        second: &'static str,
    },

    #[error(
        "{field} provided but runtime is {runtime}, not {required}; \
         set runtime explicitly or remove {field}"
    )]
    FieldNotApplicable {
        field: &'static str,
        runtime: Runtime,
        required: Runtime,
    },

    #[error("inconsistent configuration ({}): {reason}", fields.join(", "))]
    InconsistentConfiguration { fields: Vec<String>, reason: String },

    #[error(
        "{field} must reside within the working directory. Got {} outside {}",
        path.display(),
        working_directory.display()
    )]
    PathEscapesWorkingDirectory {
        field: &'static str,
        path: PathBuf,
        working_directory: PathBuf,
    },

    #[error(
        "neither server_file nor server_command provided; pass a .py/.js file or a \
         command on the command line, or set server-file / server-command in emsipi.yaml"
    )]
    MissingCommandTarget,

    #[error("unknown provider '{name}'; available providers: {}", available.join(", "))]
    UnknownProvider {
        name: String,
        available: Vec<&'static str>,
    },

    // ── Inference ──
    #[error(
        "ambiguous project signals: both Python and Node config files found ({observed}); \
         set runtime explicitly (--runtime or `runtime:` in emsipi.yaml)"
    )]
    AmbiguousRuntimeSignals { observed: String },

    #[error(
        "cannot infer runtime: no Python or Node signals ({observed}); \
         set runtime explicitly or add a dependency file"
    )]
    NoRuntimeSignals { observed: String },

    #[error(
        "no Python dependency file found ({observed}); add uv.lock, requirements.txt or a \
         pyproject.toml with [project].dependencies, or set python-dependencies-file explicitly"
    )]
    NoDependencyFileFound { observed: String },

    #[error("cannot infer python_version from {source_file}; set python-version explicitly")]
    CannotDetectPythonVersion { source_file: &'static str },

    #[error("cannot infer command_type: neither server_file nor server_command is set")]
    CannotInferCommandType,

    // ── Manifests / terminal ──
    #[error("failed to read {path}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {detail}")]
    ManifestParse { path: PathBuf, detail: String },

    #[error("failed to resolve server file {path}")]
    ServerFileResolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read interactive answer")]
    Prompt { source: std::io::Error },

    #[error("failed to serialize resolved configuration")]
    Serialize { source: serde_json::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownField { .. }
            | Self::MissingRequiredField { .. }
            | Self::InvalidFormat { .. }
            | Self::InvalidRuntimeValue { .. }
            | Self::EmptyField { .. }
            | Self::EmptyCommand
            | Self::UnsupportedExtension { .. }
            | Self::InvalidVersionSpecifier { .. } => ErrorKind::Input,

            Self::MutualExclusionViolation { .. }
            | Self::FieldNotApplicable { .. }
            | Self::InconsistentConfiguration { .. }
            | Self::PathEscapesWorkingDirectory { .. }
            | Self::MissingCommandTarget
            | Self::UnknownProvider { .. } => ErrorKind::Consistency,

            Self::AmbiguousRuntimeSignals { .. }
            | Self::NoRuntimeSignals { .. }
            | Self::NoDependencyFileFound { .. }
            | Self::CannotDetectPythonVersion { .. }
            | Self::CannotInferCommandType => ErrorKind::Inference,

            Self::ConfigNotFound { .. }
            | Self::ConfigLoad { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigShape { .. }
            | Self::WorkingDirectory { .. }
            | Self::ManifestRead { .. }
            | Self::ManifestParse { .. }
            | Self::ServerFileResolve { .. }
            | Self::Prompt { .. }
            | Self::Serialize { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidFormat {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    pub(crate) fn missing(field: impl Into<String>, action: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            action: action.into(),
        }
    }
}
