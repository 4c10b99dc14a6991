//! Field resolver chain.
//!
//! Resolution is a fixed, ordered list of steps over a shared
//! [`ResolutionContext`]. Each step reads only fields settled by earlier
//! steps and writes its own. The first failing step ends the pass.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml_ng::{Mapping, Number, Value};

use crate::config::{
    CommandType, ConfigParts, PythonDependencySource, Resolution, ResolvedConfig, Runtime,
    ScriptKind,
};
use crate::error::Error;
use crate::loader::{self, ConfigFiles};
use crate::probe::{self, ProbedSignals};
use crate::prompt::{Prompter, Wizard};
use crate::provider::{self, ProviderEntry};
use crate::raw::{Field, RawInput, describe_value};
use crate::version;

pub const DEFAULT_NODE_VERSION: &str = "20";

/// Inputs of one resolution pass, typically built from command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub working_directory: PathBuf,
    /// Explicit public config file. Relative paths are taken from the
    /// working directory.
    pub config_path: Option<PathBuf>,
    pub server_file_or_command: Option<String>,
    /// `python`, `node` or `auto`.
    pub runtime: Option<String>,
    /// Provider that must be present in the result.
    pub provider: Option<String>,
    /// Allow prompting when no config file exists.
    pub interactive: bool,
}

impl ResolveRequest {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            config_path: None,
            server_file_or_command: None,
            runtime: None,
            provider: None,
            interactive: false,
        }
    }

    /// Explicit public config file. A relative path is joined onto the
    /// working directory.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn server_file_or_command(mut self, target: impl Into<String>) -> Self {
        self.server_file_or_command = Some(target.into());
        self
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}

/// Run one full resolution pass.
///
/// Loads the config file pair, applies command-line overrides, probes the
/// working directory and walks the resolver chain. `prompter` is consulted
/// only in generate mode: no config file exists and the request is
/// interactive.
pub fn resolve(request: &ResolveRequest, prompter: &mut dyn Prompter) -> crate::Result<Resolution> {
    let working_directory = request
        .working_directory
        .canonicalize()
        .map_err(|e| Error::WorkingDirectory {
            path: request.working_directory.clone(),
            source: e,
        })?;

    let selected_provider = request
        .provider
        .as_deref()
        .map(provider::lookup)
        .transpose()?;

    let files = match &request.config_path {
        Some(path) => ConfigFiles::explicit(&probe::absolutize(&working_directory, path)),
        None => ConfigFiles::discover(&working_directory),
    };
    let mut raw = loader::load_files(&files)?;
    if let Some(target) = &request.server_file_or_command {
        raw.set(Field::ServerFileOrCommand, target.as_str());
    }
    if let Some(runtime) = &request.runtime {
        raw.set(Field::Runtime, runtime.as_str());
    }

    let signals = probe::probe(&working_directory, &files, &raw);
    let generate = signals.do_generate_config_files && request.interactive;
    tracing::debug!(
        dir = %working_directory.display(),
        generate,
        "resolving configuration"
    );

    let mut ctx = ResolutionContext::new(working_directory, raw, signals, selected_provider);
    let mut wizard = Wizard::new(prompter, generate);
    for (name, step) in PIPELINE {
        step(&mut ctx, &mut wizard)?;
        tracing::debug!(step = *name, "resolver step done");
    }
    ctx.finish()
}

/// Mutable accumulator threaded through the chain; private to one pass.
pub(crate) struct ResolutionContext {
    working_directory: PathBuf,
    raw: RawInput,
    signals: ProbedSignals,
    selected_provider: Option<&'static ProviderEntry>,
    file_candidate: Option<String>,
    command_candidate: Option<String>,
    parts: ConfigParts,
    warnings: Vec<String>,
}

impl ResolutionContext {
    fn new(
        working_directory: PathBuf,
        raw: RawInput,
        signals: ProbedSignals,
        selected_provider: Option<&'static ProviderEntry>,
    ) -> Self {
        let parts = ConfigParts {
            working_directory: working_directory.clone(),
            ..ConfigParts::default()
        };
        Self {
            working_directory,
            raw,
            signals,
            selected_provider,
            file_candidate: None,
            command_candidate: None,
            parts,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Record a wizard answer that replaced the value shown to the user.
    fn note_change(&mut self, field: &str, before: &str, after: &str) {
        if before != after {
            self.warn(format!(
                "{field} changed from '{before}' to '{after}' during confirmation"
            ));
        }
    }

    fn runtime(&self) -> crate::Result<Runtime> {
        self.parts.runtime.ok_or_else(|| unsettled("runtime"))
    }

    fn server_name(&self) -> crate::Result<String> {
        self.parts
            .server_name
            .clone()
            .ok_or_else(|| unsettled("server_name"))
    }

    fn finish(self) -> crate::Result<Resolution> {
        check_invariants(&self.parts)?;
        let config = ResolvedConfig::assemble(self.parts, self.signals)?;
        Ok(Resolution {
            config,
            warnings: self.warnings,
        })
    }
}

fn unsettled(field: &str) -> Error {
    Error::InconsistentConfiguration {
        fields: vec![field.to_owned()],
        reason: "required by a later step but not resolved".to_owned(),
    }
}

type Step = fn(&mut ResolutionContext, &mut Wizard<'_>) -> crate::Result<()>;

/// Resolution order. Later steps depend on fields settled by earlier ones.
const PIPELINE: &[(&str, Step)] = &[
    ("server_name", resolve_server_name),
    ("server_file_or_command", disambiguate_target),
    ("server_file", resolve_server_file),
    ("server_command", resolve_server_command),
    ("command_type", resolve_command_type),
    ("runtime", resolve_runtime),
    ("python_dependencies_file", resolve_python_dependencies_file),
    ("python_version", resolve_python_version),
    ("node", resolve_node),
    ("dockerfile", resolve_dockerfile),
    ("environment_variables", resolve_environment_variables),
    ("providers", resolve_providers),
];

// ── Server name ──

/// At least three ASCII letters, digits or dashes.
pub fn is_valid_server_name(name: &str) -> bool {
    name.len() >= 3 && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn validate_server_name(name: &str) -> crate::Result<()> {
    if is_valid_server_name(name) {
        Ok(())
    } else {
        Err(Error::invalid(
            Field::ServerName.name(),
            name,
            "must be at least 3 characters and contain only letters, digits and dashes",
        ))
    }
}

fn resolve_server_name(ctx: &mut ResolutionContext, wizard: &mut Wizard<'_>) -> crate::Result<()> {
    let name = match ctx.raw.string(Field::ServerName)? {
        Some(name) => {
            validate_server_name(&name)?;
            if wizard.is_active() {
                let confirmed = wizard.ask(Field::ServerName.name(), Some(name.as_str()))?;
                ctx.note_change(Field::ServerName.name(), &name, &confirmed);
                confirmed
            } else {
                name
            }
        }
        None if wizard.is_active() => wizard.ask(Field::ServerName.name(), None)?,
        None => {
            return Err(Error::missing(
                Field::ServerName.name(),
                "set server-name in emsipi.yaml",
            ));
        }
    };
    validate_server_name(&name)?;
    ctx.parts.server_name = Some(name);
    Ok(())
}

// ── Run target ──

/// An existing server file is followed through symlinks; the real file must
/// still live under the (canonical) working directory.
fn ensure_contained(path: &Path, working_directory: &Path) -> crate::Result<()> {
    let canonical = path
        .canonicalize()
        .map_err(|e| Error::ServerFileResolve {
            path: path.to_path_buf(),
            source: e,
        })?;
    if canonical.starts_with(working_directory) {
        Ok(())
    } else {
        Err(Error::PathEscapesWorkingDirectory {
            field: "server_file",
            path: canonical,
            working_directory: working_directory.to_path_buf(),
        })
    }
}

/// Split the combined command-line value into a file or a command. When
/// given, it replaces `server-file` / `server-command` from config.
fn disambiguate_target(ctx: &mut ResolutionContext, wizard: &mut Wizard<'_>) -> crate::Result<()> {
    let declared_file = ctx
        .raw
        .string(Field::ServerFile)?
        .filter(|file| !file.trim().is_empty());
    let declared_command = ctx.raw.string(Field::ServerCommand)?;
    let mut combined = ctx.raw.string(Field::ServerFileOrCommand)?;

    if combined.is_none()
        && declared_file.is_none()
        && declared_command.is_none()
        && wizard.is_active()
    {
        combined = Some(wizard.ask(Field::ServerFileOrCommand.name(), None)?);
    }

    let Some(combined) = combined else {
        ctx.file_candidate = declared_file;
        ctx.command_candidate = declared_command;
        return Ok(());
    };

    let overridden = declared_file
        .iter()
        .chain(declared_command.iter())
        .any(|declared| *declared != combined);
    if overridden {
        ctx.warn(format!(
            "command-line target '{combined}' overrides server-file/server-command from config"
        ));
    }

    if probe::looks_like_script(&combined) {
        ctx.file_candidate = Some(combined);
    } else {
        ctx.command_candidate = Some(combined);
    }
    Ok(())
}

fn resolve_server_file(ctx: &mut ResolutionContext, _wizard: &mut Wizard<'_>) -> crate::Result<()> {
    let Some(file) = ctx.file_candidate.clone() else {
        return Ok(());
    };
    if ctx.command_candidate.is_some() {
        return Err(Error::MutualExclusionViolation {
            first: "server_file",
            second: "server_command",
        });
    }

    let absolute = probe::absolutize(&ctx.working_directory, Path::new(&file));
    let relative = absolute
        .strip_prefix(&ctx.working_directory)
        .map(Path::to_path_buf)
        .map_err(|_| Error::PathEscapesWorkingDirectory {
            field: "server_file",
            path: absolute.clone(),
            working_directory: ctx.working_directory.clone(),
        })?;
    if absolute.exists() {
        ensure_contained(&absolute, &ctx.working_directory)?;
    }

    let kind = ScriptKind::from_path(&relative).ok_or_else(|| Error::UnsupportedExtension {
        extension: relative
            .extension()
            .map_or_else(|| "no extension".to_owned(), |e| format!(".{}", e.to_string_lossy())),
        path: absolute.clone(),
    })?;

    if !ctx.signals.server_file_exists {
        ctx.warn(format!(
            "server file {} does not exist in {}",
            relative.display(),
            ctx.working_directory.display()
        ));
    }
    ctx.parts.server_file = Some((relative, kind));
    Ok(())
}

fn resolve_server_command(ctx: &mut ResolutionContext, _wizard: &mut Wizard<'_>) -> crate::Result<()> {
    if let Some(command) = ctx.command_candidate.clone() {
        if ctx.parts.server_file.is_some() {
            return Err(Error::MutualExclusionViolation {
                first: "server_command",
                second: "server_file",
            });
        }
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }
        ctx.parts.server_command = Some(command.to_owned());
    }

    match (&ctx.parts.server_file, &ctx.parts.server_command) {
        (None, None) => Err(Error::MissingCommandTarget),
        (Some(_), Some(_)) => Err(Error::MutualExclusionViolation {
            first: "server_file",
            second: "server_command",
        }),
        _ => Ok(()),
    }
}

fn resolve_command_type(ctx: &mut ResolutionContext, _wizard: &mut Wizard<'_>) -> crate::Result<()> {
    let command_type = match (&ctx.parts.server_file, &ctx.parts.server_command) {
        (Some((_, ScriptKind::Python)), None) => CommandType::Python,
        (Some((_, ScriptKind::JavaScript)), None) => CommandType::Node,
        (None, Some(_)) => CommandType::Shell,
        _ => return Err(Error::CannotInferCommandType),
    };
    ctx.parts.command_type = Some(command_type);
    Ok(())
}

// ── Runtime ──

fn resolve_runtime(ctx: &mut ResolutionContext, wizard: &mut Wizard<'_>) -> crate::Result<()> {
    let command_type = ctx
        .parts
        .command_type
        .ok_or(Error::CannotInferCommandType)?;
    let forced = command_type.forced_runtime();

    let explicit = match ctx.raw.string(Field::Runtime)? {
        None => None,
        Some(value) if value == "auto" => None,
        Some(value) => {
            Some(Runtime::parse(&value).ok_or(Error::InvalidRuntimeValue { value })?)
        }
    };

    let (runtime, prompted) = match (explicit, forced) {
        (Some(runtime), _) => (runtime, false),
        (None, Some(runtime)) => (runtime, false),
        (None, None) => infer_runtime(ctx, wizard)?,
    };

    let runtime = if wizard.is_active() && !prompted {
        let answer = wizard.choose(Field::Runtime.name(), Some(runtime.as_str()), &Runtime::CHOICES)?;
        ctx.note_change(Field::Runtime.name(), runtime.as_str(), &answer);
        Runtime::parse(&answer).ok_or(Error::InvalidRuntimeValue { value: answer })?
    } else {
        runtime
    };

    if let Some(required) = forced {
        if runtime != required {
            return Err(Error::InconsistentConfiguration {
                fields: vec!["runtime".to_owned(), "server_file".to_owned()],
                reason: format!(
                    "runtime is {runtime} but the server file requires {required}"
                ),
            });
        }
    }

    ctx.parts.runtime = Some(runtime);
    Ok(())
}

/// Runtime for a shell command, from dependency-file signals.
/// Returns whether the user was asked.
fn infer_runtime(
    ctx: &mut ResolutionContext,
    wizard: &mut Wizard<'_>,
) -> crate::Result<(Runtime, bool)> {
    let python = ctx.signals.any_python_config_file_present;
    let node = ctx.signals.package_json_present;
    let observed = ctx.signals.describe();

    match (python, node) {
        (true, false) => Ok((Runtime::Python, false)),
        (false, true) => Ok((Runtime::Node, false)),
        (true, true) if !wizard.is_active() => Err(Error::AmbiguousRuntimeSignals { observed }),
        (false, false) if !wizard.is_active() => Err(Error::NoRuntimeSignals { observed }),
        (both, _) => {
            if !both {
                ctx.warn(format!(
                    "no Python or Node dependency files found ({observed}); \
                     the image build needs one"
                ));
            }
            let answer = wizard.choose(Field::Runtime.name(), None, &Runtime::CHOICES)?;
            let runtime = Runtime::parse(&answer).ok_or(Error::InvalidRuntimeValue { value: answer })?;
            Ok((runtime, true))
        }
    }
}

// ── Python ──

fn resolve_python_dependencies_file(
    ctx: &mut ResolutionContext,
    wizard: &mut Wizard<'_>,
) -> crate::Result<()> {
    const FIELD: &str = "python_dependencies_file";
    let runtime = ctx.runtime()?;
    let explicit = ctx
        .raw
        .string(Field::PythonDependenciesFile)?
        .filter(|value| value != "auto");

    if runtime != Runtime::Python {
        if explicit.is_some() {
            return Err(Error::FieldNotApplicable {
                field: FIELD,
                runtime,
                required: Runtime::Python,
            });
        }
        return Ok(());
    }

    let source = match explicit {
        Some(name) => PythonDependencySource::from_file_name(&name).ok_or_else(|| {
            Error::invalid(
                FIELD,
                name.as_str(),
                "expected one of auto, requirements.txt, pyproject.toml, uv.lock",
            )
        })?,
        None => detect_dependency_source(ctx)?,
    };

    let source = if wizard.is_active() {
        let answer = wizard.choose(
            FIELD,
            Some(source.file_name()),
            &PythonDependencySource::CHOICES,
        )?;
        ctx.note_change(FIELD, source.file_name(), &answer);
        PythonDependencySource::from_file_name(&answer)
            .ok_or_else(|| Error::invalid(FIELD, answer.as_str(), "unknown dependency file"))?
    } else {
        source
    };

    ctx.parts.python_dependencies_file = Some(source);
    Ok(())
}

/// Highest-priority present file: uv.lock > requirements.txt > pyproject.toml.
fn detect_dependency_source(ctx: &mut ResolutionContext) -> crate::Result<PythonDependencySource> {
    let present = ctx.signals.python_dependency_files();
    let winner = present
        .first()
        .and_then(|name| PythonDependencySource::from_file_name(name))
        .ok_or_else(|| Error::NoDependencyFileFound {
            observed: ctx.signals.describe(),
        })?;

    if present.len() > 1 {
        ctx.warn(format!(
            "found {}; using {winner}",
            join_names(&present)
        ));
    }
    Ok(winner)
}

fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => (*one).to_owned(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

fn resolve_python_version(ctx: &mut ResolutionContext, wizard: &mut Wizard<'_>) -> crate::Result<()> {
    const FIELD: &str = "python_version";
    let runtime = ctx.runtime()?;
    let explicit = match ctx.raw.get(Field::PythonVersion) {
        None => None,
        Some(Value::String(value)) if value == "auto" => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(number)) => {
            return Err(Error::invalid(
                FIELD,
                number.to_string(),
                "expected a quoted string such as \"3.11\"",
            ));
        }
        Some(other) => {
            return Err(Error::invalid(FIELD, describe_value(other), "expected a string"));
        }
    };

    if runtime != Runtime::Python {
        if explicit.is_some() {
            return Err(Error::FieldNotApplicable {
                field: FIELD,
                runtime,
                required: Runtime::Python,
            });
        }
        return Ok(());
    }

    if let Some(value) = explicit {
        if value.trim().is_empty() {
            return Err(Error::EmptyField {
                field: FIELD.to_owned(),
            });
        }
        ctx.parts.python_version = Some(value);
        return Ok(());
    }

    let source = ctx
        .parts
        .python_dependencies_file
        .ok_or_else(|| unsettled("python_dependencies_file"))?;
    let manifest = ctx.working_directory.join(source.file_name());
    let detected = match source {
        PythonDependencySource::RequirementsTxt => {
            if !wizard.is_active() {
                return Err(Error::CannotDetectPythonVersion {
                    source_file: source.file_name(),
                });
            }
            let answer = wizard.ask_default(FIELD, version::DEFAULT_PYTHON_VERSION)?;
            ctx.parts.python_version = Some(answer);
            return Ok(());
        }
        PythonDependencySource::UvLock => detect_python_version(&manifest, &["requires-python"])?,
        PythonDependencySource::PyprojectToml => {
            detect_python_version(&manifest, &["project", "requires-python"])?
        }
    };

    let value = match detected {
        Some(found) => {
            let found = found.to_string();
            if wizard.is_active() {
                let answer = wizard.ask(FIELD, Some(found.as_str()))?;
                ctx.note_change(FIELD, &found, &answer);
                answer
            } else {
                found
            }
        }
        None => {
            tracing::debug!(
                source = source.file_name(),
                default = version::DEFAULT_PYTHON_VERSION,
                "no requires-python match; using default"
            );
            if wizard.is_active() {
                wizard.ask_default(FIELD, version::DEFAULT_PYTHON_VERSION)?
            } else {
                version::DEFAULT_PYTHON_VERSION.to_owned()
            }
        }
    };
    ctx.parts.python_version = Some(value);
    Ok(())
}

fn detect_python_version(
    manifest: &Path,
    keys: &[&str],
) -> crate::Result<Option<version::Version>> {
    match probe::read_requires_python(manifest, keys)? {
        Some(specifier) => version::resolve_version(&specifier, version::candidates()),
        None => Ok(None),
    }
}

// ── Node ──

fn resolve_node(ctx: &mut ResolutionContext, wizard: &mut Wizard<'_>) -> crate::Result<()> {
    const VERSION: &str = "node_version";
    const BUILD: &str = "run_npm_build";
    let runtime = ctx.runtime()?;

    let node_version = match ctx.raw.get(Field::NodeVersion) {
        None => None,
        Some(Value::String(value)) => Some(value.trim().to_owned()),
        Some(Value::Number(number)) => Some(node_major(number)?),
        Some(other) => {
            return Err(Error::invalid(VERSION, describe_value(other), "expected a string or number"));
        }
    };
    let run_npm_build = match ctx.raw.get(Field::RunNpmBuild) {
        None => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(other) => {
            return Err(Error::invalid(BUILD, describe_value(other), "expected true or false"));
        }
    };

    if runtime != Runtime::Node {
        let stray = [(VERSION, node_version.is_some()), (BUILD, run_npm_build.is_some())];
        if let Some((field, _)) = stray.into_iter().find(|(_, present)| *present) {
            return Err(Error::FieldNotApplicable {
                field,
                runtime,
                required: Runtime::Node,
            });
        }
        return Ok(());
    }

    let version = match node_version {
        Some(value) if value.is_empty() => {
            return Err(Error::EmptyField {
                field: VERSION.to_owned(),
            });
        }
        Some(value) if wizard.is_active() => {
            let answer = wizard.ask(VERSION, Some(value.as_str()))?;
            ctx.note_change(VERSION, &value, &answer);
            answer
        }
        Some(value) => value,
        None if wizard.is_active() => wizard.ask_default(VERSION, DEFAULT_NODE_VERSION)?,
        None => {
            return Err(Error::missing(
                VERSION,
                "set node-version in emsipi.yaml (e.g. \"20\")",
            ));
        }
    };

    let build = match run_npm_build {
        Some(flag) if wizard.is_active() => wizard.confirm(BUILD, flag)?,
        Some(flag) => flag,
        None if wizard.is_active() => wizard.confirm(BUILD, false)?,
        None => false,
    };

    ctx.parts.node_version = Some(version);
    ctx.parts.run_npm_build = Some(build);
    Ok(())
}

/// `20` and `20.0` both mean major version "20".
fn node_major(number: &Number) -> crate::Result<String> {
    if let Some(major) = number.as_u64() {
        return Ok(major.to_string());
    }
    match number.as_f64() {
        Some(value) if value.is_finite() && value >= 0.0 => Ok(format!("{}", value.trunc())),
        _ => Err(Error::invalid(
            "node_version",
            number.to_string(),
            "expected a major version such as \"20\"",
        )),
    }
}

// ── Artifacts ──

fn resolve_dockerfile(ctx: &mut ResolutionContext, _wizard: &mut Wizard<'_>) -> crate::Result<()> {
    if let Some(path) = ctx.raw.string(Field::Dockerfile)? {
        if path.trim().is_empty() {
            return Err(Error::EmptyField {
                field: Field::Dockerfile.name().to_owned(),
            });
        }
    }
    ctx.parts.dockerfile = probe::dockerfile_path(&ctx.working_directory, &ctx.raw);
    Ok(())
}

fn resolve_environment_variables(
    ctx: &mut ResolutionContext,
    _wizard: &mut Wizard<'_>,
) -> crate::Result<()> {
    const FIELD: &str = "environment_variables";
    let Some(value) = ctx.raw.get(Field::EnvironmentVariables) else {
        return Ok(());
    };
    let Value::Mapping(entries) = value else {
        return Err(Error::invalid(
            FIELD,
            describe_value(value),
            "expected a mapping of variable names to values",
        ));
    };

    let mut variables = BTreeMap::new();
    for (key, value) in entries {
        let Value::String(name) = key else {
            return Err(Error::invalid(FIELD, describe_value(key), "variable names must be strings"));
        };
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(Error::invalid(
                    format!("{FIELD}.{name}"),
                    describe_value(other),
                    "expected a string, number or boolean",
                ));
            }
        };
        variables.insert(name.clone(), value);
    }

    if !variables.is_empty() {
        ctx.parts.environment_variables = Some(variables);
    }
    Ok(())
}

// ── Providers ──

fn resolve_providers(ctx: &mut ResolutionContext, wizard: &mut Wizard<'_>) -> crate::Result<()> {
    let server_name = ctx.server_name()?;
    let declared = match ctx.raw.get(Field::Providers) {
        None => Mapping::new(),
        Some(Value::Mapping(blocks)) => blocks.clone(),
        Some(other) => {
            return Err(Error::invalid(
                "providers",
                describe_value(other),
                "expected a mapping of provider names to settings",
            ));
        }
    };

    let mut blocks: BTreeMap<&'static str, (&'static ProviderEntry, String, Mapping)> =
        BTreeMap::new();
    for (key, value) in declared {
        let name = match key {
            Value::String(name) => name,
            other => {
                return Err(Error::invalid(
                    "providers",
                    describe_value(&other),
                    "provider names must be strings",
                ));
            }
        };
        let entry = provider::lookup(&name)?;
        let block = match value {
            Value::Mapping(block) => block,
            other => {
                return Err(Error::invalid(
                    format!("providers.{name}"),
                    describe_value(&other),
                    "expected a mapping",
                ));
            }
        };
        if let Some((_, previous, _)) = blocks.get(entry.name) {
            return Err(Error::InconsistentConfiguration {
                fields: vec![format!("providers.{previous}"), format!("providers.{name}")],
                reason: format!("both configure the {} provider", entry.name),
            });
        }
        blocks.insert(entry.name, (entry, name, block));
    }

    if let Some(selected) = ctx.selected_provider {
        blocks
            .entry(selected.name)
            .or_insert_with(|| (selected, selected.name.to_owned(), Mapping::new()));
    }
    if blocks.is_empty() {
        let entry = provider::lookup(provider::DEFAULT_PROVIDER)?;
        blocks.insert(entry.name, (entry, entry.name.to_owned(), Mapping::new()));
    }

    for (name, (entry, _, block)) in blocks {
        let config = entry.resolve(&block, &server_name, wizard)?;
        ctx.parts.providers.insert(name.to_owned(), config);
    }
    Ok(())
}

// ── Aggregate invariants ──

/// Whole-aggregate check that reports every failing field at once.
fn check_invariants(parts: &ConfigParts) -> crate::Result<()> {
    let mut fields: Vec<String> = Vec::new();
    let mut reasons: Vec<String> = Vec::new();
    let mut fail = |names: &[&str], reason: &str| {
        fields.extend(names.iter().map(|n| (*n).to_owned()));
        reasons.push(reason.to_owned());
    };

    if parts.server_name.is_none() {
        fail(&["server_name"], "server name is unset");
    }
    if parts.server_file.is_some() == parts.server_command.is_some() {
        fail(
            &["server_file", "server_command"],
            "exactly one of server file and server command must be set",
        );
    }

    let python = parts.runtime == Some(Runtime::Python);
    let node = parts.runtime == Some(Runtime::Node);
    if parts.python_version.is_some() != python {
        fail(&["python_version"], "set iff runtime is python");
    }
    if parts.python_dependencies_file.is_some() != python {
        fail(&["python_dependencies_file"], "set iff runtime is python");
    }
    if parts.node_version.is_some() != node {
        fail(&["node_version"], "set iff runtime is node");
    }
    if parts.run_npm_build.is_some() != node {
        fail(&["run_npm_build"], "set iff runtime is node");
    }

    let forced = parts.command_type.and_then(CommandType::forced_runtime);
    if forced.is_some() && forced != parts.runtime {
        fail(&["runtime", "command_type"], "runtime contradicts the server file type");
    }
    if parts.providers.is_empty() {
        fail(&["providers"], "at least one provider must be configured");
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(Error::InconsistentConfiguration {
            fields,
            reason: reasons.join("; "),
        })
    }
}
