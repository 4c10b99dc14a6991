//! Untyped input bag and the external-key alias table.
//!
//! Config files and command-line flags speak in dash-separated keys
//! (`server-name`, `run-npm-build`, ...). Resolvers address fields through
//! [`Field`], which owns the mapping between the external key and the
//! internal snake_case identifier used in messages and serialized output.

use serde_yaml_ng::{Mapping, Value};

use crate::error::Error;

/// A top-level field accepted in `emsipi.yaml` / `emsipi.private.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ServerName,
    ServerFile,
    ServerCommand,
    ServerFileOrCommand,
    Runtime,
    PythonDependenciesFile,
    PythonVersion,
    NodeVersion,
    RunNpmBuild,
    EnvironmentVariables,
    Providers,
    Dockerfile,
}

/// `(field, external key, internal name)`
const FIELD_ALIASES: &[(Field, &str, &str)] = &[
    (Field::ServerName, "server-name", "server_name"),
    (Field::ServerFile, "server-file", "server_file"),
    (Field::ServerCommand, "server-command", "server_command"),
    (
        Field::ServerFileOrCommand,
        "server-file-or-command",
        "server_file_or_command",
    ),
    (Field::Runtime, "runtime", "runtime"),
    (
        Field::PythonDependenciesFile,
        "python-dependencies-file",
        "python_dependencies_file",
    ),
    (Field::PythonVersion, "python-version", "python_version"),
    (Field::NodeVersion, "node-version", "node_version"),
    (Field::RunNpmBuild, "run-npm-build", "run_npm_build"),
    (
        Field::EnvironmentVariables,
        "environment-variables",
        "environment_variables",
    ),
    (Field::Providers, "providers", "providers"),
    (Field::Dockerfile, "dockerfile", "dockerfile"),
];

impl Field {
    /// Dash-separated key used in config files.
    pub fn key(self) -> &'static str {
        FIELD_ALIASES
            .iter()
            .find(|(f, _, _)| *f == self)
            .map_or("", |(_, key, _)| key)
    }

    /// snake_case identifier used in messages and serialized output.
    pub fn name(self) -> &'static str {
        FIELD_ALIASES
            .iter()
            .find(|(f, _, _)| *f == self)
            .map_or("", |(_, _, name)| name)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        FIELD_ALIASES
            .iter()
            .find(|(_, k, _)| *k == key)
            .map(|(f, _, _)| *f)
    }

    pub fn known_keys() -> Vec<&'static str> {
        FIELD_ALIASES.iter().map(|(_, key, _)| *key).collect()
    }
}

/// Merged raw configuration: config files plus command-line overrides.
///
/// No typing or cross-field invariants are enforced here beyond rejecting
/// unknown top-level keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    values: Mapping,
}

impl RawInput {
    /// Wrap a merged mapping, rejecting keys outside the alias table.
    pub fn from_mapping(values: Mapping) -> crate::Result<Self> {
        for key in values.keys() {
            let known = key.as_str().and_then(Field::from_key);
            if known.is_none() {
                return Err(Error::UnknownField {
                    key: describe_key(key),
                    known: Field::known_keys(),
                });
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        self.values.get(field.key())
    }

    /// Override a field (command-line flags take precedence over files).
    pub fn set(&mut self, field: Field, value: impl Into<Value>) {
        self.values
            .insert(Value::String(field.key().to_owned()), value.into());
    }

    pub fn contains(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.values
    }

    /// Read a field that must be a YAML string when present.
    pub fn string(&self, field: Field) -> crate::Result<Option<String>> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Error::invalid(
                field.name(),
                describe_value(other),
                "expected a string",
            )),
        }
    }
}

/// Recursive merge: nested mappings combine key by key, anything else in
/// `overlay` replaces the `base` value wholesale.
pub fn deep_merge(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match value {
            Value::Mapping(incoming) => {
                if let Some(Value::Mapping(existing)) = base.get_mut(&key) {
                    deep_merge(existing, incoming);
                    continue;
                }
                base.insert(key, Value::Mapping(incoming));
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Drop every `null` value at every nesting level.
pub fn strip_nulls(values: Mapping) -> Mapping {
    values
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::Mapping(nested) => Some((key, Value::Mapping(strip_nulls(nested)))),
            other => Some((key, other)),
        })
        .collect()
}

pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(_) => "a list".to_owned(),
        Value::Mapping(_) => "a mapping".to_owned(),
        Value::Tagged(t) => format!("tagged value {}", t.tag),
    }
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => describe_value(other),
    }
}
