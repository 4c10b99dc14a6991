//! Provider registry: provider name -> config resolver.
//!
//! Each entry owns the schema of one `providers.<name>` block. Drivers in
//! `emsipi-cloud` dispatch on the resolved [`ProviderConfig`] variant.

use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};

use crate::error::Error;
use crate::prompt::Wizard;
use crate::raw::describe_value;

pub const DEFAULT_PROVIDER: &str = "google";
pub const DEFAULT_GOOGLE_REGION: &str = "us-central1";

/// Resolved settings for Google Cloud Run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoogleProviderConfig {
    pub project: String,
    pub region: String,
    pub artifact_registry: String,
    pub service_name: String,
}

/// Resolved provider block, one variant per registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Google(GoogleProviderConfig),
}

impl ProviderConfig {
    pub fn as_google(&self) -> Option<&GoogleProviderConfig> {
        match self {
            Self::Google(google) => Some(google),
        }
    }
}

type ResolveFn = fn(&Mapping, &str, &mut Wizard<'_>) -> crate::Result<ProviderConfig>;

/// One row of the provider capability table.
pub struct ProviderEntry {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    resolve: ResolveFn,
}

impl ProviderEntry {
    /// Resolve a raw `providers.<name>` block against the settled server name.
    pub(crate) fn resolve(
        &self,
        block: &Mapping,
        server_name: &str,
        wizard: &mut Wizard<'_>,
    ) -> crate::Result<ProviderConfig> {
        (self.resolve)(block, server_name, wizard)
    }
}

pub static PROVIDERS: &[ProviderEntry] = &[ProviderEntry {
    name: "google",
    aliases: &["gcp"],
    resolve: resolve_google,
}];

/// Find a provider by canonical name or alias.
pub fn lookup(name: &str) -> crate::Result<&'static ProviderEntry> {
    PROVIDERS
        .iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .ok_or_else(|| Error::UnknownProvider {
            name: name.to_owned(),
            available: available(),
        })
}

/// Canonical names and aliases, in registration order.
pub fn available() -> Vec<&'static str> {
    PROVIDERS
        .iter()
        .flat_map(|p| std::iter::once(p.name).chain(p.aliases.iter().copied()))
        .collect()
}

// ── Google ──

/// `(canonical key, accepted spellings)`
const GOOGLE_KEYS: &[(&str, &[&str])] = &[
    ("project", &["project"]),
    ("region", &["region"]),
    ("artifact_registry", &["artifact-registry", "artifact_registry"]),
    ("service_name", &["service-name", "service_name"]),
];

fn resolve_google(
    block: &Mapping,
    server_name: &str,
    wizard: &mut Wizard<'_>,
) -> crate::Result<ProviderConfig> {
    reject_unknown_keys("google", block, GOOGLE_KEYS)?;

    const PROJECT: &str = "providers.google.project";
    let project = match block_string(block, "google", "project")? {
        Some(project) => {
            let project = non_empty(PROJECT, &project)?;
            if wizard.is_active() {
                let confirmed = wizard.ask("google.project", Some(project.as_str()))?;
                non_empty(PROJECT, &confirmed)?
            } else {
                project
            }
        }
        None if wizard.is_active() => non_empty(PROJECT, &wizard.ask("google.project", None)?)?,
        None => {
            return Err(Error::missing(
                PROJECT,
                "set providers.google.project in emsipi.private.yaml",
            ));
        }
    };

    let region = match block_string(block, "google", "region")? {
        Some(region) => non_empty("providers.google.region", &region)?,
        None if wizard.is_active() => non_empty(
            "providers.google.region",
            &wizard.ask_default("google.region", DEFAULT_GOOGLE_REGION)?,
        )?,
        None => DEFAULT_GOOGLE_REGION.to_owned(),
    };

    let artifact_registry = defaulted(
        block,
        "artifact_registry",
        &format!("{server_name}-repo"),
        wizard,
    )?;
    let service_name = defaulted(block, "service_name", &format!("{server_name}-service"), wizard)?;

    Ok(ProviderConfig::Google(GoogleProviderConfig {
        project,
        region,
        artifact_registry,
        service_name,
    }))
}

/// Optional string with a server-name-derived default. Blank counts as unset.
fn defaulted(
    block: &Mapping,
    key: &str,
    default: &str,
    wizard: &mut Wizard<'_>,
) -> crate::Result<String> {
    let declared = block_string(block, "google", key)?
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());
    let prompt = format!("google.{key}");
    match declared {
        Some(value) if wizard.is_active() => wizard.ask(&prompt, Some(value.as_str())),
        Some(value) => Ok(value),
        None if wizard.is_active() => wizard.ask_default(&prompt, default),
        None => Ok(default.to_owned()),
    }
}

fn block_string(block: &Mapping, provider: &str, key: &str) -> crate::Result<Option<String>> {
    let spellings = GOOGLE_KEYS
        .iter()
        .find(|(canonical, _)| *canonical == key)
        .map_or(&[][..], |(_, spellings)| *spellings);
    let Some(value) = spellings.iter().find_map(|s| block.get(*s)) else {
        return Ok(None);
    };
    match value {
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(Error::invalid(
            format!("providers.{provider}.{key}"),
            describe_value(other),
            "expected a string",
        )),
    }
}

fn reject_unknown_keys(
    provider: &str,
    block: &Mapping,
    keys: &[(&'static str, &'static [&'static str])],
) -> crate::Result<()> {
    let accepted: Vec<&'static str> = keys.iter().flat_map(|(_, s)| s.iter().copied()).collect();
    for key in block.keys() {
        let known = key.as_str().is_some_and(|k| accepted.contains(&k));
        if !known {
            return Err(Error::UnknownField {
                key: format!("providers.{provider}.{}", describe_value(key)),
                known: accepted,
            });
        }
    }
    Ok(())
}

fn non_empty(field: &str, value: &str) -> crate::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyField {
            field: field.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}
