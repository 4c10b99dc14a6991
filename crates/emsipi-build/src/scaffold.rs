//! Persist a wizard-resolved configuration as `emsipi.yaml` +
//! `emsipi.private.yaml`, so the next invocation runs non-interactively.
//!
//! Provider blocks carry account identifiers and go to the private file;
//! everything else is public.

use std::path::{Path, PathBuf};

use emsipi_core::{
    PRIVATE_CONFIG_FILE, ProviderConfig, PUBLIC_CONFIG_FILE, ResolvedConfig,
    probe::DEFAULT_DOCKERFILE,
};
use serde_yaml_ng::{Mapping, Value};

/// Paths of the two written files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scaffolded {
    pub public: PathBuf,
    pub private: PathBuf,
}

/// Write both config files into `config.working_directory`.
///
/// Refuses to touch either file if one already exists.
pub fn write_config_files(config: &ResolvedConfig) -> Result<Scaffolded, ScaffoldError> {
    let public = config.working_directory.join(PUBLIC_CONFIG_FILE);
    let private = config.working_directory.join(PRIVATE_CONFIG_FILE);
    for path in [&public, &private] {
        if path.exists() {
            return Err(ScaffoldError::AlreadyExists(path.clone()));
        }
    }

    write_yaml(&public, &public_document(config))?;
    write_yaml(&private, &private_document(config))?;

    tracing::info!(
        public = %public.display(),
        private = %private.display(),
        "wrote config files"
    );
    Ok(Scaffolded { public, private })
}

/// Public half: every field except provider blocks.
pub fn public_document(config: &ResolvedConfig) -> Mapping {
    let mut doc = Mapping::new();
    insert(&mut doc, "server-name", config.server_name.as_str());
    match config.target.server_file() {
        Some(path) => insert(&mut doc, "server-file", path.to_string_lossy().replace('\\', "/")),
        None => {
            if let Some(command) = config.target.server_command() {
                insert(&mut doc, "server-command", command);
            }
        }
    }
    insert(&mut doc, "runtime", config.runtime.as_str());
    if let Some(source) = config.python_dependencies_file {
        insert(&mut doc, "python-dependencies-file", source.file_name());
    }
    if let Some(version) = &config.python_version {
        insert(&mut doc, "python-version", version.as_str());
    }
    if let Some(version) = &config.node_version {
        insert(&mut doc, "node-version", version.as_str());
    }
    if let Some(build) = config.run_npm_build {
        insert(&mut doc, "run-npm-build", build);
    }

    let dockerfile = config.dockerfile_relative();
    if dockerfile != Path::new(DEFAULT_DOCKERFILE) {
        insert(&mut doc, "dockerfile", dockerfile.to_string_lossy().replace('\\', "/"));
    }

    if let Some(vars) = &config.environment_variables {
        let vars: Mapping = vars
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
            .collect();
        insert(&mut doc, "environment-variables", vars);
    }
    doc
}

/// Private half: the `providers` table.
pub fn private_document(config: &ResolvedConfig) -> Mapping {
    let providers: Mapping = config
        .providers
        .iter()
        .map(|(name, provider)| (Value::from(name.as_str()), Value::Mapping(provider_block(provider))))
        .collect();
    let mut doc = Mapping::new();
    insert(&mut doc, "providers", providers);
    doc
}

fn provider_block(provider: &ProviderConfig) -> Mapping {
    match provider {
        ProviderConfig::Google(google) => {
            let mut block = Mapping::new();
            insert(&mut block, "project", google.project.as_str());
            insert(&mut block, "region", google.region.as_str());
            insert(&mut block, "artifact-registry", google.artifact_registry.as_str());
            insert(&mut block, "service-name", google.service_name.as_str());
            block
        }
    }
}

fn insert(doc: &mut Mapping, key: &str, value: impl Into<Value>) {
    doc.insert(Value::from(key), value.into());
}

fn write_yaml(path: &Path, doc: &Mapping) -> Result<(), ScaffoldError> {
    let content = serde_yaml_ng::to_string(doc).map_err(|e| ScaffoldError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, content).map_err(|e| ScaffoldError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("{0} already exists; edit it directly or delete it to regenerate")]
    AlreadyExists(PathBuf),
    #[error("failed to serialize {path}")]
    Serialize {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
