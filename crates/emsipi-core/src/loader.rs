use std::path::{Path, PathBuf};

use serde_yaml_ng::{Mapping, Value};

use crate::error::Error;
use crate::raw::{self, RawInput};

pub const PUBLIC_CONFIG_FILE: &str = "emsipi.yaml";
pub const PRIVATE_CONFIG_FILE: &str = "emsipi.private.yaml";

/// Location of the public/private config file pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFiles {
    pub public: PathBuf,
    pub private: PathBuf,
    /// Set when the public path was given on the command line.
    pub explicit: bool,
}

impl ConfigFiles {
    /// Default file names inside the working directory.
    pub fn discover(working_directory: &Path) -> Self {
        Self {
            public: working_directory.join(PUBLIC_CONFIG_FILE),
            private: working_directory.join(PRIVATE_CONFIG_FILE),
            explicit: false,
        }
    }

    /// An explicit public file; its private sibling shares the stem
    /// (`deploy.yaml` -> `deploy.private.yaml`).
    pub fn explicit(public: &Path) -> Self {
        Self {
            public: public.to_path_buf(),
            private: public.with_extension("private.yaml"),
            explicit: true,
        }
    }

    pub fn any_present(&self) -> bool {
        self.public.is_file() || self.private.is_file()
    }
}

/// Load and merge `emsipi.yaml` + `emsipi.private.yaml` from `working_directory`.
pub fn load(working_directory: &Path) -> crate::Result<RawInput> {
    load_files(&ConfigFiles::discover(working_directory))
}

/// Load and merge a config file pair. The private file wins on conflicts.
///
/// # Errors
///
/// - [`Error::ConfigNotFound`] if an explicit public file is missing
/// - [`Error::ConfigParse`] / [`Error::ConfigShape`] if a present file is not a YAML mapping
/// - [`Error::UnknownField`] if the merged document has an unrecognized top-level key
pub fn load_files(files: &ConfigFiles) -> crate::Result<RawInput> {
    if files.explicit && !files.public.is_file() {
        return Err(Error::ConfigNotFound {
            path: files.public.clone(),
        });
    }

    let mut merged = read_mapping(&files.public)?;
    let private = read_mapping(&files.private)?;
    raw::deep_merge(&mut merged, private);

    tracing::debug!(
        public = %files.public.display(),
        private = %files.private.display(),
        keys = merged.len(),
        "config files merged"
    );

    RawInput::from_mapping(raw::strip_nulls(merged))
}

fn read_mapping(path: &Path) -> crate::Result<Mapping> {
    if !path.is_file() {
        return Ok(Mapping::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml_ng::from_str(&content).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Err(Error::ConfigShape {
            path: path.to_path_buf(),
            found: "a scalar",
        }),
        Value::Sequence(_) => Err(Error::ConfigShape {
            path: path.to_path_buf(),
            found: "a list",
        }),
        Value::Tagged(_) => Err(Error::ConfigShape {
            path: path.to_path_buf(),
            found: "a tagged value",
        }),
    }
}
