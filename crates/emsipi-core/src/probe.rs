//! Filesystem signals used as evidence for auto-detection.
//!
//! Probing is best-effort: absence is a signal, and files that exist but
//! cannot be read or parsed degrade to "signal absent" instead of failing.

use std::io::BufRead;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::Error;
use crate::loader::ConfigFiles;
use crate::raw::{Field, RawInput};

/// First-line marker of a regenerable Dockerfile.
pub const OVERWRITE_MARKER: &str = "# OVERWRITE:OK";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

pub const UV_LOCK: &str = "uv.lock";
pub const PYPROJECT_TOML: &str = "pyproject.toml";
pub const REQUIREMENTS_TXT: &str = "requirements.txt";
pub const PACKAGE_JSON: &str = "package.json";

/// Flat bag of facts about the working directory. Immutable once probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbedSignals {
    pub server_file_exists: bool,
    pub uv_lock_present: bool,
    pub deps_in_pyproject: bool,
    pub requirements_txt_present: bool,
    pub any_python_config_file_present: bool,
    pub package_json_present: bool,
    /// Neither config file exists.
    pub do_generate_config_files: bool,
    /// Dockerfile absent, or present with [`OVERWRITE_MARKER`] on its first line.
    pub do_generate_dockerfile: bool,
}

impl ProbedSignals {
    /// Human-readable present/absent listing for inference error messages.
    pub fn describe(&self) -> String {
        let state = |present: bool| if present { "present" } else { "absent" };
        format!(
            "uv.lock: {}, requirements.txt: {}, pyproject.toml dependencies: {}, package.json: {}",
            state(self.uv_lock_present),
            state(self.requirements_txt_present),
            state(self.deps_in_pyproject),
            state(self.package_json_present),
        )
    }

    /// Present Python dependency files, highest priority first.
    pub fn python_dependency_files(&self) -> Vec<&'static str> {
        let mut files = Vec::new();
        if self.uv_lock_present {
            files.push(UV_LOCK);
        }
        if self.requirements_txt_present {
            files.push(REQUIREMENTS_TXT);
        }
        if self.deps_in_pyproject {
            files.push(PYPROJECT_TOML);
        }
        files
    }
}

/// Inspect `working_directory` for dependency manifests, config files and
/// the Dockerfile declared in `raw`.
pub fn probe(working_directory: &Path, files: &ConfigFiles, raw: &RawInput) -> ProbedSignals {
    let uv_lock_present = working_directory.join(UV_LOCK).is_file();
    let requirements_txt_present = working_directory.join(REQUIREMENTS_TXT).is_file();
    let deps_in_pyproject = pyproject_declares_dependencies(&working_directory.join(PYPROJECT_TOML));
    let package_json_present = working_directory.join(PACKAGE_JSON).is_file();

    let server_file_exists = declared_server_file(raw)
        .is_some_and(|file| absolutize(working_directory, Path::new(&file)).exists());

    let dockerfile = dockerfile_path(working_directory, raw);
    let do_generate_dockerfile = dockerfile_is_regenerable(&dockerfile);

    let signals = ProbedSignals {
        server_file_exists,
        uv_lock_present,
        deps_in_pyproject,
        requirements_txt_present,
        any_python_config_file_present: uv_lock_present
            || requirements_txt_present
            || deps_in_pyproject,
        package_json_present,
        do_generate_config_files: !files.any_present(),
        do_generate_dockerfile,
    };

    tracing::debug!(
        dir = %working_directory.display(),
        signals = %signals.describe(),
        generate_config = signals.do_generate_config_files,
        generate_dockerfile = signals.do_generate_dockerfile,
        "working directory probed"
    );

    signals
}

/// The Dockerfile path declared in config (default `./Dockerfile`), made
/// absolute against the working directory.
pub fn dockerfile_path(working_directory: &Path, raw: &RawInput) -> PathBuf {
    let declared = match raw.get(Field::Dockerfile) {
        Some(serde_yaml_ng::Value::String(path)) => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_DOCKERFILE),
    };
    absolutize(working_directory, &declared)
}

/// A missing Dockerfile may always be generated; an existing one only when
/// its first line carries [`OVERWRITE_MARKER`]. An unreadable Dockerfile is
/// treated as hand-edited.
pub fn dockerfile_is_regenerable(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    match read_first_line(path) {
        Ok(line) => line.contains(OVERWRITE_MARKER),
        Err(e) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "Dockerfile unreadable; treating marker as absent"
            );
            false
        }
    }
}

fn read_first_line(path: &Path) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut line = String::new();
    std::io::BufReader::new(file).read_line(&mut line)?;
    Ok(line)
}

fn pyproject_declares_dependencies(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match read_toml(path) {
        Ok(table) => table
            .get("project")
            .and_then(|p| p.get("dependencies"))
            .and_then(toml::Value::as_array)
            .is_some_and(|deps| !deps.is_empty()),
        Err(e) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "pyproject.toml unreadable; treating dependencies as absent"
            );
            false
        }
    }
}

/// The server file named by the command line (when it looks like a script)
/// or by `server-file` in config.
pub(crate) fn declared_server_file(raw: &RawInput) -> Option<String> {
    if let Some(serde_yaml_ng::Value::String(combined)) = raw.get(Field::ServerFileOrCommand) {
        return looks_like_script(combined).then(|| combined.clone());
    }
    match raw.get(Field::ServerFile) {
        Some(serde_yaml_ng::Value::String(file)) => Some(file.clone()),
        _ => None,
    }
}

pub(crate) fn looks_like_script(value: &str) -> bool {
    value.ends_with(".py") || value.ends_with(".js")
}

/// Read `requires-python` from a TOML manifest by key path.
///
/// Returns `Ok(None)` when the key is absent.
pub fn read_requires_python(path: &Path, keys: &[&str]) -> crate::Result<Option<String>> {
    let table = read_toml(path)?;
    let mut current: Option<&toml::Value> = None;
    for (i, key) in keys.iter().enumerate() {
        current = if i == 0 {
            table.get(*key)
        } else {
            match current {
                Some(toml::Value::Table(t)) => t.get(*key),
                _ => None,
            }
        };
    }
    match current {
        None => Ok(None),
        Some(toml::Value::String(specifier)) => Ok(Some(specifier.clone())),
        Some(other) => Err(Error::invalid(
            format!("{} in {}", keys.join("."), path.display()),
            other.to_string(),
            "expected a version specifier string",
        )),
    }
}

fn read_toml(path: &Path) -> crate::Result<toml::Table> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ManifestRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    content.parse::<toml::Table>().map_err(|e| Error::ManifestParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Join `path` onto `base` unless absolute, then fold `.` and `..` lexically.
/// The target may not exist yet, so symlinks are not resolved.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absolutize_folds_parent_components() {
        let base = Path::new("/work/project");
        assert_eq!(
            absolutize(base, Path::new("../outside.py")),
            PathBuf::from("/work/outside.py")
        );
        assert_eq!(
            absolutize(base, Path::new("./src/./app.py")),
            PathBuf::from("/work/project/src/app.py")
        );
        assert_eq!(
            absolutize(base, Path::new("/etc/app.py")),
            PathBuf::from("/etc/app.py")
        );
    }

    #[test]
    fn script_detection_uses_suffix_only() {
        assert!(looks_like_script("server.py"));
        assert!(looks_like_script("dist/index.js"));
        assert!(!looks_like_script("python server.py --port 8080"));
        assert!(!looks_like_script("npm start"));
    }

    #[test]
    fn requires_python_non_string_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("uv.lock");
        std::fs::write(&path, "requires-python = 3\n").unwrap();
        let err = read_requires_python(&path, &["requires-python"]).unwrap_err();
        assert!(err.to_string().contains("requires-python"), "got: {err}");
    }

    #[test]
    fn requires_python_nested_lookup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pyproject.toml");
        std::fs::write(
            &path,
            "[project]\nname = \"x\"\nrequires-python = \">=3.10\"\n",
        )
        .unwrap();
        let specifier = read_requires_python(&path, &["project", "requires-python"]).unwrap();
        assert_eq!(specifier.as_deref(), Some(">=3.10"));
        assert_eq!(read_requires_python(&path, &["tool", "requires-python"]).unwrap(), None);
    }
}
