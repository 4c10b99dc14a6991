use std::path::{Path, PathBuf};
use std::process::Command;

use emsipi_core::PRIVATE_CONFIG_FILE;

pub const BUNDLE_DIR: &str = ".emsipi-bundle";

/// Paths never copied into a bundle, regardless of .gitignore content.
const ALWAYS_EXCLUDED: &[&str] = &[BUNDLE_DIR, ".git", PRIVATE_CONFIG_FILE];

/// Assembles the build context for remote image builds.
///
/// Copies every file `git ls-files` reports (tracked plus untracked but not
/// ignored) into `.emsipi-bundle/`, then writes `dockerfile_content` as the
/// bundle's root `Dockerfile`.
pub fn create_bundle(
    working_directory: &Path,
    dockerfile_content: &str,
) -> Result<PathBuf, BundleError> {
    let bundle_dir = working_directory.join(BUNDLE_DIR);

    if bundle_dir.exists() {
        std::fs::remove_dir_all(&bundle_dir).map_err(|e| BundleError::Cleanup {
            path: bundle_dir.clone(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(&bundle_dir).map_err(|e| BundleError::Create {
        path: bundle_dir.clone(),
        source: e,
    })?;

    let files = git_ls_files(working_directory)?;
    let mut copied = 0usize;
    for relative_path in &files {
        if ALWAYS_EXCLUDED.iter().any(|ex| relative_path.starts_with(ex)) {
            continue;
        }

        let src = working_directory.join(relative_path);
        // ls-files still lists tracked files deleted from the worktree
        if !src.is_file() {
            continue;
        }
        let dst = bundle_dir.join(relative_path);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BundleError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::copy(&src, &dst).map_err(|e| BundleError::CopyFile {
            path: src,
            source: e,
        })?;
        copied += 1;
    }

    let dockerfile = bundle_dir.join("Dockerfile");
    std::fs::write(&dockerfile, dockerfile_content).map_err(|e| {
        BundleError::WriteDockerfile {
            path: dockerfile.clone(),
            source: e,
        }
    })?;

    tracing::debug!(bundle = %bundle_dir.display(), files = copied, "bundle created");
    Ok(bundle_dir)
}

/// Tracked files plus untracked files that are not ignored, relative to
/// `working_directory`.
fn git_ls_files(working_directory: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let output = Command::new("git")
        .args(["ls-files", "--cached", "--others", "--exclude-standard"])
        .current_dir(working_directory)
        .output()
        .map_err(|e| BundleError::GitCommand {
            detail: "failed to execute git ls-files".to_owned(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BundleError::GitFailed {
            detail: format!(
                "git ls-files exited with {}: {}",
                output.status,
                stderr.trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut files: Vec<PathBuf> = stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();
    files.dedup();
    Ok(files)
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to clean up bundle directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy file {path}")]
    CopyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("git command failed: {detail}")]
    GitCommand {
        detail: String,
        source: std::io::Error,
    },
    #[error("git failed; the working directory must be inside a git repository: {detail}")]
    GitFailed { detail: String },
}
