use std::process::Stdio;

use crate::gcloud::GcloudError;

/// Seam between the deployment driver and the `gcloud` binary.
///
/// [`RealExecutor`] spawns the CLI; tests substitute a mockall mock.
#[allow(async_fn_in_trait)]
pub trait GcloudExecutor: Send + Sync {
    /// Run `gcloud <args>` and return its stdout.
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;

    /// Run `gcloud <args>` with output attached to the terminal.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError>;
}

/// Spawns the `gcloud` found on `PATH`.
pub struct RealExecutor;

impl GcloudExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError> {
        tracing::debug!(args = %args.join(" "), "gcloud");
        let output = tokio::process::Command::new("gcloud")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GcloudError::NotFound { source: e })?;

        if !output.status.success() {
            return Err(GcloudError::CommandFailed {
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|e| GcloudError::InvalidUtf8 { source: e })
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError> {
        tracing::debug!(args = %args.join(" "), "gcloud (streaming)");
        // stdout stays reserved for command results; build logs go to stderr
        let status = tokio::process::Command::new("gcloud")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| GcloudError::NotFound { source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(GcloudError::CommandFailed {
                args: args.to_vec(),
                stderr: format!("exit status: {status}"),
            })
        }
    }
}
