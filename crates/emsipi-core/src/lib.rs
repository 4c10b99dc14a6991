//! Configuration inference engine for emsipi.
//!
//! Turns the `emsipi.yaml` / `emsipi.private.yaml` pair, command-line
//! overrides, filesystem signals and (in generate mode) wizard answers into
//! one fully resolved [`ResolvedConfig`], or a precise [`Error`].
//!
//! ```no_run
//! use emsipi_core::{NonInteractive, ResolveRequest, resolve};
//!
//! let request = ResolveRequest::new(".").server_file_or_command("server.py");
//! let resolution = resolve(&request, &mut NonInteractive)?;
//! println!("{}", resolution.config.to_json()?);
//! # Ok::<(), emsipi_core::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod probe;
pub mod prompt;
pub mod provider;
pub mod raw;
pub mod resolve;
pub mod version;

pub use config::{
    CommandTarget, CommandType, ConfigDocument, PythonDependencySource, Resolution,
    ResolvedConfig, Runtime, ScriptKind,
};
pub use error::{Error, ErrorKind, Result};
pub use loader::{ConfigFiles, PRIVATE_CONFIG_FILE, PUBLIC_CONFIG_FILE};
pub use probe::{OVERWRITE_MARKER, ProbedSignals};
pub use prompt::{NonInteractive, Prompter};
pub use provider::{GoogleProviderConfig, ProviderConfig};
pub use resolve::{ResolveRequest, resolve};
