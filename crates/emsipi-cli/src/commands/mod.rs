mod config;
mod deploy;
mod dockerfile;

use std::io::IsTerminal;

use emsipi_build::scaffold;
use emsipi_core::{NonInteractive, Prompter, ResolveRequest, ResolvedConfig};

use crate::ResolveOptions;
use crate::terminal::TerminalPrompter;

pub use config::config;
pub use deploy::deploy;
pub use dockerfile::dockerfile;

/// Resolve the configuration for one command invocation.
///
/// Prompts only when stdin is a terminal and `--no-input` is absent. A
/// wizard run is persisted as config files so the next run is silent.
pub(crate) fn resolve_config(
    provider: Option<&str>,
    target: Option<&str>,
    options: &ResolveOptions,
) -> anyhow::Result<ResolvedConfig> {
    let interactive = !options.no_input && std::io::stdin().is_terminal();

    let mut request = ResolveRequest::new(&options.directory).interactive(interactive);
    if let Some(provider) = provider {
        request = request.provider(provider);
    }
    if let Some(target) = target {
        request = request.server_file_or_command(target);
    }
    if let Some(runtime) = &options.runtime {
        request = request.runtime(runtime);
    }
    if let Some(path) = &options.config {
        // Relative to where emsipi was invoked, not to --directory.
        request = request.config_path(std::env::current_dir()?.join(path));
    }

    let mut prompter: Box<dyn Prompter> = if interactive {
        Box::new(TerminalPrompter::new())
    } else {
        Box::new(NonInteractive)
    };
    let resolution = emsipi_core::resolve(&request, prompter.as_mut())?;
    let config = resolution.config;
    tracing::debug!(
        server = %config.server_name,
        runtime = ?config.runtime,
        warnings = resolution.warnings.len(),
        "configuration resolved"
    );

    if interactive && config.do_generate_config_files() {
        let written = scaffold::write_config_files(&config)?;
        eprintln!(
            "Saved answers to {} and {}",
            written.public.display(),
            written.private.display()
        );
    }
    Ok(config)
}
