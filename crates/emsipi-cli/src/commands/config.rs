use crate::ResolveOptions;

/// Print the resolved configuration as pretty JSON on stdout.
pub fn config(
    provider: &str,
    server_file_or_command: Option<&str>,
    options: &ResolveOptions,
) -> anyhow::Result<()> {
    let config = super::resolve_config(Some(provider), server_file_or_command, options)?;
    println!("{}", config.to_json()?);
    Ok(())
}
