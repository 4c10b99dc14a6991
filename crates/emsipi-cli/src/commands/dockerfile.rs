use emsipi_build::write_dockerfile;

use crate::ResolveOptions;

pub fn dockerfile(
    server_file_or_command: Option<&str>,
    options: &ResolveOptions,
) -> anyhow::Result<()> {
    let config = super::resolve_config(None, server_file_or_command, options)?;

    match write_dockerfile(&config)? {
        Some(path) => println!("Generated {}", path.display()),
        None => println!(
            "Kept {} (no '# OVERWRITE:OK' marker on its first line)",
            config.dockerfile.display()
        ),
    }
    Ok(())
}
