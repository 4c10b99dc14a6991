use emsipi_build::bundle;
use emsipi_build::dockerfile::{load_dockerfile, write_dockerfile};
use emsipi_cloud::{GcloudClient, driver};

use crate::ResolveOptions;

/// Resolve, write the Dockerfile, bundle the build context and hand it to
/// the provider's driver.
pub async fn deploy(
    provider: &str,
    server_file_or_command: &str,
    options: &ResolveOptions,
) -> anyhow::Result<()> {
    let config = super::resolve_config(Some(provider), Some(server_file_or_command), options)?;

    if let Some(path) = write_dockerfile(&config)? {
        println!("Generated {}", path.display());
    } else {
        println!("Using existing {}", config.dockerfile.display());
    }
    let dockerfile = load_dockerfile(&config)?;

    println!("Bundling source...");
    let bundle_dir = bundle::create_bundle(&config.working_directory, &dockerfile)?;
    tracing::debug!(bundle = %bundle_dir.display(), "build context ready");

    println!("Deploying '{}' to {provider}...", config.server_name);
    let client = GcloudClient::new();
    let outcome = driver::deploy(&client, &config, provider, &bundle_dir).await?;

    for step in &outcome.steps {
        println!("  {step}");
    }
    println!();
    println!("Service URL: {}", outcome.url);
    Ok(())
}
