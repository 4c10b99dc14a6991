//! Build artifacts for emsipi: Dockerfile, config scaffolding, build context.
//!
//! # Deploy pipeline
//!
//! ```text
//! emsipi deploy <provider> <target>
//!   1. Resolve     ── emsipi_core::resolve()
//!   2. Scaffold    ── emsipi.yaml + emsipi.private.yaml (wizard runs only)
//!   3. Dockerfile  ── DockerfileGenerator::render(), written unless hand-edited
//!   4. Bundle      ── git ls-files → .emsipi-bundle/ with the Dockerfile at its root
//!   5. Deploy      ── emsipi_cloud driver for the selected provider
//! ```
//!
//! # Dockerfile ownership
//!
//! A generated Dockerfile always starts with `# OVERWRITE:OK`. Removing that
//! line hands the file over to the user; emsipi then builds from it as is.

pub mod bundle;
pub mod dockerfile;
pub mod scaffold;

pub use dockerfile::{DockerfileGenerator, write_dockerfile};
