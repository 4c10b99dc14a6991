//! Deployment drivers for emsipi.
//!
//! [`driver::deploy`] picks the driver for the selected provider and runs
//! it against an already assembled build context. Every cloud call goes
//! through a [`GcloudExecutor`], so the whole pipeline runs against mocks in
//! tests.

pub mod client;
pub mod driver;
pub mod executor;
pub mod gcloud;

pub use client::{CloudBuildError, DeployError, GcloudClient, PreflightError, PreflightReport};
pub use driver::{DeployOutcome, DriverError, deploy};
pub use executor::{GcloudExecutor, RealExecutor};
pub use gcloud::GcloudError;
