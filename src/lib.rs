//! pg-provision — PostgreSQL host-based authentication and client-trust provisioning
//!
//! One step of a larger automated deployment pipeline. A single run:
//!
//! 1. Checks the target cluster's `pg_hba.conf` exists (precondition)
//! 2. Appends the managed host-based authentication rule block to it
//! 3. Issues a CA-signed client certificate for the `pgdaemon` service account
//! 4. Verifies the certificate chains to the root of trust for client
//!    authentication, then normalizes ownership of the configuration tree
//!
//! Execution is strictly sequential; the external orchestrator owns retries
//! and fleet-level serialization. External cryptographic and filesystem
//! tooling is reached through the [`exec::CommandExecutor`] seam so tests can
//! substitute a fake and assert exact invocations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod provision;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
