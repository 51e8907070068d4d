//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// PostgreSQL host-based authentication and client-trust provisioning
#[derive(Parser, Debug)]
#[command(name = "pg-provision")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "PG_PROVISION_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// PostgreSQL major version of the target cluster (e.g. "9.3")
    #[arg(long, env = "PG_PROVISION_PG_VERSION", global = true)]
    pub pg_version: Option<String>,

    /// Logical cluster/instance name (e.g. "prod1")
    #[arg(long, env = "PG_PROVISION_INSTANCE", global = true)]
    pub instance: Option<String>,

    /// Path to the signing authority's private key
    #[arg(long, env = "PG_PROVISION_CA_KEY", global = true)]
    pub ca_key: Option<PathBuf>,

    /// Path to the signing authority's certificate (root of trust)
    #[arg(long, env = "PG_PROVISION_CA_CERT", global = true)]
    pub ca_cert: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "PG_PROVISION_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "PG_PROVISION_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to a full provisioning run)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full provisioning lifecycle (default)
    Run {
        /// Print the run report as JSON for auditing
        #[arg(long)]
        json: bool,

        /// Treat an unmet precondition as a failure instead of a deferral
        #[arg(long)]
        strict: bool,
    },

    /// Check preconditions only; exit 0 when the host is ready
    Check,
}
