//! Error types for pg-provision

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pg-provision
pub type Result<T> = std::result::Result<T, Error>;

/// Provisioning errors
///
/// An absent precondition is deliberately *not* represented here: the
/// runner reports it as a deferred outcome and leaves the skip/fail/wait
/// decision to the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No rule template exists for the requested PostgreSQL version
    #[error("No pg_hba rule template for version '{version}' (looked for {})", path.display())]
    TemplateNotFound {
        /// Requested PostgreSQL version
        version: String,
        /// Path that was probed
        path: PathBuf,
    },

    /// Rule merge attempted but the target pg_hba.conf does not exist
    #[error("Target access-control file missing: {}", .0.display())]
    TargetMissing(PathBuf),

    /// An external tool exited with a non-zero status
    #[error("'{program}' exited with status {status}: {stderr}")]
    ToolInvocation {
        /// Program that was invoked
        program: String,
        /// Exit status reported by the tool
        status: i32,
        /// Captured standard error
        stderr: String,
    },

    /// The issued client certificate does not chain to the trusted root
    /// for the client-authentication purpose
    #[error("Failed to verify client certificate for '{identity}' against the root of trust")]
    TrustRejected {
        /// Service account whose certificate was rejected
        identity: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_rejected_message_names_the_identity() {
        let err = Error::TrustRejected {
            identity: "pgdaemon".to_string(),
        };
        assert!(err.to_string().contains("pgdaemon"));
    }

    #[test]
    fn tool_invocation_message_carries_status_and_stderr() {
        let err = Error::ToolInvocation {
            program: "openssl".to_string(),
            status: 2,
            stderr: "unable to load CA".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("openssl"));
        assert!(msg.contains('2'));
        assert!(msg.contains("unable to load CA"));
    }

    #[test]
    fn template_not_found_message_carries_version() {
        let err = Error::TemplateNotFound {
            version: "9.3".to_string(),
            path: PathBuf::from("/usr/share/pg-provision/templates/pg_hba-9.3.conf.template"),
        };
        assert!(err.to_string().contains("9.3"));
    }
}
