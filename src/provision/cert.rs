//! Client certificate issuance and trust verification
//!
//! Issues an unencrypted key, a CSR, and a CA-signed client certificate for
//! the fixed `pgdaemon` identity, all via the external `openssl` toolchain.
//! The coda verifies the issued certificate against the root of trust for
//! the TLS client-authentication purpose and, only then, normalizes
//! ownership of the configuration tree. A rejected certificate aborts the
//! task before any ownership change.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::exec::ExecOutput;
use crate::provision::rules::{self, CERT_SUBJECT, DAEMON_ACCOUNT};
use crate::provision::{ProvisionContext, ProvisionStep, StepReport};
use crate::{Error, Result};

/// Key file name inside the ssl working directory
pub const KEY_FILE: &str = "pgdaemon.key";
/// CSR file name inside the ssl working directory
pub const CSR_FILE: &str = "pgdaemon.csr";
/// Certificate file name inside the ssl working directory
pub const CERT_FILE: &str = "pgdaemon.crt";

/// Certificate issuance and trust-verification step.
pub struct CertStep;

impl CertStep {
    fn ssl_dir(ctx: &ProvisionContext<'_>) -> PathBuf {
        let cluster = &ctx.config.cluster;
        rules::ssl_dir(&ctx.config.work_root, &cluster.version, &cluster.instance)
    }

    /// Raise [`Error::ToolInvocation`] for a non-zero tool status.
    ///
    /// Issuance itself returns raw outputs; this is the lifecycle-caller
    /// policy that treats any non-zero status as fatal.
    fn ensure_success(output: &ExecOutput) -> Result<()> {
        if output.success() {
            return Ok(());
        }
        Err(Error::ToolInvocation {
            program: output.program.clone(),
            status: output.status,
            stderr: output.stderr.clone(),
        })
    }
}

#[async_trait]
impl ProvisionStep for CertStep {
    fn name(&self) -> &'static str {
        "client-cert"
    }

    /// Issuance has no host precondition of its own; CA material validity
    /// is delegated entirely to the openssl toolchain at apply time.
    async fn check_ready(&self, _ctx: &ProvisionContext<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Generate key + CSR for the fixed subject, then sign the request
    /// against the configured authority.
    async fn apply(&self, ctx: &ProvisionContext<'_>) -> Result<StepReport> {
        let workdir = Self::ssl_dir(ctx);
        tokio::fs::create_dir_all(&workdir).await?;
        debug!(workdir = %workdir.display(), "ssl working directory ready");

        let csr = ctx
            .executor
            .run(
                "openssl",
                &[
                    "req".to_string(),
                    "-new".to_string(),
                    "-nodes".to_string(),
                    "-keyout".to_string(),
                    KEY_FILE.to_string(),
                    "-out".to_string(),
                    CSR_FILE.to_string(),
                    "-subj".to_string(),
                    CERT_SUBJECT.to_string(),
                ],
                Some(&workdir),
            )
            .await?;
        Self::ensure_success(&csr)?;

        // -CAcreateserial: the authority's serial counter file is created
        // on first use and shared across issuances.
        let crt = ctx
            .executor
            .run(
                "openssl",
                &[
                    "x509".to_string(),
                    "-req".to_string(),
                    "-CAcreateserial".to_string(),
                    "-in".to_string(),
                    CSR_FILE.to_string(),
                    "-CAkey".to_string(),
                    ctx.config.ca.key.display().to_string(),
                    "-CA".to_string(),
                    ctx.config.ca.cert.display().to_string(),
                    "-out".to_string(),
                    CERT_FILE.to_string(),
                ],
                Some(&workdir),
            )
            .await?;
        Self::ensure_success(&crt)?;

        info!(identity = DAEMON_ACCOUNT, workdir = %workdir.display(), "client certificate issued");
        Ok(StepReport::commands("client-cert", vec![csr, crt]))
    }

    /// Verify the issued certificate for client authentication; chown the
    /// configuration tree only on success.
    async fn finalize(&self, ctx: &ProvisionContext<'_>) -> Result<()> {
        let workdir = Self::ssl_dir(ctx);

        let verdict = ctx
            .executor
            .run(
                "openssl",
                &[
                    "verify".to_string(),
                    "-CAfile".to_string(),
                    ctx.config.ca.cert.display().to_string(),
                    "-purpose".to_string(),
                    "sslclient".to_string(),
                    CERT_FILE.to_string(),
                ],
                Some(&workdir),
            )
            .await?;

        if !verdict.success() {
            return Err(Error::TrustRejected {
                identity: DAEMON_ACCOUNT.to_string(),
            });
        }
        info!(identity = DAEMON_ACCOUNT, "client certificate verified against root of trust");

        let conf_root: &Path = &ctx.config.cluster.conf_root;
        let chown = ctx
            .executor
            .run(
                "chown",
                &[
                    "-R".to_string(),
                    format!(
                        "{}:{}",
                        ctx.config.cluster.service_user, ctx.config.cluster.service_group
                    ),
                    conf_root.display().to_string(),
                ],
                None,
            )
            .await?;
        Self::ensure_success(&chown)?;

        info!(conf_root = %conf_root.display(), "configuration tree ownership normalized");
        Ok(())
    }
}
