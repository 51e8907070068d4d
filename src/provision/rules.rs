//! Fixed rule block, daemon identity, and path conventions
//!
//! The managed HBA entries are immutable data compiled into the binary; the
//! per-version template file on disk supplies header/defaults and gates
//! which PostgreSQL versions this tool supports.
//!
//! References:
//! - <https://tools.ietf.org/html/rfc1918#section-3>
//! - <https://www.postgresql.org/docs/9.3/static/auth-pg-hba-conf.html>
//! - <https://www.postgresql.org/docs/9.3/static/auth-methods.html#AUTH-CERT>

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Service account the client certificate identifies
pub const DAEMON_ACCOUNT: &str = "pgdaemon";

/// Fixed certificate subject for the daemon account
pub const CERT_SUBJECT: &str = "/O=pg-provision/OU=postgres/CN=pgdaemon";

/// Managed HBA entries, appended verbatim after the existing rules.
///
/// Order matters: PostgreSQL evaluates pg_hba.conf top-down, so these never
/// shadow a pre-existing rule. The commented-out catch-all stays last so an
/// operator can opt the host into world access with a one-character edit.
pub const HBA_RULE_BLOCK: &[&str] = &[
    "# pg-provision managed entries (auto-generated)",
    "# ===================================================",
    "# allow the \"pgdaemon\" service account from anywhere, but require a",
    "# matching ssl client cert for this privilege to even be considered.",
    "local      all             pgdaemon                                cert clientcert=1",
    "hostssl    all             pgdaemon        0.0.0.0/0               cert clientcert=1",
    "# internal networks (rfc1918)",
    "hostssl    all             all             10.0.0.0/8              md5",
    "hostssl    all             all             172.16.0.0/12           md5",
    "hostssl    all             all             192.168.0.0/16          md5",
    "# operations network (remote maintenance)",
    "hostssl    all             all             .ops.internal           md5",
    "hostssl    all             all             100.64.0.0/10           md5",
    "# world",
    "#hostssl   all             all             0.0.0.0/0               md5",
];

/// Validate an identifier used as a single filesystem path segment.
pub fn validate_segment(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Config(format!("{name} must not be empty")));
    }
    if value.contains(['/', '\0']) || value == "." || value == ".." {
        return Err(Error::Config(format!(
            "{name} '{value}' is not usable as a path segment"
        )));
    }
    Ok(())
}

/// Expected absolute path of the access-control file for a cluster.
pub fn hba_path(conf_root: &Path, version: &str, instance: &str) -> PathBuf {
    conf_root.join(version).join(instance).join("pg_hba.conf")
}

/// Version/instance-scoped working directory for certificate material.
pub fn ssl_dir(work_root: &Path, version: &str, instance: &str) -> PathBuf {
    work_root.join(version).join(instance).join("ssl")
}

/// Path of the rule template for `version` under `directory`.
pub fn template_path(directory: &Path, version: &str) -> PathBuf {
    directory.join(format!("pg_hba-{version}.conf.template"))
}

/// Load the rule template for `version`, split into lines.
///
/// # Errors
///
/// Returns [`Error::TemplateNotFound`] when no template file exists for the
/// exact version string.
pub async fn load_template(directory: &Path, version: &str) -> Result<Vec<String>> {
    let path = template_path(directory, version);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(content.split('\n').map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::TemplateNotFound {
            version: version.to_string(),
            path,
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rule_block_ends_with_commented_out_catch_all() {
        let last = HBA_RULE_BLOCK.last().unwrap();
        assert!(last.starts_with('#'));
        assert!(last.contains("0.0.0.0/0"));
    }

    #[test]
    fn rule_block_grants_daemon_account_cert_only_access() {
        let daemon_rules: Vec<&&str> = HBA_RULE_BLOCK
            .iter()
            .filter(|l| !l.starts_with('#') && l.contains(DAEMON_ACCOUNT))
            .collect();
        assert_eq!(daemon_rules.len(), 2);
        for rule in daemon_rules {
            assert!(rule.contains("cert clientcert=1"));
        }
    }

    #[test]
    fn rule_block_covers_all_rfc1918_ranges() {
        let joined = HBA_RULE_BLOCK.join("\n");
        for range in ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"] {
            assert!(joined.contains(range), "missing {range}");
        }
    }

    #[test]
    fn hba_path_follows_debian_cluster_layout() {
        let path = hba_path(Path::new("/etc/postgresql"), "9.3", "prod1");
        assert_eq!(path, PathBuf::from("/etc/postgresql/9.3/prod1/pg_hba.conf"));
    }

    #[test]
    fn template_path_substitutes_exact_version_string() {
        let path = template_path(Path::new("/usr/share/pg-provision/templates"), "9.3");
        assert_eq!(
            path,
            PathBuf::from("/usr/share/pg-provision/templates/pg_hba-9.3.conf.template")
        );
    }

    #[test]
    fn validate_segment_rejects_empty_and_traversal() {
        assert!(validate_segment("version", "9.3").is_ok());
        assert!(validate_segment("version", "").is_err());
        assert!(validate_segment("instance", "a/b").is_err());
        assert!(validate_segment("instance", "..").is_err());
    }

    #[tokio::test]
    async fn load_template_reports_template_not_found_for_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_template(dir.path(), "8.4").await.unwrap_err();
        match err {
            Error::TemplateNotFound { version, .. } => assert_eq!(version, "8.4"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn load_template_splits_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            template_path(dir.path(), "9.3"),
            "# defaults\nlocal all postgres peer\n",
        )
        .unwrap();
        let lines = load_template(dir.path(), "9.3").await.unwrap();
        assert_eq!(lines[0], "# defaults");
        assert_eq!(lines[1], "local all postgres peer");
    }
}
