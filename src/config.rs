//! Configuration management

use std::{env, path::Path, path::PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
///
/// Immutable for the duration of a provisioning run. Loaded from an optional
/// YAML file merged with `PG_PROVISION_`-prefixed environment variables,
/// then overridden by CLI flags in `main`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Target cluster identification and layout
    pub cluster: ClusterConfig,
    /// Signing authority material
    pub ca: CaConfig,
    /// Rule template lookup
    pub templates: TemplateConfig,
    /// Root directory for per-instance working files (keys, CSRs, certs)
    pub work_root: PathBuf,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            env_files: Vec::new(),
            cluster: ClusterConfig::default(),
            ca: CaConfig::default(),
            templates: TemplateConfig::default(),
            work_root: PathBuf::from("/var/lib/pg-provision"),
        }
    }
}

/// Target PostgreSQL cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// PostgreSQL major version (e.g. "9.3"); selects the rule template
    pub version: String,
    /// Logical cluster/instance name (e.g. "prod1" or "main")
    pub instance: String,
    /// Root of the per-cluster configuration tree
    pub conf_root: PathBuf,
    /// Operating-system user owning the configuration tree after cleanup
    pub service_user: String,
    /// Operating-system group owning the configuration tree after cleanup
    pub service_group: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            instance: String::new(),
            conf_root: PathBuf::from("/etc/postgresql"),
            service_user: "postgres".to_string(),
            service_group: "postgres".to_string(),
        }
    }
}

/// Signing authority key and certificate paths (existing PEM material,
/// validity delegated to the openssl toolchain)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CaConfig {
    /// Path to the authority's private key
    pub key: PathBuf,
    /// Path to the authority's certificate (also the root of trust for
    /// client-certificate verification)
    pub cert: PathBuf,
}

/// Rule template lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory holding one `pg_hba-{version}.conf.template` per
    /// supported version
    pub directory: PathBuf,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/usr/share/pg-provision/templates"),
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from an optional YAML file and the environment.
    ///
    /// Environment variables use the `PG_PROVISION_` prefix with `__` as the
    /// section separator, e.g. `PG_PROVISION_CLUSTER__VERSION=9.3`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("PG_PROVISION_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        // Expand ${VAR} in path values
        config.expand_env_vars();

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in path-valued fields
    fn expand_env_vars(&mut self) {
        // Pattern: ${VAR} or ${VAR:-default}
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();

        for path in [
            &mut self.cluster.conf_root,
            &mut self.ca.key,
            &mut self.ca.cert,
            &mut self.templates.directory,
            &mut self.work_root,
        ] {
            let raw = path.to_string_lossy().into_owned();
            let expanded = Self::expand_string(&re, &raw);
            if expanded != raw {
                *path = PathBuf::from(expanded);
            }
        }
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_cluster_config_uses_conventional_roots() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.conf_root, PathBuf::from("/etc/postgresql"));
        assert_eq!(cfg.service_user, "postgres");
        assert_eq!(cfg.service_group, "postgres");
    }

    #[test]
    fn default_template_directory_is_shared_data_dir() {
        let cfg = TemplateConfig::default();
        assert_eq!(
            cfg.directory,
            PathBuf::from("/usr/share/pg-provision/templates")
        );
    }

    #[test]
    fn full_config_deserializes_from_yaml() {
        let yaml = r#"
cluster:
  version: "9.3"
  instance: prod1
  conf_root: /etc/postgresql
ca:
  key: /etc/ssl/private/authority.key
  cert: /etc/ssl/certs/authority.crt
templates:
  directory: /usr/share/pg-provision/templates
work_root: /var/lib/pg-provision
"#;
        let cfg: ProvisionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.cluster.version, "9.3");
        assert_eq!(cfg.cluster.instance, "prod1");
        assert_eq!(cfg.ca.key, PathBuf::from("/etc/ssl/private/authority.key"));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let yaml = "cluster:\n  version: \"9.3\"\n  instance: main";
        let cfg: ProvisionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.cluster.service_user, "postgres");
        assert!(cfg.env_files.is_empty());
    }

    #[test]
    fn expand_string_substitutes_env_var_with_default() {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
        let out = ProvisionConfig::expand_string(&re, "${PG_PROVISION_TEST_UNSET:-/fallback}/ca.key");
        assert_eq!(out, "/fallback/ca.key");
    }

    #[test]
    fn load_rejects_missing_config_file() {
        let err = ProvisionConfig::load(Some(Path::new("/nonexistent/pg-provision.yaml")))
            .unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
