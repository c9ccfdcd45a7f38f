use crate::environment::{Environment, EnvironmentRegistry};
use crate::hosts;
use crate::http::{HttpSettings, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration loaded from ~/.config/ftm/config.toml
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Operator login defaults
    #[serde(default)]
    pub auth: AuthConfig,

    /// Transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-environment endpoint overrides, keyed by environment name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentOverride>,

    /// Hosts-file entry for the identity provider
    #[serde(default)]
    pub hosts: HostsConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Default username (without the mail domain)
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Accept self-signed certificates on token and feature endpoints
    pub insecure_skip_verify: bool,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            insecure_skip_verify: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentOverride {
    pub token_url: String,
    pub feature_url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Line to ensure in the hosts file
    pub entry: Option<String>,

    /// Hosts file location (default: platform hosts file)
    pub path: Option<PathBuf>,
}

impl CliConfig {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ftm").join("config.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                eprintln!("Warning: Failed to read config: {}", e);
                Self::default()
            }
        }
    }

    /// Parse config text, falling back to defaults on error
    pub fn parse(content: &str) -> Self {
        toml::from_str(content).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config: {}", e);
            Self::default()
        })
    }

    /// Save config to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = Self::config_path() else {
            return Err("Could not determine config directory".into());
        };

        // Create directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            insecure_skip_verify: self.http.insecure_skip_verify,
            timeout: Duration::from_secs(self.http.timeout_secs),
        }
    }

    /// Compiled-in environment table with the configured overrides applied.
    ///
    /// Overrides for unknown environment names are skipped with a warning.
    pub fn registry(&self) -> EnvironmentRegistry {
        let mut registry = EnvironmentRegistry::builtin();
        for (key, endpoints) in &self.environments {
            match key.parse::<Environment>() {
                Ok(env) => {
                    tracing::debug!(environment = %env, "applying endpoint override");
                    registry = registry.with_override(
                        env,
                        endpoints.token_url.clone(),
                        endpoints.feature_url.clone(),
                    );
                }
                Err(e) => {
                    tracing::warn!("ignoring [environments.{}] override: {}", key, e);
                }
            }
        }
        registry
    }

    pub fn default_username(&self) -> Option<String> {
        self.auth
            .username
            .clone()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn hosts_entry(&self) -> String {
        self.hosts
            .entry
            .clone()
            .unwrap_or_else(|| hosts::DEFAULT_ENTRY.to_string())
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.hosts
            .path
            .clone()
            .unwrap_or_else(hosts::default_hosts_path)
    }
}

/// Generate a sample config file content
pub fn sample_config() -> &'static str {
    r#"# Feature Toggle Manager configuration
# Location: ~/.config/ftm/config.toml

[auth]
# Default username (without the mail domain)
# username = "Ivan.Ivanov"

[http]
# The internal token and feature endpoints use self-signed certificates.
# Set to false to require valid certificates.
insecure_skip_verify = true
timeout_secs = 30

# Endpoint overrides (the built-in table is used for anything not listed)
# [environments.dev]
# token_url = "https://kc-dev-omni.x5.ru/auth/realms/feature-toggle-management-tf/protocol/openid-connect/token"
# feature_url = "https://feature-toggle-management-pp-dev.k8s.5post-stage-2.salt.x5.ru/api/v1/feature"

[hosts]
# entry = "193.232.108.20 kc-omni.x5.ru"
# path = "/etc/hosts"
"#
}
