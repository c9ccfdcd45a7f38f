use crate::error::FtmError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Deployment environment a feature operation can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Environment {
    Dev,
    Test,
    Preprod,
    Stage,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 5] = [
        Environment::Dev,
        Environment::Test,
        Environment::Preprod,
        Environment::Stage,
        Environment::Prod,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Preprod => "preprod",
            Environment::Stage => "stage",
            Environment::Prod => "prod",
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Prod
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = FtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| FtmError::UnknownEnvironment(s.to_string()))
    }
}

/// Endpoints of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub key: Environment,
    /// OpenID Connect token endpoint
    pub token_url: String,
    /// Base URL of the feature API (`.../api/v1/feature`)
    pub feature_url: String,
}

const BUILTIN: [(Environment, &str, &str); 5] = [
    (
        Environment::Dev,
        "https://kc-dev-omni.x5.ru/auth/realms/feature-toggle-management-tf/protocol/openid-connect/token",
        "https://feature-toggle-management-pp-dev.k8s.5post-stage-2.salt.x5.ru/api/v1/feature",
    ),
    (
        Environment::Test,
        "https://kc-test-omni.x5.ru/auth/realms/feature-toggle-management-tf/protocol/openid-connect/token",
        "https://feature-toggle-management-pp-test.k8s.5post-stage-2.salt.x5.ru/api/v1/feature",
    ),
    (
        Environment::Preprod,
        "https://kc-preprod-omni.x5.ru/auth/realms/feature-toggle-management-tf/protocol/openid-connect/token",
        "https://feature-toggle-management.k8s.5post-stage-2.salt.x5.ru/api/v1/feature",
    ),
    (
        Environment::Stage,
        "https://kc-stage-omni.x5.ru/auth/realms/feature-toggle-management-tf/protocol/openid-connect/token",
        "https://feature-toggle-management.k8s.5post-stage-1.salt.x5.ru/api/v1/feature",
    ),
    (
        Environment::Prod,
        "https://kc-omni.x5.ru/auth/realms/feature-toggle-management-tf/protocol/openid-connect/token",
        "https://feature-toggle-management-pp-prod.k8s.5post-stage-2.salt.x5.ru/api/v1/feature",
    ),
];

/// Read-only table of environment endpoints.
///
/// Built once at start-up (compiled-in table plus optional overrides from the
/// local config) and shared behind an `Arc` by every dispatch.
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    entries: BTreeMap<Environment, EnvironmentConfig>,
}

impl EnvironmentRegistry {
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(key, token_url, feature_url)| {
                (
                    *key,
                    EnvironmentConfig {
                        key: *key,
                        token_url: (*token_url).to_string(),
                        feature_url: (*feature_url).to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Replace the endpoints of one environment.
    pub fn with_override(
        mut self,
        key: Environment,
        token_url: impl Into<String>,
        feature_url: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            key,
            EnvironmentConfig {
                key,
                token_url: token_url.into(),
                feature_url: feature_url.into(),
            },
        );
        self
    }

    pub fn lookup(&self, key: &str) -> Result<&EnvironmentConfig, FtmError> {
        let env = key.parse::<Environment>()?;
        self.get(env)
            .ok_or_else(|| FtmError::UnknownEnvironment(key.to_string()))
    }

    pub fn get(&self, env: Environment) -> Option<&EnvironmentConfig> {
        self.entries.get(&env)
    }

    /// Entries in canonical order (dev → prod).
    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentConfig> {
        self.entries.values()
    }
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_builtin_urls_for_every_key() {
        let registry = EnvironmentRegistry::builtin();
        for (key, token_url, feature_url) in BUILTIN {
            let cfg = registry.lookup(key.as_str()).unwrap();
            assert_eq!(cfg.key, key);
            assert_eq!(cfg.token_url, token_url);
            assert_eq!(cfg.feature_url, feature_url);
        }
    }

    #[test]
    fn test_lookup_rejects_unknown_keys() {
        let registry = EnvironmentRegistry::builtin();
        for key in ["", "qa", "PROD", "Dev", " dev", "production"] {
            match registry.lookup(key) {
                Err(FtmError::UnknownEnvironment(name)) => assert_eq!(name, key),
                other => panic!("expected UnknownEnvironment for {key:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_override_replaces_only_one_entry() {
        let registry = EnvironmentRegistry::builtin().with_override(
            Environment::Dev,
            "http://localhost:1/token",
            "http://localhost:1/feature",
        );

        let dev = registry.get(Environment::Dev).unwrap();
        assert_eq!(dev.token_url, "http://localhost:1/token");
        assert_eq!(dev.feature_url, "http://localhost:1/feature");

        let prod = registry.get(Environment::Prod).unwrap();
        assert_eq!(prod.feature_url, BUILTIN[4].2);
    }

    #[test]
    fn test_iter_is_in_canonical_order() {
        let keys: Vec<_> = EnvironmentRegistry::builtin()
            .iter()
            .map(|cfg| cfg.key)
            .collect();
        assert_eq!(keys, Environment::ALL.to_vec());
    }

    #[test]
    fn test_only_prod_is_production() {
        let production: Vec<_> = Environment::ALL
            .into_iter()
            .filter(|env| env.is_production())
            .collect();
        assert_eq!(production, vec![Environment::Prod]);
    }
}
