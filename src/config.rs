use std::path::PathBuf;
use std::time::Duration;

use crate::credential::DEFAULT_CREDENTIAL_KEY;
use crate::Error;

/// Default API root.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overrides [`ClientConfig::api_base_url`].
pub const ENV_API_BASE_URL: &str = "POSTURE_API_BASE_URL";
/// Overrides [`ClientConfig::timeout`], in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "POSTURE_TIMEOUT_MS";
/// Sets [`ClientConfig::storage_path`].
pub const ENV_STORAGE_PATH: &str = "POSTURE_STORAGE_PATH";
/// Overrides [`ClientConfig::credential_key`].
pub const ENV_CREDENTIAL_KEY: &str = "POSTURE_CREDENTIAL_KEY";

/// Client settings.
///
/// The security mode is deliberately absent: it always comes from the
/// server, with [`SecurityMode::DEFAULT`](crate::SecurityMode::DEFAULT)
/// before the first fetch.
///
/// # Examples
///
/// ```
/// use posture_core::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.api_base_url, "http://localhost:8080/api");
/// assert_eq!(config.credential_key, "accessToken");
/// assert!(config.storage_path.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root every endpoint path is joined onto.
    pub api_base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Storage key of the VULN-mode bearer token.
    pub credential_key: String,
    /// File backing client-readable storage; in-memory when `None`.
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            storage_path: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by the `POSTURE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but unusable.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value is set but unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_BASE_URL) {
            let url = url.trim();
            if url.is_empty() {
                return Err(Error::Config(format!("{} is empty", ENV_API_BASE_URL)));
            }
            config.api_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a whole number of milliseconds, got '{}'", ENV_TIMEOUT_MS, raw))
            })?;
            if millis == 0 {
                return Err(Error::Config(format!("{} must be positive", ENV_TIMEOUT_MS)));
            }
            config.timeout = Duration::from_millis(millis);
        }

        if let Some(key) = lookup(ENV_CREDENTIAL_KEY) {
            if key.trim().is_empty() {
                return Err(Error::Config(format!("{} is empty", ENV_CREDENTIAL_KEY)));
            }
            config.credential_key = key.trim().to_string();
        }

        config.storage_path = lookup(ENV_STORAGE_PATH)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        tracing::debug!(
            api_base_url = %config.api_base_url,
            timeout_ms = config.timeout.as_millis() as u64,
            persistent_storage = config.storage_path.is_some(),
            "loaded client configuration"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn no_variables_gives_defaults() {
        assert_eq!(ClientConfig::from_lookup(lookup(&[])).unwrap(), ClientConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_BASE_URL, "https://blog.example/api/"),
            (ENV_TIMEOUT_MS, "2500"),
            (ENV_STORAGE_PATH, "/tmp/posture.json"),
            (ENV_CREDENTIAL_KEY, "jwt"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://blog.example/api");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/posture.json")));
        assert_eq!(config.credential_key, "jwt");
    }

    #[test]
    fn bad_timeout_is_rejected() {
        for raw in ["soon", "-1", "0"] {
            let result = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, raw)]));
            assert!(matches!(result, Err(Error::Config(_))), "{}", raw);
        }
    }

    #[test]
    fn empty_values_are_rejected_or_ignored() {
        assert!(ClientConfig::from_lookup(lookup(&[(ENV_API_BASE_URL, " ")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(ENV_CREDENTIAL_KEY, "")])).is_err());
        let config = ClientConfig::from_lookup(lookup(&[(ENV_STORAGE_PATH, "")])).unwrap();
        assert!(config.storage_path.is_none());
    }
}
