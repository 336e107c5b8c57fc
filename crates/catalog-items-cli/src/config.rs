use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog_items::PollPolicy;
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Base URL of the vCenter, e.g. `https://vc.example`.
    pub server: Option<String>,
    pub username: Option<String>,
    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub poll: PollConfig,
}

/// Remote-fetch wait settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Give up after this long. Absent waits for as long as the session is
    /// pending.
    pub timeout_secs: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: None,
        }
    }
}

impl PollConfig {
    /// The wait policy. Intervals below one second are raised to one second.
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.interval_secs.max(MIN_INTERVAL_SECS)),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

const MIN_INTERVAL_SECS: u64 = 1;

fn default_interval_secs() -> u64 {
    10
}

/// Config file path: `~/.config/catalog-upload/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catalog-upload").join("config.toml"))
}

/// Load config from file, falling back to defaults if missing.
pub fn load_config() -> AppConfig {
    if let Some(path) = config_path()
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        if let Ok(config) = toml::from_str::<AppConfig>(&contents) {
            return config;
        }
        eprintln!(
            "warning: failed to parse config at {}, using defaults",
            path.display()
        );
    }

    AppConfig::default()
}

/// Connection values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub username: Option<String>,
    pub insecure: bool,
}

/// Everything needed to open an API session.
#[derive(Debug, Clone)]
pub struct Connection {
    pub server: String,
    pub username: String,
    pub password: String,
    pub insecure: bool,
}

impl Connection {
    /// Merge flags, environment and config file, in that order of precedence.
    ///
    /// The password is only ever read from `CATALOG_PASSWORD`.
    pub fn resolve(
        config: &AppConfig,
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let server = overrides
            .server
            .or_else(|| env("CATALOG_SERVER"))
            .or_else(|| config.server.clone())
            .context("no server configured; pass --server or set CATALOG_SERVER")?;
        let username = overrides
            .username
            .or_else(|| env("CATALOG_USERNAME"))
            .or_else(|| config.username.clone())
            .context("no username configured; pass --username or set CATALOG_USERNAME")?;
        let password = env("CATALOG_PASSWORD").context("CATALOG_PASSWORD is not set")?;

        Ok(Self {
            server,
            username,
            password,
            insecure: overrides.insecure || config.insecure,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn parse_full_config_from_toml() {
        let toml_str = r#"
server = "https://vc.example"
username = "administrator@vsphere.local"
insecure = true

[poll]
interval_secs = 5
timeout_secs = 600
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.as_deref(), Some("https://vc.example"));
        assert!(config.insecure);

        let policy = config.poll.policy();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.server.is_none());
        assert!(!config.insecure);
        assert_eq!(config.poll.policy(), PollPolicy::default());
    }

    #[test]
    fn poll_table_without_interval_keeps_default() {
        let config: AppConfig = toml::from_str("[poll]\ntimeout_secs = 30\n").unwrap();
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.poll.timeout_secs, Some(30));
    }

    #[test]
    fn zero_interval_is_raised_to_one_second() {
        let config: AppConfig = toml::from_str("[poll]\ninterval_secs = 0\n").unwrap();
        assert_eq!(config.poll.policy().interval, Duration::from_secs(1));
    }

    #[test]
    fn flags_beat_environment_beat_file() {
        let config = AppConfig {
            server: Some("https://file.example".into()),
            username: Some("file-user".into()),
            ..AppConfig::default()
        };
        let env = env_from(&[
            ("CATALOG_SERVER", "https://env.example"),
            ("CATALOG_PASSWORD", "secret"),
        ]);
        let overrides = Overrides {
            username: Some("flag-user".into()),
            ..Overrides::default()
        };

        let conn = Connection::resolve(&config, overrides, env).unwrap();
        assert_eq!(conn.server, "https://env.example");
        assert_eq!(conn.username, "flag-user");
        assert_eq!(conn.password, "secret");
    }

    #[test]
    fn missing_password_is_an_error() {
        let config = AppConfig {
            server: Some("https://vc.example".into()),
            username: Some("admin".into()),
            ..AppConfig::default()
        };
        let err = Connection::resolve(&config, Overrides::default(), env_from(&[])).unwrap_err();
        assert!(err.to_string().contains("CATALOG_PASSWORD"));
    }
}
