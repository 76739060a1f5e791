//! tern.toml configuration parser.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Backend;

/// Default port the scheduler listens on.
pub const DEFAULT_SCHEDULER_PORT: u16 = 20503;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TernConfig {
    pub scheduler: SchedulerConfig,
    pub directory: DirectoryConfig,
}

/// How the scheduler learns about backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum DeploymentMode {
    /// Backends are listed statically in `[directory]`.
    #[default]
    #[serde(rename = "configbased")]
    ConfigBased,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub deployment_mode: DeploymentMode,
    pub listen: SocketAddr,
    /// Address workers and frontends reach this scheduler at. Defaults to
    /// `listen`.
    pub advertise: Option<SocketAddr>,
    /// Requests with exactly this many tasks take the partitioned path.
    pub special_task_set_size: Option<usize>,
    pub probe_ratio: f64,
    pub constrained_probe_ratio: f64,
    #[serde(deserialize_with = "duration_str")]
    pub probe_timeout: Duration,
    #[serde(deserialize_with = "duration_str")]
    pub connect_timeout: Duration,
    /// Bound on one request/response exchange with a node monitor or
    /// frontend, once connected.
    #[serde(deserialize_with = "duration_str")]
    pub rpc_timeout: Duration,
    pub max_idle_per_node: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            deployment_mode: DeploymentMode::ConfigBased,
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_SCHEDULER_PORT),
            advertise: None,
            special_task_set_size: None,
            probe_ratio: 1.05,
            constrained_probe_ratio: 2.0,
            probe_timeout: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(1),
            rpc_timeout: Duration::from_secs(2),
            max_idle_per_node: 8,
        }
    }
}

/// Static backend lists for the config-based directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Backends shared by every application.
    pub backends: Vec<Backend>,
    /// Per-application overrides of `backends`.
    pub apps: HashMap<String, AppBackends>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppBackends {
    pub backends: Vec<Backend>,
}

impl SchedulerConfig {
    /// The address request ids and task status routing are built from.
    pub fn advertised_address(&self) -> SocketAddr {
        self.advertise.unwrap_or(self.listen)
    }
}

impl TernConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: TernConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let s = &self.scheduler;
        for (name, ratio) in [
            ("probe_ratio", s.probe_ratio),
            ("constrained_probe_ratio", s.constrained_probe_ratio),
        ] {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {ratio}"
                )));
            }
        }
        if s.special_task_set_size == Some(0) {
            return Err(ConfigError::Invalid(
                "special_task_set_size must be at least 1".to_string(),
            ));
        }
        for (name, timeout) in [
            ("probe_timeout", s.probe_timeout),
            ("connect_timeout", s.connect_timeout),
            ("rpc_timeout", s.rpc_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn duration_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_duration(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = TernConfig::from_toml_str("").unwrap();
        assert_eq!(config.scheduler.deployment_mode, DeploymentMode::ConfigBased);
        assert_eq!(config.scheduler.listen.port(), DEFAULT_SCHEDULER_PORT);
        assert_eq!(config.scheduler.special_task_set_size, None);
        assert_eq!(config.scheduler.advertised_address(), config.scheduler.listen);
        assert_eq!(config.scheduler.probe_ratio, 1.05);
        assert_eq!(config.scheduler.probe_timeout, Duration::from_millis(50));
        assert_eq!(config.scheduler.rpc_timeout, Duration::from_secs(2));
        assert!(config.directory.backends.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[scheduler]
deployment_mode = "configbased"
listen = "127.0.0.1:9000"
advertise = "10.0.0.100:9000"
special_task_set_size = 4
probe_ratio = 2.0
probe_timeout = "200ms"
connect_timeout = "2s"
rpc_timeout = "750ms"

[directory]
backends = ["10.0.0.1:20502", "10.0.0.2:20502"]

[directory.apps.analytics]
backends = ["10.0.0.9:20502"]
"#;
        let config = TernConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.scheduler.listen, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.scheduler.advertised_address(),
            "10.0.0.100:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.scheduler.special_task_set_size, Some(4));
        assert_eq!(config.scheduler.probe_ratio, 2.0);
        assert_eq!(config.scheduler.constrained_probe_ratio, 2.0);
        assert_eq!(config.scheduler.probe_timeout, Duration::from_millis(200));
        assert_eq!(config.scheduler.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.scheduler.rpc_timeout, Duration::from_millis(750));
        assert_eq!(config.directory.backends.len(), 2);
        assert_eq!(config.directory.apps["analytics"].backends.len(), 1);
    }

    #[test]
    fn unsupported_deployment_mode_is_rejected() {
        let toml_str = r#"
[scheduler]
deployment_mode = "standalone"
"#;
        assert!(matches!(
            TernConfig::from_toml_str(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_probe_ratio_is_rejected() {
        let toml_str = r#"
[scheduler]
probe_ratio = -1.0
"#;
        assert!(matches!(
            TernConfig::from_toml_str(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_special_task_set_size_is_rejected() {
        let toml_str = r#"
[scheduler]
special_task_set_size = 0
"#;
        assert!(matches!(
            TernConfig::from_toml_str(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_rpc_timeout_is_rejected() {
        let toml_str = r#"
[scheduler]
rpc_timeout = "0ms"
"#;
        assert!(matches!(
            TernConfig::from_toml_str(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        let toml_str = r#"
[scheduler]
probe_timeout = "soon"
"#;
        assert!(matches!(
            TernConfig::from_toml_str(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tern.toml");
        std::fs::write(&path, "[directory]\nbackends = [\"10.0.0.1:20502\"]\n").unwrap();

        let config = TernConfig::from_file(&path).unwrap();
        let expected: SocketAddr = "10.0.0.1:20502".parse().unwrap();
        assert_eq!(config.directory.backends, vec![expected]);
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let result = TernConfig::from_file(Path::new("/nonexistent/tern.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("fast"), None);
    }
}
