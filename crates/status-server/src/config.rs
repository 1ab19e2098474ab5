//! Configuration loading and validation for the status server

use crate::types::{ConsoleMode, ServerConfig};
use healthcheck::{ProbeConfig, Target};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found in search paths")]
    FileNotFound,

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub channel: ChannelSettings,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub targets: Vec<TargetSettings>,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.server.validate()?;
        self.monitor.validate()?;
        self.channel.validate()?;
        for target in &self.targets {
            target.validate()?;
        }
        if let Err(e) = validate_target_names(&self.targets) {
            let mut errors = ValidationErrors::new();
            errors.add("targets", e);
            return Err(errors);
        }
        Ok(())
    }
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    #[validate(length(min = 1))]
    pub host: String,

    #[validate(range(min = 1))]
    pub port: u16,

    #[validate(range(min = 1, max = 4096))]
    pub backlog: i32,
}

/// Probe cadence and request settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MonitorSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_interval")]
    pub interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub connect_timeout: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub timeout: Duration,

    #[validate(length(min = 1))]
    pub user_agent: String,

    #[validate(range(min = 1, max = 10000))]
    pub still_down_every: u32,
}

/// Observer channel settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ChannelSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_poll_timeout")]
    pub poll_timeout: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub handshake_timeout: Duration,

    #[validate(range(min = 64, max = 1048576))]
    pub read_chunk: usize,

    #[validate(range(min = 1024, max = 16777216))]
    pub max_buffer: usize,
}

/// Console presentation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub mode: ConsoleMode,
}

/// One monitored endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TargetSettings {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(custom = "validate_target_url")]
    pub url: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl LoggingSettings {
    /// Whether JSON output was requested
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            backlog: 5,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let probe = ProbeConfig::default();
        Self {
            interval: Duration::from_secs(30),
            connect_timeout: probe.connect_timeout,
            timeout: probe.timeout,
            user_agent: probe.user_agent,
            still_down_every: 10,
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(5),
            read_chunk: 2048,
            max_buffer: 64 * 1024,
        }
    }
}

// Custom validators

fn validate_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if secs < 1 || secs > 86_400 {
        return Err(ValidationError::new("interval_out_of_range"));
    }
    Ok(())
}

fn validate_probe_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if millis < 100 || millis > 300_000 {
        return Err(ValidationError::new("timeout_out_of_range"));
    }
    Ok(())
}

fn validate_poll_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if millis < 1 || millis > 1_000 {
        return Err(ValidationError::new("poll_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_target_url(url: &str) -> Result<(), ValidationError> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .ok_or_else(|| ValidationError::new("url_scheme_invalid"))?;
    if rest.is_empty() {
        return Err(ValidationError::new("url_host_empty"));
    }
    Ok(())
}

fn validate_target_names(targets: &[TargetSettings]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for target in targets {
        if !seen.insert(target.name.as_str()) {
            return Err(ValidationError::new("target_name_duplicate"));
        }
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    ///
    /// Returns the file that was read, `None` when defaults were used.
    /// Nothing is logged here: tracing is set up from the loaded config.
    pub fn load() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_first(Self::search_paths())
    }

    /// Load the first existing file among `paths`, or defaults
    pub fn load_first(
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match paths.into_iter().find(|p| p.is_file()) {
            Some(path) => Ok((Self::load_from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound);
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Standard configuration locations, in lookup order
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/status-monitor/status-server.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./status-server.yaml"));
        paths
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/status-monitor/status-server.yaml"))
    }

    /// Listen address in `host:port` form; IPv6 hosts are bracketed
    pub fn listen_addr(&self) -> String {
        let host = self.server.host.trim();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.server.port)
        } else {
            format!("{}:{}", host, self.server.port)
        }
    }

    /// Convert to the runtime [`ServerConfig`]
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.listen_addr(),
            backlog: self.server.backlog,
            sweep_interval: self.monitor.interval,
            poll_timeout: self.channel.poll_timeout,
            handshake_timeout: self.channel.handshake_timeout,
            read_chunk_size: self.channel.read_chunk,
            max_buffer_size: self.channel.max_buffer,
            still_down_every: self.monitor.still_down_every,
            console_mode: self.console.mode,
            probe: ProbeConfig {
                connect_timeout: self.monitor.connect_timeout,
                timeout: self.monitor.timeout,
                user_agent: self.monitor.user_agent.clone(),
            },
            targets: self
                .targets
                .iter()
                .map(|t| Target::new(t.name.trim(), t.url.trim()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000

monitor:
  interval: 15s
  connect_timeout: 2s
  timeout: 4s
  user_agent: "status-check"

channel:
  poll_timeout: 50ms

console:
  mode: verbose

targets:
  - name: DietSync
    url: "http://152.67.45.167"
  - name: Docs
    url: "https://docs.example.com"

logging:
  level: debug
  format: json
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
        assert_eq!(config.monitor.interval, Duration::from_secs(15));
        assert_eq!(config.channel.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.console.mode, ConsoleMode::Verbose);
        assert_eq!(config.targets.len(), 2);
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
targets:
  - name: A
    url: "http://ok.example"
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.monitor.interval, Duration::from_secs(30));
        assert_eq!(config.monitor.still_down_every, 10);
        assert_eq!(config.channel.read_chunk, 2048);
        assert_eq!(config.console.mode, ConsoleMode::Quiet);
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let yaml = r#"
server:
  port: 9090
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_invalid_interval() {
        let yaml = r#"
monitor:
  interval: 500ms  # Invalid: < 1s
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_target_url() {
        let yaml = r#"
targets:
  - name: A
    url: "ftp://files.example"
"#;
        assert!(Config::from_yaml(yaml).is_err());

        assert!(validate_target_url("http://ok.example").is_ok());
        assert!(validate_target_url("https://ok.example/health").is_ok());
        assert!(validate_target_url("http://").is_err());
        assert!(validate_target_url("ok.example").is_err());
    }

    #[test]
    fn test_duplicate_and_empty_target_names() {
        let yaml = r#"
targets:
  - name: A
    url: "http://a.example"
  - name: A
    url: "http://b.example"
"#;
        assert!(Config::from_yaml(yaml).is_err());

        let yaml = r#"
targets:
  - name: ""
    url: "http://a.example"
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_unknown_console_mode_rejected() {
        let yaml = r#"
console:
  mode: loud
"#;
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load_from_file("/nonexistent/status-server.yaml"),
            Err(ConfigError::FileNotFound)
        ));
    }

    #[test]
    fn test_load_first_reports_chosen_file() {
        let dir = std::env::temp_dir().join(format!("status-server-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("status-server.yaml");
        std::fs::write(&file, "server:\n  port: 9191\n").unwrap();

        let (config, path) =
            Config::load_first(vec![dir.join("missing.yaml"), file.clone()]).unwrap();
        assert_eq!(path.as_deref(), Some(file.as_path()));
        assert_eq!(config.server.port, 9191);

        let (config, path) = Config::load_first(vec![dir.join("missing.yaml")]).unwrap();
        assert_eq!(path, None);
        assert_eq!(config.server.port, 8080);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_ipv6_listen_addr() {
        let yaml = r#"
server:
  host: "::"
  port: 8080
"#;
        assert_eq!(Config::from_yaml(yaml).unwrap().listen_addr(), "[::]:8080");
    }

    #[test]
    fn test_config_to_server_config_conversion() {
        let yaml = r#"
monitor:
  interval: 1m
  user_agent: "probe"
  still_down_every: 5
targets:
  - name: A
    url: "http://ok.example"
"#;
        let server_config = Config::from_yaml(yaml).unwrap().to_server_config();

        assert_eq!(server_config.listen_addr, "0.0.0.0:8080");
        assert_eq!(server_config.sweep_interval, Duration::from_secs(60));
        assert_eq!(server_config.still_down_every, 5);
        assert_eq!(server_config.probe.user_agent, "probe");
        assert_eq!(server_config.probe.timeout, Duration::from_secs(10));
        assert_eq!(server_config.targets, vec![Target::new("A", "http://ok.example")]);
    }
}
