use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CliConfig {
    /// Unix socket the host daemon listens on.
    pub socket_path: PathBuf,
    /// YAML inventory served by `devctl serve`.
    #[serde(default)]
    pub inventory_path: Option<PathBuf>,
    /// Upper bound for each call. Unset means wait for the host indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
    pub show_time: bool,
    pub show_file: bool,
    pub show_line: bool,
    #[serde(default)]
    pub redaction: RedactionConfig,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct RedactionConfig {
    #[serde(default = "true_default")]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Vec<RedactionPattern>,
}

fn true_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionPattern {
    pub name: String,
    pub regex: String,
    pub placeholder: String,
}

pub fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("devctl.sock")
}

/// Layered load: built-in defaults, `devctl.yaml`, `.devctl.yaml` (local
/// override), an explicit `--config` file, then `DEVCTL__*` env vars.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default(
            "socket_path",
            default_socket_path().to_string_lossy().into_owned(),
        )?
        .set_default("logging.level", "warn")?
        .set_default("logging.json", false)?
        .set_default("logging.show_time", true)?
        .set_default("logging.show_file", false)?
        .set_default("logging.show_line", false)?
        .add_source(File::with_name("devctl.yaml").required(false))
        .add_source(File::with_name(".devctl.yaml").required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder
        // Map nested env vars like DEVCTL__LOGGING__LEVEL=debug
        .add_source(Environment::with_prefix("DEVCTL").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    struct EnvGuard(&'static str);
    impl EnvGuard {
        fn new(key: &'static str, val: &str) -> Self {
            env::set_var(key, val);
            Self(key)
        }
    }
    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.0);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config.socket_path, default_socket_path());
        assert_eq!(config.timeout_ms, None);
        assert_eq!(config.inventory_path, None);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.redaction.patterns.is_empty());
    }

    #[test]
    #[serial]
    fn test_env_var_override() {
        let _guard1 = EnvGuard::new("DEVCTL__SOCKET_PATH", "/run/devhost.sock");
        let _guard2 = EnvGuard::new("DEVCTL__TIMEOUT_MS", "2500");
        let _guard3 = EnvGuard::new("DEVCTL__LOGGING__LEVEL", "debug");

        let config = load_config(None).expect("should load config");
        assert_eq!(config.socket_path, PathBuf::from("/run/devhost.sock"));
        assert_eq!(config.timeout_ms, Some(2500));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    #[serial]
    fn test_explicit_file() {
        let path = env::temp_dir().join("devctl_config_test.yaml");
        std::fs::write(
            &path,
            r#"
inventory_path: /etc/devhost/devices.yaml
logging:
  level: info
  redaction:
    patterns:
      - name: ipv4
        regex: '\b\d{1,3}(\.\d{1,3}){3}\b'
        placeholder: "[ip]"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).expect("should load config");
        assert_eq!(
            config.inventory_path,
            Some(PathBuf::from("/etc/devhost/devices.yaml"))
        );
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.redaction.enabled);
        assert_eq!(config.logging.redaction.patterns[0].placeholder, "[ip]");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/devctl.yaml"))).is_err());
    }
}
