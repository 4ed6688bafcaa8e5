//! Configuration file parsing for bridgespoof
//!
//! Parses an optional `bridgespoof.toml` using serde. Every field has a
//! built-in default, so an empty file is a valid configuration.

use crate::capture::{DEFAULT_ARGS, DEFAULT_FILTER, DEFAULT_PROGRAM, DEFAULT_STOP_TIMEOUT};
use crate::error::{Error, Result};
use crate::network::bridge::{self, DEFAULT_BRIDGE};
use crate::network::link::{DEFAULT_IP_BINARY, DEFAULT_SYSFS_NET};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load configuration from a file
pub fn load(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

/// Load the file if one was given, otherwise use the defaults
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load(path),
        None => Ok(Config::default()),
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub capture: CaptureConfig,
    pub system: SystemConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        bridge::validate_name(&self.bridge.name)
            .map_err(|e| Error::ConfigValidation(format!("[bridge] name: {}", e)))?;

        if self.capture.program.as_os_str().is_empty() {
            return Err(Error::ConfigValidation("[capture] program is empty".into()));
        }
        if self.capture.stop_timeout_secs == 0 {
            return Err(Error::ConfigValidation(
                "[capture] stop_timeout_secs must be at least 1".into(),
            ));
        }

        if self.system.ip.as_os_str().is_empty() {
            return Err(Error::ConfigValidation("[system] ip is empty".into()));
        }
        if self.system.sysfs.as_os_str().is_empty() {
            return Err(Error::ConfigValidation("[system] sysfs is empty".into()));
        }

        Ok(())
    }
}

/// Bridge defaults
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge name used when none is given
    pub name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BRIDGE.to_string(),
        }
    }
}

/// Capture tool settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture binary
    pub program: PathBuf,

    /// Arguments placed before `-i <iface>`
    pub args: Vec<String>,

    /// Filter used when none is given
    pub filter: String,

    /// Grace period after SIGTERM before the capture is killed
    pub stop_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
            filter: DEFAULT_FILTER.to_string(),
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT.as_secs(),
        }
    }
}

impl CaptureConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Host tooling locations
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SystemConfig {
    /// iproute2 binary
    pub ip: PathBuf,

    /// sysfs network class directory
    pub sysfs: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            ip: PathBuf::from(DEFAULT_IP_BINARY),
            sysfs: PathBuf::from(DEFAULT_SYSFS_NET),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bridge.name, "br0");
        assert_eq!(config.capture.args, vec!["-n", "-l", "-vv"]);
        assert_eq!(config.capture.stop_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[bridge]
name = "labbr0"

[capture]
program = "/usr/sbin/tcpdump"
args = ["-n", "-e"]
filter = "arp"
stop_timeout_secs = 2

[system]
ip = "/sbin/ip"
sysfs = "/tmp/net"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bridge.name, "labbr0");
        assert_eq!(config.capture.program, PathBuf::from("/usr/sbin/tcpdump"));
        assert_eq!(config.capture.args, vec!["-n", "-e"]);
        assert_eq!(config.capture.filter, "arp");
        assert_eq!(config.capture.stop_timeout(), Duration::from_secs(2));
        assert_eq!(config.system.ip, PathBuf::from("/sbin/ip"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: Config = toml::from_str("[capture]\nfilter = \"icmp\"\n").unwrap();
        assert_eq!(config.capture.filter, "icmp");
        assert_eq!(config.capture.program, PathBuf::from("tcpdump"));
        assert_eq!(config.system, SystemConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config: Config =
            toml::from_str("[bridge]\nname = \"this-name-is-too-long\"\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));

        let config: Config = toml::from_str("[capture]\nstop_timeout_secs = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));

        let config: Config = toml::from_str("[capture]\nprogram = \"\"\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bridge]\nname = \"testbr0\"").unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.bridge.name, "testbr0");
    }

    #[test]
    fn test_load_errors() {
        let missing = load(Path::new("/nonexistent/bridgespoof.toml"));
        assert!(matches!(missing, Err(Error::ConfigRead { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bridge\nname = 1").unwrap();
        assert!(matches!(load(file.path()), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_no_path_uses_defaults() {
        assert_eq!(load_or_default(None).unwrap(), Config::default());
    }
}
