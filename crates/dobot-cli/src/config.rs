//! Runtime configuration – reads/writes `~/.dobot/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dobot_types::DobotError;

/// Persisted front-end configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address both channels bind to.
    #[serde(default = "default_ip")]
    pub ip: IpAddr,

    #[serde(default = "default_motion_port")]
    pub motion_port: u16,

    #[serde(default = "default_feedback_port")]
    pub feedback_port: u16,

    /// Realtime feedback period in milliseconds.
    #[serde(default = "default_feedback_period_ms")]
    pub feedback_period_ms: u64,

    /// Upper bound on bytes read per motion command.
    #[serde(default = "default_max_receive_bytes")]
    pub max_receive_bytes: usize,

    /// Reach of the simulated arm, in millimetres from the base.
    #[serde(default = "default_reach_mm")]
    pub reach_mm: f64,

    /// Time the simulated arm spends on each queued motion.
    #[serde(default = "default_motion_step_ms")]
    pub motion_step_ms: u64,
}

fn default_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_motion_port() -> u16 {
    30003
}
fn default_feedback_port() -> u16 {
    30004
}
fn default_feedback_period_ms() -> u64 {
    8
}
fn default_max_receive_bytes() -> usize {
    1024
}
fn default_reach_mm() -> f64 {
    900.0
}
fn default_motion_step_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            motion_port: default_motion_port(),
            feedback_port: default_feedback_port(),
            feedback_period_ms: default_feedback_period_ms(),
            max_receive_bytes: default_max_receive_bytes(),
            reach_mm: default_reach_mm(),
            motion_step_ms: default_motion_step_ms(),
        }
    }
}

impl Config {
    pub fn motion_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.motion_port)
    }

    pub fn feedback_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.feedback_port)
    }

    pub fn feedback_period(&self) -> Duration {
        Duration::from_millis(self.feedback_period_ms)
    }

    pub fn motion_step(&self) -> Duration {
        Duration::from_millis(self.motion_step_ms)
    }

    /// Reject values the servers cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`DobotError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), DobotError> {
        if self.feedback_period_ms == 0 {
            return Err(DobotError::Config("feedback_period_ms must be greater than 0".to_string()));
        }
        if self.max_receive_bytes == 0 {
            return Err(DobotError::Config("max_receive_bytes must be greater than 0".to_string()));
        }
        if self.motion_step_ms == 0 {
            return Err(DobotError::Config("motion_step_ms must be greater than 0".to_string()));
        }
        if !(self.reach_mm.is_finite() && self.reach_mm > 0.0) {
            return Err(DobotError::Config(format!("reach_mm must be a positive distance, got {}", self.reach_mm)));
        }
        if self.motion_port == self.feedback_port && self.motion_port != 0 {
            return Err(DobotError::Config(format!(
                "motion_port and feedback_port are both {}",
                self.motion_port
            )));
        }
        Ok(())
    }
}

/// Return the path to `~/.dobot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".dobot").join("config.toml")
}

/// Load the config from disk and apply `DOBOT_*` overrides.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, DobotError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, DobotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| DobotError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| DobotError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
    Ok(Some(cfg))
}

/// Apply `DOBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DOBOT_IP` | `ip` |
/// | `DOBOT_MOTION_PORT` | `motion_port` |
/// | `DOBOT_FEEDBACK_PORT` | `feedback_port` |
/// | `DOBOT_FEEDBACK_PERIOD_MS` | `feedback_period_ms` |
/// | `DOBOT_MAX_RECEIVE_BYTES` | `max_receive_bytes` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("DOBOT_IP")
        && let Ok(ip) = v.parse::<IpAddr>() {
            cfg.ip = ip;
        }
    if let Ok(v) = std::env::var("DOBOT_MOTION_PORT")
        && let Ok(port) = v.parse::<u16>() {
            cfg.motion_port = port;
        }
    if let Ok(v) = std::env::var("DOBOT_FEEDBACK_PORT")
        && let Ok(port) = v.parse::<u16>() {
            cfg.feedback_port = port;
        }
    if let Ok(v) = std::env::var("DOBOT_FEEDBACK_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.feedback_period_ms = ms;
        }
    if let Ok(v) = std::env::var("DOBOT_MAX_RECEIVE_BYTES")
        && let Ok(bytes) = v.parse::<usize>() {
            cfg.max_receive_bytes = bytes;
        }
}

/// Save the config to disk, creating `~/.dobot/` if necessary.
pub fn save(cfg: &Config) -> Result<(), DobotError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), DobotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DobotError::Config(format!("failed to create config directory: {}", e)))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| DobotError::Config(format!("failed to serialize config: {}", e)))?;
    fs::write(path, raw)
        .map_err(|e| DobotError::Config(format!("failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller_ports() {
        let cfg = Config::default();
        assert_eq!(cfg.motion_addr().to_string(), "0.0.0.0:30003");
        assert_eq!(cfg.feedback_addr().to_string(), "0.0.0.0:30004");
        assert_eq!(cfg.feedback_period(), Duration::from_millis(8));
        assert_eq!(cfg.max_receive_bytes, 1024);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            ip: "127.0.0.1".parse().unwrap(),
            feedback_period_ms: 20,
            reach_mm: 650.0,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "motion_port = 40003\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.motion_port, 40003);
        assert_eq!(loaded.feedback_port, 30004);
        assert_eq!(loaded.motion_step_ms, 100);
    }

    #[test]
    fn unparsable_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "motion_port = \"many\"\n").unwrap();

        assert!(matches!(load_from(&path), Err(DobotError::Config(_))));
    }

    #[test]
    fn config_path_points_to_dobot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".dobot"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn validate_rejects_unusable_values() {
        for cfg in [
            Config { feedback_period_ms: 0, ..Config::default() },
            Config { max_receive_bytes: 0, ..Config::default() },
            Config { motion_step_ms: 0, ..Config::default() },
            Config { reach_mm: -1.0, ..Config::default() },
            Config { reach_mm: f64::NAN, ..Config::default() },
            Config { feedback_port: 30003, ..Config::default() },
        ] {
            assert!(matches!(cfg.validate(), Err(DobotError::Config(_))), "{cfg:?}");
        }
    }

    #[test]
    fn apply_env_overrides_changes_motion_port() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("DOBOT_MOTION_PORT", "41003") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.motion_port, 41003);
        unsafe { std::env::remove_var("DOBOT_MOTION_PORT") };
    }

    #[test]
    fn apply_env_overrides_changes_ip() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("DOBOT_IP", "192.168.5.1") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.ip.to_string(), "192.168.5.1");
        unsafe { std::env::remove_var("DOBOT_IP") };
    }

    #[test]
    fn apply_env_overrides_changes_feedback_period() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("DOBOT_FEEDBACK_PERIOD_MS", "16") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.feedback_period(), Duration::from_millis(16));
        unsafe { std::env::remove_var("DOBOT_FEEDBACK_PERIOD_MS") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_values() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe {
            std::env::set_var("DOBOT_FEEDBACK_PORT", "not-a-port");
            std::env::set_var("DOBOT_MAX_RECEIVE_BYTES", "-5");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.feedback_port, 30004);
        assert_eq!(cfg.max_receive_bytes, 1024);
        unsafe {
            std::env::remove_var("DOBOT_FEEDBACK_PORT");
            std::env::remove_var("DOBOT_MAX_RECEIVE_BYTES");
        }
    }
}
