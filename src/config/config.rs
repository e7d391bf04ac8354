// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding installed packs and partial downloads
    pub packs_dir: PathBuf,

    /// Base URL packs are fetched from, as `<base>/<pack>.zip`
    pub delivery_base_url: String,

    /// Local poll API bind address (e.g., "127.0.0.1:8080")
    pub local_api_bind: SocketAddr,

    /// Per-request timeout for pack downloads
    pub download_timeout_secs: u64,

    /// Attempts per download, including the first
    pub max_download_retries: u32,

    /// Undrained event backlog size that triggers a warning
    pub event_backlog_warn_threshold: usize,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("PAD_CONFIG")
            .unwrap_or_else(|_| "config.toml".to_string());

        let mut config: Config = if std::path::Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        if let Ok(val) = std::env::var("PAD_PACKS_DIR") {
            config.packs_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PAD_DELIVERY_BASE_URL") {
            config.delivery_base_url = val;
        }
        if let Ok(val) = std::env::var("PAD_LOCAL_API_BIND") {
            config.local_api_bind = SocketAddr::from_str(&val)?;
        }
        if let Ok(val) = std::env::var("PAD_DOWNLOAD_TIMEOUT_SECS") {
            config.download_timeout_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("PAD_MAX_DOWNLOAD_RETRIES") {
            config.max_download_retries = val.parse()?;
        }
        if let Ok(val) = std::env::var("PAD_EVENT_BACKLOG_WARN_THRESHOLD") {
            config.event_backlog_warn_threshold = val.parse()?;
        }
        if let Ok(val) = std::env::var("PAD_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Ok(val) = std::env::var("PAD_LOG_JSON") {
            config.log_json = val.parse()?;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packs_dir: PathBuf::from("packs"),
            delivery_base_url: String::from("http://localhost:3000/packs/"),
            local_api_bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            download_timeout_secs: 300, // 5 minutes
            max_download_retries: 3,
            event_backlog_warn_threshold: 1024,
            log_level: String::from("info"),
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests below mutate process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "PAD_CONFIG",
        "PAD_PACKS_DIR",
        "PAD_DELIVERY_BASE_URL",
        "PAD_LOCAL_API_BIND",
        "PAD_DOWNLOAD_TIMEOUT_SECS",
        "PAD_MAX_DOWNLOAD_RETRIES",
        "PAD_EVENT_BACKLOG_WARN_THRESHOLD",
        "PAD_LOG_LEVEL",
        "PAD_LOG_JSON",
    ];

    fn set_env_var(key: &str, value: &str) {
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn clear_env_vars() {
        for key in ENV_VARS {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.packs_dir, PathBuf::from("packs"));
        assert_eq!(config.delivery_base_url, "http://localhost:3000/packs/");
        assert_eq!(config.local_api_bind, SocketAddr::from_str("127.0.0.1:8080").unwrap());
        assert_eq!(config.download_timeout_secs, 300);
        assert_eq!(config.max_download_retries, 3);
        assert_eq!(config.event_backlog_warn_threshold, 1024);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
    }

    #[test]
    fn test_load_missing_config_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_env_var("PAD_CONFIG", "/nonexistent/pad-config.toml");

        let config = Config::load().unwrap();
        assert_eq!(config.packs_dir, PathBuf::from("packs"));
        assert_eq!(config.max_download_retries, 3);

        clear_env_vars();
    }

    #[test]
    fn test_load_from_toml() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();

        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
packs_dir = "/data/packs"
delivery_base_url = "https://cdn.example.com/packs/"
local_api_bind = "0.0.0.0:9000"
download_timeout_secs = 60
max_download_retries = 5
event_backlog_warn_threshold = 256
log_level = "debug"
log_json = true
"#;
        fs::write(temp_file.path(), config_content).unwrap();
        set_env_var("PAD_CONFIG", temp_file.path().to_str().unwrap());

        let config = Config::load().unwrap();
        assert_eq!(config.packs_dir, PathBuf::from("/data/packs"));
        assert_eq!(config.delivery_base_url, "https://cdn.example.com/packs/");
        assert_eq!(config.local_api_bind, SocketAddr::from_str("0.0.0.0:9000").unwrap());
        assert_eq!(config.download_timeout_secs, 60);
        assert_eq!(config.max_download_retries, 5);
        assert_eq!(config.event_backlog_warn_threshold, 256);
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);

        clear_env_vars();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "log_level = \"warn\"\n").unwrap();
        set_env_var("PAD_CONFIG", temp_file.path().to_str().unwrap());

        let config = Config::load().unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.packs_dir, PathBuf::from("packs"));
        assert_eq!(config.download_timeout_secs, 300);

        clear_env_vars();
    }

    #[test]
    fn test_env_var_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_env_var("PAD_CONFIG", "/nonexistent/pad-config.toml");
        set_env_var("PAD_PACKS_DIR", "/env/packs");
        set_env_var("PAD_DELIVERY_BASE_URL", "http://env-cdn.example.com/");
        set_env_var("PAD_LOCAL_API_BIND", "192.168.1.1:9090");
        set_env_var("PAD_DOWNLOAD_TIMEOUT_SECS", "120");
        set_env_var("PAD_MAX_DOWNLOAD_RETRIES", "7");
        set_env_var("PAD_EVENT_BACKLOG_WARN_THRESHOLD", "10");
        set_env_var("PAD_LOG_LEVEL", "trace");
        set_env_var("PAD_LOG_JSON", "true");

        let config = Config::load().unwrap();
        assert_eq!(config.packs_dir, PathBuf::from("/env/packs"));
        assert_eq!(config.delivery_base_url, "http://env-cdn.example.com/");
        assert_eq!(config.local_api_bind, SocketAddr::from_str("192.168.1.1:9090").unwrap());
        assert_eq!(config.download_timeout_secs, 120);
        assert_eq!(config.max_download_retries, 7);
        assert_eq!(config.event_backlog_warn_threshold, 10);
        assert_eq!(config.log_level, "trace");
        assert!(config.log_json);

        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_override_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_env_var("PAD_CONFIG", "/nonexistent/pad-config.toml");
        set_env_var("PAD_MAX_DOWNLOAD_RETRIES", "many");

        assert!(Config::load().is_err());

        clear_env_vars();
    }
}
