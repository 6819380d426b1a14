use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Linear backoff parameters (optional sections in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay added on every consecutive retry, in milliseconds.
    pub step_ms: u64,
    /// Give up once the next delay would reach this many milliseconds.
    pub max_delay_ms: u64,
}

impl BackoffConfig {
    /// Defaults for HTTP errors: 5s steps, give up at 320s.
    pub const HTTP: BackoffConfig = BackoffConfig {
        step_ms: 5_000,
        max_delay_ms: 320_000,
    };

    /// Defaults for TCP/IP level errors: 250ms steps, give up at 16s.
    pub const SOCKET: BackoffConfig = BackoffConfig {
        step_ms: 250,
        max_delay_ms: 16_000,
    };

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Global configuration loaded from `~/.config/rivulet/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RivuletConfig {
    /// Seconds allowed for establishing the TCP/TLS connection.
    pub connect_timeout_secs: u64,
    /// A stream that delivers no bytes for this many seconds is treated as stalled.
    pub stall_timeout_secs: u64,
    /// HTTP status codes that trigger a paced reconnect instead of failing the stream.
    pub recoverable_status_codes: Vec<u16>,
    /// Optional HTTP backoff; if missing, `BackoffConfig::HTTP` is used.
    #[serde(default)]
    pub http_backoff: Option<BackoffConfig>,
    /// Optional socket backoff; if missing, `BackoffConfig::SOCKET` is used.
    #[serde(default)]
    pub socket_backoff: Option<BackoffConfig>,
    /// Extra request headers sent on every connect (e.g. authorization).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body chunks buffered between the transfer thread and the read loop (None = default).
    #[serde(default)]
    pub body_buffer_chunks: Option<usize>,
    /// Longest accepted body line in bytes (None = 1 MiB).
    #[serde(default)]
    pub max_line_bytes: Option<usize>,
}

impl Default for RivuletConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            stall_timeout_secs: 90,
            recoverable_status_codes: vec![420, 429, 500, 502, 503, 504],
            http_backoff: None,
            socket_backoff: None,
            headers: BTreeMap::new(),
            body_buffer_chunks: None,
            max_line_bytes: None,
        }
    }
}

impl RivuletConfig {
    pub fn http_backoff(&self) -> BackoffConfig {
        self.http_backoff.unwrap_or(BackoffConfig::HTTP)
    }

    pub fn socket_backoff(&self) -> BackoffConfig {
        self.socket_backoff.unwrap_or(BackoffConfig::SOCKET)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rivulet")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RivuletConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RivuletConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<RivuletConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: RivuletConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = RivuletConfig::default();
        assert_eq!(cfg.connect_timeout_secs, 15);
        assert_eq!(cfg.stall_timeout_secs, 90);
        assert_eq!(cfg.recoverable_status_codes, vec![420, 429, 500, 502, 503, 504]);
        assert_eq!(cfg.http_backoff(), BackoffConfig::HTTP);
        assert_eq!(cfg.socket_backoff(), BackoffConfig::SOCKET);
        assert!(cfg.headers.is_empty());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = RivuletConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RivuletConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.connect_timeout_secs, cfg.connect_timeout_secs);
        assert_eq!(parsed.stall_timeout_secs, cfg.stall_timeout_secs);
        assert_eq!(parsed.recoverable_status_codes, cfg.recoverable_status_codes);
    }

    #[test]
    fn config_toml_backoff_sections_and_headers() {
        let toml = r#"
            connect_timeout_secs = 5
            stall_timeout_secs = 30
            recoverable_status_codes = [503]
            body_buffer_chunks = 8
            max_line_bytes = 65536

            [http_backoff]
            step_ms = 1000
            max_delay_ms = 60000

            [socket_backoff]
            step_ms = 100
            max_delay_ms = 2000

            [headers]
            Authorization = "Bearer abc"
        "#;
        let cfg: RivuletConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.stall_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.recoverable_status_codes, vec![503]);
        assert_eq!(cfg.body_buffer_chunks, Some(8));
        assert_eq!(cfg.max_line_bytes, Some(65536));
        assert_eq!(cfg.http_backoff().step(), Duration::from_secs(1));
        assert_eq!(cfg.http_backoff().max_delay(), Duration::from_secs(60));
        assert_eq!(cfg.socket_backoff().step_ms, 100);
        assert_eq!(
            cfg.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[test]
    fn missing_optional_sections_fall_back() {
        let toml = r#"
            connect_timeout_secs = 10
            stall_timeout_secs = 60
            recoverable_status_codes = []
        "#;
        let cfg: RivuletConfig = toml::from_str(toml).unwrap();
        assert!(cfg.http_backoff.is_none());
        assert_eq!(cfg.http_backoff(), BackoffConfig::HTTP);
        assert!(cfg.recoverable_status_codes.is_empty());
        assert!(cfg.body_buffer_chunks.is_none());
        assert!(cfg.max_line_bytes.is_none());
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "connect_timeout_secs = 3\nstall_timeout_secs = 4\nrecoverable_status_codes = [502]\n",
        )
        .unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.connect_timeout_secs, 3);
        assert_eq!(cfg.recoverable_status_codes, vec![502]);
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "connect_timeout_secs = \"soon\"\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
    }
}
