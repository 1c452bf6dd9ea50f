//! Configuration loader (C12, §4.12).
//!
//! Grounded on the original project's `ConfigManager::LoadConfig`
//! (`src/core/config_manager.cpp`), a hand-rolled TOML-ish key/value reader
//! with manual validation and an `exit(1)` on any bad value. Replaced here
//! with the `config` crate's layered builder (defaults → optional file →
//! `MCPD_`-prefixed, `__`-separated environment variables, in increasing
//! precedence, matching §4.12/§6's ordering and key table exactly) and
//! explicit validation that collects every problem into one aggregated
//! [`ConfigError`] instead of the source's first-error-wins `exit()`.

use std::net::IpAddr;
use std::path::PathBuf;

use serde::Deserialize;

/// Fully validated, immutable server configuration (§6 "Configuration
/// (recognised keys)").
#[derive(Debug, Clone)]
pub struct Config {
    /// IP to accept connections on.
    pub bind_address: IpAddr,
    /// Plain-HTTP port; `0` disables HTTP.
    pub http_port: u16,
    /// HTTPS port; `0` disables HTTPS.
    pub https_port: u16,
    /// TLS certificate chain path, required when `https_port != 0`.
    pub tls_cert_path: Option<PathBuf>,
    /// TLS private key path, required when `https_port != 0`.
    pub tls_key_path: Option<PathBuf>,
    /// Directory scanned for plugins at startup.
    pub plugin_dir: PathBuf,
    /// Cap on concurrently tracked sessions (C2).
    pub max_sessions: usize,
    /// Ring length of cached events per session (C2).
    pub max_events_per_session: usize,
    /// Default session/event cache TTL.
    pub session_ttl: std::time::Duration,
    /// Native worker-thread count for the async runtime.
    pub io_pool_threads: usize,
    /// `trace`/`debug`/`info`/`warn`/`error`.
    pub log_level: String,
    /// Log output path; `None` means stdout.
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawServer {
    bind_address: String,
    http_port: u16,
    https_port: u16,
    tls_cert_path: Option<String>,
    tls_key_path: Option<String>,
    plugin_dir: String,
    io_pool_threads: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawCache {
    max_sessions: usize,
    max_events_per_session: usize,
    session_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawLog {
    level: String,
    path: Option<String>,
}

/// Raw, not-yet-validated configuration as deserialized from defaults, file,
/// and environment layers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct RawConfig {
    server: RawServer,
    cache: RawCache,
    log: RawLog,
}

/// Every way [`load`] can fail (§4.12 "reported as a single aggregated
/// error").
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The `config` crate failed to build or deserialize the layered
    /// sources (malformed TOML, type mismatch, …).
    #[error("failed to load configuration: {0}")]
    Source(#[from] Box<config::ConfigError>),

    /// One or more validated fields were semantically invalid; every
    /// problem found is collected rather than stopping at the first.
    #[error("invalid configuration:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

const DEFAULTS: &str = r#"
[server]
bind_address = "127.0.0.1"
http_port = 6666
https_port = 0
plugin_dir = "plugins"
io_pool_threads = 2

[cache]
max_sessions = 1000
max_events_per_session = 500
session_ttl_secs = 86400

[log]
level = "info"
"#;

/// Load configuration from, in increasing precedence: built-in defaults, an
/// optional TOML file at `config_path` (or `config.toml` in the working
/// directory if `config_path` is `None` and that file exists), and
/// `MCPD_`-prefixed, `__`-separated environment variables
/// (`MCPD_SERVER__HTTP_PORT`, `MCPD_SERVER__TLS_CERT_PATH`, …). Validates
/// the merged result and returns a single aggregated [`ConfigError`] on any
/// problem.
pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml));

    match config_path {
        Some(path) => {
            builder = builder.add_source(config::File::with_name(path));
        }
        None => {
            if std::path::Path::new("config.toml").exists() {
                builder = builder.add_source(config::File::with_name("config.toml"));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MCPD")
            .separator("__")
            .try_parsing(true),
    );

    let raw: RawConfig = builder
        .build()
        .map_err(Box::new)?
        .try_deserialize()
        .map_err(Box::new)?;

    validate(raw)
}

fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
    let mut problems = Vec::new();

    let bind_address = raw.server.bind_address.parse::<IpAddr>().unwrap_or_else(|_| {
        problems.push(format!("invalid server.bind_address: {}", raw.server.bind_address));
        IpAddr::from([0, 0, 0, 0])
    });

    if raw.server.http_port == 0 && raw.server.https_port == 0 {
        problems.push("at least one of server.http_port/server.https_port must be non-zero".to_string());
    }

    if raw.server.io_pool_threads == 0 {
        problems.push("server.io_pool_threads must be positive".to_string());
    }

    if raw.cache.max_sessions == 0 {
        problems.push("cache.max_sessions must be positive".to_string());
    }

    let tls_cert_path = raw.server.tls_cert_path.clone().map(PathBuf::from);
    let tls_key_path = raw.server.tls_key_path.clone().map(PathBuf::from);

    if raw.server.https_port != 0 && (tls_cert_path.is_none() || tls_key_path.is_none()) {
        problems.push("server.https_port is set but tls_cert_path/tls_key_path are missing".to_string());
    }

    if !matches!(raw.log.level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
        problems.push(format!("invalid log.level: {}", raw.log.level));
    }

    if !problems.is_empty() {
        return Err(ConfigError::Invalid(problems));
    }

    Ok(Config {
        bind_address,
        http_port: raw.server.http_port,
        https_port: raw.server.https_port,
        tls_cert_path,
        tls_key_path,
        plugin_dir: PathBuf::from(raw.server.plugin_dir),
        max_sessions: raw.cache.max_sessions,
        max_events_per_session: raw.cache.max_events_per_session,
        session_ttl: std::time::Duration::from_secs(raw.cache.session_ttl_secs),
        io_pool_threads: raw.server.io_pool_threads,
        log_level: raw.log.level,
        log_path: raw.log.path.map(PathBuf::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let config = load(None);
        std::env::set_current_dir(cwd).unwrap();
        let config = config.unwrap();
        assert_eq!(config.http_port, 6666);
        assert_eq!(config.io_pool_threads, 2);
        assert_eq!(config.bind_address, IpAddr::from([127, 0, 0, 1]));
    }

    #[test]
    fn https_without_cert_paths_is_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "https_port = 8443").unwrap();
        let err = load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn both_ports_zero_is_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "http_port = 0").unwrap();
        writeln!(file, "https_port = 0").unwrap();
        let err = load(Some(file.path().to_str().unwrap())).unwrap_err();
        let ConfigError::Invalid(problems) = err else {
            panic!("expected Invalid");
        };
        assert!(problems.iter().any(|p| p.contains("http_port")));
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "http_port = 9000").unwrap();
        std::env::set_var("MCPD_SERVER__HTTP_PORT", "9100");
        let config = load(Some(file.path().to_str().unwrap())).unwrap();
        std::env::remove_var("MCPD_SERVER__HTTP_PORT");
        assert_eq!(config.http_port, 9100);
    }
}
