//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;

use crate::emulator::SW_FILE_NOT_FOUND;

/// Daemon configuration. File: ~/.config/acard/config.toml or /etc/acard/config.toml.
/// Env overrides: ACARD_LISTEN_PORT, ACARD_DISCOVERY_PORT, ACARD_CERTIFICATE, ACARD_LOG.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Accessory link TCP port (default 45704).
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Discovery UDP port (default 45703).
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// How long to collect discovery replies.
    #[serde(default = "default_discovery_window_ms")]
    pub discovery_window_ms: u64,
    /// Signing certificate (PEM or DER) whose public key peers must present.
    #[serde(default = "default_certificate_path")]
    pub certificate_path: PathBuf,
    /// AIDs reported to peers, in order.
    #[serde(default = "default_aids")]
    pub aids: Vec<String>,
    /// Status word the stand-in emulator answers with.
    #[serde(default = "default_status_word")]
    pub status_word: u16,
    /// Log filter used when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    45704
}
fn default_discovery_port() -> u16 {
    45703
}
fn default_discovery_window_ms() -> u64 {
    1500
}
fn default_certificate_path() -> PathBuf {
    config_dir()
        .map(|d| d.join("signing.pem"))
        .unwrap_or_else(|| PathBuf::from("/etc/acard/signing.pem"))
}
fn default_aids() -> Vec<String> {
    vec!["F000000001".to_string()]
}
fn default_status_word() -> u16 {
    SW_FILE_NOT_FOUND
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            discovery_port: default_discovery_port(),
            discovery_window_ms: default_discovery_window_ms(),
            certificate_path: default_certificate_path(),
            aids: default_aids(),
            status_word: default_status_word(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn discovery_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.discovery_window_ms)
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(p) = var("ACARD_LISTEN_PORT").and_then(|s| s.parse::<u16>().ok()) {
        c.listen_port = p;
    }
    if let Some(p) = var("ACARD_DISCOVERY_PORT").and_then(|s| s.parse::<u16>().ok()) {
        c.discovery_port = p;
    }
    if let Some(path) = var("ACARD_CERTIFICATE") {
        c.certificate_path = PathBuf::from(path);
    }
    if let Some(level) = var("ACARD_LOG") {
        c.log_level = level;
    }
}

fn config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config/acard"))
}

fn config_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(d) = config_dir() {
        out.push(d.join("config.toml"));
    }
    out.push(PathBuf::from("/etc/acard/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p).map(|s| toml::from_str::<Config>(&s)) {
                Ok(Ok(c)) => return Some(c),
                Ok(Err(e)) => {
                    eprintln!("acard: ignoring {}: {}", p.display(), e);
                }
                Err(e) => {
                    eprintln!("acard: cannot read {}: {}", p.display(), e);
                }
            }
            break;
        }
    }
    None
}
