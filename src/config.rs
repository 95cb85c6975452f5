//! Runtime configuration.
//!
//! Read from the YAML file named by the `CONFIG` environment variable (every
//! key is optional), then overridden by `LISTEN`, `SHELL_LISTEN` and
//! `WWW_ROOT`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub shell: ShellConfig,
    pub commands: CommandConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub listen_addr: String,
    /// Directory files are served from.
    pub root_dir: PathBuf,
    /// Directory `/upload` writes into.
    pub upload_dir: PathBuf,
    pub max_connections: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:8080".to_string(),
            root_dir: PathBuf::from("www"),
            upload_dir: PathBuf::from("."),
            max_connections: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub max_connections: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:2323".to_string(),
            max_connections: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Lines that may wait for the command thread.
    pub queue_depth: usize,
    pub gc_interval_ms: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            queue_depth: 8,
            gc_interval_ms: 1000,
        }
    }
}

impl CommandConfig {
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms.max(1))
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("CONFIG") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {path}"))?;
                Self::from_yaml_str(&text).with_context(|| format!("parsing {path}"))?
            }
            Err(_) => Self::default(),
        };

        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("LISTEN") {
            self.http.listen_addr = addr;
        }
        if let Ok(addr) = std::env::var("SHELL_LISTEN") {
            self.shell.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("WWW_ROOT") {
            self.http.root_dir = PathBuf::from(root);
        }
    }
}
