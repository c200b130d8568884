//! Settings file and path resolution
//!
//! `~/.kubedeck/config.toml` is optional; every key has a default and CLI
//! flags override whatever the file says.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Directory holding the config file and the log file
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kubedeck"))
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Contexts kept loaded at once (1-20)
    pub max_contexts: usize,
    pub sync_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// How long status messages stay in the bottom bar
    pub status_message_secs: u64,
    pub tick_rate_ms: u64,
    /// Lines fetched when opening pod logs
    pub log_tail_lines: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_contexts: 5,
            sync_timeout_secs: kubedeck_k8s::DEFAULT_SYNC_TIMEOUT.as_secs(),
            connect_timeout_secs: kubedeck_k8s::DEFAULT_CONNECT_TIMEOUT.as_secs(),
            read_timeout_secs: kubedeck_k8s::DEFAULT_READ_TIMEOUT.as_secs(),
            status_message_secs: 4,
            tick_rate_ms: 250,
            log_tail_lines: 200,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    /// Read settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_message_secs)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(10))
    }
}

/// Kubeconfig to use: the flag, else the first `$KUBECONFIG` entry, else
/// `~/.kube/config`
pub fn resolve_kubeconfig(flag: Option<PathBuf>, env: Option<&OsStr>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(first) = env.and_then(|value| std::env::split_paths(value).next()) {
        if !first.as_os_str().is_empty() {
            return Ok(first);
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .context("Could not determine home directory for ~/.kube/config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.sync_timeout(), Duration::from_secs(30));
        assert_eq!(settings.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_contexts = 3\nstatus_message_secs = 8").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.max_contexts, 3);
        assert_eq!(settings.status_ttl(), Duration::from_secs(8));
        assert_eq!(settings.tick_rate_ms, 250);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_contexts = \"lots\"").unwrap();
        assert!(Settings::load(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "colour = \"red\"").unwrap();
        assert!(Settings::load(file.path()).is_err());
    }

    #[test]
    fn test_kubeconfig_resolution() {
        let flag = PathBuf::from("/tmp/flag-config");
        assert_eq!(
            resolve_kubeconfig(Some(flag.clone()), Some(OsStr::new("/tmp/env"))).unwrap(),
            flag
        );

        let joined = std::env::join_paths(["/tmp/first", "/tmp/second"]).unwrap();
        assert_eq!(
            resolve_kubeconfig(None, Some(joined.as_os_str())).unwrap(),
            PathBuf::from("/tmp/first")
        );

        let fallback = resolve_kubeconfig(None, Some(OsStr::new(""))).unwrap();
        assert!(fallback.ends_with(".kube/config"));
    }
}
