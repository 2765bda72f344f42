//! Folder configuration: which directories are searchable.
//!
//! The configuration is a small JSON document loaded once at startup:
//!
//! ```json
//! { "folders": ["/home/me/notes", "/home/me/papers", "relative/dir"],
//!   "query_timeout_ms": 10000,
//!   "model": "lightonai/GTE-ModernColBERT-v1" }
//! ```
//!
//! Relative folder entries are resolved against the directory holding the
//! configuration file. Changing the file requires a restart.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const CONFIG_ENV_VAR: &str = "SEARCH_MCP_CONFIG";
pub const CONFIG_FILE_NAME: &str = "folders.json";
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    folders: Vec<String>,
    #[serde(default)]
    query_timeout_ms: Option<u64>,
    #[serde(default)]
    model: Option<String>,
}

/// Parsed folder configuration.
#[derive(Debug, Clone)]
pub struct FolderConfig {
    /// Folder paths in configuration order, already made absolute.
    pub folders: Vec<PathBuf>,
    /// Deadline applied to each per-collection query.
    pub query_timeout: Duration,
    /// Embedding model override.
    pub model: Option<String>,
}

impl FolderConfig {
    /// Resolve the configuration file location from, in order of priority:
    /// 1. An explicit path (from --config)
    /// 2. The SEARCH_MCP_CONFIG environment variable
    /// 3. The XDG config directory (~/.config/search-mcp/folders.json)
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(val));
        }
        xdg::BaseDirectories::with_prefix("search-mcp")
            .get_config_home()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                Error::Config(
                    "could not determine XDG config home directory".into(),
                )
            })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    /// Parse configuration text, resolving relative folders against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid config: {e}")))?;

        let mut folders = Vec::with_capacity(raw.folders.len());
        for entry in raw.folders {
            if entry.trim().is_empty() {
                return Err(Error::Config(
                    "folder entries must not be empty".into(),
                ));
            }
            let path = PathBuf::from(entry);
            folders.push(if path.is_absolute() {
                path
            } else {
                base.join(path)
            });
        }

        let query_timeout = match raw.query_timeout_ms {
            Some(0) => {
                return Err(Error::Config(
                    "query_timeout_ms must be greater than zero".into(),
                ));
            }
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_QUERY_TIMEOUT,
        };

        Ok(Self {
            folders,
            query_timeout,
            model: raw.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config =
            FolderConfig::parse(r#"{"folders": ["/a", "/b"]}"#, Path::new("/"))
                .unwrap();

        assert_eq!(
            config.folders,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(config.query_timeout, DEFAULT_QUERY_TIMEOUT);
        assert!(config.model.is_none());
    }

    #[test]
    fn relative_folders_resolve_against_base() {
        let config = FolderConfig::parse(
            r#"{"folders": ["notes", "/abs"]}"#,
            Path::new("/etc/search-mcp"),
        )
        .unwrap();

        assert_eq!(config.folders[0], PathBuf::from("/etc/search-mcp/notes"));
        assert_eq!(config.folders[1], PathBuf::from("/abs"));
    }

    #[test]
    fn optional_fields_are_read() {
        let config = FolderConfig::parse(
            r#"{"folders": [], "query_timeout_ms": 250, "model": "m/x"}"#,
            Path::new("/"),
        )
        .unwrap();

        assert!(config.folders.is_empty());
        assert_eq!(config.query_timeout, Duration::from_millis(250));
        assert_eq!(config.model.as_deref(), Some("m/x"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = FolderConfig::parse(
            r#"{"folders": [], "query_timeout_ms": 0}"#,
            Path::new("/"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_folders_is_rejected() {
        assert!(FolderConfig::parse("{}", Path::new("/")).is_err());
        assert!(
            FolderConfig::parse(r#"{"folders": [""]}"#, Path::new("/"))
                .is_err()
        );
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"folders": ["docs"]}"#).unwrap();

        let config = FolderConfig::load(&path).unwrap();
        assert_eq!(config.folders, vec![tmp.path().join("docs")]);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = FolderConfig::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_location_wins() {
        let path = FolderConfig::locate(Some(Path::new("/x/y.json"))).unwrap();
        assert_eq!(path, PathBuf::from("/x/y.json"));
    }
}
