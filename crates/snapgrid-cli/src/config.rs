//! Application configuration
//!
//! Layered: defaults, then an optional TOML file, then `FLICKR_API_KEY`,
//! then command-line flags (applied by the caller).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use snapgrid_core::GridConfig;
use snapgrid_search::SearchConfig;
use std::path::Path;

/// Environment variable holding the search API key
pub(crate) const API_KEY_ENV: &str = "FLICKR_API_KEY";

/// Everything the CLI needs to run a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) grid: GridConfig,
    pub(crate) search: SearchConfig,
}

impl AppConfig {
    /// Load from `path` (if any) and the environment
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_api_key(std::env::var(API_KEY_ENV).ok()))
    }

    /// Parse a TOML file
    pub(crate) fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Environment key wins over the file when set and non-empty
    #[must_use]
    pub(crate) fn with_env_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.search.api_key = Some(key);
        }
        self
    }

    /// Render as TOML with the API key masked
    pub(crate) fn to_toml_redacted(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        if shown.search.api_key.is_some() {
            shown.search.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).context("serializing config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use snapgrid_search::PhotoSize;
    use std::io::Write;

    #[test]
    fn missing_sections_use_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[grid]
max_concurrent_fetches = 3
thumbnail_size = 256

[search]
api_key = "from-file"
photo_size = "z"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.grid.max_concurrent_fetches, 3);
        assert_eq!(config.grid.thumbnail_size, Some(256));
        assert_eq!(config.grid.fetch_timeout_secs, 30);
        assert_eq!(config.search.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.search.photo_size, PhotoSize::Medium640);
        assert_eq!(config.search.per_page, 50);
    }

    #[test]
    fn env_key_overrides_file() {
        let config = AppConfig::default()
            .with_env_api_key(Some("file".into()))
            .with_env_api_key(Some("env".into()));
        assert_eq!(config.search.api_key.as_deref(), Some("env"));

        let config = config.with_env_api_key(Some(String::new()));
        assert_eq!(config.search.api_key.as_deref(), Some("env"));
    }

    #[test]
    fn unreadable_file_names_path() {
        let err = AppConfig::from_file(Path::new("/nonexistent/snapgrid.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/snapgrid.toml"));
    }

    #[test]
    fn redacted_toml_hides_key() {
        let mut config = AppConfig::default();
        config.search.api_key = Some("secret".into());
        let text = config.to_toml_redacted().unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains("max_concurrent_fetches = 6"));
    }
}
