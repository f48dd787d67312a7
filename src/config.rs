use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::render::ViewMode;

const CONFIG_FILE: &str = ".pr-viewer.toml";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = "pr-viewer";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .pr-viewer.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Presentation settings
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    /// Requests are sent anonymously when neither is set.
    pub token: Option<String>,

    /// API base URL, for GitHub Enterprise. Defaults to https://api.github.com
    pub api_url: Option<String>,

    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewConfig {
    /// Diff layout used when --view is not given
    #[serde(default)]
    pub mode: ViewMode,
}

impl Config {
    /// Load configuration from .pr-viewer.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var. Blank values count as unset.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    pub fn api_url(&self) -> &str {
        self.github.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn user_agent(&self) -> &str {
        self.github.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.api_url(), "https://api.github.com");
        assert_eq!(config.user_agent(), "pr-viewer");
        assert_eq!(config.view.mode, ViewMode::Unified);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
token = "abc123"
api_url = "https://ghe.example.com/api/v3"

[view]
mode = "split"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github_token().as_deref(), Some("abc123"));
        assert_eq!(config.api_url(), "https://ghe.example.com/api/v3");
        assert_eq!(config.view.mode, ViewMode::Split);
    }

    #[test]
    fn test_empty_config_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.github.api_url.is_none());
        assert_eq!(config.view.mode, ViewMode::Unified);
    }

    #[test]
    fn test_invalid_view_mode_is_parse_error() {
        let result: Result<Config, _> = toml::from_str("[view]\nmode = \"sideways\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("pr_viewer_test_config_{}.toml", std::process::id()));
        fs::write(&path, "[github]\nuser_agent = \"custom-agent\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.user_agent(), "custom-agent");
        assert!(config.github.token.is_none());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::load_from(Path::new("/nonexistent/pr-viewer.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_)));
    }
}
