use crate::error::{Result, SdkError};
use crate::services::ServicePreset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one service client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    /// Explicit key. When unset the key is read from `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Sent with every request; may override the SDK's own headers.
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

impl ClientConfig {
    pub fn for_service(preset: &ServicePreset) -> Self {
        Self {
            base_url: preset.base_url.to_string(),
            api_key: None,
            api_key_env: preset.default_api_key_env.to_string(),
            timeout_secs: preset.default_timeout_secs,
            default_headers: HashMap::new(),
        }
    }

    pub fn superagent() -> Self {
        Self::for_service(&ServicePreset::SUPERAGENT)
    }

    pub fn verifier() -> Self {
        Self::for_service(&ServicePreset::VERIFIER)
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Base URL without a trailing slash.
    pub fn effective_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// The configured key, else the environment variable. Empty values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One service's table in the config file. Unset fields fall back to the preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub default_headers: HashMap<String, String>,
}

impl ServiceSection {
    fn resolve(&self, preset: &ServicePreset) -> ClientConfig {
        let defaults = ClientConfig::for_service(preset);
        ClientConfig {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            api_key: self.api_key.clone(),
            api_key_env: self.api_key_env.clone().unwrap_or(defaults.api_key_env),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            default_headers: self.default_headers.clone(),
        }
    }
}

/// Contents of a `superagent.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub superagent: ServiceSection,
    pub verifier: ServiceSection,
}

impl SdkConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SdkError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: explicit path > CWD > XDG config > home dir.
    ///
    /// An explicit path must exist. Without one, finding nothing yields the
    /// built-in defaults.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in &config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn superagent(&self) -> ClientConfig {
        self.superagent.resolve(&ServicePreset::SUPERAGENT)
    }

    pub fn verifier(&self) -> ClientConfig {
        self.verifier.resolve(&ServicePreset::VERIFIER)
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("superagent.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("superagent").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("superagent").join("config.toml"));
        paths.push(home.join(".superagent.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
[superagent]
base_url = "https://agent.example.com/"
api_key = "sk-test"
timeout_secs = 120

[superagent.default_headers]
X-Team = "platform"

[verifier]
api_key_env = "MY_VERIFIER_KEY"
"#
        )
        .unwrap();

        let config = SdkConfig::load(f.path()).unwrap();
        let agent = config.superagent();
        assert_eq!(agent.effective_base_url(), "https://agent.example.com");
        assert_eq!(agent.api_key.as_deref(), Some("sk-test"));
        assert_eq!(agent.timeout_secs, 120);
        assert_eq!(
            agent.default_headers.get("X-Team"),
            Some(&"platform".to_string())
        );

        let verifier = config.verifier();
        assert_eq!(verifier.base_url, "http://localhost:8081");
        assert_eq!(verifier.api_key_env, "MY_VERIFIER_KEY");
        assert_eq!(verifier.timeout_secs, 30);
    }

    #[test]
    fn test_empty_file_uses_presets() {
        let f = NamedTempFile::new().unwrap();
        let config = SdkConfig::load(f.path()).unwrap();
        assert_eq!(config.superagent(), ClientConfig::superagent());
        assert_eq!(config.verifier(), ClientConfig::verifier());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "[superagent\nbase_url = 1").unwrap();
        let err = SdkConfig::load(f.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let err = SdkConfig::find_and_load(Some(Path::new("/nonexistent/superagent.toml")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_api_key_falls_back_to_env() {
        let mut config = ClientConfig::superagent();
        config.api_key_env = "SUPERAGENT_SDK_TEST_FALLBACK_KEY".to_string();
        std::env::set_var("SUPERAGENT_SDK_TEST_FALLBACK_KEY", "from-env");
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-env"));

        let config = config.api_key("explicit");
        assert_eq!(config.resolve_api_key().as_deref(), Some("explicit"));
    }

    #[test]
    fn test_api_key_unset_everywhere() {
        let mut config = ClientConfig::verifier();
        config.api_key_env = "SUPERAGENT_SDK_TEST_NEVER_SET".to_string();
        assert!(config.resolve_api_key().is_none());
    }
}
