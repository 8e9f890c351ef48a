//! Application Configuration
//!
//! Proxy, client and capture settings stored in TOML format. The model
//! credential is never stored here; only the name of the environment
//! variable that holds it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::capture::encoder::DEFAULT_JPEG_QUALITY;
use crate::capture::FacingMode;
use crate::proxy::DEFAULT_MAX_BODY_BYTES;
use crate::vision::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::vision::ApiKey;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Proxy service settings
    pub proxy: ProxySettings,
    /// Analysis client settings
    pub client: ClientSettings,
    /// Capture settings
    pub capture: CaptureSettings,
}

/// Proxy service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Base URL of the model API
    pub api_base: String,
    /// Model identifier
    pub model: String,
    /// Environment variable holding the model API key
    pub api_key_env: String,
    /// Timeout for one model call, in seconds
    pub request_timeout_secs: u64,
    /// Largest accepted request body, in bytes
    pub max_body_bytes: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8888".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "API_KEY".to_string(),
            request_timeout_secs: 60,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ProxySettings {
    /// Model call timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Read the API key once through `lookup` (normally the process environment)
    pub fn resolve_api_key<F>(&self, lookup: F) -> Option<ApiKey>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        lookup(&self.api_key_env).and_then(ApiKey::new)
    }
}

/// Analysis client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Full URL of the analyze endpoint
    pub endpoint: String,
    /// Timeout for one analysis round trip, in seconds
    pub timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8888/api/analyze".to_string(),
            timeout_secs: 60,
        }
    }
}

impl ClientSettings {
    /// Round trip timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Camera facing to request first
    pub preferred_facing: FacingMode,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            preferred_facing: FacingMode::Environment,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check proxy defaults
        assert_eq!(config.proxy.bind_address, "127.0.0.1:8888");
        assert_eq!(config.proxy.model, "gemini-2.5-flash");
        assert_eq!(config.proxy.api_key_env, "API_KEY");
        assert_eq!(config.proxy.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.proxy.max_body_bytes, 20 * 1024 * 1024);

        // Check client defaults
        assert_eq!(config.client.endpoint, "http://127.0.0.1:8888/api/analyze");
        assert_eq!(config.client.timeout(), Duration::from_secs(60));

        // Check capture defaults
        assert_eq!(config.capture.preferred_facing, FacingMode::Environment);
        assert_eq!(config.capture.jpeg_quality, 90);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.capture.preferred_facing = FacingMode::User;
        config.client.timeout_secs = 15;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.capture.preferred_facing, FacingMode::User);
        assert_eq!(parsed.client.timeout_secs, 15);
        assert_eq!(parsed.proxy.api_base, config.proxy.api_base);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [proxy]
            bind_address = "0.0.0.0:9000"
            max_body_bytes = 8388608

            [capture]
            preferred_facing = "user"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.proxy.bind_address, "0.0.0.0:9000");
        assert_eq!(parsed.proxy.model, "gemini-2.5-flash");
        assert_eq!(parsed.proxy.max_body_bytes, 8 * 1024 * 1024);
        assert_eq!(parsed.capture.preferred_facing, FacingMode::User);
        assert_eq!(parsed.capture.jpeg_quality, 90);
        assert_eq!(parsed.client.timeout_secs, 60);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.proxy.bind_address, loaded.proxy.bind_address);
        assert_eq!(config.client.endpoint, loaded.client.endpoint);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_api_key() {
        let settings = ProxySettings::default();

        let key = settings.resolve_api_key(|name| {
            assert_eq!(name, "API_KEY");
            Some("abc123".to_string())
        });
        assert_eq!(key.unwrap().expose(), "abc123");

        assert!(settings.resolve_api_key(|_| None).is_none());
        assert!(settings.resolve_api_key(|_| Some(String::new())).is_none());
    }
}
