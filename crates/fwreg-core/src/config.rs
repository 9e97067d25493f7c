//! Configuration loading and credential resolution

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::detect::DeviceDetector;

/// Environment variable holding the service base URL
pub const ENV_BASE_URL: &str = "EXPO_PUBLIC_SUPABASE_URL";
/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "EXPO_PUBLIC_SUPABASE_ANON_KEY";
/// Env-file key holding the service base URL
pub const FILE_BASE_URL: &str = "SUPABASE_URL";
/// Env-file key holding the API key
pub const FILE_API_KEY: &str = "SUPABASE_ANON_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error(
        "SUPABASE_URL and SUPABASE_ANON_KEY must be set either in environment variables or in the env file (checked {})",
        .env_file.display()
    )]
    MissingCredentials { env_file: PathBuf },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub detection: DeviceDetector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory searched for firmware binaries
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,
    /// Extension identifying firmware binaries
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Object storage bucket
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// REST table holding firmware records
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            extension: default_extension(),
            bucket: default_bucket(),
            table: default_table(),
        }
    }
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("./firmware")
}

fn default_extension() -> String {
    ".bin".to_string()
}

fn default_bucket() -> String {
    "firmware".to_string()
}

fn default_table() -> String {
    "firmware".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Key=value file consulted when the environment lacks credentials
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
        }
    }
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

/// Load configuration from file, falling back to defaults when it is absent
pub fn load_config(path: &Path) -> Result<RegistryConfig, ConfigError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: RegistryConfig = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        debug!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(RegistryConfig::default())
    }
}

/// Backend credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Service base URL, without trailing slash
    pub base_url: String,
    /// API key, sent both as bearer token and `apikey` header
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Resolve credentials from the process environment, then the env file
    pub fn from_env(env_file: &Path) -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok(), env_file)
    }

    /// Resolve credentials using `lookup` for environment variables
    ///
    /// Each value falls back to the env file independently, so the URL may come
    /// from the environment and the key from the file.
    pub fn resolve<F>(lookup: F, env_file: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let mut base_url = non_empty(lookup(ENV_BASE_URL));
        let mut api_key = non_empty(lookup(ENV_API_KEY));

        if base_url.is_none() || api_key.is_none() {
            let file_vars = read_env_file(env_file)?;
            base_url = base_url.or_else(|| non_empty(file_vars.get(FILE_BASE_URL).cloned()));
            api_key = api_key.or_else(|| non_empty(file_vars.get(FILE_API_KEY).cloned()));
        }

        match (base_url, api_key) {
            (Some(url), Some(key)) => Ok(Self::new(url, key)),
            _ => Err(ConfigError::MissingCredentials {
                env_file: env_file.to_path_buf(),
            }),
        }
    }
}

/// Read a key=value file
///
/// Blank lines and lines starting with `//` or `#` are skipped. Lines are split
/// at the first `=`. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "Env file not found");
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_env(&content))
}

fn parse_env(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_env() {
        let vars = parse_env(
            "// comment\n# another\n\nSUPABASE_URL=https://x.supabase.co\nSUPABASE_ANON_KEY=abc=def\nJUNK\n",
        );
        assert_eq!(vars.get("SUPABASE_URL").unwrap(), "https://x.supabase.co");
        // Split at the first '=' only
        assert_eq!(vars.get("SUPABASE_ANON_KEY").unwrap(), "abc=def");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_credentials_from_environment() {
        let temp_dir = TempDir::new().unwrap();
        let creds = Credentials::resolve(
            |key| match key {
                ENV_BASE_URL => Some("https://env.example.com/".to_string()),
                ENV_API_KEY => Some("env-key".to_string()),
                _ => None,
            },
            &temp_dir.path().join(".env"),
        )
        .unwrap();
        assert_eq!(creds.base_url, "https://env.example.com");
        assert_eq!(creds.api_key, "env-key");
    }

    #[test]
    fn test_credentials_fall_back_per_field() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".env");
        std::fs::write(
            &env_file,
            "SUPABASE_URL=https://file.example.com\nSUPABASE_ANON_KEY=file-key\n",
        )
        .unwrap();

        let creds = Credentials::resolve(
            |key| (key == ENV_BASE_URL).then(|| "https://env.example.com".to_string()),
            &env_file,
        )
        .unwrap();
        assert_eq!(creds.base_url, "https://env.example.com");
        assert_eq!(creds.api_key, "file-key");
    }

    #[test]
    fn test_missing_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join(".env");
        std::fs::write(&env_file, "SUPABASE_URL=https://file.example.com\n").unwrap();

        let err = Credentials::resolve(|_| None, &env_file).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials { .. }));
        assert!(err.to_string().contains(".env"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = Credentials::new("https://x", "secret-key");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("https://x"));
    }

    #[test]
    fn test_load_config_defaults_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.storage.bucket, "firmware");
        assert_eq!(config.storage.extension, ".bin");
        assert_eq!(config.detection.fallback, "esp32");

        let path = temp_dir.path().join("fwreg.toml");
        std::fs::write(
            &path,
            r#"
[storage]
bin_dir = "/srv/firmware"
bucket = "images"

[detection]
known_devices = ["nrf52"]
separator = "-"
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.bin_dir, PathBuf::from("/srv/firmware"));
        assert_eq!(config.storage.bucket, "images");
        assert_eq!(config.storage.table, "firmware");
        assert_eq!(config.detection.known_devices, vec!["nrf52".to_string()]);
        assert_eq!(config.detection.separator, '-');
        assert_eq!(config.detection.fallback, "esp32");
        assert_eq!(config.credentials.env_file, PathBuf::from(".env"));
    }
}
