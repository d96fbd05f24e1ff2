use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::store::GitHubConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct NikkiConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub avatar: AvatarConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct AuthConfig {
    pub secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthConfig {
    /// File value first, then `ADMIN_PASSWORD`.
    pub fn resolved_secret(&self) -> Option<String> {
        self.secret
            .clone()
            .or_else(|| std::env::var("ADMIN_PASSWORD").ok())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Github,
    Memory,
}

#[derive(Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    pub branch: Option<String>,
    #[serde(default = "default_document_path")]
    pub document_path: String,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
    pub token: Option<String>,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("document_path", &self.document_path)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

fn default_document_path() -> String {
    "data/summaries.json".to_string()
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    concat!("nikki/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_store_timeout() -> u64 {
    15
}

impl StoreConfig {
    /// GitHub connection settings; the token falls back to `GITHUB_TOKEN`.
    pub fn github(&self) -> Result<GitHubConfig, ConfigError> {
        let token = self
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::NotFound("store.token (or GITHUB_TOKEN)".to_string()))?;
        if self.owner.is_empty() || self.repo.is_empty() {
            return Err(ConfigError::Message(
                "store.owner and store.repo are required for the github backend".to_string(),
            ));
        }

        Ok(GitHubConfig {
            token,
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            api_base: self.api_base.clone(),
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
        })
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub model: String,
    pub api_base: String,
    pub timeout_seconds: u64,
    pub max_output_tokens: u32,
    pub prompt: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for EnrichmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentConfig")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_seconds: 8,
            max_output_tokens: 100,
            prompt: None,
            api_key: None,
        }
    }
}

impl EnrichmentConfig {
    /// File value first, then `GEMINI_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AvatarConfig {
    #[serde(default)]
    pub images: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub directory: String,
    pub public_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            directory: "images".to_string(),
            public_base_url: String::new(),
        }
    }
}

impl NikkiConfig {
    /// Load a TOML file, with `NIKKI__SECTION__KEY` variables taking precedence.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("NIKKI").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = NikkiConfig::from_toml(
            r#"
            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.document_path, "data/summaries.json");
        assert_eq!(config.http.port, 8787);
        assert_eq!(config.enrichment.timeout_seconds, 8);
        assert!(config.avatar.images.is_empty());
        assert_eq!(config.uploads.directory, "images");
    }

    #[test]
    fn full_github_config_parses() {
        let config = NikkiConfig::from_toml(
            r#"
            [http]
            host = "0.0.0.0"
            port = 9000
            max_upload_bytes = 1024

            [auth]
            secret = "hunter2"

            [store]
            backend = "github"
            owner = "someone"
            repo = "My-japanese-diary"
            branch = "main"
            token = "ghp_test"

            [avatar]
            images = ["picture/01.JPG"]

            [uploads]
            directory = "uploads"
            public_base_url = "https://raw.githubusercontent.com/someone/My-japanese-diary/main"
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.resolved_secret().as_deref(), Some("hunter2"));
        let github = config.store.github().unwrap();
        assert_eq!(github.owner, "someone");
        assert_eq!(github.branch.as_deref(), Some("main"));
        assert_eq!(github.timeout, Duration::from_secs(15));
        assert_eq!(config.avatar.images, vec!["picture/01.JPG".to_string()]);
    }

    #[test]
    fn github_backend_requires_coordinates() {
        let config = NikkiConfig::from_toml(
            r#"
            [store]
            backend = "github"
            token = "ghp_test"
            "#,
        )
        .unwrap();
        assert!(config.store.github().is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = NikkiConfig::from_toml(
            r#"
            [auth]
            secret = "hunter2"
            [store]
            backend = "github"
            token = "ghp_secret"
            [enrichment]
            model = "gemini-2.5-flash"
            api_base = "https://example.invalid"
            timeout_seconds = 3
            max_output_tokens = 50
            api_key = "AIza-secret"
            "#,
        )
        .unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("ghp_secret"));
        assert!(!printed.contains("AIza-secret"));
    }
}
