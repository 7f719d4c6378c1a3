use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Identity provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Firebase ID tokens (RS256, Google-hosted keys)
    Firebase,
    /// HS256 tokens signed with a shared secret
    Jwt,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_provider")]
    pub provider: AuthProvider,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_jwks_url")]
    pub jwks_url: String,
    #[serde(default = "default_jwks_cache_seconds")]
    pub jwks_cache_seconds: u64,
    #[serde(default)]
    pub jwt_secret: String,
}

/// Blob storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderKind {
    /// Google Cloud Storage
    Gcs,
    /// Local directory served under /images
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_provider")]
    pub provider: StorageProviderKind,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Prefix of every image URL; derived from the provider when empty
    #[serde(default)]
    pub public_base_url: String,
    /// Static OAuth token for GCS; the metadata server is used when empty
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default)]
    pub delete_blob_on_remove: bool,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1323
}

fn default_db_path() -> String {
    "data/daymemo.db".to_string()
}

fn default_auth_provider() -> AuthProvider {
    AuthProvider::Firebase
}

fn default_jwks_url() -> String {
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
        .to_string()
}

fn default_jwks_cache_seconds() -> u64 {
    3600
}

fn default_storage_provider() -> StorageProviderKind {
    StorageProviderKind::Gcs
}

fn default_bucket() -> String {
    "daymemo-memory".to_string()
}

fn default_local_path() -> String {
    "data/images".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: default_auth_provider(),
            project_id: String::new(),
            jwks_url: default_jwks_url(),
            jwks_cache_seconds: default_jwks_cache_seconds(),
            jwt_secret: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            bucket: default_bucket(),
            public_base_url: String::new(),
            access_token: String::new(),
            local_path: default_local_path(),
            delete_blob_on_remove: false,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.resolve_public_base_url();
        config.check_auth()?;
        config.ensure_directories()?;
        tracing::info!(
            "Storage config: provider={:?}, bucket={}, public_base_url={}",
            config.storage.provider,
            config.storage.bucket,
            config.storage.public_base_url
        );
        Ok(config)
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: DM_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(val) = var("DM_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(val) = var("DM_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        // Database overrides
        if let Some(val) = var("DM_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        // Auth overrides
        if let Some(val) = var("DM_CONF_AUTH_PROVIDER") {
            match val.trim().to_lowercase().as_str() {
                "firebase" => self.auth.provider = AuthProvider::Firebase,
                "jwt" => self.auth.provider = AuthProvider::Jwt,
                other => tracing::warn!("Ignoring unknown auth provider: {}", other),
            }
        }
        if let Some(val) = var("DM_CONF_AUTH_PROJECT_ID") {
            self.auth.project_id = val;
        }
        if let Some(val) = var("DM_CONF_AUTH_JWKS_URL") {
            if !val.trim().is_empty() {
                self.auth.jwks_url = val;
            }
        }
        if let Some(val) = var("DM_CONF_AUTH_JWKS_CACHE_SECONDS") {
            if let Ok(secs) = val.parse() {
                self.auth.jwks_cache_seconds = secs;
            }
        }
        if let Some(val) = var("DM_CONF_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = val;
        }

        // Storage overrides
        if let Some(val) = var("DM_CONF_STORAGE_PROVIDER") {
            match val.trim().to_lowercase().as_str() {
                "gcs" => self.storage.provider = StorageProviderKind::Gcs,
                "local" => self.storage.provider = StorageProviderKind::Local,
                other => tracing::warn!("Ignoring unknown storage provider: {}", other),
            }
        }
        if let Some(val) = var("DM_CONF_STORAGE_BUCKET") {
            if !val.trim().is_empty() {
                self.storage.bucket = val;
            }
        }
        if let Some(val) = var("DM_CONF_STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = val;
        }
        if let Some(val) = var("DM_CONF_STORAGE_ACCESS_TOKEN") {
            self.storage.access_token = val;
        }
        if let Some(val) = var("DM_CONF_STORAGE_LOCAL_PATH") {
            self.storage.local_path = val;
        }
        if let Some(val) = var("DM_CONF_STORAGE_DELETE_BLOB_ON_REMOVE") {
            if let Ok(v) = val.parse() {
                self.storage.delete_blob_on_remove = v;
            }
        }
    }

    /// Fill in the image URL prefix when it was not configured explicitly
    fn resolve_public_base_url(&mut self) {
        let configured = self.storage.public_base_url.trim().trim_end_matches('/');
        self.storage.public_base_url = if configured.is_empty() {
            match self.storage.provider {
                StorageProviderKind::Gcs => {
                    format!("https://storage.googleapis.com/{}", self.storage.bucket)
                }
                StorageProviderKind::Local => {
                    let host = match self.server.host.as_str() {
                        "0.0.0.0" => "localhost",
                        host => host,
                    };
                    format!("http://{}:{}/images", host, self.server.port)
                }
            }
        } else {
            configured.to_string()
        };
    }

    fn check_auth(&self) -> anyhow::Result<()> {
        match self.auth.provider {
            AuthProvider::Firebase if self.auth.project_id.trim().is_empty() => {
                anyhow::bail!("auth.project_id is required for the firebase provider")
            }
            AuthProvider::Jwt if self.auth.jwt_secret.is_empty() => {
                anyhow::bail!("auth.jwt_secret is required for the jwt provider")
            }
            _ => Ok(()),
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        if self.storage.provider == StorageProviderKind::Local {
            fs::create_dir_all(&self.storage.local_path)?;
        }

        Ok(())
    }
}
