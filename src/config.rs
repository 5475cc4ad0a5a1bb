use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix for environment overrides of secrets and deployment paths.
const ENV_PREFIX: &str = "PHANTOM_SALES_";

const MAX_TOKEN_TTL_MINUTES: i64 = 24 * 60;

const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub phantom: PhantomConfig,

    pub storage: StorageConfig,

    pub security: SecurityConfig,

    pub admin_seed: AdminSeedConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/phantom-sales.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5080,
            cors_allowed_origins: vec![
                "http://localhost:5080".to_string(),
                "http://127.0.0.1:5080".to_string(),
            ],
        }
    }
}

/// Connection settings for the Phantom subscriber-management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantomConfig {
    /// Single endpoint; the operation is selected with the `action` query parameter.
    pub base_url: String,

    pub api_user: String,

    #[serde(skip_serializing)]
    pub api_pass: String,

    pub request_timeout_seconds: u64,

    /// Kept below the upstream token lifetime (15 minutes) so a cached
    /// token is never used right at its expiry edge.
    pub token_ttl_minutes: i64,
}

impl Default for PhantomConfig {
    fn default() -> Self {
        Self {
            base_url: "https://phantom.example.com/api.php".to_string(),
            api_user: String::new(),
            api_pass: String::new(),
            request_timeout_seconds: 30,
            token_ttl_minutes: 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory where uploaded sale receipts are written.
    pub receipts_path: String,

    pub max_receipt_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            receipts_path: "data/receipts".to_string(),
            max_receipt_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Lifetime of a login session.
    pub session_ttl_hours: i64,

    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 12,
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

/// Initial administrator, created once when the users table is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSeedConfig {
    pub username: Option<String>,

    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl AdminSeedConfig {
    /// Trimmed username and password, when both are present and non-blank.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().map(str::trim)?;
        let password = self.password.as_deref()?;

        if username.is_empty() || password.trim().is_empty() {
            return None;
        }

        Some((username, password))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    /// Loads `.env`, then the first config file found, then applies
    /// `PHANTOM_SALES_*` environment overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from: {}", path.display());
        }

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Overrides values from a variable lookup. Takes the lookup as a closure
    /// so tests do not touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("DATABASE_PATH") {
            self.general.database_path = v;
        }
        if let Some(v) = var("PHANTOM_BASE_URL") {
            self.phantom.base_url = v;
        }
        if let Some(v) = var("PHANTOM_API_USER") {
            self.phantom.api_user = v;
        }
        if let Some(v) = var("PHANTOM_API_PASS") {
            self.phantom.api_pass = v;
        }
        if let Some(v) = var("ADMIN_USERNAME") {
            self.admin_seed.username = Some(v);
        }
        if let Some(v) = var("ADMIN_PASSWORD") {
            self.admin_seed.password = Some(v);
        }
        if let Some(v) = var("RECEIPTS_PATH") {
            self.storage.receipts_path = v;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("phantom-sales").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".phantom-sales").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.phantom.base_url.trim().is_empty() {
            anyhow::bail!("Phantom base URL cannot be empty");
        }

        url::Url::parse(&self.phantom.base_url)
            .with_context(|| format!("Invalid Phantom base URL: {}", self.phantom.base_url))?;

        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&self.phantom.token_ttl_minutes) {
            anyhow::bail!(
                "Phantom token TTL must be between 1 and {MAX_TOKEN_TTL_MINUTES} minutes"
            );
        }

        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.security.session_ttl_hours) {
            anyhow::bail!("Session TTL must be between 1 and {MAX_SESSION_TTL_HOURS} hours");
        }

        if self.storage.max_receipt_bytes == 0 {
            anyhow::bail!("Maximum receipt size must be > 0");
        }

        Ok(())
    }
}
