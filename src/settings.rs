use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use jsonwebtoken::{DecodingKey, EncodingKey};
use std::{env, fmt, str::FromStr};
use zeroize::Zeroizing;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

/// Where documents live.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    #[serde(default)]
    pub database_url: String,

    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_minutes: i64,

    #[serde(default)]
    pub refresh_token_secret: String,

    #[serde(default = "default_refresh_expiration")]
    pub refresh_token_exp_days: i64,

    /// OAuth client id Google ID tokens must be issued for. Empty disables
    /// Google sign-in.
    #[serde(default)]
    pub google_client_id: String,

    #[serde(default)]
    pub admin_emails: Vec<String>,

    #[serde(default = "default_featured_count")]
    pub featured_count: usize,

    #[serde(default = "default_related_count")]
    pub related_count: usize,

    /// JSON file loaded into an empty store at startup.
    #[serde(default)]
    pub seed_file: Option<String>,

    #[serde(default = "default_purge_interval")]
    pub revocation_purge_interval_secs: u64,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_name() -> String {
    "Showcase-API".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_database_max_connections() -> u32 {
    10
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_jwt_expiration() -> i64 {
    15
}
fn default_refresh_expiration() -> i64 {
    7
}
fn default_featured_count() -> usize {
    3
}
fn default_related_count() -> usize {
    3
}
fn default_purge_interval() -> u64 {
    60 * 10
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins")
                    .with_list_parse_key("admin_emails")
                    .ignore_empty(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;

        config.jwt_secret = fill_or_env(config.jwt_secret, "APP_JWT_SECRET")?;
        config.refresh_token_secret = fill_or_env(config.refresh_token_secret, "APP_REFRESH_TOKEN_SECRET")?;

        if config.database_url.trim().is_empty() {
            config.database_url = env::var("APP_DATABASE_URL").unwrap_or_default();
        }
        if config.redis_url.is_none() {
            config.redis_url = env::var("APP_REDIS_URL").ok().filter(|u| !u.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// A complete configuration for tests: in-memory store, in-process
    /// revocations and fixed secrets.
    pub fn for_tests() -> Self {
        AppConfig {
            env: AppEnvironment::Testing,
            name: "Showcase Backend Test".to_string(),
            port: 0,
            host: "127.0.0.1".to_string(),
            worker_count: 1,
            store_backend: StoreBackend::Memory,
            database_url: String::new(),
            database_max_connections: 1,
            redis_url: None,
            cors_allowed_origins: vec!["*".to_string()],
            jwt_secret: "test_jwt_secret_that_is_long_enough_for_hs512_1234567890".into(),
            jwt_expiration_minutes: 5,
            refresh_token_secret: "test_refresh_secret_that_is_long_enough_1234567890".into(),
            refresh_token_exp_days: 1,
            google_client_id: "test-client.apps.googleusercontent.com".into(),
            admin_emails: vec!["admin@example.com".to_string()],
            featured_count: 3,
            related_count: 3,
            seed_file: None,
            revocation_purge_interval_secs: 60,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.store_backend == StoreBackend::Postgres && self.database_url.trim().is_empty() {
            errors.push("DATABASE_URL is required by the postgres store backend");
        }
        if self.jwt_secret.len() < 32 {
            errors.push("JWT_SECRET must be at least 32 characters");
        }
        if self.refresh_token_secret.len() < 32 {
            errors.push("REFRESH_TOKEN_SECRET must be at least 32 characters");
        }
        if self.jwt_expiration_minutes <= 0 || self.refresh_token_exp_days <= 0 {
            errors.push("Token lifetimes must be positive");
        }
        if self.is_production() && self.cors_origins().iter().any(|o| o == "*") {
            errors.push("Wildcard CORS (*) is not allowed in production");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnvironment::Production
    }

    pub fn cors_origins(&self) -> Vec<String> {
        split_list(&self.cors_allowed_origins)
    }

    pub fn admin_email_list(&self) -> Vec<String> {
        split_list(&self.admin_emails)
    }
}

fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn fill_or_env(current: String, env_key: &str) -> Result<String, ConfigError> {
    if current.trim().is_empty() {
        env::var(env_key).map_err(|_| ConfigError::Message(format!("{env_key} must be set")))
    } else {
        Ok(current)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else if self.len() < 32 {
            "[TOO_SHORT]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for String {
    fn redact(&self) -> &str {
        self.as_str().redact()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let database_url = if self.database_url.is_empty() { "[NONE]" } else { "[REDACTED]" };
        let redis_url = self.redis_url.as_ref().map(|_| "[REDACTED]");

        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("name", &self.name)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("store_backend", &self.store_backend)
            .field("database_url", &database_url)
            .field("database_max_connections", &self.database_max_connections)
            .field("redis_url", &redis_url)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("jwt_secret", &self.jwt_secret.redact())
            .field("jwt_expiration_minutes", &self.jwt_expiration_minutes)
            .field("refresh_token_secret", &self.refresh_token_secret.redact())
            .field("refresh_token_exp_days", &self.refresh_token_exp_days)
            .field("google_client_id", &self.google_client_id)
            .field("admin_emails", &self.admin_emails.len())
            .field("featured_count", &self.featured_count)
            .field("related_count", &self.related_count)
            .field("seed_file", &self.seed_file)
            .field("revocation_purge_interval_secs", &self.revocation_purge_interval_secs)
            .finish()
    }
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub refresh_encoding: EncodingKey,
    pub refresh_decoding: DecodingKey,
}

impl From<&AppConfig> for JwtKeys {
    fn from(config: &AppConfig) -> Self {
        let jwt_secret = Zeroizing::new(config.jwt_secret.clone());
        let refresh_secret = Zeroizing::new(config.refresh_token_secret.clone());

        JwtKeys {
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
        }
    }
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys")
            .field("encoding", &"[REDACTED]")
            .field("decoding", &"[REDACTED]")
            .field("refresh_encoding", &"[REDACTED]")
            .field("refresh_decoding", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        assert!(AppConfig::for_tests().validate().is_ok());
    }

    #[test]
    fn postgres_backend_needs_database_url() {
        let mut config = AppConfig::for_tests();
        config.store_backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());

        config.database_url = "postgres://localhost/showcase".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_rejects_wildcard_cors() {
        let mut config = AppConfig::for_tests();
        config.env = AppEnvironment::Production;
        assert!(config.validate().is_err());

        config.cors_allowed_origins = vec!["https://showcase.example.com".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn list_settings_accept_comma_separated_values() {
        let mut config = AppConfig::for_tests();
        config.admin_emails = vec!["a@example.com, b@example.com".into(), "".into()];
        assert_eq!(config.admin_email_list(), vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", AppConfig::for_tests());
        assert!(!rendered.contains("test_jwt_secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
