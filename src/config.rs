use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::fmt;

/// Secret used only when no signing secret is configured outside production
pub const DEVELOPMENT_FALLBACK_SECRET: &str = "development-secret-not-for-production";

/// Minimum signing secret length accepted in production
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
    pub observability: ObservabilityConfig,
}

/// Deployment mode. Production turns configuration gaps into startup failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(AppError::Configuration(format!(
                "Unknown environment '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub session_ttl_seconds: i64,
    pub max_login_attempts: u32,
    pub lockout_duration_seconds: i64,
    pub revocation_enabled: bool,
    /// Accounts available at startup
    pub seed_users: Vec<SeedUser>,
}

// Keeps the secret out of `tracing::info!("{:?}", config)` output.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("max_login_attempts", &self.max_login_attempts)
            .field("lockout_duration_seconds", &self.lockout_duration_seconds)
            .field("revocation_enabled", &self.revocation_enabled)
            .field("seed_users", &self.seed_users.len())
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_issuer: "warden".to_string(),
            jwt_audience: "warden-users".to_string(),
            session_ttl_seconds: 86_400,
            max_login_attempts: 5,
            lockout_duration_seconds: 15 * 60,
            revocation_enabled: false,
            seed_users: Vec::new(),
        }
    }
}

/// Account provisioned from configuration
#[derive(Clone, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    /// Argon2 PHC string
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Plaintext password, hashed at startup; rejected in production
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Request budget for one route class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitPolicy {
    pub max_requests: u64,
    pub window_seconds: i64,
}

impl RateLimitPolicy {
    pub const fn new(max_requests: u64, window_seconds: i64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_seconds * 1000
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub backend: StoreBackend,
    pub auth: RateLimitPolicy,
    pub scan: RateLimitPolicy,
    pub general: RateLimitPolicy,
    pub registration: RateLimitPolicy,
    pub eviction_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            auth: RateLimitPolicy::new(5, 15 * 60),
            scan: RateLimitPolicy::new(10, 60),
            general: RateLimitPolicy::new(100, 60),
            registration: RateLimitPolicy::new(5, 60 * 60),
            eviction_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub cors_allowed_origins: Vec<String>,
    pub cors_allowed_methods: Vec<String>,
    pub cors_allowed_headers: Vec<String>,
    pub cors_max_age_seconds: u64,
    pub csp_script_sources: Vec<String>,
    pub csp_style_sources: Vec<String>,
    pub csp_font_sources: Vec<String>,
    pub csp_img_sources: Vec<String>,
    pub csp_connect_sources: Vec<String>,
    pub csp_report_uri: Option<String>,
    pub hsts_max_age_seconds: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            cors_allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cors_allowed_headers: ["Content-Type", "Authorization", "X-Requested-With"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cors_max_age_seconds: 86_400,
            csp_script_sources: vec!["https://cdn.jsdelivr.net".to_string()],
            csp_style_sources: vec!["https://fonts.googleapis.com".to_string()],
            csp_font_sources: vec!["https://fonts.gstatic.com".to_string()],
            csp_img_sources: vec!["data:".to_string(), "blob:".to_string(), "https:".to_string()],
            csp_connect_sources: vec!["https://api.openai.com".to_string()],
            csp_report_uri: None,
            hsts_max_age_seconds: 31_536_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub channel_capacity: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 10_000,
            batch_size: 100,
            flush_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Determine environment
        let environment: Environment = env::var("WARDEN_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .parse()?;

        let config = config::Config::builder()
            .set_default("environment", environment.as_str())
            .map_err(|e| AppError::Configuration(e.to_string()))?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::File::with_name(&format!("config/{}", environment.as_str()))
                    .required(false),
            )
            // e.g., WARDEN__AUTH__JWT_SECRET=...
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_allowed_origins")
                    .with_list_parse_key("security.cors_allowed_methods")
                    .with_list_parse_key("security.cors_allowed_headers")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let mut config: Config = config
            .try_deserialize()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        config.environment = environment;
        Ok(config)
    }

    /// Validate configuration, failing fast on anything unsafe to run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration("Invalid port number".to_string()));
        }

        // Resolving the secret enforces the production secret rules
        self.signing_secret()?;

        if self.auth.session_ttl_seconds <= 0 {
            return Err(AppError::Configuration(
                "Session TTL must be positive".to_string(),
            ));
        }

        if self.auth.max_login_attempts == 0 || self.auth.lockout_duration_seconds <= 0 {
            return Err(AppError::Configuration(
                "Login lockout threshold and duration must be positive".to_string(),
            ));
        }

        for (name, policy) in [
            ("auth", &self.rate_limit.auth),
            ("scan", &self.rate_limit.scan),
            ("general", &self.rate_limit.general),
            ("registration", &self.rate_limit.registration),
        ] {
            if policy.max_requests == 0 || policy.window_seconds <= 0 {
                return Err(AppError::Configuration(format!(
                    "Rate limit policy '{}' must have a positive budget and window",
                    name
                )));
            }
        }

        if self.rate_limit.backend == StoreBackend::Redis && self.redis.url.is_empty() {
            return Err(AppError::Configuration(
                "Redis URL is required for the redis store backend".to_string(),
            ));
        }

        for user in &self.auth.seed_users {
            match (&user.password_hash, &user.password) {
                (Some(_), _) => {}
                (None, Some(_)) if !self.environment.is_production() => {}
                (None, Some(_)) => {
                    return Err(AppError::Configuration(format!(
                        "Seed user '{}' must use a password hash in production",
                        user.id
                    )));
                }
                (None, None) => {
                    return Err(AppError::Configuration(format!(
                        "Seed user '{}' has no password",
                        user.id
                    )));
                }
            }
        }

        if self.environment.is_production() {
            if self.security.cors_allowed_origins.is_empty() {
                return Err(AppError::Configuration(
                    "CORS allowed origins must be configured in production".to_string(),
                ));
            }
            if self.security.cors_allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::Configuration(
                    "Wildcard CORS origin is not allowed in production".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Resolve the token signing secret
    ///
    /// Production requires a configured secret of at least 32 characters.
    /// Other environments fall back to a fixed development secret.
    pub fn signing_secret(&self) -> Result<String> {
        match self.auth.jwt_secret.as_deref().map(str::trim) {
            Some(secret) if secret.len() >= MIN_SECRET_LENGTH => Ok(secret.to_string()),
            Some(secret) if !secret.is_empty() => {
                if self.environment.is_production() {
                    return Err(AppError::Configuration(format!(
                        "JWT secret must be at least {} characters long",
                        MIN_SECRET_LENGTH
                    )));
                }
                tracing::warn!(
                    environment = self.environment.as_str(),
                    "JWT secret is shorter than {} characters",
                    MIN_SECRET_LENGTH
                );
                Ok(secret.to_string())
            }
            _ => {
                if self.environment.is_production() {
                    return Err(AppError::Configuration(
                        "JWT secret must be set via WARDEN__AUTH__JWT_SECRET in production"
                            .to_string(),
                    ));
                }
                tracing::warn!(
                    environment = self.environment.as_str(),
                    "No JWT secret configured, using the development fallback secret"
                );
                Ok(DEVELOPMENT_FALLBACK_SECRET.to_string())
            }
        }
    }
}
