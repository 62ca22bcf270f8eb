use std::env;

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// The application's configuration, loaded once at startup and shared immutably through
/// `AppState` (handlers and extractors pull it via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Runtime environment marker. Selects log format and which settings are mandatory.
    pub env: Env,
    /// Postgres connection string. `None` (local only) selects the in-memory store.
    pub db_url: Option<String>,
    /// HS256 secret used to sign and verify session tokens.
    pub jwt_secret: String,
    /// Token and cookie lifetime in seconds.
    pub jwt_ttl_secs: u64,
    /// Root directory for uploaded pictures, served under `/uploads`.
    pub upload_dir: String,
    pub port: u16,
    /// Request body limit, applied to multipart uploads.
    pub max_upload_bytes: usize,
}

/// Env
///
/// The runtime context: `Local` gives developer defaults, `Production` demands every
/// secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking values for tests; no environment variables are read.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_ttl_secs: 7 * 24 * 60 * 60,
            upload_dir: "uploads".to_string(),
            port: 5000,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Reads an optional numeric variable. A set but unparsable value is a fatal error.
fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {key} must be a number, got `{raw}`")),
        Err(_) => default,
    }
}

impl AppConfig {
    /// load
    ///
    /// Builds the configuration from environment variables.
    ///
    /// # Panics
    /// Panics if a variable required in production (`DATABASE_URL`, `JWT_SECRET`) is
    /// missing or a numeric variable cannot be parsed, so the service never starts
    /// half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            ),
        };

        Self {
            env,
            db_url,
            jwt_secret,
            jwt_ttl_secs: parsed("JWT_TTL_SECS", defaults.jwt_ttl_secs),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            port: parsed("PORT", defaults.port),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }
}
