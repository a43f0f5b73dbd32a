use std::{env, path::PathBuf};

use thiserror::Error;

/// Connection string used when `MONGODB_URI` is not set.
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017/project_management";

/// Database used when the connection string carries no database path.
pub const DEFAULT_DATABASE: &str = "project_management";

/// Placeholder signing secret used when `SESSION_SECRET` is not set.
pub const PLACEHOLDER_SESSION_SECRET: &str = "your-secret-key";

pub const DEFAULT_PORT: u16 = 3000;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only with every handler through `AppState` (pulled out via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // MongoDB connection string.
    pub mongodb_uri: String,
    // Secret used to sign the session cookie.
    pub session_secret: String,
    // Runtime environment marker. Controls error detail and log format.
    pub env: Env,
    // TCP port the HTTP server listens on.
    pub port: u16,
    // Directory served as static files from `/`.
    pub public_dir: PathBuf,
    // Directory served as static files from `/uploads`.
    pub uploads_dir: PathBuf,
    // Work factor for password hashing.
    pub bcrypt_cost: u32,
}

/// Env
///
/// Runtime context, resolved from `NODE_ENV`. Only the literal `development`
/// enables development behaviour; every other value is treated as production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Development,
    Production,
}

impl Env {
    pub fn from_node_env(value: Option<&str>) -> Self {
        match value {
            Some("development") => Env::Development,
            _ => Env::Production,
        }
    }

    pub fn is_development(self) -> bool {
        self == Env::Development
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a valid TCP port number, got {0:?}")]
    InvalidPort(String),

    #[error("BCRYPT_COST must be an integer between {min} and {max}, got {value:?}")]
    InvalidBcryptCost { value: String, min: u32, max: u32 },
}

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

impl Default for AppConfig {
    /// Safe values for test state scaffolding; no environment access.
    fn default() -> Self {
        Self {
            mongodb_uri: DEFAULT_MONGODB_URI.to_string(),
            session_secret: "super-secure-test-secret-value-local".to_string(),
            env: Env::Development,
            port: DEFAULT_PORT,
            public_dir: PathBuf::from("public"),
            uploads_dir: PathBuf::from("uploads"),
            bcrypt_cost: MIN_BCRYPT_COST,
        }
    }
}

impl AppConfig {
    /// True when no `SESSION_SECRET` was provided.
    pub fn uses_placeholder_secret(&self) -> bool {
        self.session_secret == PLACEHOLDER_SESSION_SECRET
    }

    /// load
    ///
    /// Reads every parameter from the environment, falling back to the documented
    /// defaults. Malformed numeric values are rejected instead of silently replaced.
    pub fn load() -> Result<Self, ConfigError> {
        let env = Env::from_node_env(env::var("NODE_ENV").ok().as_deref());

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => PLACEHOLDER_SESSION_SECRET.to_string(),
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(cost) if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) => cost,
                _ => {
                    return Err(ConfigError::InvalidBcryptCost {
                        value: raw,
                        min: MIN_BCRYPT_COST,
                        max: MAX_BCRYPT_COST,
                    });
                }
            },
            Err(_) => bcrypt::DEFAULT_COST,
        };

        Ok(Self {
            mongodb_uri: env::var("MONGODB_URI")
                .unwrap_or_else(|_| DEFAULT_MONGODB_URI.to_string()),
            session_secret,
            env,
            port,
            public_dir: env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            uploads_dir: env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            bcrypt_cost,
        })
    }
}
