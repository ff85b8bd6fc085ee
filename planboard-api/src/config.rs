/// Configuration management for the API server
///
/// Configuration is read from environment variables, with a `.env` file
/// loaded first when present.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS and other production behaviour (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing, at least 32 characters (required)
/// - `JWT_ACCESS_TTL_SECONDS`: Access token lifetime (default: 86400)
/// - `JWT_REFRESH_TTL_SECONDS`: Refresh token lifetime (default: 2592000)
/// - `STORAGE_ENDPOINT`, `STORAGE_REGION`, `STORAGE_BUCKET`,
///   `STORAGE_ACCESS_KEY`, `STORAGE_SECRET_KEY`, `STORAGE_PUBLIC_URL`:
///   S3-compatible object storage for avatars (optional)
/// - `AVATAR_MAX_BYTES`: Largest accepted avatar upload (default: 2 MiB)
/// - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USER`, `SMTP_PASSWORD`,
///   `SMTP_FROM`: outgoing mail for assignment and invitation notices
///   (optional; needs at least host and sender)
///
/// # Example
///
/// ```no_run
/// use planboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use planboard_shared::auth::jwt::TokenLifetimes;
use serde::{Deserialize, Serialize};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_AVATAR_MAX_BYTES: usize = 2 * 1024 * 1024;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// None when object storage is not configured
    pub storage: Option<StorageConfig>,

    pub uploads: UploadConfig,

    /// None when outgoing mail is not configured
    pub smtp: Option<SmtpConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl JwtConfig {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: chrono::Duration::seconds(self.access_ttl_seconds),
            refresh: chrono::Duration::seconds(self.refresh_ttl_seconds),
        }
    }
}

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,

    #[serde(skip_serializing)]
    pub access_key: String,

    #[serde(skip_serializing)]
    pub secret_key: String,

    /// Base URL for public object links; defaults to `<endpoint>/<bucket>`
    pub public_url: Option<String>,
}

/// Outgoing mail relay (STARTTLS)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,

    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Sender mailbox, e.g. `Planboard <noreply@example.com>`
    pub from: String,
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub avatar_max_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&var, "API_PORT", 8080u16)?;

        let cors_origins = var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        let production = parse_or(&var, "PRODUCTION", false)?;

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let access_ttl_seconds = parse_or(&var, "JWT_ACCESS_TTL_SECONDS", DEFAULT_ACCESS_TTL_SECONDS)?;
        let refresh_ttl_seconds =
            parse_or(&var, "JWT_REFRESH_TTL_SECONDS", DEFAULT_REFRESH_TTL_SECONDS)?;
        if access_ttl_seconds <= 0 || refresh_ttl_seconds <= 0 {
            anyhow::bail!("JWT token lifetimes must be positive");
        }

        let storage = match (
            var("STORAGE_ENDPOINT"),
            var("STORAGE_BUCKET"),
            var("STORAGE_ACCESS_KEY"),
            var("STORAGE_SECRET_KEY"),
        ) {
            (Some(endpoint), Some(bucket), Some(access_key), Some(secret_key)) => {
                Some(StorageConfig {
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    region: var("STORAGE_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    bucket,
                    access_key,
                    secret_key,
                    public_url: var("STORAGE_PUBLIC_URL")
                        .map(|url| url.trim_end_matches('/').to_string()),
                })
            }
            _ => None,
        };

        let avatar_max_bytes = parse_or(&var, "AVATAR_MAX_BYTES", DEFAULT_AVATAR_MAX_BYTES)?;

        let smtp = match (var("SMTP_HOST"), var("SMTP_FROM")) {
            (Some(host), Some(from)) => Some(SmtpConfig {
                host,
                port: parse_or(&var, "SMTP_PORT", 587u16)?,
                username: var("SMTP_USER"),
                password: var("SMTP_PASSWORD"),
                from,
            }),
            _ => None,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_seconds,
                refresh_ttl_seconds,
            },
            storage,
            uploads: UploadConfig { avatar_max_bytes },
            smtp,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True when any origin is allowed
    pub fn cors_is_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}
