//! Runtime configuration, read from the process environment.

use std::{net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

use chrono::TimeDelta;
use secrecy::SecretString;
use thiserror::Error;
use tracing::info;

/// Upper bound for `DRAFT_TTL_HOURS` (one year).
pub const MAX_DRAFT_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
}

#[derive(Debug)]
pub enum StorageBackend {
    /// Files under `root`, served by this process at `/uploads`.
    Local { root: PathBuf },
    S3(S3Settings),
}

#[derive(Debug)]
pub enum AuthKey {
    Hs256(SecretString),
    Rs256 { public_key_pem: String },
}

#[derive(Debug)]
pub struct AuthSettings {
    pub key: AuthKey,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageBackend,
    pub public_base_url: String,
    pub signed_url_ttl: Duration,
    pub auth: AuthSettings,
    pub anthropic_api_key: Option<SecretString>,
    pub anthropic_model: Option<String>,
    pub draft_ttl: TimeDelta,
    pub draft_cleanup_interval: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage = match get("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "local" => StorageBackend::Local {
                root: PathBuf::from(
                    get("LOCAL_STORAGE_DIR").unwrap_or_else(|| "./uploads".to_string()),
                ),
            },
            "s3" => StorageBackend::S3(S3Settings {
                bucket: get("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?,
                region: get("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: get("S3_ENDPOINT"),
                access_key_id: get("S3_ACCESS_KEY_ID")
                    .ok_or(ConfigError::Missing("S3_ACCESS_KEY_ID"))?,
                secret_access_key: get("S3_SECRET_ACCESS_KEY")
                    .map(SecretString::from)
                    .ok_or(ConfigError::Missing("S3_SECRET_ACCESS_KEY"))?,
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    message: format!("expected `local` or `s3`, got `{other}`"),
                });
            }
        };

        let key = match (get("AUTH_JWT_PUBLIC_KEY_PEM"), get("AUTH_JWT_SECRET")) {
            (Some(pem), _) => AuthKey::Rs256 {
                public_key_pem: pem.replace("\\n", "\n"),
            },
            (None, Some(secret)) => AuthKey::Hs256(SecretString::from(secret)),
            (None, None) => return Err(ConfigError::Missing("AUTH_JWT_SECRET")),
        };

        let draft_ttl_hours = parse_or(&get, "DRAFT_TTL_HOURS", 24i64)?;
        let draft_ttl = (1..=MAX_DRAFT_TTL_HOURS)
            .contains(&draft_ttl_hours)
            .then(|| TimeDelta::try_hours(draft_ttl_hours))
            .flatten()
            .ok_or_else(|| ConfigError::Invalid {
                key: "DRAFT_TTL_HOURS",
                message: format!("must be between 1 and {MAX_DRAFT_TTL_HOURS}"),
            })?;

        let port = parse_or(&get, "PORT", 3001u16)?;
        let config = Self {
            host: parse_or(&get, "HOST", IpAddr::from([127, 0, 0, 1]))?,
            port,
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://recipes.db?mode=rwc".to_string()),
            storage,
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}"))
                .trim_end_matches('/')
                .to_string(),
            signed_url_ttl: Duration::from_secs(parse_or(&get, "SIGNED_URL_TTL_SECS", 86_400u64)?),
            auth: AuthSettings {
                key,
                issuer: get("AUTH_JWT_ISSUER"),
                audience: get("AUTH_JWT_AUDIENCE"),
            },
            anthropic_api_key: get("ANTHROPIC_API_KEY").map(SecretString::from),
            anthropic_model: get("ANTHROPIC_MODEL"),
            draft_ttl,
            draft_cleanup_interval: Duration::from_secs(parse_or(
                &get,
                "DRAFT_CLEANUP_INTERVAL_SECS",
                3_600u64,
            )?),
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", 5 * 1024 * 1024usize)?,
        };

        if config.draft_cleanup_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "DRAFT_CLEANUP_INTERVAL_SECS",
                message: "must be positive".to_string(),
            });
        }

        info!(
            host = %config.host,
            port = config.port,
            storage = config.storage.name(),
            llm = config.anthropic_api_key.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

impl StorageBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::S3(_) => "s3",
        }
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
