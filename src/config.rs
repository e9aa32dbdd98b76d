use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// StoreBackend
// ---------------------------------------------------------------------------

/// Which `RecordRepository` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local; contents are lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("unknown store backend: {other:?}")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        })
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// Required when `store_backend` is `Postgres`.
    pub database_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    /// Directory that uploaded photos are written under.
    pub photo_storage_dir: PathBuf,
    /// Prefix for photo URLs; the storage directory is expected to be served
    /// from here.
    pub photo_public_base_url: String,
    /// Load the demo project on startup when the store has no projects.
    pub seed_on_start: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_backend = optional("STORE_BACKEND", "postgres")
            .parse::<StoreBackend>()
            .context("STORE_BACKEND must be 'postgres' or 'memory'")?;

        let database_url = match store_backend {
            StoreBackend::Postgres => Some(required("DATABASE_URL")?),
            StoreBackend::Memory => std::env::var("DATABASE_URL").ok(),
        };

        Ok(Self {
            store_backend,
            database_url,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            photo_storage_dir: PathBuf::from(optional("PHOTO_STORAGE_DIR", "storage")),
            photo_public_base_url: optional("PHOTO_PUBLIC_BASE_URL", "/files"),
            seed_on_start: parse_flag(&optional("SEED_ON_START", "false"))
                .context("SEED_ON_START must be true or false")?,
        })
    }
}

/// Accepts `true/false`, `1/0` and `yes/no`, case-insensitively.
fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(anyhow::anyhow!("not a boolean flag: {other:?}")),
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
