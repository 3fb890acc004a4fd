use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Which half of the primary/backup pair this process runs as. Determines
/// whether `main` starts the HTTP edge + replication client + failover
/// manager (`Primary`) or just the replication server (`Backup`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Backup,
}

impl Role {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "primary" => Ok(Role::Primary),
            "backup" => Ok(Role::Backup),
            other => anyhow::bail!("ROLE must be 'primary' or 'backup', got '{other}'"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Backup => "backup",
        }
    }
}

/// Process configuration, loaded once at startup from environment variables.
/// Every knob has a documented default.
#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub http_port: u16,
    pub primary_rpc_port: u16,
    pub backup_rpc_port: u16,
    pub backup_host: String,
    pub health_interval: Duration,
    pub replicate_timeout: Duration,
    pub ping_timeout: Duration,
    pub state_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let role = Role::parse(&env_or("ROLE", "primary"))?;

        Ok(Self {
            role,
            http_port: env_parse("HTTP_PORT", 8000)?,
            primary_rpc_port: env_parse("PRIMARY_RPC_PORT", 50051)?,
            backup_rpc_port: env_parse("BACKUP_RPC_PORT", 50052)?,
            backup_host: env_or("BACKUP_HOST", "127.0.0.1"),
            health_interval: Duration::from_millis(env_parse("HEALTH_INTERVAL_MS", 5000)?),
            replicate_timeout: Duration::from_millis(env_parse("REPLICATE_TIMEOUT_MS", 5000)?),
            ping_timeout: Duration::from_millis(env_parse("PING_TIMEOUT_MS", 2000)?),
            state_dir: PathBuf::from(env_or("STATE_DIR", "./state")),
        })
    }

    pub fn backup_addr(&self) -> String {
        format!("{}:{}", self.backup_host, self.backup_rpc_port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        Err(_) => Ok(default),
    }
}
