use crate::datasource::hyperliquid::{DEFAULT_API_URL, DEFAULT_LEADERBOARD_URL};
use crate::datasource::FILLS_PAGE_LIMIT;
use crate::harvest::HarvestConfig;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// 2024-01-01T00:00:00Z
pub const DEFAULT_START_MS: i64 = 1_704_067_200_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub hyperliquid_api_url: String,
    pub leaderboard_url: String,
    pub harvest_workers: usize,
    pub request_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub default_start_ms: i64,
    pub fill_batch_size: usize,
    pub progress_every: u64,
    pub tracked_addresses: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let hyperliquid_api_url = env_map
            .get("HYPERLIQUID_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let leaderboard_url = env_map
            .get("LEADERBOARD_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LEADERBOARD_URL.to_string());

        let harvest_workers = parse_or(&env_map, "HARVEST_WORKERS", 10usize, "must be >= 1")?;
        if harvest_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "HARVEST_WORKERS".to_string(),
                "must be >= 1".to_string(),
            ));
        }

        let request_delay_ms =
            parse_or(&env_map, "REQUEST_DELAY_MS", 200u64, "must be a valid u64")?;
        let request_timeout_ms =
            parse_or(&env_map, "REQUEST_TIMEOUT_MS", 60_000u64, "must be a valid u64")?;
        let default_start_ms = parse_or(
            &env_map,
            "DEFAULT_START_MS",
            DEFAULT_START_MS,
            "must be a valid i64",
        )?;

        let fill_batch_size = parse_or(&env_map, "FILL_BATCH_SIZE", 500usize, "must be >= 1")?;
        if fill_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "FILL_BATCH_SIZE".to_string(),
                "must be >= 1".to_string(),
            ));
        }

        let progress_every = parse_or(&env_map, "PROGRESS_EVERY", 50u64, "must be >= 1")?;
        if progress_every == 0 {
            return Err(ConfigError::InvalidValue(
                "PROGRESS_EVERY".to_string(),
                "must be >= 1".to_string(),
            ));
        }

        let tracked_addresses = parse_tracked_addresses_from_map(&env_map)?;

        Ok(Config {
            port,
            database_path,
            hyperliquid_api_url,
            leaderboard_url,
            harvest_workers,
            request_delay_ms,
            request_timeout_ms,
            default_start_ms,
            fill_batch_size,
            progress_every,
            tracked_addresses,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Pool tunables derived from this configuration.
    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            workers: self.harvest_workers,
            request_delay: Duration::from_millis(self.request_delay_ms),
            default_start_ms: self.default_start_ms,
            batch_size: self.fill_batch_size,
            progress_every: self.progress_every,
            page_limit: FILLS_PAGE_LIMIT,
        }
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    hint: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), hint.to_string())),
        None => Ok(default),
    }
}

fn parse_tracked_addresses_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<String>, ConfigError> {
    if let Some(addresses) = env_map.get("TRACKED_ADDRESSES") {
        Ok(addresses
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else if let Some(file_path) = env_map.get("TRACKED_ADDRESSES_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "TRACKED_ADDRESSES_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        Ok(content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|s| !s.is_empty() && !s.starts_with('#'))
            .collect())
    } else {
        Ok(Vec::new())
    }
}
