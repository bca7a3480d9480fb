use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::app::{FailurePolicy, FetchOptions};
use crate::domain::ProductId;
use crate::error::FetchError;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "s2fetch.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub target_dir: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub keep_going: Option<bool>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub products: Vec<ProductId>,
    pub target_dir: Utf8PathBuf,
    pub base_url: Option<String>,
    pub options: FetchOptions,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config at `path`, or `s2fetch.json` in the current
    /// directory. The default file must exist.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        let config = Self::read(path)?.ok_or(FetchError::MissingConfig)?;
        Self::resolve_config(config)
    }

    /// Like `resolve`, but a missing default file yields the built-in defaults.
    pub fn resolve_or_default(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        Self::resolve_config(Self::read(path)?.unwrap_or_default())
    }

    fn read(path: Option<&str>) -> Result<Option<Config>, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;
        Ok(Some(config))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let products = config
            .products
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<ProductId>, FetchError>>()?;

        let failure_policy = if config.keep_going.unwrap_or(false) {
            FailurePolicy::CollectAll
        } else {
            FailurePolicy::FailFast
        };

        Ok(ResolvedConfig {
            schema_version,
            products,
            target_dir: Utf8PathBuf::from(config.target_dir.unwrap_or_else(|| ".".to_string())),
            base_url: config.base_url,
            options: FetchOptions {
                concurrency: config.concurrency.unwrap_or(1).max(1),
                failure_policy,
                retry: RetryPolicy::new(config.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)),
            },
        })
    }
}
