//! Client configuration.
//!
//! Values are layered: built-in defaults, then `config.json` in the storage
//! directory, then environment variables, then command-line flags.

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::runtime::Runtime;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_HEALTH_PATH: &str = "health";

pub const ENV_API_URL: &str = "COLLECTDESK_API_URL";
pub const ENV_FALLBACK_URLS: &str = "COLLECTDESK_FALLBACK_URLS";
pub const ENV_TIMEOUT_MS: &str = "COLLECTDESK_TIMEOUT_MS";
pub const ENV_HOME: &str = "COLLECTDESK_HOME";

const CONFIG_FILE: &str = "config.json";
const STORAGE_FILE: &str = "storage.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub fallback_urls: Vec<String>,
    pub timeout: Duration,
    pub login_route: String,
    pub health_path: String,
    pub storage_dir: PathBuf,
}

/// Values given on the command line. Empty fields leave lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub fallback_urls: Vec<String>,
    pub timeout_ms: Option<u64>,
}

/// On-disk form; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    fallback_urls: Option<Vec<String>>,
    timeout_ms: Option<u64>,
    login_route: Option<String>,
    health_path: Option<String>,
}

impl Config {
    #[tracing::instrument(skip(runtime, overrides))]
    pub fn load<R: Runtime>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let storage_dir = storage_dir(runtime)?;
        let file = read_config_file(runtime, &storage_dir.join(CONFIG_FILE))?;

        let mut timeout_ms = file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        let mut config = Config {
            api_url: file.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            fallback_urls: file.fallback_urls.unwrap_or_default(),
            timeout: Duration::ZERO,
            login_route: file
                .login_route
                .unwrap_or_else(|| DEFAULT_LOGIN_ROUTE.to_string()),
            health_path: file
                .health_path
                .unwrap_or_else(|| DEFAULT_HEALTH_PATH.to_string()),
            storage_dir,
        };

        if let Ok(url) = runtime.env_var(ENV_API_URL) {
            config.api_url = url;
        }
        if let Ok(urls) = runtime.env_var(ENV_FALLBACK_URLS) {
            config.fallback_urls = split_urls(&urls);
        }
        if let Ok(value) = runtime.env_var(ENV_TIMEOUT_MS) {
            timeout_ms = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {:?}", ENV_TIMEOUT_MS, value))?;
        }

        if let Some(url) = overrides.api_url {
            config.api_url = url;
        }
        if !overrides.fallback_urls.is_empty() {
            config.fallback_urls = overrides.fallback_urls;
        }
        if let Some(ms) = overrides.timeout_ms {
            timeout_ms = ms;
        }

        if timeout_ms == 0 {
            bail!("Timeout must be greater than zero");
        }
        config.timeout = Duration::from_millis(timeout_ms);
        config.validate()?;

        debug!(
            "Using API {} with {} fallback(s), timeout {:?}",
            config.api_url,
            config.fallback_urls.len(),
            config.timeout
        );
        Ok(config)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_dir.join(STORAGE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join(CONFIG_FILE)
    }

    fn validate(&self) -> Result<()> {
        validate_url(&self.api_url).context("Invalid API URL")?;
        for url in &self.fallback_urls {
            validate_url(url).context("Invalid fallback URL")?;
        }
        Ok(())
    }
}

fn storage_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if let Ok(home) = runtime.env_var(ENV_HOME) {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    runtime
        .config_dir()
        .map(|dir| dir.join("collectdesk"))
        .with_context(|| {
            format!(
                "Could not determine a configuration directory; set {}",
                ENV_HOME
            )
        })
}

fn read_config_file<R: Runtime>(runtime: &R, path: &std::path::Path) -> Result<ConfigFile> {
    if !runtime.exists(path) {
        return Ok(ConfigFile::default());
    }

    debug!("Reading configuration from {:?}", path);
    let content = runtime.read_to_string(path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn split_urls(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => bail!("{:?} is not an http(s) URL", url),
    }
}
