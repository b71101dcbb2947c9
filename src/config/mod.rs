use crate::api::RetryPolicy;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const TOKEN_DOCS_URL: &str =
    "https://www.jetbrains.com/help/youtrack/devportal/authentication-with-permanent-token.html";

const DEFAULT_REQUEST_DELAY_MS: u64 = 100;
const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 60_000;
const DEFAULT_MAX_RETRIES: u32 = 20;
const DEFAULT_MAX_RESULTS: usize = 500;
const DEFAULT_ACTIVITY_LIMIT: usize = 1000;
const DEFAULT_SUBSYSTEM_FIELD: &str = "Subsystem";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no YouTrack token found at {}.\nPlease follow the instructions at {} to obtain a YouTrack permanent token\nand save it to that file (or point YOUTRACK_TOKEN_FILE at it).",
        .path.display(),
        TOKEN_DOCS_URL
    )]
    MissingTokenFile { path: PathBuf },
    #[error("token file {} is empty", .path.display())]
    EmptyToken { path: PathBuf },
    #[error("failed to read token file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token_file: PathBuf,
    pub retry: RetryPolicy,
    pub max_results: usize,
    pub activity_limit: usize,
    pub subsystem_field: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            retry: RetryPolicy {
                request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
                retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
                max_retry_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
                max_retries: DEFAULT_MAX_RETRIES,
            },
            max_results: DEFAULT_MAX_RESULTS,
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            subsystem_field: DEFAULT_SUBSYSTEM_FIELD.to_string(),
        }
    }
}

impl Config {
    // Build config from the process environment (call dotenvy first)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("YOUTRACK_TOKEN_FILE") {
            config.token_file = PathBuf::from(path);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "YOUTRACK_REQUEST_DELAY_MS")? {
            config.retry.request_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "YOUTRACK_RETRY_DELAY_MS")? {
            config.retry.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "YOUTRACK_RETRY_MAX_DELAY_MS")? {
            config.retry.max_retry_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, "YOUTRACK_MAX_RETRIES")? {
            config.retry.max_retries = n;
        }
        if let Some(n) = parse_var::<usize, _>(&lookup, "YOUTRACK_MAX_RESULTS")? {
            config.max_results = n;
        }
        if let Some(n) = parse_var::<usize, _>(&lookup, "YOUTRACK_ACTIVITY_LIMIT")? {
            config.activity_limit = n;
        }
        if let Some(field) = lookup("YOUTRACK_SUBSYSTEM_FIELD") {
            config.subsystem_field = field;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

fn default_token_file() -> PathBuf {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default();
    home.join(".youtrack-token")
}

// Read the bearer token (first line of the credential file)
pub fn load_token(path: &Path) -> Result<String, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingTokenFile { path: path.to_path_buf() }
        } else {
            ConfigError::Io { path: path.to_path_buf(), source }
        }
    })?;

    let token = contents.lines().next().unwrap_or("").trim();
    if token.is_empty() {
        return Err(ConfigError::EmptyToken { path: path.to_path_buf() });
    }
    Ok(token.to_string())
}
