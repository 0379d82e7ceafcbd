//! Process configuration, read once from the environment at start-up.

use crate::providers::openai::DEFAULT_BASE_URL;
use crate::Error;
use axum::http::HeaderValue;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "deepseek-v3.1";
pub const DEFAULT_DB_PATH: &str = "sql_app.db";
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

/// Everything the server needs, built once and shared read-only by all handlers.
#[derive(Clone)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible upstream, without trailing slash.
    pub base_url: String,
    /// Upstream credential. `None` when unset or blank.
    pub api_key: Option<String>,
    pub model: String,
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = var("TEXTLENS_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|e| Error::config(format!("TEXTLENS_BIND '{bind}' is not a socket address: {e}")))?;

        let cors_origins: Vec<String> = match var("TEXTLENS_CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };
        for origin in &cors_origins {
            HeaderValue::from_str(origin)
                .map_err(|_| Error::config(format!("invalid CORS origin '{origin}'")))?;
        }

        Ok(Self {
            base_url: var("AI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: var("AI_API_KEY"),
            model: var("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            db_path: var("TEXTLENS_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            bind_addr,
            cors_origins,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

// Hand-written so the credential never reaches a log line.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("db_path", &self.db_path)
            .field("bind_addr", &self.bind_addr)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}
