use std::{path::PathBuf, time::Duration};

use url::Url;

use crate::error::ApiError;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_YT_DLP_BIN: &str = "yt-dlp";
pub const DEFAULT_YT_DLP_TIMEOUT_SECONDS: u64 = 180;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub yt_dlp_bin: PathBuf,
    pub yt_dlp_timeout: Duration,
    pub work_dir: PathBuf,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let yt_dlp_timeout_seconds = lookup("YT_DLP_TIMEOUT_SECONDS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_YT_DLP_TIMEOUT_SECONDS);

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                normalize_origin(origin).ok_or_else(|| {
                    ApiError::internal(format!(
                        "Invalid origin in ALLOWED_ORIGINS: {origin}. Use values like https://example.com"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            bind_addr: resolve_bind_addr(&lookup),
            yt_dlp_bin: lookup("YT_DLP_BIN")
                .as_deref()
                .and_then(non_empty)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_YT_DLP_BIN)),
            yt_dlp_timeout: Duration::from_secs(yt_dlp_timeout_seconds),
            work_dir: lookup("WORK_DIR")
                .as_deref()
                .and_then(non_empty)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            allowed_origins,
        })
    }
}

fn resolve_bind_addr(lookup: &impl Fn(&str) -> Option<String>) -> String {
    if let Some(configured) = lookup("APP_ADDR")
        .as_deref()
        .and_then(non_empty)
        .map(ToString::to_string)
    {
        return configured;
    }

    if let Some(port) = lookup("PORT").and_then(|value| value.trim().parse::<u16>().ok()) {
        return format!("0.0.0.0:{port}");
    }

    DEFAULT_BIND_ADDR.to_string()
}

/// Reduces an origin to `scheme://host[:port]`, dropping default ports.
pub fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };

    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    match parsed.port() {
        Some(port) if port != default_port => Some(format!("{scheme}://{host}:{port}")),
        _ => Some(format!("{scheme}://{host}")),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
