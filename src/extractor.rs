use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Output,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    process::Command,
    time::{Duration, timeout},
};
use tracing::debug;

use crate::error::ExtractError;

/// Best MP4 video with M4A audio, else best single MP4, else anything.
pub const BEST_MP4_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
pub const MERGE_CONTAINER: &str = "mp4";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct VideoMetadata {
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub output_path: PathBuf,
    pub format: String,
    pub merge_container: String,
}

impl DownloadOptions {
    pub fn best_mp4(output_path: PathBuf) -> Self {
        Self {
            output_path,
            format: BEST_MP4_FORMAT.to_string(),
            merge_container: MERGE_CONTAINER.to_string(),
        }
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError>;

    async fn download(&self, url: &str, options: &DownloadOptions) -> Result<(), ExtractError>;
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<Output, ExtractError> {
        debug!("Running {:?} {:?}", self.binary, args);

        let command_future = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output();
        let output = timeout(self.timeout, command_future)
            .await
            .map_err(|_| {
                ExtractError::Unexpected(format!(
                    "yt-dlp did not finish within {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    ExtractError::Unexpected(format!(
                        "yt-dlp binary {:?} is not installed or not on PATH",
                        self.binary
                    ))
                } else {
                    ExtractError::Unexpected(format!("could not run yt-dlp: {error}"))
                }
            })?;

        if !output.status.success() {
            return Err(ExtractError::Download(last_stderr_line(&output.stderr)));
        }

        Ok(output)
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn extract_metadata(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        let output = self.run(metadata_args(url)).await?;
        parse_metadata(&output.stdout)
    }

    async fn download(&self, url: &str, options: &DownloadOptions) -> Result<(), ExtractError> {
        self.run(download_args(url, options)).await.map(|_| ())
    }
}

fn metadata_args(url: &str) -> Vec<String> {
    vec![
        "-J".to_string(),
        "--no-playlist".to_string(),
        "--quiet".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}

fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
    vec![
        "--no-playlist".to_string(),
        "--quiet".to_string(),
        "--no-warnings".to_string(),
        "-f".to_string(),
        options.format.clone(),
        "--merge-output-format".to_string(),
        options.merge_container.clone(),
        "-o".to_string(),
        output_template(&options.output_path),
        url.to_string(),
    ]
}

// `%` starts a template field in `-o`.
fn output_template(path: &Path) -> String {
    path.to_string_lossy().replace('%', "%%")
}

fn parse_metadata(stdout: &[u8]) -> Result<VideoMetadata, ExtractError> {
    serde_json::from_slice(stdout).map_err(|error| {
        ExtractError::Unexpected(format!("yt-dlp returned unreadable metadata: {error}"))
    })
}

fn last_stderr_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp exited without an error message")
        .to_string()
}
