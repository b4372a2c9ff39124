use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{error, info, warn};

use crate::{
    error::FetchError,
    extractor::{DownloadOptions, Extractor},
    sanitize::{DEFAULT_TITLE, DEFAULT_UPLOADER, OUTPUT_EXTENSION, derive_filename, sanitize_title},
};

/// A downloaded video held in memory. Its file on disk is already gone.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub uploader: String,
    pub title: String,
    pub sanitized_title: String,
    pub filename: String,
    pub local_path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Runs [`fetch`] on its own task; dropping this future does not abort it.
pub async fn fetch_detached(
    extractor: Arc<dyn Extractor>,
    url: String,
    work_dir: PathBuf,
) -> Result<VideoArtifact, FetchError> {
    tokio::spawn(async move { fetch(extractor.as_ref(), &url, &work_dir).await })
        .await
        .map_err(|error| {
            error!("Fetch task did not complete: {error}");
            FetchError::Unexpected(format!("fetch task failed: {error}"))
        })?
}

pub async fn fetch(
    extractor: &dyn Extractor,
    url: &str,
    work_dir: &Path,
) -> Result<VideoArtifact, FetchError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(FetchError::EmptyInput);
    }

    info!("Fetching metadata for {url:?}");
    let metadata = extractor
        .extract_metadata(url)
        .await
        .map_err(|error| log_failure(url, error.into()))?;

    let uploader = metadata
        .uploader
        .unwrap_or_else(|| DEFAULT_UPLOADER.to_string());
    let title = metadata.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let filename = derive_filename(&uploader, &title);
    let local_path = work_dir.join(&filename);

    info!("Downloading {url:?} to {local_path:?}");
    let options = DownloadOptions::best_mp4(local_path.clone());
    if let Err(error) = extractor.download(url, &options).await {
        discard_leftovers(work_dir, &filename).await;
        return Err(log_failure(url, error.into()));
    }

    let read_result = tokio::fs::read(&local_path).await;
    let remove_result = remove_if_present(&local_path).await;

    let bytes = match read_result {
        Ok(bytes) => bytes,
        Err(error) => {
            discard_leftovers(work_dir, &filename).await;
            return Err(log_failure(
                url,
                FetchError::Unexpected(format!("could not read {local_path:?}: {error}")),
            ));
        }
    };
    if let Err(error) = remove_result {
        return Err(log_failure(
            url,
            FetchError::Unexpected(format!("could not delete {local_path:?}: {error}")),
        ));
    }

    info!("Loaded {} bytes for {filename:?}", bytes.len());
    Ok(VideoArtifact {
        sanitized_title: sanitize_title(&title),
        uploader,
        title,
        filename,
        local_path,
        bytes,
    })
}

fn log_failure(url: &str, failure: FetchError) -> FetchError {
    match &failure {
        FetchError::EmptyInput => {}
        FetchError::Download(detail) => warn!("yt-dlp rejected {url:?}: {detail}"),
        FetchError::Unexpected(detail) => error!("Unexpected failure fetching {url:?}: {detail}"),
    }
    failure
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

// yt-dlp leaves `<target>.part`, per-format `<stem>.f<id>.<ext>[.part]` and
// `<stem>.temp.<ext>` files behind when a download or merge fails.
fn is_leftover(name: &str, filename: &str) -> bool {
    let stem = filename
        .strip_suffix(&format!(".{OUTPUT_EXTENSION}"))
        .unwrap_or(filename);

    name == filename
        || name
            .strip_prefix(filename)
            .is_some_and(|rest| rest == ".part" || rest == ".ytdl")
        || name
            .strip_prefix(stem)
            .is_some_and(|rest| rest.starts_with(".f") || rest.starts_with(".temp."))
}

async fn discard_leftovers(work_dir: &Path, filename: &str) {
    let mut entries = match tokio::fs::read_dir(work_dir).await {
        Ok(entries) => entries,
        Err(error) => {
            warn!("Could not scan {:?} for leftovers: {error}", work_dir);
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(error) => {
                warn!("Could not scan {:?} for leftovers: {error}", work_dir);
                break;
            }
        };

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_leftover(name, filename) {
            continue;
        }

        let path = entry.path();
        if let Err(error) = remove_if_present(&path).await {
            warn!("Could not remove leftover {:?}: {error}", path);
        }
    }
}
