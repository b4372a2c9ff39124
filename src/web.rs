use std::{collections::HashSet, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, Method,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::{
    config::normalize_origin,
    error::ApiError,
    extractor::Extractor,
    fetch::fetch_detached,
    sanitize::{build_content_disposition, sanitize_ascii_filename},
};

const INDEX_HTML: &str = include_str!("../static/index.html");
const VIDEO_MIME: &str = "video/mp4";
const DOWNLOAD_FILENAME_HEADER: &str = "x-download-filename";

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn Extractor>,
    pub work_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let app = Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/fetch", post(fetch_video))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if allowed_origins.is_empty() {
        app
    } else {
        app.layer(build_cors_layer(allowed_origins))
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn fetch_video(
    State(state): State<AppState>,
    Json(payload): Json<DownloadRequest>,
) -> Result<Response, ApiError> {
    let artifact = fetch_detached(state.extractor, payload.url, state.work_dir).await?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(VIDEO_MIME));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(artifact.bytes.len()));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(&artifact.filename))
            .map_err(|_| ApiError::internal("Could not build the download header."))?,
    );
    headers.insert(
        HeaderName::from_static(DOWNLOAD_FILENAME_HEADER),
        HeaderValue::from_str(&sanitize_ascii_filename(&artifact.filename))
            .map_err(|_| ApiError::internal("Could not build the filename header."))?,
    );

    info!(
        "Serving {:?} ({} bytes, uploader={:?}, title={:?} -> {:?}, scratch file {:?} removed)",
        artifact.filename,
        artifact.bytes.len(),
        artifact.uploader,
        artifact.title,
        artifact.sanitized_title,
        artifact.local_path
    );
    Ok((headers, artifact.bytes).into_response())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_origins: Arc<HashSet<String>> = Arc::new(origins.iter().cloned().collect());
    info!(
        "CORS allow-list loaded with {} origin(s): {:?}",
        allowed_origins.len(),
        origins
    );

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let normalized = origin.to_str().ok().and_then(normalize_origin);
        let allowed = normalized
            .as_ref()
            .is_some_and(|value| allowed_origins.contains(value));
        debug!(
            "CORS origin check raw={:?} normalized={:?} allowed={}",
            origin, normalized, allowed
        );
        allowed
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([
            CONTENT_DISPOSITION,
            HeaderName::from_static(DOWNLOAD_FILENAME_HEADER),
        ])
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        error::{DOWNLOAD_ERROR_MESSAGE, EMPTY_INPUT_MESSAGE, ExtractError, UNEXPECTED_ERROR_MESSAGE},
        fetch::tests::{DownloadBehavior, StubExtractor},
    };

    fn app(extractor: Arc<StubExtractor>, work_dir: PathBuf) -> Router {
        router(
            AppState {
                extractor,
                work_dir,
            },
            &[],
        )
    }

    fn fetch_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/fetch")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_serves_the_form() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::new(None, None, DownloadBehavior::SkipWrite));
        let response = app(extractor, dir.path().to_path_buf())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Fetch Video"));
        assert!(html.contains("Show video preview"));
    }

    #[tokio::test]
    async fn successful_fetch_streams_the_video_back() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::new(
            Some("alice"),
            Some("My Cool Dance!"),
            DownloadBehavior::Write(b"mp4 bytes".to_vec()),
        ));

        let response = app(extractor, dir.path().to_path_buf())
            .oneshot(fetch_request(r#"{"url":"https://www.tiktok.com/@alice/video/1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[CONTENT_LENGTH], "9");
        assert_eq!(headers[DOWNLOAD_FILENAME_HEADER], "alice(My Cool Dance_).mp4");
        assert!(
            headers[CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("filename*=UTF-8''alice%28My%20Cool%20Dance%21%29.mp4")
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"mp4 bytes");
        assert!(!dir.path().join("alice(My Cool Dance!).mp4").exists());
    }

    #[tokio::test]
    async fn empty_url_is_a_warning_without_extractor_calls() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::new(None, None, DownloadBehavior::SkipWrite));

        let response = app(extractor.clone(), dir.path().to_path_buf())
            .oneshot(fetch_request(r#"{"url":"   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], EMPTY_INPUT_MESSAGE);
        assert_eq!(body["level"], "warning");
        assert_eq!(extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_url_field_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::new(None, None, DownloadBehavior::SkipWrite));

        let response = app(extractor.clone(), dir.path().to_path_buf())
            .oneshot(fetch_request("{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn download_errors_get_the_fixed_message() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::rejecting_metadata(
            "ERROR: [TikTok] 42: This post is private",
        ));

        let response = app(extractor, dir.path().to_path_buf())
            .oneshot(fetch_request(r#"{"url":"https://www.tiktok.com/@p/video/42"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"], DOWNLOAD_ERROR_MESSAGE);
        assert_eq!(body["level"], "error");
        let rendered = body.to_string();
        assert!(!rendered.contains("This post is"));
        assert!(!rendered.contains("42"));
    }

    #[tokio::test]
    async fn unexpected_errors_get_the_generic_message() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::new(
            Some("u"),
            Some("t"),
            DownloadBehavior::Fail(ExtractError::Unexpected("disk full".to_string())),
        ));

        let response = app(extractor, dir.path().to_path_buf())
            .oneshot(fetch_request(r#"{"url":"https://www.tiktok.com/@u/video/7"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], UNEXPECTED_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn cors_layer_only_echoes_listed_origins() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::new(None, None, DownloadBehavior::SkipWrite));
        let app = router(
            AppState {
                extractor,
                work_dir: dir.path().to_path_buf(),
            },
            &["https://ui.example".to_string()],
        );

        let allowed = app
            .clone()
            .oneshot(
                Request::get("/api/health")
                    .header("origin", "https://ui.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()["access-control-allow-origin"],
            "https://ui.example"
        );

        let denied = app
            .oneshot(
                Request::get("/api/health")
                    .header("origin", "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(!denied.headers().contains_key("access-control-allow-origin"));
    }
}
