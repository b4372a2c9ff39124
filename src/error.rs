use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const EMPTY_INPUT_MESSAGE: &str = "Please enter a TikTok URL.";
pub const DOWNLOAD_ERROR_MESSAGE: &str =
    "❌ Invalid URL or private video. Please check the URL and try again.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "❌ An unexpected error occurred. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Bad URL, private or removed video, unsupported site.
    #[error("download error: {0}")]
    Download(String),
    #[error("unexpected extractor failure: {0}")]
    Unexpected(String),
}

/// Outcome of a failed fetch. Inner strings are diagnostics and stay server-side.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no URL submitted")]
    EmptyInput,
    #[error("download error: {0}")]
    Download(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl FetchError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyInput => EMPTY_INPUT_MESSAGE,
            Self::Download(_) => DOWNLOAD_ERROR_MESSAGE,
            Self::Unexpected(_) => UNEXPECTED_ERROR_MESSAGE,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Self::EmptyInput => Level::Warning,
            Self::Download(_) | Self::Unexpected(_) => Level::Error,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmptyInput => StatusCode::BAD_REQUEST,
            Self::Download(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ExtractError> for FetchError {
    fn from(error: ExtractError) -> Self {
        match error {
            ExtractError::Download(detail) => Self::Download(detail),
            ExtractError::Unexpected(detail) => Self::Unexpected(detail),
        }
    }
}

/// Banner style the page uses to render a message.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Warning,
    Error,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub level: Level,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub level: Level,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            level: Level::Error,
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(error: FetchError) -> Self {
        Self {
            status: error.status(),
            message: error.user_message().to_string(),
            level: error.level(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            level: self.level,
        });

        (self.status, body).into_response()
    }
}
