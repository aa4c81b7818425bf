use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use blob_store::BlobError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_limit: Option<u64>,
}

/// Failures surfaced to HTTP callers. Store-layer causes are kept as sources
/// for logging; only the display message reaches the caller.
#[derive(Debug, Error)]
pub enum ServerErr {
    #[error("Method not allowed")]
    BadMethod { allow: &'static str },

    #[error("File too large. Maximum size is {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Could not find the file.")]
    NotFound,

    #[error("Origin not allowed")]
    OriginRejected,

    #[error("Invalid Host header")]
    BadHost(#[from] url::ParseError),

    #[error("Upload did not complete in time")]
    TimedOut,

    #[error("Could not save file")]
    StoreWriteFailed(#[source] BlobError),

    #[error("Could not read the file")]
    StoreReadFailed(#[source] BlobError),

    #[error("Internal server error")]
    StoreUnavailable(#[source] BlobError),
}

impl ResponseError for ServerErr {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerErr::BadMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ServerErr::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerErr::NotFound => StatusCode::NOT_FOUND,
            ServerErr::OriginRejected => StatusCode::FORBIDDEN,
            ServerErr::BadHost(_) => StatusCode::BAD_REQUEST,
            ServerErr::TimedOut => StatusCode::REQUEST_TIMEOUT,
            ServerErr::StoreWriteFailed(_)
            | ServerErr::StoreReadFailed(_)
            | ServerErr::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = ErrorBody {
            message: self.to_string(),
            max_limit: match self {
                ServerErr::TooLarge { limit } => Some(*limit),
                _ => None,
            },
        };
        let mut response = HttpResponse::build(self.status_code());
        if let ServerErr::BadMethod { allow } = self {
            response.insert_header((header::ALLOW, *allow));
        }
        response.json(body)
    }
}

/// Rejected startup configuration.
#[derive(Debug, Error)]
pub enum ConfigErr {
    #[error("maximum upload size must be at least one byte")]
    ZeroUploadLimit,

    #[error("CORS allow-all is disabled but no allowed origins were given")]
    EmptyAllowlist,
}
