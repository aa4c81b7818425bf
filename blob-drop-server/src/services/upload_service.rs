use std::fmt::Display;
use std::io;

use actix_web::http::header;
use actix_web::web::{self, Bytes, Data};
use actix_web::{HttpRequest, HttpResponse};
use async_stream::try_stream;
use blob_store::{BlobError, ByteStream};
use futures_util::{pin_mut, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::app::{AppState, DOWNLOAD_PREFIX};
use crate::errors::ServerErr;
use crate::services::APP_TYPE_JSON;

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "dataKey")]
    pub data_key: String,
    pub url: String,
}

/// Raised inside the body stream once more than `limit` bytes have arrived.
#[derive(Debug, Error)]
#[error("request body exceeds {limit} bytes")]
struct BodyLimitExceeded {
    limit: u64,
}

pub async fn upload(
    req: HttpRequest,
    payload: web::Payload,
    shared_state: Data<AppState>,
) -> HttpResponse {
    let mut response = match store_upload(&req, payload, &shared_state).await {
        Ok(resp) => HttpResponse::Ok().content_type(APP_TYPE_JSON).json(resp),
        Err(e) => HttpResponse::from_error(e),
    };
    shared_state.cors.apply_upload(&req, &mut response);
    response
}

pub async fn preflight(req: HttpRequest, shared_state: Data<AppState>) -> HttpResponse {
    let mut response = HttpResponse::NoContent().finish();
    shared_state.cors.apply_upload(&req, &mut response);
    response
}

pub async fn method_not_allowed(req: HttpRequest, shared_state: Data<AppState>) -> HttpResponse {
    let mut response = HttpResponse::from_error(ServerErr::BadMethod { allow: "POST, OPTIONS" });
    shared_state.cors.apply_upload(&req, &mut response);
    response
}

async fn store_upload(
    req: &HttpRequest,
    payload: web::Payload,
    shared_state: &AppState,
) -> Result<UploadResponse, ServerErr> {
    shared_state.cors.check_upload_origin(req)?;

    let limit = shared_state.config.max_upload_bytes;
    if let Some(declared) = declared_length(req) {
        if declared > limit {
            tracing::warn!("refusing upload declaring {} bytes (limit {})", declared, limit);
            return Err(ServerErr::TooLarge { limit });
        }
    }

    // Everything that can be rejected up front is checked before a byte is stored.
    let data_key = shared_state.keys.generate();
    let url = retrieval_url(req, &data_key)?;

    let put = shared_state.store.put(&data_key, limit_body(payload, limit));
    let outcome = match shared_state.config.upload_timeout {
        Some(deadline) => match tokio::time::timeout(deadline, put).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("upload {} exceeded its {:?} deadline", data_key, deadline);
                discard(shared_state, &data_key).await;
                return Err(ServerErr::TimedOut);
            }
        },
        None => put.await,
    };

    match outcome {
        Ok(size) => {
            tracing::info!(
                "file uploaded successfully dataKey={} size={} origin={:?}",
                data_key,
                size,
                req.headers().get(header::ORIGIN)
            );
            Ok(UploadResponse { data_key, url })
        }
        Err(e) => {
            let err = classify_failure(&data_key, e);
            if !matches!(err, ServerErr::StoreWriteFailed(BlobError::AlreadyExists { .. })) {
                discard(shared_state, &data_key).await;
            }
            Err(err)
        }
    }
}

fn classify_failure(data_key: &str, e: BlobError) -> ServerErr {
    match e {
        BlobError::Source(source) => {
            if let Some(exceeded) = source
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<BodyLimitExceeded>())
            {
                tracing::warn!("upload {} aborted: {}", data_key, exceeded);
                return ServerErr::TooLarge { limit: exceeded.limit };
            }
            tracing::error!("upload {} interrupted while reading the body: {}", data_key, source);
            ServerErr::StoreWriteFailed(BlobError::Source(source))
        }
        e => {
            tracing::error!("failed to store upload {}: {}", data_key, e);
            ServerErr::StoreWriteFailed(e)
        }
    }
}

/// A failed upload must not leave a blob behind under its key. Stores already
/// guarantee this for their own failures; this covers a deadline that fires
/// after the blob was published but before `put` returned.
async fn discard(shared_state: &AppState, data_key: &str) {
    match shared_state.store.delete(data_key).await {
        Ok(true) => tracing::warn!("removed blob {} left by a failed upload", data_key),
        Ok(false) => {}
        Err(e) => tracing::error!("failed to remove blob {} after a failed upload: {}", data_key, e),
    }
}

fn declared_length(req: &HttpRequest) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Absolute URL of the download endpoint for `data_key`, on the scheme and
/// host the request arrived on.
fn retrieval_url(req: &HttpRequest, data_key: &str) -> Result<String, ServerErr> {
    let conn = req.connection_info();
    let base = Url::parse(&format!("{}://{}/", conn.scheme(), conn.host()))?;
    let url = base.join(&format!("{}{}", DOWNLOAD_PREFIX.trim_start_matches('/'), data_key))?;
    Ok(url.into())
}

/// Passes `body` through chunk by chunk, failing with [`BodyLimitExceeded`]
/// as soon as the running total goes past `limit`. Nothing after that chunk
/// is read.
pub(crate) fn limit_body<S, E>(body: S, limit: u64) -> ByteStream
where
    S: Stream<Item = Result<Bytes, E>> + 'static,
    E: Display,
{
    try_stream! {
        pin_mut!(body);
        let mut received: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string()))?;
            received += chunk.len() as u64;
            within_limit(received, limit)?;
            yield chunk;
        }
    }
    .boxed_local()
}

fn within_limit(received: u64, limit: u64) -> io::Result<()> {
    if received > limit {
        return Err(io::Error::other(BodyLimitExceeded { limit }));
    }
    Ok(())
}
