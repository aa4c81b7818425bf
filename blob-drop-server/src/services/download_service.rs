use std::io;
use std::time::Duration;

use actix_web::web::{self, Data};
use actix_web::HttpResponse;
use async_stream::try_stream;
use blob_store::{BlobError, BlobReader, ByteStream};
use futures_util::StreamExt;
use tokio::time::Instant;

use crate::app::AppState;
use crate::cors::CorsPolicy;
use crate::errors::ServerErr;

pub const APP_TYPE_OCTET_STREAM: &str = "application/octet-stream";

pub async fn download(
    from_path: web::Path<String>,
    shared_state: Data<AppState>,
) -> HttpResponse {
    let tail = from_path.into_inner();
    let data_key = last_segment(&tail);
    let mut response = match open_blob(data_key, &shared_state).await {
        Ok(reader) => {
            tracing::info!("serving dataKey={} size={}", data_key, reader.size_bytes);
            HttpResponse::Ok()
                .content_type(APP_TYPE_OCTET_STREAM)
                .no_chunking(reader.size_bytes)
                .streaming(with_deadline(reader.stream, shared_state.config.download_timeout))
        }
        Err(e) => HttpResponse::from_error(e),
    };
    CorsPolicy::apply_download(&mut response);
    response
}

pub async fn preflight() -> HttpResponse {
    let mut response = HttpResponse::NoContent().finish();
    CorsPolicy::apply_download(&mut response);
    response
}

pub async fn method_not_allowed() -> HttpResponse {
    let mut response = HttpResponse::from_error(ServerErr::BadMethod { allow: "GET, OPTIONS" });
    CorsPolicy::apply_download(&mut response);
    response
}

/// `a/b/KEY/` names `KEY`. An empty tail yields an empty key, which no
/// store will accept.
fn last_segment(tail: &str) -> &str {
    tail.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or("")
}

async fn open_blob(data_key: &str, shared_state: &AppState) -> Result<BlobReader, ServerErr> {
    match shared_state.store.exists(data_key).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("file not found dataKey={}", data_key);
            return Err(ServerErr::NotFound);
        }
        // Such a key was never issued, so it cannot name a stored blob.
        Err(BlobError::InvalidKey { key }) => {
            tracing::warn!("rejected unaddressable key {:?}", key);
            return Err(ServerErr::NotFound);
        }
        Err(e) => {
            tracing::error!("existence check failed for dataKey={}: {}", data_key, e);
            return Err(ServerErr::StoreUnavailable(e));
        }
    }

    // The blob can still disappear between the check and the open; that is a
    // server-side failure for this request only.
    shared_state.store.get(data_key).await.map_err(|e| {
        tracing::error!("failed to open dataKey={}: {}", data_key, e);
        ServerErr::StoreReadFailed(e)
    })
}

/// Fails the body stream once `timeout` has elapsed since the response began.
fn with_deadline(stream: ByteStream, timeout: Option<Duration>) -> ByteStream {
    let Some(timeout) = timeout else {
        return stream;
    };
    let deadline = Instant::now() + timeout;
    try_stream! {
        let mut stream = stream;
        while let Some(chunk) = next_before(&mut stream, deadline).await? {
            yield chunk?;
        }
    }
    .boxed_local()
}

async fn next_before(stream: &mut ByteStream, deadline: Instant) -> io::Result<Option<io::Result<web::Bytes>>> {
    tokio::time::timeout_at(deadline, stream.next())
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "download deadline exceeded"))
}
