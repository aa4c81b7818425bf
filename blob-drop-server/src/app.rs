use std::sync::Arc;
use std::time::Duration;

use actix_web::http::Method;
use actix_web::web;
use blob_store::{BlobStore, KeyGenerator};

use crate::cors::CorsPolicy;
use crate::services::{download_service, upload_service};

pub const UPLOAD_PATH: &str = "/api/v2/post/";
pub const DOWNLOAD_PREFIX: &str = "/api/v2/";

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Limits fixed at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub max_upload_bytes: u64,
    pub upload_timeout: Option<Duration>,
    pub download_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_timeout: None,
            download_timeout: None,
        }
    }
}

// Shared by every worker; nothing in here changes after startup.
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub keys: Arc<dyn KeyGenerator>,
    pub config: ServerConfig,
    pub cors: CorsPolicy,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(UPLOAD_PATH)
            .route(web::post().to(upload_service::upload))
            .route(web::method(Method::OPTIONS).to(upload_service::preflight))
            .default_service(web::to(upload_service::method_not_allowed)),
    )
    .service(
        // Anything else under the prefix is a download; the key is its last segment.
        web::resource("/api/v2/{tail:.*}")
            .route(web::get().to(download_service::download))
            .route(web::method(Method::OPTIONS).to(download_service::preflight))
            .default_service(web::to(download_service::method_not_allowed)),
    );
}
