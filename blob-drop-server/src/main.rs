mod app;
mod cors;
mod errors;
mod params;
mod services;

use std::io;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use blob_store::{BlobStore, LocalFileBlobStore, MemoryBlobStore, RandomKeyGenerator};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::AppState;
use crate::params::{Args, StorageBackend};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = args
        .server_config()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let cors = args
        .cors_policy()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let store: Arc<dyn BlobStore> = match args.storage {
        StorageBackend::Local => {
            tokio::fs::create_dir_all(&args.data_dir).await?;
            let local = LocalFileBlobStore::new(&args.data_dir).with_sync_writes(args.sync_writes);
            let swept = local
                .sweep_partials()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if swept > 0 {
                tracing::warn!("removed {} unfinished uploads from {}", swept, args.data_dir.display());
            }
            Arc::new(local)
        }
        StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };

    tracing::info!(
        "starting blob-drop-server storage={:?} dataDir={} maxUploadSize={} corsAllowAll={} allowedOrigins={:?}",
        args.storage,
        args.data_dir.display(),
        config.max_upload_bytes,
        cors.allow_all(),
        cors.allowlist()
    );

    let shared_state = web::Data::new(AppState {
        store,
        keys: Arc::new(RandomKeyGenerator),
        config,
        cors,
    });

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(shared_state.clone())
            .wrap(middleware::Logger::default())
            .configure(app::routes)
    });
    if let Some(workers) = args.workers {
        server = server.workers(workers);
    }

    tracing::info!("server listening on {}:{}", args.bind_addr, args.port);
    server.bind((args.bind_addr.as_str(), args.port))?.run().await
}
