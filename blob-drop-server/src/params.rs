use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use crate::app::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::cors::CorsPolicy;
use crate::errors::ConfigErr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// One file per blob under the data directory.
    Local,
    /// Process memory; everything is lost on restart.
    Memory,
}

#[derive(Parser, Debug)]
#[command(version, about = "Stores uploaded blobs under random keys and serves them back")]
pub struct Args {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub(crate) bind_addr: String,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub(crate) port: u16,
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub(crate) data_dir: PathBuf,
    #[arg(long, env = "MAX_UPLOAD_SIZE", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub(crate) max_upload_bytes: u64,
    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Local)]
    pub(crate) storage: StorageBackend,
    /// Fsync each blob before publishing it.
    #[arg(long, env = "SYNC_WRITES")]
    pub(crate) sync_writes: bool,
    /// Reflect any upload origin. Set to false to only accept `--cors-allowed-origin`.
    #[arg(long, env = "CORS_ALLOW_ALL", default_value_t = true, action = ArgAction::Set)]
    pub(crate) cors_allow_all: bool,
    #[arg(long = "cors-allowed-origin", env = "CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub(crate) cors_allowed_origins: Vec<String>,
    #[arg(long, env = "UPLOAD_TIMEOUT_SECS")]
    pub(crate) upload_timeout_secs: Option<u64>,
    #[arg(long, env = "DOWNLOAD_TIMEOUT_SECS")]
    pub(crate) download_timeout_secs: Option<u64>,
    #[arg(long, env = "HTTP_WORKERS")]
    pub(crate) workers: Option<usize>,
}

impl Args {
    pub(crate) fn server_config(&self) -> Result<ServerConfig, ConfigErr> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigErr::ZeroUploadLimit);
        }
        Ok(ServerConfig {
            max_upload_bytes: self.max_upload_bytes,
            upload_timeout: self.upload_timeout_secs.map(Duration::from_secs),
            download_timeout: self.download_timeout_secs.map(Duration::from_secs),
        })
    }

    pub(crate) fn cors_policy(&self) -> Result<CorsPolicy, ConfigErr> {
        let policy = CorsPolicy::new(self.cors_allow_all, &self.cors_allowed_origins);
        if !policy.allow_all() && policy.allowlist().is_empty() {
            return Err(ConfigErr::EmptyAllowlist);
        }
        Ok(policy)
    }
}
