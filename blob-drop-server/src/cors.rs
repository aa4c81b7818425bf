use std::collections::BTreeSet;

use actix_web::http::header::{self, HeaderValue};
use actix_web::{HttpRequest, HttpResponse};

use crate::errors::ServerErr;

/// Origin policy for upload responses. Downloads are open to every origin:
/// a blob is only reachable through its unguessable key.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    allow_all: bool,
    allowlist: BTreeSet<String>,
}

impl CorsPolicy {
    pub fn new<I, S>(allow_all: bool, allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowlist = allowlist
            .into_iter()
            .map(|origin| normalize_origin(origin.as_ref()))
            .filter(|origin| !origin.is_empty())
            .collect();
        Self { allow_all, allowlist }
    }

    /// Echo back whatever origin the request names.
    pub fn reflect_all() -> Self {
        Self::new(true, std::iter::empty::<&str>())
    }

    pub fn allow_all(&self) -> bool {
        self.allow_all
    }

    pub fn allowlist(&self) -> &BTreeSet<String> {
        &self.allowlist
    }

    pub fn permits(&self, origin: &str) -> bool {
        self.allow_all || self.allowlist.contains(&normalize_origin(origin))
    }

    /// Refuses an upload whose `Origin` is outside the allowlist. Requests
    /// without an `Origin` header are not browser cross-origin requests and
    /// pass through.
    pub fn check_upload_origin(&self, req: &HttpRequest) -> Result<(), ServerErr> {
        match req.headers().get(header::ORIGIN) {
            None => Ok(()),
            Some(origin) if origin.to_str().map_or(false, |o| self.permits(o)) => Ok(()),
            Some(origin) => {
                tracing::warn!("rejected upload from origin {:?}", origin);
                Err(ServerErr::OriginRejected)
            }
        }
    }

    pub fn apply_upload(&self, req: &HttpRequest, response: &mut HttpResponse) {
        let headers = response.headers_mut();
        if let Some(origin) = req.headers().get(header::ORIGIN) {
            if origin.to_str().map_or(false, |o| self.permits(o)) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    }

    pub fn apply_download(response: &mut HttpResponse) {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::reflect_all()
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
