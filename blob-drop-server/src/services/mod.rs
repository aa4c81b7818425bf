pub mod download_service;
pub mod upload_service;

#[cfg(test)]
pub(crate) mod test_support;

pub const APP_TYPE_JSON: &str = "application/json";
