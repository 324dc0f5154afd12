//! Utility helpers shared across the asset subsystem
//!
//! - `retry` — bounded retry with configurable backoff, used by both the
//!   locator's existence probes and the bulk sync downloader
//! - `validation` — image payload integrity checks (size + magic bytes)

pub mod retry;
pub mod validation;

/// Sanitize a base URL by removing trailing slashes and ensuring a scheme.
pub fn sanitize_base_url(base_url: &str) -> String {
    let mut url = base_url.trim().to_string();

    while url.ends_with('/') {
        url.pop();
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("https://{}", url);
    }

    url
}
