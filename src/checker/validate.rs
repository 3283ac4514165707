// src/checker/validate.rs
// =============================================================================
// Syntactic URL validation. No network access happens here.
//
// A URL is checkable when it:
// - parses as an absolute URL
// - uses http or https
// - has a host (the authority part)
//
// Anything else is recorded as "Invalid URL format" and never sent.
// =============================================================================

use url::Url;

pub fn is_valid_url(candidate: &str) -> bool {
    match Url::parse(candidate.trim()) {
        Ok(url) => is_checkable_scheme(url.scheme()) && url.has_host(),
        Err(_) => false,
    }
}

// We skip mailto:, tel:, javascript:, data:, file: and friends.
fn is_checkable_scheme(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}
