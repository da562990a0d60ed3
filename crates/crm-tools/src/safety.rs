//! Outbound HTTP hygiene: scheme checks and credential redaction for anything we log or return.

use crate::error::{BridgeError, Result};
use url::Url;

/// Reject anything that is not plain `http(s)` with a host.
///
/// # Errors
///
/// Returns [`BridgeError::Configuration`] for unsupported schemes or host-less URLs.
pub fn check_scheme(url: &Url) -> Result<()> {
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(BridgeError::Configuration(format!(
            "Unsupported CRM URL scheme '{scheme}' (expected http or https)"
        )));
    }
    if url.host_str().is_none() {
        return Err(BridgeError::Configuration(
            "CRM URL is missing a host".to_string(),
        ));
    }
    Ok(())
}

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
