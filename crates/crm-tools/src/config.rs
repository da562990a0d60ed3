//! Connection settings for the CRM backend.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub const BASE_URL_ENV: &str = "CRM_API_URL";
pub const USERNAME_ENV: &str = "CRM_API_USER";
pub const PASSWORD_ENV: &str = "CRM_API_PASSWORD";

/// Raw connection settings as supplied by the environment or the command line.
///
/// Every field is optional here; presence is checked per call by [`ConnectionConfig::credentials`]
/// so that a process can start (and serve other plugins) without CRM access configured.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// CRM base URL, e.g. `https://crm.example.com`. `/api/...` is appended per request.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Basic-auth username.
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: Some(base_url.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Read settings from `CRM_API_URL`, `CRM_API_USER` and `CRM_API_PASSWORD`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            base_url: lookup(BASE_URL_ENV),
            username: lookup(USERNAME_ENV),
            password: lookup(PASSWORD_ENV),
        }
    }

    /// Validate the settings into usable credentials.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if any of the three values is absent or blank, or if
    /// the base URL is not an absolute `http(s)` URL.
    pub fn credentials(&self) -> Result<Credentials> {
        let base_url = required(self.base_url.as_deref(), "base URL", BASE_URL_ENV)?;
        let username = required(self.username.as_deref(), "username", USERNAME_ENV)?;
        let password = required(self.password.as_deref(), "password", PASSWORD_ENV)?;

        let parsed = Url::parse(base_url).map_err(|e| {
            BridgeError::Configuration(format!("Invalid CRM base URL '{base_url}': {e}"))
        })?;
        crate::safety::check_scheme(&parsed)?;

        Ok(Credentials {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

fn required<'a>(value: Option<&'a str>, what: &str, env: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BridgeError::Configuration(format!(
            "CRM {what} is not configured (set {env})"
        ))),
    }
}

/// Validated connection credentials. Cheap to clone; never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    base_url: String,
    username: String,
    password: String,
}

impl Credentials {
    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn credentials_require_all_three_values() {
        let cfg = ConnectionConfig::from_lookup(lookup_from(&[
            (USERNAME_ENV, "api"),
            (PASSWORD_ENV, "secret"),
        ]));
        let err = cfg.credentials().unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(err.to_string().contains(BASE_URL_ENV));

        let cfg = ConnectionConfig::new("https://crm.example.com", "api", "   ");
        let err = cfg.credentials().unwrap_err();
        assert!(err.to_string().contains(PASSWORD_ENV));
    }

    #[test]
    fn credentials_trim_trailing_slash_and_reject_bad_urls() {
        let creds = ConnectionConfig::new("https://crm.example.com/", "api", "secret")
            .credentials()
            .expect("valid");
        assert_eq!(creds.base_url(), "https://crm.example.com");

        let err = ConnectionConfig::new("crm.example.com", "api", "secret")
            .credentials()
            .unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));

        let err = ConnectionConfig::new("ftp://crm.example.com", "api", "secret")
            .credentials()
            .unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn debug_output_hides_password() {
        let cfg = ConnectionConfig::new("https://crm.example.com", "api", "hunter2");
        assert!(!format!("{cfg:?}").contains("hunter2"));
        let creds = cfg.credentials().expect("valid");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
