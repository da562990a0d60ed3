//! HTTP method semantics for CRM calls.
//!
//! Only the four verbs the CRM API uses are modelled. Reads are the default everywhere; the write
//! verbs exist so the passthrough plugin can forward explicit mutations, and are never chosen by
//! query resolution.

use crate::error::{BridgeError, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// `true` for `GET`.
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Get)
    }

    /// `PUT` and `DELETE` replace or remove existing records.
    #[must_use]
    pub fn is_destructive(self) -> bool {
        matches!(self, Self::Put | Self::Delete)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub fn to_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(BridgeError::Validation(format!(
                "Unsupported HTTP method '{other}' (expected GET, POST, PUT or DELETE)"
            ))),
        }
    }
}
