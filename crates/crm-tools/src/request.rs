//! Request builder: turns a resolved resource into a fully formed, authenticated CRM request.

use crate::catalog::ResourceDescriptor;
use crate::config::{ConnectionConfig, Credentials};
use crate::error::{BridgeError, Result};
use crate::semantics::HttpMethod;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use url::Url;

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;

/// Upstream pagination hints. Both values are validated on construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    limit: Option<u32>,
    offset: Option<u64>,
}

impl Pagination {
    /// Validate pagination hints.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if `limit` is outside `1..=100` or `offset` is negative.
    /// Out-of-range values are never clamped.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self> {
        let limit = match limit {
            None => None,
            Some(l) if (MIN_LIMIT..=MAX_LIMIT).contains(&l) => u32::try_from(l).ok(),
            Some(l) => {
                return Err(BridgeError::Validation(format!(
                    "limit must be between {MIN_LIMIT} and {MAX_LIMIT} (got {l})"
                )));
            }
        };
        let offset = match offset {
            None => None,
            Some(o) => Some(u64::try_from(o).map_err(|_| {
                BridgeError::Validation(format!("offset must be >= 0 (got {o})"))
            })?),
        };
        Ok(Self { limit, offset })
    }

    #[must_use]
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }
}

/// An explicit mutation: a write method together with its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    method: HttpMethod,
    body: Value,
}

impl WriteIntent {
    /// Combine a caller-supplied method and body.
    ///
    /// Returns `Ok(None)` for plain reads (no method or `GET`, no body).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if a write method comes without a body, or a body comes
    /// without an explicit write method.
    pub fn from_parts(method: Option<HttpMethod>, body: Option<Value>) -> Result<Option<Self>> {
        let body = body.filter(|b| !b.is_null());
        match (method, body) {
            (None | Some(HttpMethod::Get), None) => Ok(None),
            (Some(method), Some(body)) if !method.is_read_only() => {
                Ok(Some(Self { method, body }))
            }
            (Some(method), None) => Err(BridgeError::Validation(format!(
                "{method} requests require a JSON body"
            ))),
            (_, Some(_)) => Err(BridgeError::Validation(
                "a request body requires an explicit POST, PUT or DELETE method".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// A request ready to hand to a [`crate::transport::Transport`].
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: HttpMethod,
    url: Url,
    headers: HeaderMap,
    body: Option<Value>,
}

impl OutboundRequest {
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryPair {
    key: String,
    value: String,
}

/// Builds authenticated requests against one CRM instance.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    credentials: Credentials,
    authorization: HeaderValue,
}

impl RequestBuilder {
    /// Check credentials and prepare the authorization header.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the base URL, username or password is missing or
    /// invalid. Nothing is built in that case.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        Self::from_credentials(config.credentials()?)
    }

    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the credentials cannot form a header value.
    pub fn from_credentials(credentials: Credentials) -> Result<Self> {
        let raw = format!("{}:{}", credentials.username(), credentials.password());
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        let mut authorization = HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|e| {
            BridgeError::Configuration(format!("Invalid CRM credentials header: {e}"))
        })?;
        authorization.set_sensitive(true);
        Ok(Self {
            credentials,
            authorization,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.credentials.base_url()
    }

    /// Build the request for a catalog resource.
    ///
    /// `{searchParam}={query}` is added only for a non-empty query; `limit`/`offset` only when set.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the resulting URL is invalid.
    pub fn build(
        &self,
        descriptor: &ResourceDescriptor,
        query: Option<&str>,
        pagination: Pagination,
        write: Option<WriteIntent>,
    ) -> Result<OutboundRequest> {
        let mut query_params: Vec<QueryPair> = Vec::new();
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            query_params.push(QueryPair {
                key: descriptor.search_param().to_string(),
                value: q.to_string(),
            });
        }
        if let Some(limit) = pagination.limit() {
            query_params.push(QueryPair {
                key: "limit".to_string(),
                value: limit.to_string(),
            });
        }
        if let Some(offset) = pagination.offset() {
            query_params.push(QueryPair {
                key: "offset".to_string(),
                value: offset.to_string(),
            });
        }

        let url = build_url(self.base_url(), descriptor.remote_path(), &query_params)?;
        Ok(self.finish(url, write))
    }

    /// Build a request for an explicit CRM API path such as `contacts/42` (passthrough calls).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if the path is empty, absolute, carries a query or
    /// fragment, or contains `.`/`..` segments.
    pub fn build_raw(&self, path: &str, write: Option<WriteIntent>) -> Result<OutboundRequest> {
        let path = validate_raw_path(path)?;
        let url = build_url(self.base_url(), path, &[])?;
        Ok(self.finish(url, write))
    }

    fn finish(&self, url: Url, write: Option<WriteIntent>) -> OutboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let (method, body) = match write {
            Some(w) => (w.method, Some(w.body)),
            None => (HttpMethod::Get, None),
        };

        OutboundRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

fn validate_raw_path(path: &str) -> Result<&str> {
    let trimmed = path.trim().trim_start_matches('/');
    let trimmed = trimmed.strip_prefix("api/").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(BridgeError::Validation(
            "endpoint path must not be empty".to_string(),
        ));
    }
    if trimmed.contains("://") || trimmed.contains(['?', '#']) {
        return Err(BridgeError::Validation(format!(
            "endpoint must be a plain CRM API path (got '{trimmed}')"
        )));
    }
    if trimmed.split('/').any(|seg| seg == ".." || seg == ".") {
        return Err(BridgeError::Validation(format!(
            "endpoint must not contain relative segments (got '{trimmed}')"
        )));
    }
    Ok(trimmed)
}

fn build_url(base_url: &str, path: &str, query_params: &[QueryPair]) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| BridgeError::Configuration(format!("Invalid CRM base URL: {e}")))?;

    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            BridgeError::Configuration(format!("CRM base URL '{base_url}' cannot carry a path"))
        })?;
        segments.pop_if_empty().push("api");
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
    }

    if !query_params.is_empty() {
        let mut query = String::new();
        for (i, p) in query_params.iter().enumerate() {
            if i > 0 {
                query.push('&');
            }
            query.push_str(&encode_query_component(&p.key));
            query.push('=');
            query.push_str(&encode_query_component(&p.value));
        }
        url.set_query(Some(&query));
    }

    Ok(url)
}

fn encode_query_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}
