//! CRM sources: the end-to-end call chains behind the bridge's plugins.
//!
//! [`CrmQuerySource`] answers free-text queries (resolve, build, send, normalize).
//! [`CrmApiSource`] forwards explicit API calls and returns the raw CRM JSON.

use crate::catalog::ResourceCatalog;
use crate::config::ConnectionConfig;
use crate::error::{BridgeError, Result};
use crate::normalize::{NormalizedResult, normalize};
use crate::request::{Pagination, RequestBuilder, WriteIntent};
use crate::resolver::EndpointResolver;
use crate::semantics::HttpMethod;
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Options accepted by the query plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Explicit resource key; wins over inference when it names a catalog resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl QueryOptions {
    /// Parse plugin options. `null` means "no options".
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if `options` is not an object or a field has the wrong
    /// type.
    pub fn from_value(options: Value) -> Result<Self> {
        parse_options(options, "query")
    }
}

/// Options accepted by the passthrough plugin.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOptions {
    /// CRM API path below `/api`, e.g. `contacts/42`.
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiOptions {
    /// # Errors
    ///
    /// Returns [`BridgeError::Validation`] if `options` is not an object, `endpoint` is missing, or
    /// a field has the wrong type.
    pub fn from_value(options: Value) -> Result<Self> {
        parse_options(options, "api")
    }
}

fn parse_options<T: DeserializeOwned>(options: Value, kind: &str) -> Result<T> {
    let options = match options {
        Value::Null => Value::Object(serde_json::Map::new()),
        v @ Value::Object(_) => v,
        other => {
            return Err(BridgeError::Validation(format!(
                "{kind} options must be a JSON object (got {other})"
            )));
        }
    };
    serde_json::from_value(options)
        .map_err(|e| BridgeError::Validation(format!("Invalid {kind} options: {e}")))
}

/// Free-text query source over a resource catalog.
#[derive(Clone)]
pub struct CrmQuerySource {
    catalog: Arc<ResourceCatalog>,
    connection: ConnectionConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CrmQuerySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmQuerySource")
            .field("resources", &self.catalog.all().len())
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl CrmQuerySource {
    /// Source over the built-in catalog.
    #[must_use]
    pub fn new(connection: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_catalog(
            Arc::new(ResourceCatalog::builtin().clone()),
            connection,
            transport,
        )
    }

    #[must_use]
    pub fn with_catalog(
        catalog: Arc<ResourceCatalog>,
        connection: ConnectionConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            catalog,
            connection,
            transport,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// Resolve, build, send and normalize one query.
    ///
    /// Credentials and options are checked before the transport is touched.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Configuration`] for missing or invalid connection settings,
    /// - [`BridgeError::Validation`] for out-of-range pagination,
    /// - [`BridgeError::Upstream`] / [`BridgeError::Transport`] from the CRM call.
    pub async fn query(&self, options: &QueryOptions) -> Result<NormalizedResult> {
        let builder = RequestBuilder::new(&self.connection)?;
        let resolution = EndpointResolver::new(&self.catalog)
            .resolve_detailed(options.query.as_deref(), options.endpoint.as_deref());
        let descriptor = resolution.descriptor;
        let pagination = Pagination::new(options.limit, options.offset)?;
        info!(
            resource = %descriptor.key(),
            reason = ?resolution.reason,
            score = resolution.score,
            "resolved CRM resource"
        );

        let request = builder.build(descriptor, options.query.as_deref(), pagination, None)?;
        let response = self.transport.send(request).await?;
        let status = response.status;
        let payload = response.into_json()?;
        let result = normalize(descriptor, &payload).map_err(|e| match e {
            BridgeError::Upstream { status: None, message } => BridgeError::Upstream {
                status: Some(status),
                message,
            },
            other => other,
        })?;
        debug!(
            resource = %descriptor.key(),
            records = result.len(),
            "normalized CRM response"
        );
        Ok(result)
    }

    /// [`CrmQuerySource::query`] over untyped plugin options, returning the result as JSON.
    ///
    /// # Errors
    ///
    /// Same as [`CrmQuerySource::query`], plus [`BridgeError::Validation`] for malformed options.
    pub async fn handle(&self, options: Value) -> Result<Value> {
        let options = QueryOptions::from_value(options)?;
        Ok(self.query(&options).await?.into_value())
    }
}

/// Result of a passthrough call: the CRM status code and its raw JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub code: u16,
    pub data: Value,
}

/// Explicit passthrough to the CRM API.
///
/// Unlike [`CrmQuerySource`], a non-2xx answer is not an error here: the caller gets `code` and
/// the CRM's body and decides what to do.
#[derive(Clone)]
pub struct CrmApiSource {
    connection: ConnectionConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CrmApiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmApiSource")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl CrmApiSource {
    #[must_use]
    pub fn new(connection: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            connection,
            transport,
        }
    }

    /// Forward one call.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Configuration`] for missing or invalid connection settings,
    /// - [`BridgeError::Validation`] for a bad path, an unknown method, or a write without body,
    /// - [`BridgeError::Upstream`] if a JSON-typed body does not parse,
    /// - [`BridgeError::Transport`] for connection failures.
    pub async fn call(&self, options: &ApiOptions) -> Result<ApiResponse> {
        let builder = RequestBuilder::new(&self.connection)?;
        let method = options
            .method
            .as_deref()
            .map(str::parse::<HttpMethod>)
            .transpose()?;
        let write = WriteIntent::from_parts(method, options.data.clone())?;
        if let Some(w) = &write
            && w.method().is_destructive()
        {
            info!(method = %w.method(), endpoint = %options.endpoint, "forwarding destructive CRM call");
        }

        let request = builder.build_raw(&options.endpoint, write)?;
        let response = self.transport.send(request).await?;
        debug!(status = response.status, "CRM passthrough answered");
        Ok(ApiResponse {
            code: response.status,
            data: response.json()?,
        })
    }

    /// [`CrmApiSource::call`] over untyped plugin options.
    ///
    /// # Errors
    ///
    /// Same as [`CrmApiSource::call`], plus [`BridgeError::Validation`] for malformed options.
    pub async fn handle(&self, options: Value) -> Result<Value> {
        let options = ApiOptions::from_value(options)?;
        let response = self.call(&options).await?;
        serde_json::to_value(response)
            .map_err(|e| BridgeError::Upstream {
                status: None,
                message: format!("failed to encode CRM response: {e}"),
            })
    }
}
