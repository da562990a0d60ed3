//! The CRM plugins: thin [`Plugin`] wrappers around the `crm-bridge-tools` sources.

use crate::openapi::{api_plugin_document, query_plugin_document};
use crate::plugin::Plugin;
use async_trait::async_trait;
use crm_bridge_tools::catalog::ResourceCatalog;
use crm_bridge_tools::config::ConnectionConfig;
use crm_bridge_tools::error::Result;
use crm_bridge_tools::source::{CrmApiSource, CrmQuerySource};
use crm_bridge_tools::transport::Transport;
use openapiv3::OpenAPI;
use serde_json::Value;
use std::sync::Arc;

pub const QUERY_PLUGIN_NAME: &str = "OfficialCrm";
pub const API_PLUGIN_NAME: &str = "OfficialCrmApi";

/// Free-text query plugin: `{query?, endpoint?, limit?, offset?}` → normalized records.
pub struct CrmQueryPlugin {
    source: CrmQuerySource,
    openapi: OpenAPI,
}

impl CrmQueryPlugin {
    /// # Errors
    ///
    /// Returns a configuration error if the OpenAPI descriptor cannot be generated.
    pub fn new(source: CrmQuerySource) -> Result<Self> {
        let openapi = query_plugin_document(QUERY_PLUGIN_NAME, source.catalog())?;
        Ok(Self { source, openapi })
    }
}

#[async_trait]
impl Plugin for CrmQueryPlugin {
    fn name(&self) -> &str {
        QUERY_PLUGIN_NAME
    }

    fn openapi(&self) -> &OpenAPI {
        &self.openapi
    }

    async fn handle(&self, options: Value) -> Result<Value> {
        self.source.handle(options).await
    }
}

/// Explicit passthrough plugin: `{endpoint, method?, data?}` → `{code, data}`.
pub struct CrmApiPlugin {
    source: CrmApiSource,
    openapi: OpenAPI,
}

impl CrmApiPlugin {
    /// # Errors
    ///
    /// Returns a configuration error if the OpenAPI descriptor cannot be generated.
    pub fn new(source: CrmApiSource) -> Result<Self> {
        Ok(Self {
            source,
            openapi: api_plugin_document(API_PLUGIN_NAME)?,
        })
    }
}

#[async_trait]
impl Plugin for CrmApiPlugin {
    fn name(&self) -> &str {
        API_PLUGIN_NAME
    }

    fn openapi(&self) -> &OpenAPI {
        &self.openapi
    }

    async fn handle(&self, options: Value) -> Result<Value> {
        self.source.handle(options).await
    }
}

/// Both CRM plugins sharing one connection, catalog and transport.
///
/// # Errors
///
/// Returns a configuration error if a descriptor cannot be generated. Credentials are not checked
/// here; each call checks them before touching the transport.
pub fn crm_plugins(
    catalog: Arc<ResourceCatalog>,
    connection: ConnectionConfig,
    transport: Arc<dyn Transport>,
) -> Result<(CrmQueryPlugin, CrmApiPlugin)> {
    let query = CrmQueryPlugin::new(CrmQuerySource::with_catalog(
        catalog,
        connection.clone(),
        Arc::clone(&transport),
    ))?;
    let api = CrmApiPlugin::new(CrmApiSource::new(connection, transport))?;
    Ok((query, api))
}
