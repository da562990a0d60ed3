//! Plugin dispatch for the CRM bridge.
//!
//! A [`registry::PluginRegistry`] maps plugin names to [`plugin::Plugin`] handlers. The CRM
//! plugins in [`crm`] wrap the sources from `crm-bridge-tools` and publish OpenAPI descriptors
//! generated from the resource catalog.

pub mod crm;
pub mod error;
pub mod openapi;
pub mod plugin;
pub mod registry;

use crm_bridge_tools::catalog::ResourceCatalog;
use crm_bridge_tools::config::ConnectionConfig;
use crm_bridge_tools::transport::Transport;
use std::sync::Arc;

/// The registry the bridge ships with: [`crm::QUERY_PLUGIN_NAME`] and [`crm::API_PLUGIN_NAME`].
///
/// # Errors
///
/// Returns an error if a plugin descriptor cannot be generated.
pub fn default_registry(
    catalog: Arc<ResourceCatalog>,
    connection: ConnectionConfig,
    transport: Arc<dyn Transport>,
) -> Result<registry::PluginRegistry, error::RegistryError> {
    let (query, api) = crm::crm_plugins(catalog, connection, transport)?;
    registry::PluginRegistry::builder()
        .register(query)
        .register(api)
        .build()
}
