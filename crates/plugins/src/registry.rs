//! Plugin registry and dispatch.

use crate::error::{DispatchError, RegistryError, Result};
use crate::plugin::Plugin;
use openapiv3::OpenAPI;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument as _, debug, info_span, warn};

/// Immutable name → plugin mapping, built once at startup and shared across dispatches.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    inner: Arc<BTreeMap<String, Arc<dyn Plugin>>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

/// Collects plugins; [`PluginRegistryBuilder::build`] checks names.
#[derive(Default)]
pub struct PluginRegistryBuilder {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistryBuilder {
    #[must_use]
    pub fn register(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    #[must_use]
    pub fn register_shared(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicatePlugin`] if two plugins share a name, or
    /// [`RegistryError::EmptyName`] for a blank name.
    pub fn build(self) -> std::result::Result<PluginRegistry, RegistryError> {
        let mut map: BTreeMap<String, Arc<dyn Plugin>> = BTreeMap::new();
        for plugin in self.plugins {
            let name = plugin.name().to_string();
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if map.contains_key(&name) {
                return Err(RegistryError::DuplicatePlugin { name });
            }
            map.insert(name, plugin);
        }
        Ok(PluginRegistry {
            inner: Arc::new(map),
        })
    }
}

impl PluginRegistry {
    #[must_use]
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    /// Route `options` to the plugin registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownPlugin`] if nothing is registered under `name`; otherwise
    /// the handler's own error, unchanged.
    pub async fn dispatch(&self, name: &str, options: Value) -> Result<Value> {
        let Some(plugin) = self.inner.get(name) else {
            warn!(plugin = %name, "unknown plugin");
            return Err(DispatchError::UnknownPlugin {
                name: name.to_string(),
            });
        };

        let span = info_span!("dispatch", plugin = %name);
        async {
            debug!("dispatching plugin call");
            let out = plugin.handle(options).await;
            if let Err(e) = &out {
                debug!(error = %e, "plugin call failed");
            }
            out.map_err(DispatchError::from)
        }
        .instrument(span)
        .await
    }

    /// Registered plugin names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.inner.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    #[must_use]
    pub fn openapi(&self, name: &str) -> Option<&OpenAPI> {
        self.inner.get(name).map(|p| p.openapi())
    }

    /// Every plugin's descriptor, keyed by plugin name.
    #[must_use]
    pub fn openapi_documents(&self) -> BTreeMap<&str, &OpenAPI> {
        self.inner
            .iter()
            .map(|(name, p)| (name.as_str(), p.openapi()))
            .collect()
    }
}
