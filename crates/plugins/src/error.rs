//! Error types for plugin dispatch.

use crm_bridge_tools::error::BridgeError;
use thiserror::Error;

/// Errors surfaced by [`crate::registry::PluginRegistry::dispatch`].
///
/// The registry itself only ever produces [`DispatchError::UnknownPlugin`]; handler errors pass
/// through unchanged.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unable to find plugin '{name}'")]
    UnknownPlugin { name: String },

    #[error(transparent)]
    Handler(#[from] BridgeError),
}

impl DispatchError {
    /// The handler's error, when the plugin was found and failed.
    #[must_use]
    pub fn as_handler(&self) -> Option<&BridgeError> {
        match self {
            Self::Handler(e) => Some(e),
            Self::UnknownPlugin { .. } => None,
        }
    }
}

/// Errors raised while assembling a registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Plugin '{name}' is registered more than once")]
    DuplicatePlugin { name: String },

    #[error("Plugin name must not be empty")]
    EmptyName,

    /// A plugin could not be constructed (e.g. its descriptor failed to generate).
    #[error("Failed to build plugin: {0}")]
    Plugin(#[from] BridgeError),
}

/// Result type alias for dispatch.
pub type Result<T> = std::result::Result<T, DispatchError>;
