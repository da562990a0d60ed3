//! The plugin contract.

use async_trait::async_trait;
use crm_bridge_tools::error::Result;
use openapiv3::OpenAPI;
use serde_json::Value;

/// A named handler with an OpenAPI descriptor.
///
/// Plugins are shared across concurrent dispatches, so they must be `Send + Sync` and must not
/// rely on interior mutability for correctness.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable name callers dispatch on (e.g. `OfficialCrm`).
    fn name(&self) -> &str;

    /// Descriptor of the options this plugin accepts and the result it returns.
    fn openapi(&self) -> &OpenAPI;

    /// Handle one call. `options` is the caller's JSON, unvalidated.
    async fn handle(&self, options: Value) -> Result<Value>;
}
