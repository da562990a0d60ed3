//! Endpoint resolution and response normalization for the CRM plugin bridge.
//!
//! This crate is intended to be used by:
//! - `crm-bridge-plugins` (the plugin dispatcher and its CRM plugins)
//! - `crm-bridge-cli` (resolution explain + direct queries)
//!
//! It contains **no** plugin registry logic; the dispatcher wraps [`source::CrmQuerySource`] and
//! [`source::CrmApiSource`] behind its own `Plugin` trait.

pub mod catalog;
pub mod config;
pub mod error;
pub mod normalize;
pub mod request;
pub mod resolver;
pub mod safety;
pub mod semantics;
pub mod source;
pub mod transport;
