//! OpenAPI descriptors for the CRM plugins, generated from the resource catalog.
//!
//! Documents are assembled as JSON and then parsed into typed [`OpenAPI`] values, so anything we
//! publish is known to be a well-formed OpenAPI 3.0 document.

use crm_bridge_tools::catalog::{FieldKind, ResourceCatalog, ResourceDescriptor};
use crm_bridge_tools::error::{BridgeError, Result};
use crm_bridge_tools::request::{MAX_LIMIT, MIN_LIMIT};
use openapiv3::OpenAPI;
use serde_json::{Map, Value, json};

const OPENAPI_VERSION: &str = "3.0.3";

/// Descriptor for the free-text query plugin.
///
/// The response schema has one optional property per distinct response key in `catalog`; a
/// result only ever carries one of them.
///
/// # Errors
///
/// Returns [`BridgeError::Configuration`] if the generated document does not parse.
pub fn query_plugin_document(plugin_name: &str, catalog: &ResourceCatalog) -> Result<OpenAPI> {
    let endpoints: Vec<&str> = catalog.all().iter().map(ResourceDescriptor::key).collect();

    let mut response_properties = Map::new();
    for d in catalog.all() {
        if !response_properties.contains_key(d.response_key()) {
            response_properties.insert(
                d.response_key().to_string(),
                json!({
                    "type": "array",
                    "description": format!("Records of the '{}' resource", d.key()),
                    "items": record_schema(d),
                }),
            );
        }
    }

    let doc = json!({
        "openapi": OPENAPI_VERSION,
        "info": {
            "title": "CRM Query Plugin",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Query CRM contacts, segments, campaigns, assets, reports, forms, pages and emails with free text.",
        },
        "paths": {
            format!("/{}", plugin_name.to_ascii_lowercase()): {
                "post": {
                    "operationId": plugin_name,
                    "summary": "Resolve a free-text query to a CRM resource and return its records",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/QueryRequest"},
                            },
                        },
                    },
                    "responses": {
                        "200": {
                            "description": "Normalized records of the resolved resource",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/QueryResponse"},
                                },
                            },
                        },
                    },
                },
            },
        },
        "components": {
            "schemas": {
                "QueryRequest": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Free-text query, e.g. 'show me my campaigns'",
                            "example": "show me my campaigns",
                        },
                        "endpoint": {
                            "type": "string",
                            "description": "Explicit resource key; overrides inference from the query",
                            "enum": endpoints,
                        },
                        "limit": {
                            "type": "integer",
                            "minimum": MIN_LIMIT,
                            "maximum": MAX_LIMIT,
                        },
                        "offset": {
                            "type": "integer",
                            "minimum": 0,
                        },
                    },
                },
                "QueryResponse": {
                    "type": "object",
                    "description": "Exactly one property is present: the resolved resource's response key",
                    "properties": response_properties,
                },
            },
        },
    });

    parse_document(doc)
}

/// Descriptor for the explicit passthrough plugin.
///
/// # Errors
///
/// Returns [`BridgeError::Configuration`] if the generated document does not parse.
pub fn api_plugin_document(plugin_name: &str) -> Result<OpenAPI> {
    let doc = json!({
        "openapi": OPENAPI_VERSION,
        "info": {
            "title": "CRM API Plugin",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Forward explicit calls to the CRM REST API.",
        },
        "paths": {
            format!("/{}", plugin_name.to_ascii_lowercase()): {
                "post": {
                    "operationId": plugin_name,
                    "summary": "Make a request to the CRM API",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/ApiRequest"},
                            },
                        },
                    },
                    "responses": {
                        "200": {
                            "description": "The CRM's status code and raw JSON body",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ApiResponse"},
                                },
                            },
                        },
                    },
                },
            },
        },
        "components": {
            "schemas": {
                "ApiRequest": {
                    "type": "object",
                    "required": ["endpoint"],
                    "properties": {
                        "endpoint": {
                            "type": "string",
                            "description": "CRM API path below /api (e.g. contacts, segments/3, contacts/new)",
                            "example": "contacts",
                        },
                        "method": {
                            "type": "string",
                            "enum": ["GET", "POST", "PUT", "DELETE"],
                            "default": "GET",
                        },
                        "data": {
                            "type": "object",
                            "description": "JSON body; required for POST, PUT and DELETE",
                        },
                    },
                },
                "ApiResponse": {
                    "type": "object",
                    "properties": {
                        "code": {"type": "integer", "example": 200},
                        "data": {"description": "Raw CRM response body"},
                    },
                },
            },
        },
    });

    parse_document(doc)
}

fn record_schema(descriptor: &ResourceDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in descriptor.fields() {
        let mut schema = Map::new();
        // Object fields may be JSON objects or arrays.
        if field.kind() != FieldKind::Object {
            schema.insert("type".to_string(), json!(field.kind().schema_type()));
        }
        if let Some(desc) = field.description() {
            schema.insert("description".to_string(), json!(desc));
        }
        if field.is_id() {
            required.push(field.name().to_string());
        }
        properties.insert(field.name().to_string(), Value::Object(schema));
    }
    json!({
        "type": "object",
        "required": required,
        "properties": properties,
    })
}

fn parse_document(doc: Value) -> Result<OpenAPI> {
    serde_json::from_value(doc)
        .map_err(|e| BridgeError::Configuration(format!("Invalid plugin OpenAPI document: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_bridge_tools::catalog::FieldSpec;

    #[test]
    fn query_document_lists_every_response_key() {
        let catalog = ResourceCatalog::builtin();
        let doc = query_plugin_document("OfficialCrm", catalog).expect("document");
        let v = serde_json::to_value(&doc).expect("serialize");

        let props = v["components"]["schemas"]["QueryResponse"]["properties"]
            .as_object()
            .expect("response properties");
        for d in catalog.all() {
            assert!(props.contains_key(d.response_key()), "{}", d.response_key());
        }
        assert!(props.contains_key("lists"));
        assert!(!props.contains_key("segments"));

        assert!(v["paths"]["/officialcrm"]["post"].is_object());
        assert_eq!(
            v["components"]["schemas"]["QueryRequest"]["properties"]["limit"]["maximum"],
            json!(100)
        );
        assert_eq!(
            props["contacts"]["items"]["required"],
            json!(["id"])
        );
        assert_eq!(
            props["campaigns"]["items"]["properties"]["isPublished"]["type"],
            "boolean"
        );
    }

    #[test]
    fn endpoint_enum_follows_the_catalog() {
        let catalog = ResourceCatalog::new(vec![
            ResourceDescriptor::new("contacts", "contacts", "contacts", &["contact"])
                .with_field(FieldSpec::id("Contact ID")),
            ResourceDescriptor::new("deals", "deals", "deals", &["deal"])
                .with_field(FieldSpec::id("Deal ID"))
                .with_field(FieldSpec::new("amount", FieldKind::Number)),
        ])
        .expect("catalog");
        let doc = query_plugin_document("Deals", &catalog).expect("document");
        let v = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(
            v["components"]["schemas"]["QueryRequest"]["properties"]["endpoint"]["enum"],
            json!(["contacts", "deals"])
        );
        assert_eq!(
            v["components"]["schemas"]["QueryResponse"]["properties"]["deals"]["items"]["properties"]["amount"]["type"],
            "number"
        );
    }

    #[test]
    fn api_document_requires_endpoint() {
        let doc = api_plugin_document("OfficialCrmApi").expect("document");
        let v = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(
            v["components"]["schemas"]["ApiRequest"]["required"],
            json!(["endpoint"])
        );
        assert!(v["paths"]["/officialcrmapi"]["post"].is_object());
    }
}
