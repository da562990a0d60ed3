//! Resource catalog: the table of CRM resources the bridge knows how to query.
//!
//! The catalog is data, not code. Adding a resource means adding a [`ResourceDescriptor`] (in
//! [`builtin_resources`] or in an operator-supplied YAML/JSON file); the resolver, request builder
//! and normalizer need no changes.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_RESOURCE_KEY: &str = "contacts";

fn default_search_param() -> String {
    "search".to_string()
}

/// JSON type of a projected record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Number,
    String,
    Boolean,
    Object,
}

impl FieldKind {
    /// JSON Schema `type` keyword for this kind.
    #[must_use]
    pub fn schema_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }
}

/// One output field of a normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    name: String,
    /// JSON pointer into the raw record. Defaults to `/{name}`.
    #[serde(default)]
    source: Option<String>,
    kind: FieldKind,
    #[serde(default)]
    id: bool,
    #[serde(default)]
    description: Option<String>,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            source: None,
            kind,
            id: false,
            description: None,
        }
    }

    /// The integer `id` field every record carries.
    #[must_use]
    pub fn id(description: impl Into<String>) -> Self {
        Self {
            id: true,
            ..Self::new("id", FieldKind::Integer).describe(description)
        }
    }

    /// Read the value from a nested location instead of `/{name}`.
    #[must_use]
    pub fn from_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.source = Some(pointer.into());
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub fn is_id(&self) -> bool {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// JSON pointer used to read this field from a raw record.
    #[must_use]
    pub fn pointer(&self) -> Cow<'_, str> {
        match &self.source {
            Some(p) => Cow::Borrowed(p.as_str()),
            None => Cow::Owned(format!("/{}", self.name)),
        }
    }
}

/// A CRM resource kind: where it lives, how callers refer to it, and how its records look.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    key: String,
    remote_path: String,
    terms: Vec<String>,
    response_key: String,
    #[serde(default = "default_search_param")]
    search_param: String,
    #[serde(default)]
    fields: Vec<FieldSpec>,
}

impl ResourceDescriptor {
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        remote_path: impl Into<String>,
        response_key: impl Into<String>,
        terms: &[&str],
    ) -> Self {
        Self {
            key: key.into(),
            remote_path: remote_path.into(),
            terms: terms.iter().map(|t| (*t).to_string()).collect(),
            response_key: response_key.into(),
            search_param: default_search_param(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_search_param(mut self, param: impl Into<String>) -> Self {
        self.search_param = param.into();
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Lower-cased matching terms in declaration order.
    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    #[must_use]
    pub fn response_key(&self) -> &str {
        &self.response_key
    }

    #[must_use]
    pub fn search_param(&self) -> &str {
        &self.search_param
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// The field marked as the record id. Present on every descriptor of a built catalog.
    #[must_use]
    pub fn id_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id)
    }

    fn normalize_and_validate(&mut self) -> Result<()> {
        let key = self.key.trim().to_string();
        if key.is_empty() {
            return Err(BridgeError::Configuration(
                "Resource key must not be empty".to_string(),
            ));
        }
        self.key = key;

        let path = self.remote_path.trim().trim_matches('/').to_string();
        if path.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "Resource '{}' has an empty remotePath",
                self.key
            )));
        }
        self.remote_path = path;

        if self.response_key.trim().is_empty() {
            return Err(BridgeError::Configuration(format!(
                "Resource '{}' has an empty responseKey",
                self.key
            )));
        }
        if self.search_param.trim().is_empty() {
            return Err(BridgeError::Configuration(format!(
                "Resource '{}' has an empty searchParam",
                self.key
            )));
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut terms = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let t = term.trim().to_lowercase();
            if t.is_empty() {
                return Err(BridgeError::Configuration(format!(
                    "Resource '{}' has an empty matching term",
                    self.key
                )));
            }
            if seen.insert(t.clone()) {
                terms.push(t);
            }
        }
        if terms.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "Resource '{}' must declare at least one matching term",
                self.key
            )));
        }
        self.terms = terms;

        let id_fields = self.fields.iter().filter(|f| f.id).count();
        if id_fields != 1 {
            return Err(BridgeError::Configuration(format!(
                "Resource '{}' must declare exactly one id field (found {id_fields})",
                self.key
            )));
        }
        let mut names: HashSet<&str> = HashSet::new();
        for f in &self.fields {
            if !names.insert(f.name.as_str()) {
                return Err(BridgeError::Configuration(format!(
                    "Resource '{}' declares field '{}' twice",
                    self.key, f.name
                )));
            }
            if !f.pointer().starts_with('/') {
                return Err(BridgeError::Configuration(format!(
                    "Resource '{}' field '{}' has an invalid source pointer '{}'",
                    self.key,
                    f.name,
                    f.pointer()
                )));
            }
        }

        Ok(())
    }
}

/// On-disk catalog format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    default: Option<String>,
    resources: Vec<ResourceDescriptor>,
}

/// Immutable, validated set of resource descriptors.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    resources: Vec<ResourceDescriptor>,
    default_index: usize,
}

// The built-in table is already normalized (lower-case terms, bare paths, `contacts` first);
// `builtin_table_passes_validation` keeps it that way.
static BUILTIN: LazyLock<ResourceCatalog> = LazyLock::new(|| ResourceCatalog {
    resources: builtin_resources(),
    default_index: 0,
});

impl ResourceCatalog {
    /// Build a catalog, validating every descriptor.
    ///
    /// The default resource is `contacts` when declared, otherwise the first descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the list is empty, keys collide, or a descriptor
    /// violates its invariants (no terms, empty response key, missing id field, ...).
    pub fn new(resources: Vec<ResourceDescriptor>) -> Result<Self> {
        Self::with_default(resources, None)
    }

    /// Build a catalog with an explicit default resource key.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceCatalog::new`], plus an unknown `default_key`.
    pub fn with_default(
        mut resources: Vec<ResourceDescriptor>,
        default_key: Option<&str>,
    ) -> Result<Self> {
        if resources.is_empty() {
            return Err(BridgeError::Configuration(
                "Resource catalog must declare at least one resource".to_string(),
            ));
        }

        let mut keys: HashSet<String> = HashSet::new();
        for d in &mut resources {
            d.normalize_and_validate()?;
            if !keys.insert(d.key.clone()) {
                return Err(BridgeError::Configuration(format!(
                    "Duplicate resource key '{}' in catalog",
                    d.key
                )));
            }
        }

        let default_index = match default_key {
            Some(k) => resources.iter().position(|d| d.key == k).ok_or_else(|| {
                BridgeError::Configuration(format!(
                    "Default resource '{k}' is not declared in the catalog"
                ))
            })?,
            None => resources
                .iter()
                .position(|d| d.key == DEFAULT_RESOURCE_KEY)
                .unwrap_or(0),
        };

        Ok(Self {
            resources,
            default_index,
        })
    }

    /// The built-in catalog, constructed once per process.
    #[must_use]
    pub fn builtin() -> &'static ResourceCatalog {
        &BUILTIN
    }

    /// Parse a catalog from YAML (JSON is valid YAML too).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] on parse or validation failures.
    pub fn from_yaml_str(src: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(src)
            .map_err(|e| BridgeError::Configuration(format!("Invalid resource catalog: {e}")))?;
        Self::with_default(file.resources, file.default.as_deref())
    }

    /// Load a catalog file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the file cannot be read, parsed or validated.
    pub fn from_path(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!(
                "Failed to read resource catalog '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&src)
    }

    /// Look up a descriptor by its exact key.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|d| d.key == key)
    }

    /// All descriptors in declaration order.
    #[must_use]
    pub fn all(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    #[must_use]
    pub fn default_resource(&self) -> &ResourceDescriptor {
        &self.resources[self.default_index]
    }
}

/// The resources the bridge ships with, in declaration (tie-break) order.
#[must_use]
pub fn builtin_resources() -> Vec<ResourceDescriptor> {
    use FieldKind as K;

    vec![
        ResourceDescriptor::new(
            "contacts",
            "contacts",
            "contacts",
            &["contact", "contacts", "lead", "leads", "person", "people"],
        )
        .with_field(FieldSpec::id("Contact ID"))
        .with_field(
            FieldSpec::new("email", K::String)
                .from_pointer("/fields/all/email")
                .describe("Contact email address"),
        )
        .with_field(
            FieldSpec::new("firstname", K::String)
                .from_pointer("/fields/all/firstname")
                .describe("First name"),
        )
        .with_field(
            FieldSpec::new("lastname", K::String)
                .from_pointer("/fields/all/lastname")
                .describe("Last name"),
        ),
        ResourceDescriptor::new(
            "campaigns",
            "campaigns",
            "campaigns",
            &["campaign", "campaigns", "automation", "automations"],
        )
        .with_field(FieldSpec::id("Campaign ID"))
        .with_field(FieldSpec::new("name", K::String).describe("Campaign name"))
        .with_field(FieldSpec::new("description", K::String).describe("Campaign description"))
        .with_field(
            FieldSpec::new("isPublished", K::Boolean).describe("Whether the campaign is published"),
        ),
        ResourceDescriptor::new(
            "segments",
            "segments",
            "lists",
            &["segment", "segments", "list", "lists"],
        )
        .with_field(FieldSpec::id("Segment ID"))
        .with_field(FieldSpec::new("name", K::String).describe("Segment name"))
        .with_field(FieldSpec::new("description", K::String).describe("Segment description")),
        ResourceDescriptor::new(
            "assets",
            "assets",
            "assets",
            &["asset", "assets", "download", "downloads"],
        )
        .with_field(FieldSpec::id("Asset ID"))
        .with_field(FieldSpec::new("title", K::String).describe("Asset title"))
        .with_field(FieldSpec::new("description", K::String).describe("Asset description"))
        .with_field(FieldSpec::new("downloadCount", K::Number).describe("Asset download count")),
        ResourceDescriptor::new("reports", "reports", "reports", &["report", "reports"])
            .with_field(FieldSpec::id("Report ID"))
            .with_field(FieldSpec::new("name", K::String).describe("Report name"))
            .with_field(FieldSpec::new("description", K::String).describe("Report description"))
            .with_field(FieldSpec::new("data", K::Object).describe("Report data")),
        ResourceDescriptor::new("forms", "forms", "forms", &["form", "forms"])
            .with_field(FieldSpec::id("Form ID"))
            .with_field(FieldSpec::new("name", K::String).describe("Form name"))
            .with_field(FieldSpec::new("description", K::String).describe("Form description")),
        ResourceDescriptor::new(
            "pages",
            "pages",
            "pages",
            &["page", "pages", "landing page", "landing pages"],
        )
        .with_field(FieldSpec::id("Page ID"))
        .with_field(FieldSpec::new("title", K::String).describe("Page title"))
        .with_field(FieldSpec::new("content", K::String).describe("Page content")),
        ResourceDescriptor::new("emails", "emails", "emails", &["email", "emails"])
            .with_field(FieldSpec::id("Email ID"))
            .with_field(FieldSpec::new("subject", K::String).describe("Email subject"))
            .with_field(FieldSpec::new("content", K::String).describe("Email content")),
    ]
}
