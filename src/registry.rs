//! Resource registry
//!
//! Declares which resources can be synced and how: endpoint, field projection,
//! primary key, cursor field and write mode. The built-in definitions are
//! embedded in the binary; configuration may add more or override them.

use crate::error::{Error, Result};
use crate::types::{parse_timestamp, JsonValue, WriteMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in resource definitions embedded in the binary
const BUILTIN_RESOURCES: &[(&str, &str)] = &[
    ("customers", include_str!("../resources/customers.yaml")),
    ("orders", include_str!("../resources/orders.yaml")),
];

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string(), "updated_at".to_string()]
}

fn default_cursor_field() -> String {
    "updated_at".to_string()
}

/// How one resource is extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Resource name, also the watermark key suffix
    pub name: String,

    /// Endpoint path segment; defaults to the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Fields to request; empty means all
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default = "default_primary_key")]
    pub primary_key: Vec<String>,

    /// Timestamp field the window filters on
    #[serde(default = "default_cursor_field")]
    pub cursor_field: String,

    #[serde(default)]
    pub write_mode: WriteMode,
}

impl ResourceDefinition {
    /// Create a definition with default key, cursor and write mode
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            fields: Vec::new(),
            primary_key: default_primary_key(),
            cursor_field: default_cursor_field(),
            write_mode: WriteMode::default(),
        }
    }

    /// Set the requested fields
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Endpoint path segment
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.name)
    }

    /// Comma-joined field list, or `None` to request everything
    pub fn field_projection(&self) -> Option<String> {
        let fields: Vec<&str> = self
            .fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();

        (!fields.is_empty()).then(|| fields.join(","))
    }

    /// Identifier of a record: its primary key values joined with `|`
    pub fn record_id(&self, record: &JsonValue) -> String {
        self.primary_key
            .iter()
            .map(|key| match record.get(key) {
                Some(JsonValue::String(s)) => s.clone(),
                Some(JsonValue::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Cursor value of a record, if present and parseable
    pub fn cursor_value(&self, record: &JsonValue) -> Option<DateTime<Utc>> {
        record
            .get(&self.cursor_field)
            .and_then(JsonValue::as_str)
            .and_then(|raw| parse_timestamp(raw).ok())
    }

    /// Check that the definition is usable
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_value("resources.name", "must not be empty"));
        }
        if self.endpoint().trim().is_empty() {
            return Err(Error::invalid_value(
                format!("resources.{}.endpoint", self.name),
                "must not be empty",
            ));
        }
        if self.primary_key.is_empty() {
            return Err(Error::invalid_value(
                format!("resources.{}.primary_key", self.name),
                "at least one column is required",
            ));
        }
        if self.cursor_field.trim().is_empty() {
            return Err(Error::invalid_value(
                format!("resources.{}.cursor_field", self.name),
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Name → definition lookup
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, ResourceDefinition>,
}

impl ResourceRegistry {
    /// Registry without any resources
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `customers` and `orders` resources
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::empty();
        for (name, yaml) in BUILTIN_RESOURCES {
            let definition: ResourceDefinition = serde_yaml::from_str(yaml)
                .map_err(|e| Error::config(format!("Built-in resource '{name}' is invalid: {e}")))?;
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Add a resource, replacing any definition with the same name
    pub fn register(&mut self, definition: ResourceDefinition) -> Result<()> {
        definition.validate()?;
        self.resources.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Look up a resource
    pub fn get(&self, name: &str) -> Result<&ResourceDefinition> {
        self.resources
            .get(name)
            .ok_or_else(|| Error::ResourceNotFound {
                name: name.to_string(),
            })
    }

    /// Whether a resource is registered
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    /// All definitions, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_builtin_resources() {
        let registry = ResourceRegistry::builtin().unwrap();
        assert_eq!(registry.names(), vec!["customers", "orders"]);

        for definition in registry.iter() {
            assert_eq!(definition.primary_key, vec!["id", "updated_at"]);
            assert_eq!(definition.cursor_field, "updated_at");
            assert_eq!(definition.write_mode, WriteMode::Upsert);
            assert_eq!(definition.endpoint(), definition.name);
        }
    }

    #[test]
    fn test_builtin_projections() {
        let registry = ResourceRegistry::builtin().unwrap();

        let customers = registry.get("customers").unwrap().field_projection().unwrap();
        assert!(customers.starts_with("id,created_at,updated_at,"));
        assert!(customers.ends_with(",orders_count"));
        assert!(!customers.contains(",,"));

        let orders = registry.get("orders").unwrap();
        assert_eq!(orders.fields.len(), 67);
        assert!(orders.fields.contains(&"line_items".to_string()));
        assert!(orders.fields.contains(&"updated_at".to_string()));
    }

    #[test]
    fn test_unknown_resource() {
        let registry = ResourceRegistry::builtin().unwrap();
        let err = registry.get("products").unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { ref name } if name == "products"));
    }

    #[test]
    fn test_register_overrides() {
        let mut registry = ResourceRegistry::builtin().unwrap();
        registry
            .register(ResourceDefinition::new("orders").with_fields(["id", "updated_at"]))
            .unwrap();
        registry
            .register(ResourceDefinition::new("products").with_endpoint("products"))
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.get("orders").unwrap().field_projection().as_deref(),
            Some("id,updated_at")
        );
        assert!(registry.contains("products"));
    }

    #[test]
    fn test_register_rejects_empty_primary_key() {
        let mut definition = ResourceDefinition::new("events");
        definition.primary_key.clear();
        assert!(ResourceRegistry::empty().register(definition).is_err());
    }

    #[test]
    fn test_definition_from_yaml_defaults() {
        let definition: ResourceDefinition = serde_yaml::from_str("name: gift_cards").unwrap();
        assert_eq!(definition.endpoint(), "gift_cards");
        assert_eq!(definition.primary_key, vec!["id", "updated_at"]);
        assert_eq!(definition.field_projection(), None);
        assert_eq!(definition.write_mode, WriteMode::Upsert);
    }

    #[test]
    fn test_record_id() {
        let definition = ResourceDefinition::new("orders");
        let record = json!({"id": 450789469, "updated_at": "2023-06-01T12:00:00-04:00"});
        assert_eq!(definition.record_id(&record), "450789469|2023-06-01T12:00:00-04:00");
        assert_eq!(definition.record_id(&json!({"id": 1})), "1|");
    }

    #[test]
    fn test_cursor_value() {
        let definition = ResourceDefinition::new("orders");
        let value = definition
            .cursor_value(&json!({"updated_at": "2023-06-01T12:00:00-04:00"}))
            .unwrap();
        assert_eq!(value, parse_timestamp("2023-06-01T16:00:00Z").unwrap());
        assert_eq!(definition.cursor_value(&json!({"updated_at": null})), None);
        assert_eq!(definition.cursor_value(&json!({"id": 1})), None);
    }
}
