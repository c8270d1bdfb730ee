//! The normalized JSON description of an entity read by the decompiler.
//!
//! Member lists are accepted either as arrays or as objects keyed by member
//! name, which is how the runtime exports them.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::diagnostic::CompilerError;
use crate::model::{
    EntityKind, EventDefinition, FieldDefinition, PropertyDefinition, ServiceDefinition, SubscriptionDefinition,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityJson {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: EntityKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thing_template: Option<String>,
    #[serde(default, deserialize_with = "list_or_map")]
    pub implemented_shapes: Vec<String>,
    #[serde(default)]
    pub data_shape: Option<String>,
    #[serde(default, deserialize_with = "list_or_map")]
    pub property_definitions: Vec<PropertyDefinition>,
    #[serde(default, deserialize_with = "list_or_map")]
    pub service_definitions: Vec<ServiceDefinition>,
    #[serde(default, deserialize_with = "list_or_map")]
    pub event_definitions: Vec<EventDefinition>,
    #[serde(default, deserialize_with = "list_or_map")]
    pub subscriptions: Vec<SubscriptionDefinition>,
    #[serde(default, deserialize_with = "list_or_map")]
    pub field_definitions: Vec<FieldDefinition>,
}

fn default_kind() -> EntityKind {
    EntityKind::Thing
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrMap<T> {
    List(Vec<T>),
    Map(IndexMap<String, T>),
}

fn list_or_map<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match ListOrMap::deserialize(deserializer)? {
        ListOrMap::List(items) => items,
        ListOrMap::Map(items) => items.into_values().collect(),
    })
}

/// Deserializes `json` into `T`, mapping failures to [`CompilerError::InvalidEntityJson`].
pub fn from_json<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, CompilerError> {
    serde_json::from_str(json).map_err(|e| CompilerError::InvalidEntityJson { message: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_as_map() {
        let entity: EntityJson = from_json(
            r#"{
                "name": "Pump",
                "thingTemplate": "GenericThing",
                "propertyDefinitions": {
                    "speed": { "name": "speed", "baseType": "NUMBER" },
                    "label": { "name": "label", "baseType": "STRING" }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(entity.kind, EntityKind::Thing);
        assert_eq!(entity.property_definitions.len(), 2);
        assert_eq!(entity.property_definitions[1].name, "label");
    }

    #[test]
    fn test_invalid_json() {
        let err = from_json::<EntityJson>("{ \"kind\": \"Thing\" }").unwrap_err();
        assert!(matches!(err, CompilerError::InvalidEntityJson { .. }));
    }
}
