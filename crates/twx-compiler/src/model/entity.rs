//! Entity descriptors and their member definitions.
//!
//! The member types double as the JSON shape read by the reverse
//! transformer, so they derive serde with the runtime's camelCase names.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::configuration::{ConfigurationTable, ConfigurationTableDefinition};
use super::permission::{PermissionSet, PrincipalType, VisibilitySet};
use super::ui::MashupModel;

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

/// A literal value as written in source or stored in an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl LiteralValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text form used in XML attributes and rows.
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
        }
    }

    /// Base type inferred from the native type of the value.
    pub fn base_type(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BOOLEAN",
            Self::Number(_) => "NUMBER",
            Self::String(_) => "STRING",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Formats a number without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Thing,
    ThingTemplate,
    ThingShape,
    DataShape,
    UserList,
    Organization,
    Mashup,
}

impl EntityKind {
    /// Collection element name, e.g. `Things`.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Thing => "Things",
            Self::ThingTemplate => "ThingTemplates",
            Self::ThingShape => "ThingShapes",
            Self::DataShape => "DataShapes",
            Self::UserList => "Users",
            Self::Organization => "Organizations",
            Self::Mashup => "Mashups",
        }
    }

    /// Entity element name, e.g. `Thing`.
    pub fn element(&self) -> &'static str {
        match self {
            Self::Thing => "Thing",
            Self::ThingTemplate => "ThingTemplate",
            Self::ThingShape => "ThingShape",
            Self::DataShape => "DataShape",
            Self::UserList => "User",
            Self::Organization => "Organization",
            Self::Mashup => "Mashup",
        }
    }
}

/// Entity-level settings taken from class decorators and heritage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityAspects {
    pub published: bool,
    pub editable: bool,
    pub value_stream: Option<String>,
    pub identifier: Option<String>,
    /// Template a Thing or ThingTemplate derives from.
    pub thing_template: Option<String>,
    pub implemented_shapes: Vec<String>,
    /// Data shape of a data-storage template instance.
    pub data_shape: Option<String>,
}

/// One compiled entity.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    /// Name of the source class.
    pub name: String,
    /// Name of the entity in the target runtime.
    pub exported_name: String,
    pub description: String,
    pub project: String,
    pub tags: Vec<String>,
    pub file: PathBuf,
    pub aspects: EntityAspects,
    pub body: EntityBody,
}

impl EntityDescriptor {
    pub fn thing(&self) -> Option<&ThingModel> {
        match &self.body {
            EntityBody::Thing(thing) => Some(thing),
            _ => None,
        }
    }

    pub fn thing_mut(&mut self) -> Option<&mut ThingModel> {
        match &mut self.body {
            EntityBody::Thing(thing) => Some(thing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntityBody {
    /// Things, ThingTemplates and ThingShapes.
    Thing(ThingModel),
    DataShape(DataShapeModel),
    UserList(UserListModel),
    Organization(OrganizationModel),
    Mashup(MashupModel),
}

/// Members of a Thing, ThingTemplate or ThingShape.
#[derive(Debug, Clone, Default)]
pub struct ThingModel {
    pub properties: Vec<PropertyDefinition>,
    pub services: Vec<ServiceDefinition>,
    pub events: Vec<EventDefinition>,
    pub subscriptions: Vec<SubscriptionDefinition>,
    pub permissions: PermissionSet,
    pub visibility: VisibilitySet,
    pub configuration_table_definitions: Vec<ConfigurationTableDefinition>,
    pub configuration_tables: Vec<ConfigurationTable>,
    pub deployment_endpoints: Vec<String>,
}

impl ThingModel {
    pub fn service_mut(&mut self, name: &str) -> Option<&mut ServiceDefinition> {
        self.services.iter_mut().find(|s| s.name == name)
    }

    pub fn subscription_mut(&mut self, name: &str) -> Option<&mut SubscriptionDefinition> {
        self.subscriptions.iter_mut().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyAspects {
    #[serde(skip_serializing_if = "is_false")]
    pub is_persistent: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_logged: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_read_only: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_remote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_change_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_change_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<LiteralValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thing_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thing_shape: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    pub base_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ordinal: u32,
    #[serde(default)]
    pub aspects: PropertyAspects,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_binding: Option<RemotePropertyBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_binding: Option<LocalPropertyBinding>,
}

/// Remote binding of a property. Options left `None` were not specified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePropertyBinding {
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fold_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPropertyBinding {
    pub source_thing_name: String,
    pub source_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldAspects {
    #[serde(skip_serializing_if = "is_false")]
    pub is_required: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<LiteralValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thing_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thing_shape: Option<String>,
}

/// A service parameter, service result, or data shape field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    pub base_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ordinal: u32,
    #[serde(default)]
    pub aspects: FieldAspects,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, base_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: base_type.into(),
            description: String::new(),
            ordinal: 0,
            aspects: FieldAspects::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceAspects {
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServiceBinding {
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_queue: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameter_definitions: Vec<FieldDefinition>,
    pub result_type: FieldDefinition,
    #[serde(default)]
    pub aspects: ServiceAspects,
    #[serde(default = "default_true")]
    pub is_allow_override: bool,
    #[serde(default)]
    pub is_overriden: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_binding: Option<RemoteServiceBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventBinding {
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub data_shape: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_binding: Option<RemoteEventBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub event_name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub source_property: String,
    #[serde(default)]
    pub code: String,
}

/// Fields of a data shape.
#[derive(Debug, Clone, Default)]
pub struct DataShapeModel {
    pub fields: Vec<FieldDefinition>,
}

/// A reference to a user or group.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub principal_type: PrincipalType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserDefinition {
    pub name: String,
    pub description: String,
    pub extensions: IndexMap<String, LiteralValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDefinition {
    pub name: String,
    pub description: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default)]
pub struct UserListModel {
    pub users: Vec<UserDefinition>,
    pub groups: Vec<GroupDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationalUnit {
    pub name: String,
    pub description: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationConnection {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct OrganizationModel {
    pub top_unit: String,
    pub units: Vec<OrganizationalUnit>,
    pub connections: Vec<OrganizationConnection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_definition_from_json() {
        let json = r#"{
            "name": "mileage",
            "baseType": "NUMBER",
            "aspects": { "isRemote": true },
            "remoteBinding": { "sourceName": "EdgeProp1", "foldType": "NONE", "pushType": "ALWAYS", "pushThreshold": 0, "timeout": 0 }
        }"#;
        let property: PropertyDefinition = serde_json::from_str(json).unwrap();
        assert!(property.aspects.is_remote);
        let binding = property.remote_binding.unwrap();
        assert_eq!(binding.source_name, "EdgeProp1");
        assert_eq!(binding.push_type.as_deref(), Some("ALWAYS"));
        assert_eq!(binding.start_type, None);
    }

    #[test]
    fn test_literal_value_text() {
        assert_eq!(LiteralValue::Number(3.0).to_text(), "3");
        assert_eq!(LiteralValue::Number(2.5).to_text(), "2.5");
        assert_eq!(LiteralValue::Bool(true).to_text(), "true");
    }

    #[test]
    fn test_service_defaults_allow_override() {
        let json = r#"{ "name": "run", "resultType": { "name": "result", "baseType": "NOTHING" } }"#;
        let service: ServiceDefinition = serde_json::from_str(json).unwrap();
        assert!(service.is_allow_override);
        assert!(!service.is_overriden);
    }
}
