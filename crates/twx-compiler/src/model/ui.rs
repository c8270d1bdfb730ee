//! Mashup content model: widget tree, data sources and bindings.
//!
//! Field names follow the runtime's mashup JSON, which is PascalCase.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::entity::FieldDefinition;

/// A widget and its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UIWidget {
    pub properties: IndexMap<String, Value>,
    pub widgets: Vec<UIWidget>,
}

impl UIWidget {
    pub fn id(&self) -> Option<&str> {
        self.properties.get("Id").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MashupDataService {
    #[serde(rename = "APIMethod")]
    pub api_method: String,
    pub characteristic: String,
    pub id: String,
    pub name: String,
    pub parameters: IndexMap<String, Value>,
    pub refresh_interval: u32,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MashupDataSource {
    pub data_name: String,
    pub entity_name: String,
    pub entity_type: String,
    pub id: String,
    pub refresh_interval: u32,
    pub services: Vec<MashupDataService>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyMap {
    pub source_property: String,
    pub source_property_base_type: String,
    pub source_property_type: String,
    pub target_property: String,
    pub target_property_base_type: String,
    pub target_property_type: String,
}

/// A data or property binding edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UIMashupBinding {
    pub id: String,
    pub property_maps: Vec<PropertyMap>,
    pub source_area: String,
    pub source_details: String,
    pub source_id: String,
    pub source_section: String,
    pub target_area: String,
    pub target_id: String,
    pub target_section: String,
}

/// An event edge: a trigger on one side invokes a handler on the other.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UIMashupEventBinding {
    pub event_handler_area: String,
    pub event_handler_id: String,
    pub event_handler_service: String,
    pub event_trigger_area: String,
    pub event_trigger_event: String,
    pub event_trigger_id: String,
    pub event_trigger_section: String,
    pub id: String,
}

/// The JSON payload stored in a mashup's `mashupContent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MashupContent {
    #[serde(rename = "Data")]
    pub data: IndexMap<String, MashupDataSource>,
    #[serde(rename = "DataBindings")]
    pub data_bindings: Vec<UIMashupBinding>,
    #[serde(rename = "Events")]
    pub events: Vec<UIMashupEventBinding>,
    #[serde(rename = "UI")]
    pub ui: UIWidget,
    #[serde(rename = "mashupType")]
    pub mashup_type: String,
    #[serde(rename = "CustomMashupCss", skip_serializing_if = "Option::is_none")]
    pub custom_mashup_css: Option<String>,
}

/// A compiled mashup.
#[derive(Debug, Clone)]
pub struct MashupModel {
    pub content: MashupContent,
    pub parameters: Vec<FieldDefinition>,
}

/// What a `define*` constant refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum UIReferenceKind {
    /// A service of an entity, or of a template when `dynamic`.
    Service {
        collection: String,
        entity: String,
        service: String,
        dynamic: bool,
    },
    Widget { widget_type: String },
    /// The Core UI controller class host.
    Script { class_name: String },
    /// Parameters of the mashup being built.
    Mashup { parameters: Vec<FieldDefinition> },
}

/// A named reference declared through a `define*` factory.
#[derive(Debug, Clone, PartialEq)]
pub struct UIReference {
    pub kind: UIReferenceKind,
    /// Join key into bindings: widget id, service data name, or host id.
    pub id: String,
}

impl UIReference {
    /// Key of the data source a service reference belongs to.
    pub fn data_name(&self) -> Option<String> {
        match &self.kind {
            UIReferenceKind::Service {
                collection,
                entity,
                dynamic,
                ..
            } => Some(if *dynamic {
                format!("Dynamic{}_{}", collection, entity)
            } else {
                format!("{}_{}", collection, entity)
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_name() {
        let reference = UIReference {
            kind: UIReferenceKind::Service {
                collection: "Things".to_string(),
                entity: "Plant".to_string(),
                service: "GetData".to_string(),
                dynamic: false,
            },
            id: "getData".to_string(),
        };
        assert_eq!(reference.data_name().as_deref(), Some("Things_Plant"));
    }

    #[test]
    fn test_widget_serializes_pascal_case() {
        let mut widget = UIWidget::default();
        widget.properties.insert("Id".to_string(), Value::String("root".to_string()));
        let json = serde_json::to_string(&widget).unwrap();
        assert_eq!(json, r#"{"Properties":{"Id":"root"},"Widgets":[]}"#);
    }
}
