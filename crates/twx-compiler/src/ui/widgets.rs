//! Known widget types, their default properties and bindable property types.

use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Str(&'static str),
    Num(f64),
    Bool(bool),
}

impl DefaultValue {
    fn to_json(self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.to_string()),
            Self::Num(n) => serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            Self::Bool(b) => Value::Bool(b),
        }
    }
}

#[derive(Debug)]
pub struct WidgetType {
    pub name: &'static str,
    pub display_name: &'static str,
    pub defaults: &'static [(&'static str, DefaultValue)],
    /// Bindable properties and their base types.
    pub properties: &'static [(&'static str, &'static str)],
}

impl WidgetType {
    pub fn property_type(&self, property: &str) -> Option<&'static str> {
        self.properties
            .iter()
            .find(|(name, _)| *name == property)
            .map(|(_, base_type)| *base_type)
    }

    /// Initial properties of a new widget with id `id`.
    pub fn properties_for(&self, id: &str) -> IndexMap<String, Value> {
        let mut properties = IndexMap::new();
        properties.insert("Id".to_string(), Value::String(id.to_string()));
        properties.insert("Type".to_string(), Value::String(self.name.to_string()));
        properties.insert(
            "__TypeDisplayName".to_string(),
            Value::String(self.display_name.to_string()),
        );
        properties.insert("DisplayName".to_string(), Value::String(id.to_string()));
        for (name, value) in self.defaults {
            properties.insert(name.to_string(), value.to_json());
        }
        properties
    }
}

use DefaultValue::{Bool, Num, Str};

const LAYOUT: &[(&str, DefaultValue)] = &[("Visible", Bool(true)), ("Width", Num(200.0)), ("Height", Num(40.0))];

pub const MASHUP: &str = "mashup";
pub const CLASS_HOST: &str = "BMTypescriptClassHost";

pub const WIDGETS: &[WidgetType] = &[
    WidgetType {
        name: MASHUP,
        display_name: "Mashup",
        defaults: &[
            ("Title", Str("")),
            ("Style", Str("DefaultMashupStyle")),
            ("ResponsiveLayout", Bool(true)),
            ("EnableParameterEditor", Bool(true)),
        ],
        properties: &[],
    },
    WidgetType {
        name: "flexcontainer",
        display_name: "Container",
        defaults: &[
            ("Visible", Bool(true)),
            ("flex-direction", Str("column")),
            ("flex-grow", Num(1.0)),
        ],
        properties: &[("Visible", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcsbutton",
        display_name: "Button",
        defaults: LAYOUT,
        properties: &[("Label", "STRING"), ("Disabled", "BOOLEAN"), ("Visible", "BOOLEAN"), ("TooltipField", "STRING")],
    },
    WidgetType {
        name: "ptcslabel",
        display_name: "Label",
        defaults: LAYOUT,
        properties: &[("LabelText", "STRING"), ("Visible", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcstextfield",
        display_name: "Text Field",
        defaults: LAYOUT,
        properties: &[("Text", "STRING"), ("Label", "STRING"), ("Disabled", "BOOLEAN"), ("Visible", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcstextarea",
        display_name: "Text Area",
        defaults: LAYOUT,
        properties: &[("Text", "STRING"), ("Label", "STRING"), ("Disabled", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcscheckbox",
        display_name: "Checkbox",
        defaults: LAYOUT,
        properties: &[("State", "BOOLEAN"), ("Label", "STRING"), ("Disabled", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcstoggle",
        display_name: "Toggle Button",
        defaults: LAYOUT,
        properties: &[("State", "BOOLEAN"), ("Label", "STRING"), ("Disabled", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcsdropdown",
        display_name: "Dropdown",
        defaults: LAYOUT,
        properties: &[
            ("Data", "INFOTABLE"),
            ("SelectedText", "STRING"),
            ("Label", "STRING"),
            ("Disabled", "BOOLEAN"),
        ],
    },
    WidgetType {
        name: "ptcslist",
        display_name: "List",
        defaults: LAYOUT,
        properties: &[("Data", "INFOTABLE"), ("SelectedText", "STRING"), ("Label", "STRING")],
    },
    WidgetType {
        name: "ptcsgrid",
        display_name: "Grid",
        defaults: &[("Visible", Bool(true)), ("Width", Num(600.0)), ("Height", Num(400.0))],
        properties: &[("Data", "INFOTABLE"), ("Visible", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcsvaluedisplay",
        display_name: "Value Display",
        defaults: LAYOUT,
        properties: &[("Data", "INFOTABLE"), ("Label", "STRING")],
    },
    WidgetType {
        name: "ptcschartline",
        display_name: "Line Chart",
        defaults: &[("Visible", Bool(true)), ("Width", Num(600.0)), ("Height", Num(400.0))],
        properties: &[("Data", "INFOTABLE"), ("ChartTitle", "STRING")],
    },
    WidgetType {
        name: "ptcsdatepicker",
        display_name: "Date Time Picker",
        defaults: LAYOUT,
        properties: &[("DateTime", "DATETIME"), ("Label", "STRING"), ("Disabled", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcsimage",
        display_name: "Image",
        defaults: LAYOUT,
        properties: &[("SourceURL", "IMAGELINK"), ("Visible", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcslink",
        display_name: "Link",
        defaults: LAYOUT,
        properties: &[("Label", "STRING"), ("LinkURL", "HYPERLINK"), ("Visible", "BOOLEAN")],
    },
    WidgetType {
        name: "ptcstabs",
        display_name: "Tabs",
        defaults: &[("Visible", Bool(true)), ("NumberOfTabs", Num(2.0))],
        properties: &[("SelectedTab", "INTEGER")],
    },
    WidgetType {
        name: "contained-mashup",
        display_name: "Contained Mashup",
        defaults: &[("Visible", Bool(true)), ("Name", Str(""))],
        properties: &[("Visible", "BOOLEAN")],
    },
    WidgetType {
        name: CLASS_HOST,
        display_name: "TypeScript Class Host",
        defaults: &[("Visible", Bool(false))],
        properties: &[],
    },
];

/// Resolves a JSX tag name or widget class identifier to a widget type.
///
/// Names match exactly first, then with the first letter lowercased, so
/// `Ptcsbutton` finds `ptcsbutton`.
pub fn widget_type(tag: &str) -> Option<&'static WidgetType> {
    if let Some(widget) = WIDGETS.iter().find(|w| w.name == tag) {
        return Some(widget);
    }
    let mut chars = tag.chars();
    let first = chars.next()?;
    let lowered: String = first.to_lowercase().chain(chars).collect();
    WIDGETS.iter().find(|w| w.name == lowered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_letter_fallback() {
        assert_eq!(widget_type("ptcsbutton").map(|w| w.name), Some("ptcsbutton"));
        assert_eq!(widget_type("Ptcsbutton").map(|w| w.name), Some("ptcsbutton"));
        assert_eq!(widget_type("Mashup").map(|w| w.name), Some("mashup"));
        assert!(widget_type("PTCSBUTTON").is_none());
        assert!(widget_type("").is_none());
    }

    #[test]
    fn test_initial_properties() {
        let button = widget_type("ptcsbutton").unwrap();
        let properties = button.properties_for("ok");
        let keys: Vec<_> = properties.keys().map(|k| k.as_str()).collect();
        assert_eq!(&keys[..4], &["Id", "Type", "__TypeDisplayName", "DisplayName"]);
        assert_eq!(properties["Width"], serde_json::json!(200.0));
        assert_eq!(button.property_type("Label"), Some("STRING"));
    }
}
