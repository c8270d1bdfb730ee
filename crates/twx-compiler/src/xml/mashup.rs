//! Mashup entities: parameters plus the `mashupContent` JSON payload.

use super::entity::{field_definition, header, owner};
use super::writer::XmlElement;
use crate::model::{EntityDescriptor, MashupModel};

pub fn mashup_element(descriptor: &EntityDescriptor, mashup: &MashupModel) -> XmlElement {
    let content = serde_json::to_string(&mashup.content).unwrap_or_default();
    header("Mashup", &descriptor.exported_name, descriptor)
        .attr("aspect.isFlex", false)
        .attr("aspect.isResponsive", true)
        .attr("aspect.mashupType", &mashup.content.mashup_type)
        .attr("columns", 0)
        .attr("rows", 0)
        .child(owner())
        .child(XmlElement::new("ParameterDefinitions").children(mashup.parameters.iter().map(field_definition)))
        .child(XmlElement::new("mashupContent").text(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityAspects, EntityBody, EntityKind, FieldDefinition, MashupContent, UIWidget};
    use crate::xml::entity::entity_document;
    use indexmap::IndexMap;
    use std::path::PathBuf;

    #[test]
    fn test_mashup_content_is_escaped_json() {
        let mashup = MashupModel {
            content: MashupContent {
                data: IndexMap::new(),
                data_bindings: Vec::new(),
                events: Vec::new(),
                ui: UIWidget::default(),
                mashup_type: "mashup".to_string(),
                custom_mashup_css: Some(".a > .b {}".to_string()),
            },
            parameters: vec![FieldDefinition::new("plant", "STRING")],
        };
        let descriptor = EntityDescriptor {
            kind: EntityKind::Mashup,
            name: "Overview".to_string(),
            exported_name: "Overview".to_string(),
            description: String::new(),
            project: String::new(),
            tags: Vec::new(),
            file: PathBuf::from("Overview.tsx"),
            aspects: EntityAspects::default(),
            body: EntityBody::Mashup(mashup),
        };
        let document = entity_document(&descriptor);
        assert!(document.contains("<Mashups>"));
        assert!(document.contains("aspect.mashupType=\"mashup\""));
        assert!(document.contains("<FieldDefinition baseType=\"STRING\" description=\"\" name=\"plant\" ordinal=\"0\"/>"));
        assert!(document.contains("\"CustomMashupCss\":\".a &gt; .b {}\""));
    }
}
