//! Entity descriptors to the runtime's entity XML.
//!
//! No validation happens here; descriptors are assumed to be complete.

use serde::Serialize;
use serde_json::Value;

use super::writer::XmlElement;
use crate::model::{
    format_number, ConfigurationTable, ConfigurationTableDefinition, DataShapeModel, EntityAspects, EntityBody,
    EntityDescriptor, EntityKind, EventDefinition, FieldDefinition, Member, OrganizationModel,
    PermissionList, PropertyDefinition, ServiceDefinition, SubscriptionDefinition, ThingModel, UserListModel,
    VisibilityPrincipal,
};

/// The `<Entities>` element describing `descriptor`.
pub fn entity_element(descriptor: &EntityDescriptor) -> XmlElement {
    let entities = XmlElement::new("Entities");
    match &descriptor.body {
        EntityBody::Thing(thing) => entities.child(
            XmlElement::new(descriptor.kind.collection()).child(thing_element(descriptor, thing)),
        ),
        EntityBody::DataShape(shape) => {
            entities.child(XmlElement::new("DataShapes").child(data_shape_element(descriptor, shape)))
        }
        EntityBody::UserList(list) => user_list_elements(descriptor, list, entities),
        EntityBody::Organization(organization) => entities.child(
            XmlElement::new("Organizations").child(organization_element(descriptor, organization)),
        ),
        EntityBody::Mashup(mashup) => entities.child(
            XmlElement::new("Mashups").child(super::mashup::mashup_element(descriptor, mashup)),
        ),
    }
}

pub fn entity_document(descriptor: &EntityDescriptor) -> String {
    entity_element(descriptor).to_document()
}

/// Attributes shared by every top-level entity.
pub(crate) fn header(element: &str, name: &str, descriptor: &EntityDescriptor) -> XmlElement {
    XmlElement::new(element)
        .attr("name", name)
        .attr("description", &descriptor.description)
        .attr("documentationContent", "")
        .attr("projectName", &descriptor.project)
        .attr("tags", descriptor.tags.join(";"))
}

pub(crate) fn owner() -> XmlElement {
    XmlElement::new("Owner").attr("name", "Administrator").attr("type", "User")
}

fn thing_element(descriptor: &EntityDescriptor, thing: &ThingModel) -> XmlElement {
    let aspects = &descriptor.aspects;
    let mut element = header(descriptor.kind.element(), &descriptor.exported_name, descriptor);
    element.set_attr("published", aspects.published);
    element.set_attr("editable", aspects.editable);
    match descriptor.kind {
        EntityKind::Thing => {
            element.set_attr("enabled", true);
            element.set_attr("thingTemplate", aspects.thing_template.as_deref().unwrap_or("GenericThing"));
            element.set_attr("valueStream", aspects.value_stream.as_deref().unwrap_or(""));
            element.set_attr("identifier", aspects.identifier.as_deref().unwrap_or(""));
            element.set_attr("aspect.isEditableExtensibleObject", false);
        }
        EntityKind::ThingTemplate => {
            element.set_attr(
                "baseThingTemplate",
                aspects.thing_template.as_deref().unwrap_or("GenericThing"),
            );
            element.set_attr("valueStream", aspects.value_stream.as_deref().unwrap_or(""));
        }
        _ => {}
    }
    if let Some(data_shape) = &aspects.data_shape {
        element.set_attr("dataShape", data_shape);
    }

    let mut element = element
        .child(owner())
        .child(permissions_element("RunTimePermissions", &thing.permissions.runtime))
        .child(visibility_element("VisibilityPermissions", &thing.visibility.runtime))
        .child(XmlElement::new("ConfigurationTableDefinitions").children(
            thing.configuration_table_definitions.iter().map(configuration_table_definition),
        ))
        .child(XmlElement::new("ConfigurationTables").children(thing.configuration_tables.iter().map(configuration_table)))
        .child(shape_element(thing))
        .child(XmlElement::new("PropertyBindings").children(thing.properties.iter().filter_map(property_binding)))
        .child(
            XmlElement::new("RemotePropertyBindings")
                .children(thing.properties.iter().filter_map(remote_property_binding)),
        )
        .child(
            XmlElement::new("RemoteServiceBindings").children(thing.services.iter().filter_map(remote_service_binding)),
        )
        .child(XmlElement::new("RemoteEventBindings").children(thing.events.iter().filter_map(remote_event_binding)));

    if descriptor.kind != EntityKind::ThingShape {
        element.push(implemented_shapes(aspects));
    }
    if descriptor.kind != EntityKind::Thing {
        element.push(permissions_element("InstanceRunTimePermissions", &thing.permissions.instance));
        element.push(visibility_element("InstanceVisibilityPermissions", &thing.visibility.instance));
    }
    element
}

fn shape_element(thing: &ThingModel) -> XmlElement {
    XmlElement::new("ThingShape")
        .child(XmlElement::new("PropertyDefinitions").children(thing.properties.iter().map(property_definition)))
        .child(XmlElement::new("ServiceDefinitions").children(thing.services.iter().map(service_definition)))
        .child(XmlElement::new("EventDefinitions").children(thing.events.iter().map(event_definition)))
        .child(
            XmlElement::new("ServiceImplementations").children(
                thing
                    .services
                    .iter()
                    .filter(|s| s.remote_binding.is_none())
                    .map(|s| script_implementation(&s.name, &s.description, &s.code)),
            ),
        )
        .child(XmlElement::new("Subscriptions").children(thing.subscriptions.iter().map(subscription)))
}

fn implemented_shapes(aspects: &EntityAspects) -> XmlElement {
    XmlElement::new("ImplementedShapes").children(aspects.implemented_shapes.iter().map(|shape| {
        XmlElement::new("ImplementedShape")
            .attr("name", shape)
            .attr("type", "ThingShape")
    }))
}

/// Copies the set fields of a serialized aspect struct as `aspect.<key>`
/// attributes.
fn aspect_attributes<T: Serialize>(element: &mut XmlElement, aspects: &T) {
    if let Ok(Value::Object(map)) = serde_json::to_value(aspects) {
        for (key, value) in map {
            element.set_attr(format!("aspect.{}", key), json_text(&value));
        }
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn property_definition(property: &PropertyDefinition) -> XmlElement {
    let mut element = XmlElement::new("PropertyDefinition");
    aspect_attributes(&mut element, &property.aspects);
    element
        .attr("baseType", &property.base_type)
        .attr("category", "")
        .attr("description", &property.description)
        .attr("isLocalOnly", false)
        .attr("name", &property.name)
        .attr("ordinal", property.ordinal)
}

pub(crate) fn field_definition(field: &FieldDefinition) -> XmlElement {
    let mut element = XmlElement::new("FieldDefinition");
    aspect_attributes(&mut element, &field.aspects);
    element
        .attr("baseType", &field.base_type)
        .attr("description", &field.description)
        .attr("name", &field.name)
        .attr("ordinal", field.ordinal)
}

fn service_definition(service: &ServiceDefinition) -> XmlElement {
    let mut result = field_definition(&service.result_type);
    result.name = "ResultType".to_string();

    XmlElement::new("ServiceDefinition")
        .attr("aspect.isAsync", service.aspects.is_async)
        .attr("category", "")
        .attr("description", &service.description)
        .attr("isAllowOverride", service.is_allow_override)
        .attr("isLocalOnly", false)
        .attr("isOpen", false)
        .attr("isOverriden", service.is_overriden)
        .attr("isPrivate", false)
        .attr("name", &service.name)
        .child(result)
        .child(XmlElement::new("ParameterDefinitions").children(service.parameter_definitions.iter().map(field_definition)))
}

fn event_definition(event: &EventDefinition) -> XmlElement {
    XmlElement::new("EventDefinition")
        .attr("category", "")
        .attr("dataShape", &event.data_shape)
        .attr("description", &event.description)
        .attr("isInvokable", true)
        .attr("isPropertyEvent", false)
        .attr("isLocalOnly", false)
        .attr("name", &event.name)
}

/// A `Script` handler carrying `code` in its single configuration row.
fn script_implementation(name: &str, description: &str, code: &str) -> XmlElement {
    let schema = XmlElement::new("DataShape").child(
        XmlElement::new("FieldDefinitions").child(
            XmlElement::new("FieldDefinition")
                .attr("baseType", "STRING")
                .attr("description", "code")
                .attr("name", "code")
                .attr("ordinal", 0),
        ),
    );
    let rows = XmlElement::new("Rows").child(XmlElement::new("Row").child(XmlElement::new("code").cdata(code)));

    XmlElement::new("ServiceImplementation")
        .attr("description", description)
        .attr("handlerName", "Script")
        .attr("name", name)
        .child(
            XmlElement::new("ConfigurationTables").child(
                XmlElement::new("ConfigurationTable")
                    .attr("description", "Script")
                    .attr("isMultiRow", false)
                    .attr("name", "Script")
                    .attr("ordinal", 0)
                    .child(schema)
                    .child(rows),
            ),
        )
}

fn subscription(subscription: &SubscriptionDefinition) -> XmlElement {
    XmlElement::new("Subscription")
        .attr("description", &subscription.description)
        .attr("enabled", subscription.enabled)
        .attr("eventName", &subscription.event_name)
        .attr("name", &subscription.name)
        .attr("source", &subscription.source)
        .attr("sourceProperty", &subscription.source_property)
        .attr("sourceType", &subscription.source_type)
        .child(script_implementation(
            &subscription.name,
            &subscription.description,
            &subscription.code,
        ))
}

fn property_binding(property: &PropertyDefinition) -> Option<XmlElement> {
    let binding = property.local_binding.as_ref()?;
    Some(
        XmlElement::new("PropertyBinding")
            .attr("name", &property.name)
            .attr("sourceName", &binding.source_name)
            .attr("sourceThingName", &binding.source_thing_name),
    )
}

fn remote_property_binding(property: &PropertyDefinition) -> Option<XmlElement> {
    let binding = property.remote_binding.as_ref()?;
    let number = |value: Option<f64>| format_number(value.unwrap_or(0.0));
    Some(
        XmlElement::new("RemotePropertyBinding")
            .attr("cacheTime", number(binding.cache_time))
            .attr("foldType", binding.fold_type.as_deref().unwrap_or("NONE"))
            .attr("name", &property.name)
            .attr("pushThreshold", number(binding.push_threshold))
            .attr("pushType", binding.push_type.as_deref().unwrap_or("VALUE"))
            .attr("sourceName", &binding.source_name)
            .attr("startType", binding.start_type.as_deref().unwrap_or("useDefaultValue"))
            .attr("timeout", number(binding.timeout)),
    )
}

fn remote_service_binding(service: &ServiceDefinition) -> Option<XmlElement> {
    let binding = service.remote_binding.as_ref()?;
    Some(
        XmlElement::new("RemoteServiceBinding")
            .attr("enableQueue", binding.enable_queue.unwrap_or(false))
            .attr("name", &service.name)
            .attr("sourceName", &binding.source_name)
            .attr("timeout", format_number(binding.timeout.unwrap_or(0.0))),
    )
}

fn remote_event_binding(event: &EventDefinition) -> Option<XmlElement> {
    let binding = event.remote_binding.as_ref()?;
    Some(
        XmlElement::new("RemoteEventBinding")
            .attr("name", &event.name)
            .attr("sourceName", &binding.source_name),
    )
}

fn permissions_element(name: &str, permissions: &PermissionList) -> XmlElement {
    XmlElement::new(name).children(permissions.iter().map(|(resource, kinds)| {
        XmlElement::new("Permissions")
            .attr("resourceName", resource)
            .children(kinds.iter().map(|(kind, principals)| {
                XmlElement::new(kind.name()).children(principals.iter().map(|principal| {
                    XmlElement::new("Principal")
                        .attr("isPermitted", principal.is_permitted)
                        .attr("name", &principal.name)
                        .attr("type", principal.principal_type.name())
                }))
            }))
    }))
}

fn visibility_element(name: &str, principals: &[VisibilityPrincipal]) -> XmlElement {
    let element = XmlElement::new(name);
    if principals.is_empty() {
        return element;
    }
    element.child(XmlElement::new("Visibility").children(principals.iter().map(|principal| {
        XmlElement::new("Principal")
            .attr("name", &principal.name)
            .attr("type", principal.kind.name())
    })))
}

fn configuration_table_definition(definition: &ConfigurationTableDefinition) -> XmlElement {
    XmlElement::new("ConfigurationTableDefinition")
        .attr("category", &definition.category)
        .attr("dataShapeName", &definition.data_shape_name)
        .attr("description", &definition.description)
        .attr("isHidden", definition.is_hidden)
        .attr("isMultiRow", definition.is_multi_row)
        .attr("name", &definition.name)
        .attr("ordinal", definition.ordinal)
}

fn configuration_table(table: &ConfigurationTable) -> XmlElement {
    let fields = table.fields.iter().enumerate().map(|(ordinal, field)| {
        XmlElement::new("FieldDefinition")
            .attr("baseType", &field.base_type)
            .attr("description", "")
            .attr("name", &field.name)
            .attr("ordinal", ordinal)
    });
    let rows = table.rows.iter().map(|row| {
        XmlElement::new("Row").children(
            table
                .fields
                .iter()
                .filter_map(|field| row.get(&field.name).map(|value| (field, value)))
                .map(|(field, value)| XmlElement::new(field.name.as_str()).cdata(value.to_text())),
        )
    });

    XmlElement::new("ConfigurationTable")
        .attr("dataShapeName", "")
        .attr("description", &table.description)
        .attr("isMultiRow", table.is_multi_row)
        .attr("name", &table.name)
        .attr("ordinal", table.ordinal)
        .child(XmlElement::new("DataShape").child(XmlElement::new("FieldDefinitions").children(fields)))
        .child(XmlElement::new("Rows").children(rows))
}

fn data_shape_element(descriptor: &EntityDescriptor, shape: &DataShapeModel) -> XmlElement {
    header("DataShape", &descriptor.exported_name, descriptor)
        .attr("baseDataShape", "")
        .child(owner())
        .child(XmlElement::new("FieldDefinitions").children(shape.fields.iter().map(field_definition)))
}

fn members_element(members: &[Member]) -> XmlElement {
    XmlElement::new("Members").child(XmlElement::new("Members").children(members.iter().map(|member| {
        XmlElement::new("Member")
            .attr("name", &member.name)
            .attr("type", member.principal_type.name())
    })))
}

fn user_list_elements(descriptor: &EntityDescriptor, list: &UserListModel, entities: XmlElement) -> XmlElement {
    let users = list.users.iter().map(|user| {
        let extensions = XmlElement::new("Row").children(
            user.extensions
                .iter()
                .map(|(name, value)| XmlElement::new(name.as_str()).cdata(value.to_text())),
        );
        header("User", &user.name, descriptor)
            .attr("description", &user.description)
            .attr("enabled", true)
            .child(owner())
            .child(XmlElement::new("UserExtensions").child(XmlElement::new("Rows").child(extensions)))
    });
    let groups = list.groups.iter().map(|group| {
        header("Group", &group.name, descriptor)
            .attr("description", &group.description)
            .child(owner())
            .child(members_element(&group.members))
    });

    let mut entities = entities;
    if !list.users.is_empty() {
        entities.push(XmlElement::new("Users").children(users));
    }
    if !list.groups.is_empty() {
        entities.push(XmlElement::new("Groups").children(groups));
    }
    entities
}

fn organization_element(descriptor: &EntityDescriptor, organization: &OrganizationModel) -> XmlElement {
    header("Organization", &descriptor.exported_name, descriptor)
        .attr("topOCName", &organization.top_unit)
        .child(owner())
        .child(
            XmlElement::new("OrganizationalUnits").children(organization.units.iter().map(|unit| {
                XmlElement::new("OrganizationalUnit")
                    .attr("description", &unit.description)
                    .attr("name", &unit.name)
                    .child(members_element(&unit.members))
            })),
        )
        .child(
            XmlElement::new("Connections").children(organization.connections.iter().map(|connection| {
                XmlElement::new("Connection")
                    .attr("from", &connection.from)
                    .attr("to", &connection.to)
            })),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        LiteralValue, OrganizationalUnit, PermissionKind, Principal, PrincipalType, PropertyAspects,
        RemotePropertyBinding, ServiceAspects, UserDefinition,
    };
    use crate::xml::writer::XmlNode;
    use indexmap::IndexMap;
    use std::path::PathBuf;

    fn descriptor(kind: EntityKind, body: EntityBody) -> EntityDescriptor {
        EntityDescriptor {
            kind,
            name: "Pump".to_string(),
            exported_name: "Main Pump".to_string(),
            description: "Water pump".to_string(),
            project: "Plant".to_string(),
            tags: vec!["Plant:Pumps".to_string()],
            file: PathBuf::from("Pump.ts"),
            aspects: EntityAspects::default(),
            body,
        }
    }

    fn pump() -> ThingModel {
        let mut thing = ThingModel::default();
        thing.properties.push(PropertyDefinition {
            name: "speed".to_string(),
            base_type: "NUMBER".to_string(),
            description: String::new(),
            ordinal: 0,
            aspects: PropertyAspects {
                is_persistent: true,
                minimum_value: Some(0.0),
                ..Default::default()
            },
            remote_binding: Some(RemotePropertyBinding {
                source_name: "EdgeSpeed".to_string(),
                ..Default::default()
            }),
            local_binding: None,
        });
        thing.services.push(ServiceDefinition {
            name: "start".to_string(),
            description: String::new(),
            parameter_definitions: vec![FieldDefinition::new("rpm", "NUMBER")],
            result_type: FieldDefinition::new("result", "NOTHING"),
            aspects: ServiceAspects::default(),
            is_allow_override: true,
            is_overriden: false,
            code: "var result = 1;".to_string(),
            remote_binding: None,
        });
        thing
            .permissions
            .runtime
            .grant(
                "*",
                PermissionKind::ServiceInvoke,
                Principal {
                    name: "Operators".to_string(),
                    principal_type: PrincipalType::Group,
                    is_permitted: true,
                },
            )
            .unwrap();
        thing
    }

    #[test]
    fn test_thing_shape_layout() {
        let element = entity_element(&descriptor(EntityKind::Thing, EntityBody::Thing(pump())));
        let thing = element.find("Things").unwrap().find("Thing").unwrap();
        assert_eq!(thing.attribute("name"), Some("Main Pump"));
        assert_eq!(thing.attribute("thingTemplate"), Some("GenericThing"));
        assert_eq!(thing.attribute("tags"), Some("Plant:Pumps"));

        let shape = thing.find("ThingShape").unwrap();
        let property = shape.find("PropertyDefinitions").unwrap().find("PropertyDefinition").unwrap();
        assert_eq!(property.attribute("aspect.isPersistent"), Some("true"));
        assert_eq!(property.attribute("aspect.minimumValue"), Some("0"));
        assert_eq!(property.attribute("aspect.isLogged"), None);

        let code = shape
            .find("ServiceImplementations")
            .and_then(|e| e.find("ServiceImplementation"))
            .and_then(|e| e.find("ConfigurationTables"))
            .and_then(|e| e.find("ConfigurationTable"))
            .and_then(|e| e.find("Rows"))
            .and_then(|e| e.find("Row"))
            .and_then(|e| e.find("code"))
            .unwrap();
        assert_eq!(code.children, vec![XmlNode::CData("var result = 1;".to_string())]);

        let remote = thing.find("RemotePropertyBindings").unwrap().find("RemotePropertyBinding").unwrap();
        assert_eq!(remote.attribute("sourceName"), Some("EdgeSpeed"));

        let principal = thing
            .find("RunTimePermissions")
            .and_then(|e| e.find("Permissions"))
            .and_then(|e| e.find("ServiceInvoke"))
            .and_then(|e| e.find("Principal"))
            .unwrap();
        assert_eq!(principal.attribute("type"), Some("Group"));
        assert!(thing.find("InstanceRunTimePermissions").is_none());
    }

    #[test]
    fn test_template_uses_base_template() {
        let mut template = descriptor(EntityKind::ThingTemplate, EntityBody::Thing(ThingModel::default()));
        template.aspects.thing_template = Some("GenericThing".to_string());
        template.aspects.implemented_shapes = vec!["Rotating".to_string()];
        let element = entity_element(&template);
        let entity = element.find("ThingTemplates").unwrap().find("ThingTemplate").unwrap();
        assert_eq!(entity.attribute("baseThingTemplate"), Some("GenericThing"));
        assert!(entity.find("InstanceRunTimePermissions").is_some());
        let shape = entity.find("ImplementedShapes").unwrap().find("ImplementedShape").unwrap();
        assert_eq!(shape.attribute("name"), Some("Rotating"));
    }

    #[test]
    fn test_user_list_and_organization() {
        let list = UserListModel {
            users: vec![UserDefinition {
                name: "bob".to_string(),
                description: String::new(),
                extensions: IndexMap::from([("mobileNumber".to_string(), LiteralValue::String("123".to_string()))]),
            }],
            groups: Vec::new(),
        };
        let element = entity_element(&descriptor(EntityKind::UserList, EntityBody::UserList(list)));
        assert!(element.find("Groups").is_none());
        let user = element.find("Users").unwrap().find("User").unwrap();
        assert_eq!(user.attribute("name"), Some("bob"));

        let organization = OrganizationModel {
            top_unit: "Plant".to_string(),
            units: vec![OrganizationalUnit {
                name: "Plant".to_string(),
                description: String::new(),
                members: vec![Member {
                    name: "bob".to_string(),
                    principal_type: PrincipalType::User,
                }],
            }],
            connections: Vec::new(),
        };
        let document = entity_document(&descriptor(EntityKind::Organization, EntityBody::Organization(organization)));
        assert!(document.contains("topOCName=\"Plant\""));
        assert!(document.contains("<Member name=\"bob\" type=\"User\"/>"));
    }
}
