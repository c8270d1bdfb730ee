//! Ambient declarations that make compiled entities visible to later files.

use crate::model::{EntityBody, EntityDescriptor};

/// Builds the `declare interface <Collection>` text for an entity.
///
/// User lists declare their users and groups rather than themselves.
pub fn declaration_of(descriptor: &EntityDescriptor) -> String {
    match &descriptor.body {
        EntityBody::UserList(list) => {
            let mut text = String::new();
            if !list.users.is_empty() {
                text.push_str("declare interface Users {\n");
                for user in &list.users {
                    text.push_str(&format!("    {}: UserEntity;\n", quoted(&user.name)));
                }
                text.push_str("}\n");
            }
            if !list.groups.is_empty() {
                text.push_str("declare interface Groups {\n");
                for group in &list.groups {
                    text.push_str(&format!("    {}: GroupEntity;\n", quoted(&group.name)));
                }
                text.push_str("}\n");
            }
            text
        }
        _ => format!(
            "declare interface {} {{ {}: {} }}\n",
            descriptor.kind.collection(),
            quoted(&descriptor.exported_name),
            descriptor.name
        ),
    }
}

fn quoted(name: &str) -> String {
    serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityAspects, EntityKind, ThingModel, UserDefinition, UserListModel};
    use indexmap::IndexMap;
    use std::path::PathBuf;

    fn descriptor(kind: EntityKind, body: EntityBody) -> EntityDescriptor {
        EntityDescriptor {
            kind,
            name: "LineSensor".to_string(),
            exported_name: "Line Sensor".to_string(),
            description: String::new(),
            project: String::new(),
            tags: Vec::new(),
            file: PathBuf::from("LineSensor.ts"),
            aspects: EntityAspects::default(),
            body,
        }
    }

    #[test]
    fn test_thing_declaration() {
        let thing = descriptor(EntityKind::Thing, EntityBody::Thing(ThingModel::default()));
        assert_eq!(
            declaration_of(&thing),
            "declare interface Things { \"Line Sensor\": LineSensor }\n"
        );
    }

    #[test]
    fn test_user_list_declares_users() {
        let list = descriptor(
            EntityKind::UserList,
            EntityBody::UserList(UserListModel {
                users: vec![UserDefinition {
                    name: "bob".to_string(),
                    description: String::new(),
                    extensions: IndexMap::new(),
                }],
                groups: Vec::new(),
            }),
        );
        assert_eq!(declaration_of(&list), "declare interface Users {\n    \"bob\": UserEntity;\n}\n");
    }
}
