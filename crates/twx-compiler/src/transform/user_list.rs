//! User lists: users and groups declared as class fields.
//!
//! ```text
//! class Staff extends UserList {
//!     bob;
//!     alice = { emailAddress: "alice@example.com" };
//!     operators = [Users.bob, Users.alice];
//! }
//! ```

use indexmap::IndexMap;

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{ClassDecl, ClassMember, Expression, ObjectMember};
use crate::frontend::typescript::jsdoc::doc_of;
use crate::model::{GroupDefinition, Member, PrincipalType, UserDefinition, UserListModel};
use crate::resolve::FileContext;

pub fn visit_user_list(ctx: &mut FileContext, class: &ClassDecl) -> Result<UserListModel, CompilerError> {
    let mut model = UserListModel::default();
    for member in &class.members {
        let ClassMember::Property(property) = member else {
            return Err(ctx.error(member.span(), "User lists can only declare users and groups as fields"));
        };
        if let Some(decorator) = property.decorators.first() {
            return Err(ctx.error(decorator.span, "Users and groups cannot be decorated"));
        }
        let description = doc_of(property.doc.as_deref()).description;

        match property.initializer.as_ref().map(|e| e.without_assertions()) {
            None => model.users.push(UserDefinition {
                name: property.name.clone(),
                description,
                extensions: IndexMap::new(),
            }),
            Some(Expression::Object { members, .. }) => {
                let mut extensions = IndexMap::new();
                for member in members {
                    let ObjectMember::Property { key, value, .. } = member else {
                        return Err(ctx.error(
                            property.span,
                            "User extensions must be written as 'name: value'",
                        ));
                    };
                    let what = format!("user extension '{}'", key);
                    if let Some(value) = ctx.required_constant(value, &what)? {
                        extensions.insert(key.clone(), value);
                    }
                }
                model.users.push(UserDefinition {
                    name: property.name.clone(),
                    description,
                    extensions,
                });
            }
            Some(Expression::Array { elements, .. }) => {
                let mut members = Vec::new();
                for element in elements {
                    members.push(principal_reference(ctx, element)?);
                }
                model.groups.push(GroupDefinition {
                    name: property.name.clone(),
                    description,
                    members,
                });
            }
            Some(other) => {
                return Err(ctx.error(
                    other.span(),
                    "Users are initialized with an object literal and groups with an array of members",
                ))
            }
        }
    }
    Ok(model)
}

/// Reads a `Users.name` or `Groups.name` reference.
pub fn principal_reference(ctx: &FileContext, expression: &Expression) -> Result<Member, CompilerError> {
    match expression.without_assertions().access_path().as_deref() {
        Some([collection, name]) if collection == "Users" => Ok(Member {
            name: name.clone(),
            principal_type: PrincipalType::User,
        }),
        Some([collection, name]) if collection == "Groups" => Ok(Member {
            name: name.clone(),
            principal_type: PrincipalType::Group,
        }),
        _ => Err(ctx.error(
            expression.span(),
            "Members must be Users.name or Groups.name references",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::frontend::typescript::ast::ParsedFile;
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::model::LiteralValue;
    use crate::resolve::SymbolTable;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("Staff.ts")).unwrap()
    }

    fn visit(source: &str) -> Result<UserListModel, CompilerError> {
        let file = parse(source);
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        visit_user_list(&mut ctx, class)
    }

    #[test]
    fn test_users_and_groups() {
        let model = visit(
            r#"class Staff extends UserList {
                /** Night shift */
                bob;
                alice = { emailAddress: "alice@example.com", level: 3 };
                operators = [Users.bob, Users.alice, Groups.Admins];
            }"#,
        )
        .unwrap();
        assert_eq!(model.users.len(), 2);
        assert_eq!(model.users[0].description, "Night shift");
        assert!(model.users[0].extensions.is_empty());
        assert_eq!(model.users[1].extensions.get("level"), Some(&LiteralValue::Number(3.0)));

        let operators = &model.groups[0];
        assert_eq!(operators.members.len(), 3);
        assert_eq!(operators.members[2].principal_type, PrincipalType::Group);
    }

    #[test]
    fn test_invalid_member_reference() {
        let err = visit("class Staff extends UserList { ops = [Things.bob]; }").unwrap_err();
        assert!(err.message().contains("Users.name"));
    }

    #[test]
    fn test_methods_are_rejected() {
        assert!(visit("class Staff extends UserList { run() {} }").is_err());
    }
}
