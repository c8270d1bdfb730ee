//! Runtime permission decorators.
//!
//! `@allow`, `@deny`, `@allowInstance` and `@denyInstance` take an optional
//! leading resource string followed by `Permission.X`, `Users.X` and
//! `Groups.X` references in any order.

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{Decorator, Expression};
use crate::model::{PermissionKind, PermissionList, PermissionSet, Principal, PrincipalType};
use crate::resolve::FileContext;

pub const PERMISSION_DECORATORS: &[&str] = &["allow", "deny", "allowInstance", "denyInstance"];

pub fn is_permission_decorator(decorator: &Decorator) -> bool {
    PERMISSION_DECORATORS.contains(&decorator.name.as_str())
}

/// Collects and merges the permission decorators of one node.
///
/// When `resource` is given the grants apply to that member and an explicit
/// resource argument must name the same member. Otherwise grants apply to
/// the explicit resource, or to every resource (`*`).
pub fn permissions_of_node(
    ctx: &FileContext,
    decorators: &[Decorator],
    resource: Option<&str>,
) -> Result<PermissionSet, CompilerError> {
    let mut merged = PermissionSet::default();
    for decorator in decorators.iter().filter(|d| is_permission_decorator(d)) {
        let partial = permissions_of_decorator(ctx, decorator, resource)?;
        merged
            .merge(partial)
            .map_err(|conflict| ctx.error(decorator.span, conflict.to_string()))?;
    }
    Ok(merged)
}

fn permissions_of_decorator(
    ctx: &FileContext,
    decorator: &Decorator,
    resource: Option<&str>,
) -> Result<PermissionSet, CompilerError> {
    let arguments = decorator.arguments.as_deref().unwrap_or(&[]);
    let (explicit_resource, rest) = match arguments.split_first() {
        Some((Expression::String { value, span }, rest)) => {
            if let Some(expected) = resource {
                if expected != value {
                    return Err(ctx.error(
                        *span,
                        format!(
                            "The permission resource '{}' does not match the member '{}' it decorates",
                            value, expected
                        ),
                    ));
                }
            }
            (Some(value.as_str()), rest)
        }
        _ => (None, arguments),
    };
    let target = explicit_resource.or(resource).unwrap_or("*");

    let mut kinds = Vec::new();
    let mut principals = Vec::new();
    let is_permitted = decorator.name.starts_with("allow");
    for argument in rest {
        let path = argument.without_assertions().access_path();
        match path.as_deref() {
            Some([root, name]) if root == "Permission" => match PermissionKind::from_name(name) {
                Some(kind) => kinds.push(kind),
                None => return Err(ctx.error(argument.span(), format!("Unknown permission '{}'", name))),
            },
            Some([root, name]) if root == "Users" || root == "Groups" => principals.push(Principal {
                name: name.clone(),
                principal_type: if root == "Users" {
                    PrincipalType::User
                } else {
                    PrincipalType::Group
                },
                is_permitted,
            }),
            _ => {
                return Err(ctx.error(
                    argument.span(),
                    "Permission arguments must be Permission.X, Users.X or Groups.X references",
                ))
            }
        }
    }
    if kinds.is_empty() {
        return Err(ctx.error(
            decorator.span,
            format!("@{} requires at least one Permission.X argument", decorator.name),
        ));
    }
    if principals.is_empty() {
        return Err(ctx.error(
            decorator.span,
            format!("@{} requires at least one user or group", decorator.name),
        ));
    }

    let mut list = PermissionList::new();
    for kind in kinds {
        for principal in &principals {
            list.grant(target, kind, principal.clone())
                .map_err(|conflict| ctx.error(decorator.span, conflict.to_string()))?;
        }
    }
    let mut set = PermissionSet::default();
    if decorator.name.ends_with("Instance") {
        set.instance = list;
    } else {
        set.runtime = list;
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::frontend::typescript::ast::{ClassMember, ParsedFile};
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::resolve::SymbolTable;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("Perm.ts")).unwrap()
    }

    fn member_decorators(file: &ParsedFile) -> Vec<Decorator> {
        match &file.classes().next().unwrap().members[0] {
            ClassMember::Property(p) => p.decorators.clone(),
            ClassMember::Method(m) => m.decorators.clone(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_member_permissions() {
        let file = parse(
            r#"class A {
                @allow(Permission.PropertyRead, Permission.PropertyWrite, Users.Administrator)
                @denyInstance(Permission.PropertyRead, Groups.Guests)
                speed: NUMBER;
            }"#,
        );
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        let set = permissions_of_node(&ctx, &member_decorators(&file), Some("speed")).unwrap();

        let runtime = set.runtime.tuples();
        assert_eq!(runtime.len(), 2);
        assert!(runtime.iter().all(|t| t.0 == "speed" && t.4));
        let instance = set.instance.tuples();
        assert_eq!(instance.len(), 1);
        assert_eq!(instance[0].2, PrincipalType::Group);
        assert!(!instance[0].4);
    }

    #[test]
    fn test_duplicate_grant_across_decorators_fails() {
        let file = parse(
            r#"class A {
                @allow(Permission.ServiceInvoke, Users.alice)
                @deny(Permission.ServiceInvoke, Users.alice)
                run(): NOTHING {}
            }"#,
        );
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        let err = permissions_of_node(&ctx, &member_decorators(&file), Some("run")).unwrap_err();
        assert!(err.message().contains("alice"));
    }

    #[test]
    fn test_mismatched_resource_fails() {
        let file = parse(r#"class A { @allow("other", Permission.PropertyRead, Users.bob) speed: NUMBER; }"#);
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        assert!(permissions_of_node(&ctx, &member_decorators(&file), Some("speed")).is_err());
    }

    #[test]
    fn test_missing_principal_fails() {
        let file = parse(r#"class A { @allow(Permission.PropertyRead) speed: NUMBER; }"#);
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        let err = permissions_of_node(&ctx, &member_decorators(&file), None).unwrap_err();
        assert!(err.message().contains("user or group"));
    }
}
