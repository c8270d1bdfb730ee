//! Organizations: a single `units` tree flattened into units and connections.

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{ClassDecl, ClassMember, Expression, ObjectMember};
use crate::model::{OrganizationConnection, OrganizationModel, OrganizationalUnit};
use crate::resolve::FileContext;

use super::user_list::principal_reference;

/// Reads `units = { name, description?, units?: [...], members?: [...] }`.
pub fn visit_organization(ctx: &mut FileContext, class: &ClassDecl) -> Result<OrganizationModel, CompilerError> {
    let property = match class.members.as_slice() {
        [ClassMember::Property(property)] if property.name == "units" => property,
        _ => {
            return Err(ctx.error(
                class.name_span,
                "Organizations must declare exactly one property named 'units'",
            ))
        }
    };
    let Some(root) = &property.initializer else {
        return Err(ctx.error(property.span, "The 'units' property requires an initializer"));
    };

    let mut model = OrganizationModel::default();
    let top_unit = visit_unit(ctx, root, None, &mut model)?;
    model.top_unit = top_unit;
    Ok(model)
}

fn visit_unit(
    ctx: &mut FileContext,
    expression: &Expression,
    parent: Option<&str>,
    model: &mut OrganizationModel,
) -> Result<String, CompilerError> {
    let Expression::Object { members, span } = expression.without_assertions() else {
        return Err(ctx.error(expression.span(), "Organizational units must be object literals"));
    };

    let mut name = None;
    let mut description = String::new();
    let mut children: &[Expression] = &[];
    let mut unit_members = Vec::new();
    for member in members {
        let ObjectMember::Property { key, value, .. } = member else {
            return Err(ctx.error(*span, "Organizational units must be written with 'key: value' entries"));
        };
        match key.as_str() {
            "name" => name = Some(ctx.string_constant(value, "unit name")?),
            "description" => description = ctx.string_constant(value, "unit description")?,
            "units" => match value.without_assertions() {
                Expression::Array { elements, .. } => children = elements,
                other => return Err(ctx.error(other.span(), "'units' must be an array of units")),
            },
            "members" => match value.without_assertions() {
                Expression::Array { elements, .. } => {
                    for element in elements {
                        unit_members.push(principal_reference(ctx, element)?);
                    }
                }
                other => return Err(ctx.error(other.span(), "'members' must be an array of users and groups")),
            },
            other => {
                return Err(ctx.error(*span, format!("Unknown organizational unit key '{}'", other)));
            }
        }
    }
    let Some(name) = name else {
        return Err(ctx.error(*span, "Organizational units require a name"));
    };
    if model.units.iter().any(|u| u.name == name) {
        return Err(ctx.error(*span, format!("Duplicate organizational unit '{}'", name)));
    }

    if let Some(parent) = parent {
        model.connections.push(OrganizationConnection {
            from: parent.to_string(),
            to: name.clone(),
        });
    }
    model.units.push(OrganizationalUnit {
        name: name.clone(),
        description,
        members: unit_members,
    });
    for child in children {
        visit_unit(ctx, child, Some(&name), model)?;
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::frontend::typescript::ast::ParsedFile;
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::model::PrincipalType;
    use crate::resolve::SymbolTable;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("Plant.ts")).unwrap()
    }

    fn visit(source: &str) -> Result<OrganizationModel, CompilerError> {
        let file = parse(source);
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        visit_organization(&mut ctx, class)
    }

    #[test]
    fn test_unit_tree_is_flattened() {
        let model = visit(
            r#"class Plant extends OrganizationBase {
                units = {
                    name: "Plant",
                    members: [Groups.Managers],
                    units: [
                        { name: "Assembly", members: [Users.bob] },
                        { name: "Paint", units: [{ name: "Booth", description: "Spray booth" }] },
                    ],
                };
            }"#,
        )
        .unwrap();
        assert_eq!(model.top_unit, "Plant");
        let names: Vec<_> = model.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Plant", "Assembly", "Paint", "Booth"]);
        assert_eq!(model.units[0].members[0].principal_type, PrincipalType::Group);
        assert_eq!(model.units[3].description, "Spray booth");
        let edges: Vec<_> = model
            .connections
            .iter()
            .map(|c| (c.from.as_str(), c.to.as_str()))
            .collect();
        assert_eq!(edges, [("Plant", "Assembly"), ("Plant", "Paint"), ("Paint", "Booth")]);
    }

    #[test]
    fn test_requires_single_units_property() {
        assert!(visit("class Plant extends OrganizationBase { teams = {}; }").is_err());
        assert!(visit(r#"class Plant extends OrganizationBase { units = { name: "A" }; other = 1; }"#).is_err());
    }

    #[test]
    fn test_unit_requires_name() {
        let err = visit(r#"class Plant extends OrganizationBase { units = { description: "x" }; }"#).unwrap_err();
        assert!(err.message().contains("require a name"));
    }
}
