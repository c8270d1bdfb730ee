//! Configuration table schemas (`@ConfigurationTables`) and values (`@config`).

use indexmap::IndexMap;

use super::field_type::entity_name_of_type;
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{ClassDecl, ClassMember, Expression, ObjectMember, TypeNode};
use crate::frontend::typescript::jsdoc::doc_of;
use crate::model::{ConfigurationField, ConfigurationTable, ConfigurationTableDefinition, LiteralValue};
use crate::resolve::{ConstantValue, FileContext};

/// Reads table declarations from an anonymous class such as
/// `class { settings: Table<SettingsShape>; hosts: MultiRowTable<HostShape> }`.
pub fn configuration_table_definitions(
    ctx: &FileContext,
    class: &ClassDecl,
) -> Result<Vec<ConfigurationTableDefinition>, CompilerError> {
    if class.name.is_some() {
        return Err(ctx.error(class.name_span, "Configuration tables must be declared with an anonymous class"));
    }
    if let Some(base) = class.heritage.first() {
        return Err(ctx.error(base.span(), "Configuration table classes cannot extend another class"));
    }

    let mut definitions = Vec::new();
    for (ordinal, member) in class.members.iter().enumerate() {
        let ClassMember::Property(property) = member else {
            return Err(ctx.error(member.span(), "Configuration table classes may only contain properties"));
        };
        let Some(TypeNode::Reference { name, arguments, span }) = &property.type_node else {
            return Err(ctx.error(
                property.span,
                "Configuration tables must be typed as Table<DataShape> or MultiRowTable<DataShape>",
            ));
        };
        let is_multi_row = match name.as_str() {
            "Table" => false,
            "MultiRowTable" => true,
            _ => {
                return Err(ctx.error(
                    *span,
                    "Configuration tables must be typed as Table<DataShape> or MultiRowTable<DataShape>",
                ))
            }
        };
        let data_shape_name = match arguments.as_slice() {
            [argument] => entity_name_of_type(ctx, argument)?,
            _ => None,
        }
        .ok_or_else(|| ctx.error(*span, format!("{} requires a single data shape argument", name)))?;

        definitions.push(ConfigurationTableDefinition {
            name: property.name.clone(),
            category: String::new(),
            description: doc_of(property.doc.as_deref()).description,
            is_hidden: false,
            is_multi_row,
            data_shape_name,
            ordinal: ordinal as u32,
        });
    }
    Ok(definitions)
}

/// Reads configuration values from an object literal whose properties are
/// tables, each either one row (object) or several rows (array of objects).
///
/// The column schema is inferred from the first row; keys that only appear
/// in later rows are dropped with a warning.
pub fn configuration_tables(
    ctx: &mut FileContext,
    object: &Expression,
) -> Result<Vec<ConfigurationTable>, CompilerError> {
    let Expression::Object { members, .. } = object.without_assertions() else {
        return Err(ctx.error(object.span(), "Configuration values must be an object literal"));
    };

    let mut tables = Vec::new();
    for (ordinal, member) in members.iter().enumerate() {
        let ObjectMember::Property { key, value, .. } = member else {
            return Err(ctx.error(member_span(member), "Configuration tables must be written as 'name: value'"));
        };
        let (is_multi_row, row_expressions): (bool, Vec<&Expression>) = match value.without_assertions() {
            row @ Expression::Object { .. } => (false, vec![row]),
            Expression::Array { elements, .. } => (true, elements.iter().collect()),
            other => {
                return Err(ctx.error(
                    other.span(),
                    "A configuration table must be an object literal or an array of object literals",
                ))
            }
        };

        let mut rows = Vec::new();
        for expression in row_expressions {
            rows.push(configuration_row(ctx, expression)?);
        }

        let fields: Vec<ConfigurationField> = rows
            .first()
            .map(|first| {
                first
                    .iter()
                    .map(|(name, value)| ConfigurationField {
                        name: name.clone(),
                        base_type: value.base_type().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (index, row) in rows.iter_mut().enumerate().skip(1) {
            let dropped: Vec<String> = row
                .keys()
                .filter(|k| !fields.iter().any(|f| &f.name == *k))
                .cloned()
                .collect();
            for field in dropped {
                row.shift_remove(&field);
                let file = ctx.file;
                ctx.diagnostics.warning(
                    &file.path,
                    value.span(),
                    format!(
                        "Field '{}' in row {} of configuration table '{}' is not in the first row and was dropped",
                        field,
                        index + 1,
                        key
                    ),
                );
            }
        }

        tables.push(ConfigurationTable {
            name: key.clone(),
            description: String::new(),
            is_multi_row,
            ordinal: ordinal as u32,
            fields,
            rows,
        });
    }
    Ok(tables)
}

fn configuration_row(
    ctx: &mut FileContext,
    expression: &Expression,
) -> Result<IndexMap<String, LiteralValue>, CompilerError> {
    let Expression::Object { members, .. } = expression.without_assertions() else {
        return Err(ctx.error(expression.span(), "Configuration rows must be object literals"));
    };
    let mut row = IndexMap::new();
    for member in members {
        let ObjectMember::Property { key, value, .. } = member else {
            return Err(ctx.error(member_span(member), "Configuration fields must be written as 'name: value'"));
        };
        match ctx.constant(value) {
            ConstantValue::Value(literal) => {
                row.insert(key.clone(), literal);
            }
            ConstantValue::ExplicitUndefined => {}
            ConstantValue::Unresolved => {
                return Err(ctx.error(
                    value.span(),
                    "Configuration values must be literals or constant values",
                ))
            }
        }
    }
    Ok(row)
}

fn member_span(member: &ObjectMember) -> crate::diagnostic::Span {
    match member {
        ObjectMember::Property { span, .. } | ObjectMember::Shorthand { span, .. } | ObjectMember::Other(span) => *span,
        ObjectMember::Spread(expression) => expression.span(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::frontend::typescript::ast::{Decorator, ParsedFile};
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::resolve::SymbolTable;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("Config.ts")).unwrap()
    }

    fn first_argument(decorator: &Decorator) -> &Expression {
        &decorator.arguments.as_ref().unwrap()[0]
    }

    #[test]
    fn test_table_definitions() {
        let file = parse(
            r#"
            @ConfigurationTables(class {
                /** Connection settings */
                settings: Table<SettingsShape>;
                hosts: MultiRowTable<"Host Shape">;
            })
            class A {}
            "#,
        );
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        let Expression::Class(tables) = first_argument(&class.decorators[0]) else {
            panic!("expected class expression");
        };
        let definitions = configuration_table_definitions(&ctx, tables).unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].description, "Connection settings");
        assert!(!definitions[0].is_multi_row);
        assert_eq!(definitions[1].data_shape_name, "Host Shape");
        assert!(definitions[1].is_multi_row);
        assert_eq!(definitions[1].ordinal, 1);
    }

    #[test]
    fn test_schema_comes_from_first_row() {
        let file = parse(
            r#"
            @config({
                settings: { host: "localhost", port: 8080 },
                hosts: [{ name: "a", up: true }, { name: "b", up: false, extra: 1 }],
            })
            class A {}
            "#,
        );
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        let tables = configuration_tables(&mut ctx, first_argument(&class.decorators[0])).unwrap();

        assert_eq!(tables[0].fields.len(), 2);
        assert_eq!(tables[0].fields[1].base_type, "NUMBER");
        assert!(tables[1].is_multi_row);
        assert_eq!(tables[1].rows.len(), 2);
        assert!(!tables[1].rows[1].contains_key("extra"));
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(ctx.diagnostics.iter().next().unwrap().message.contains("extra"));
    }

    #[test]
    fn test_named_class_is_rejected() {
        let file = parse("@ConfigurationTables(class Named { a: Table<S>; }) class A {}");
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        let Expression::Class(tables) = first_argument(&class.decorators[0]) else {
            panic!("expected class expression");
        };
        assert!(configuration_table_definitions(&ctx, tables).is_err());
    }
}
