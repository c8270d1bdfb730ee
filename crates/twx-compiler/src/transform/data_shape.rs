//! Data shape fields.

use super::field_type::{default_value, field_type};
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{ClassDecl, ClassMember};
use crate::frontend::typescript::jsdoc::doc_of;
use crate::model::{DataShapeModel, FieldDefinition};
use crate::resolve::{classify_all, DecoratorKind, FileContext};

/// Reads the fields of a class extending `DataShapeBase`.
///
/// Ordinals default to the declaration index and can be overridden with
/// `@ordinal(n)`.
pub fn visit_data_shape(ctx: &mut FileContext, class: &ClassDecl) -> Result<DataShapeModel, CompilerError> {
    let mut model = DataShapeModel::default();
    for (index, member) in class.members.iter().enumerate() {
        let property = match member {
            ClassMember::Property(property) => property,
            ClassMember::Method(method) => {
                return Err(ctx.error(method.span, "Data shapes can only declare fields, not methods"));
            }
            ClassMember::Other { kind, span } => {
                return Err(ctx.error(*span, format!("Unsupported data shape member '{}'", kind)));
            }
        };
        if property.is_static {
            return Err(ctx.error(property.span, "Data shape fields cannot be static"));
        }
        let Some(type_node) = &property.type_node else {
            return Err(ctx.error(property.span, format!("Field '{}' requires a type annotation", property.name)));
        };

        let mut field: FieldDefinition = field_type(ctx, type_node)?.into_field(&property.name);
        field.description = doc_of(property.doc.as_deref()).description;
        field.ordinal = index as u32;
        if let Some(initializer) = &property.initializer {
            field.aspects.default_value = default_value(ctx, initializer)?;
        }

        for decorator in classify_all(ctx, &property.decorators)? {
            match decorator.kind {
                DecoratorKind::PrimaryKey => field.aspects.is_primary_key = true,
                DecoratorKind::Ordinal(ordinal) => field.ordinal = ordinal,
                _ => {
                    return Err(ctx.error(
                        decorator.span,
                        format!("@{} cannot be used on a data shape field", decorator.name),
                    ))
                }
            }
        }
        model.fields.push(field);
    }
    Ok(model)
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
        parser.parse(source, Path::new("Shape.ts")).unwrap()
    }

    fn visit(source: &str) -> Result<DataShapeModel, CompilerError> {
        let file = parse(source);
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        visit_data_shape(&mut ctx, class)
    }

    #[test]
    fn test_fields() {
        let model = visit(
            r#"class Row extends DataShapeBase {
                /** Unique key */
                @primaryKey id!: STRING;
                @ordinal(10) count: NUMBER = 5;
                owner?: THINGNAME<"User Template">;
            }"#,
        )
        .unwrap();
        assert_eq!(model.fields.len(), 3);
        assert!(model.fields[0].aspects.is_primary_key);
        assert_eq!(model.fields[0].description, "Unique key");
        assert_eq!(model.fields[1].ordinal, 10);
        assert_eq!(model.fields[1].aspects.default_value, Some(LiteralValue::Number(5.0)));
        assert_eq!(model.fields[2].ordinal, 2);
        assert_eq!(model.fields[2].aspects.thing_template.as_deref(), Some("User Template"));
    }

    #[test]
    fn test_methods_are_rejected() {
        let err = visit("class Row extends DataShapeBase { run(): NOTHING {} }").unwrap_err();
        assert!(err.message().contains("methods"));
    }

    #[test]
    fn test_property_decorators_are_rejected() {
        assert!(visit("class Row extends DataShapeBase { @persistent id: STRING; }").is_err());
    }
}
