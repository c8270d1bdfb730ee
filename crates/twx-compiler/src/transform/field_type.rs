//! Base type and default value resolution shared by properties, service
//! parameters, data shape fields and mashup parameters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{Expression, TypeLiteral, TypeNode};
use crate::model::base_type::{accepts_entity_arguments, base_type_named};
use crate::model::{FieldAspects, FieldDefinition, LiteralValue, PropertyAspects};
use crate::resolve::{ConstantValue, FileContext};

/// A resolved type annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldType {
    pub base_type: String,
    pub data_shape: Option<String>,
    pub thing_template: Option<String>,
    pub thing_shape: Option<String>,
}

impl FieldType {
    pub fn apply_to_field(&self, aspects: &mut FieldAspects) {
        aspects.data_shape = self.data_shape.clone();
        aspects.thing_template = self.thing_template.clone();
        aspects.thing_shape = self.thing_shape.clone();
    }

    pub fn apply_to_property(&self, aspects: &mut PropertyAspects) {
        aspects.data_shape = self.data_shape.clone();
        aspects.thing_template = self.thing_template.clone();
        aspects.thing_shape = self.thing_shape.clone();
    }

    pub fn into_field(self, name: &str) -> FieldDefinition {
        let mut field = FieldDefinition::new(name, self.base_type.clone());
        self.apply_to_field(&mut field.aspects);
        field
    }
}

/// Resolves a type annotation to a base type and its entity arguments.
pub fn field_type(ctx: &FileContext, type_node: &TypeNode) -> Result<FieldType, CompilerError> {
    field_type_at_depth(ctx, type_node, 0)
}

fn field_type_at_depth(ctx: &FileContext, type_node: &TypeNode, depth: usize) -> Result<FieldType, CompilerError> {
    match type_node {
        TypeNode::Keyword(keyword, span) => match base_type_named(keyword) {
            Some(base_type) => Ok(FieldType {
                base_type: base_type.to_string(),
                ..FieldType::default()
            }),
            None => Err(ctx.error(*span, format!("The type '{}' has no base type equivalent", keyword))),
        },
        TypeNode::Reference { name, arguments, span } => {
            if let Some(base_type) = base_type_named(name) {
                return base_type_with_arguments(ctx, base_type, arguments);
            }
            if depth < 8 {
                if let Some(alias) = ctx.symbols.type_alias(name) {
                    return field_type_at_depth(ctx, alias, depth + 1);
                }
            }
            Err(ctx.error(*span, format!("Unknown base type '{}'", name)))
        }
        TypeNode::Union(variants, span) => {
            let defined: Vec<_> = variants.iter().filter(|v| !is_undefined_type(v)).collect();
            match defined.as_slice() {
                [only] => field_type_at_depth(ctx, only, depth + 1),
                _ => Err(ctx.error(*span, "Union types cannot be used as a base type")),
            }
        }
        other => Err(ctx.error(
            other.span(),
            "The type must be a base type name such as STRING or INFOTABLE<DataShape>",
        )),
    }
}

fn base_type_with_arguments(
    ctx: &FileContext,
    base_type: &str,
    arguments: &[TypeNode],
) -> Result<FieldType, CompilerError> {
    let mut resolved = FieldType {
        base_type: base_type.to_string(),
        ..FieldType::default()
    };
    if !accepts_entity_arguments(base_type) {
        return Ok(resolved);
    }
    match base_type {
        "INFOTABLE" => {
            if let Some(extra) = arguments.get(1) {
                return Err(ctx.error(extra.span(), "INFOTABLE takes a single data shape argument"));
            }
            if let Some(argument) = arguments.first() {
                resolved.data_shape = entity_name_of_type(ctx, argument)?;
            }
        }
        _ => {
            if let Some(extra) = arguments.get(2) {
                return Err(ctx.error(
                    extra.span(),
                    format!("{} takes at most a thing template and a thing shape argument", base_type),
                ));
            }
            if let Some(argument) = arguments.first() {
                resolved.thing_template = entity_name_of_type(ctx, argument)?;
            }
            if let Some(argument) = arguments.get(1) {
                resolved.thing_shape = entity_name_of_type(ctx, argument)?;
            }
        }
    }
    Ok(resolved)
}

/// An entity name given as a type reference or a string literal type.
pub fn entity_name_of_type(ctx: &FileContext, type_node: &TypeNode) -> Result<Option<String>, CompilerError> {
    match type_node {
        TypeNode::Reference { name, arguments, .. } if arguments.is_empty() => Ok(Some(name.clone())),
        TypeNode::Literal(TypeLiteral::String(name), _) => Ok(Some(name.clone())),
        other if is_undefined_type(other) => Ok(None),
        TypeNode::Keyword(keyword, _) if keyword == "never" || keyword == "any" => Ok(None),
        other => Err(ctx.error(
            other.span(),
            "Entity names in type arguments must be identifiers or string literals",
        )),
    }
}

pub fn is_undefined_type(type_node: &TypeNode) -> bool {
    match type_node {
        TypeNode::Literal(TypeLiteral::Undefined, _) | TypeNode::Literal(TypeLiteral::Null, _) => true,
        TypeNode::Keyword(keyword, _) => keyword == "undefined" || keyword == "null",
        _ => false,
    }
}

/// Resolves an initializer to a default value.
///
/// `new Date("...")` yields the date as a UTC ISO 8601 string and object or
/// array literals are kept as source text. Anything else must be a
/// compile-time constant.
pub fn default_value(ctx: &mut FileContext, expression: &Expression) -> Result<Option<LiteralValue>, CompilerError> {
    match expression.without_assertions() {
        Expression::New { callee, arguments, span } if callee.as_identifier() == Some("Date") => {
            match arguments.as_slice() {
                [Expression::String { value, span }] => match iso_date(value) {
                    Some(date) => Ok(Some(LiteralValue::String(date))),
                    None => Err(ctx.error(
                        *span,
                        format!("'{}' is not an ISO 8601 date; Date defaults must be ISO 8601 date strings", value),
                    )),
                },
                _ => Err(ctx.error(
                    *span,
                    "Date defaults must be created with a single ISO date string argument",
                )),
            }
        }
        literal @ (Expression::Object { .. } | Expression::Array { .. } | Expression::Template(_)) => {
            Ok(Some(LiteralValue::String(ctx.text(literal.span()).to_string())))
        }
        other => match ctx.constant(other) {
            ConstantValue::Value(value) => Ok(Some(value)),
            ConstantValue::ExplicitUndefined => Ok(None),
            ConstantValue::Unresolved => Err(ctx.error(
                other.span(),
                "Default values must be literals or constant values",
            )),
        },
    }
}

/// Normalizes an ISO 8601 date or date-time to UTC with millisecond
/// precision. Values without an offset are read as UTC.
fn iso_date(text: &str) -> Option<String> {
    let text = text.trim();
    let utc = if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        date.with_timezone(&Utc)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.and_utc()
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M") {
        naive.and_utc()
    } else {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?.and_utc()
    };
    Some(utc.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::frontend::typescript::ast::{ClassMember, ParsedFile, PropertyDecl};
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::resolve::SymbolTable;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("Types.ts")).unwrap()
    }

    fn properties(file: &ParsedFile) -> Vec<PropertyDecl> {
        file.classes()
            .next()
            .unwrap()
            .members
            .iter()
            .filter_map(|m| match m {
                ClassMember::Property(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_generic_arguments() {
        let file = parse(
            r#"
            type Speed = NUMBER;
            class A {
                a: INFOTABLE<GenericStringList>;
                b: THINGNAME<"Generic Thing", Shape>;
                c: THINGNAME<undefined, Shape>;
                d: string;
                e: Speed;
            }
            "#,
        );
        let mut symbols = SymbolTable::new();
        symbols.collect(0, &file);
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        let types: Vec<_> = properties(&file)
            .iter()
            .map(|p| field_type(&ctx, p.type_node.as_ref().unwrap()).unwrap())
            .collect();

        assert_eq!(types[0].data_shape.as_deref(), Some("GenericStringList"));
        assert_eq!(types[1].thing_template.as_deref(), Some("Generic Thing"));
        assert_eq!(types[1].thing_shape.as_deref(), Some("Shape"));
        assert_eq!(types[2].thing_template, None);
        assert_eq!(types[2].thing_shape.as_deref(), Some("Shape"));
        assert_eq!(types[3].base_type, "STRING");
        assert_eq!(types[4].base_type, "NUMBER");
    }

    #[test]
    fn test_unknown_base_type_is_rejected() {
        let file = parse("class A { a: Widget; }");
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let ctx = FileContext::new(&file, &config, &symbols);
        let property = &properties(&file)[0];
        let err = field_type(&ctx, property.type_node.as_ref().unwrap()).unwrap_err();
        assert!(err.message().contains("Widget"));
    }

    #[test]
    fn test_default_values() {
        let file = parse(
            r#"
            class A {
                a: DATETIME = new Date("2020-01-01T00:00:00.000Z");
                b: NUMBER = -3;
                c: JSON = { x: 1 };
                d: STRING = compute();
            }
            "#,
        );
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let props = properties(&file);
        let values: Vec<_> = props
            .iter()
            .map(|p| default_value(&mut ctx, p.initializer.as_ref().unwrap()))
            .collect();

        assert_eq!(
            values[0].as_ref().unwrap(),
            &Some(LiteralValue::String("2020-01-01T00:00:00.000Z".to_string()))
        );
        assert_eq!(values[1].as_ref().unwrap(), &Some(LiteralValue::Number(-3.0)));
        assert_eq!(values[2].as_ref().unwrap(), &Some(LiteralValue::String("{ x: 1 }".to_string())));
        assert!(values[3].is_err());
    }

    #[test]
    fn test_date_defaults_are_normalized_to_utc() {
        assert_eq!(iso_date("2020-01-01").as_deref(), Some("2020-01-01T00:00:00.000Z"));
        assert_eq!(iso_date("2020-01-01T02:00:00+02:00").as_deref(), Some("2020-01-01T00:00:00.000Z"));
        assert_eq!(iso_date("2020-01-01T10:30:00.5").as_deref(), Some("2020-01-01T10:30:00.500Z"));
        assert_eq!(iso_date("2020-01-01T10:30").as_deref(), Some("2020-01-01T10:30:00.000Z"));
        assert_eq!(iso_date("January 1, 2020"), None);
        assert_eq!(iso_date("2020-13-01"), None);
    }

    #[test]
    fn test_non_iso_date_default_is_rejected() {
        let file = parse(r#"class A { a: DATETIME = new Date("01/02/2020"); }"#);
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let props = properties(&file);
        let err = default_value(&mut ctx, props[0].initializer.as_ref().unwrap()).unwrap_err();
        assert!(err.to_string().contains("ISO 8601"));
    }
}
