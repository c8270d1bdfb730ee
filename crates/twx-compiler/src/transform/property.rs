//! Class fields of things, templates and shapes: properties and events.

use super::field_type::{default_value, entity_name_of_type, field_type};
use super::permission::is_permission_decorator;
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{PropertyDecl, TypeNode};
use crate::frontend::typescript::jsdoc::doc_of;
use crate::model::base_type::is_numeric;
use crate::model::{
    EventDefinition, LiteralValue, LocalPropertyBinding, PropertyAspects, PropertyDefinition, RemoteEventBinding,
    RemotePropertyBinding,
};
use crate::resolve::{classify_all, DecoratorKind, FileContext};

/// What a class field turned into.
#[derive(Debug, Clone)]
pub enum FieldOutcome {
    Property(PropertyDefinition),
    Event(EventDefinition),
}

pub fn visit_property(
    ctx: &mut FileContext,
    property: &PropertyDecl,
    ordinal: u32,
) -> Result<FieldOutcome, CompilerError> {
    if property.is_static {
        return Err(ctx.error(property.span, "Static properties are not supported on entities"));
    }
    let Some(type_node) = &property.type_node else {
        return Err(ctx.error(property.span, format!("Property '{}' requires a type annotation", property.name)));
    };
    match type_node {
        TypeNode::Keyword(keyword, span) if !matches!(keyword.as_str(), "string" | "number" | "boolean") => {
            return Err(ctx.error(*span, format!("The type '{}' cannot be used for a property", keyword)));
        }
        TypeNode::Keyword(..) | TypeNode::Reference { .. } => {}
        other => {
            return Err(ctx.error(
                other.span(),
                "Property types must be a primitive keyword or a base type reference",
            ))
        }
    }
    if let TypeNode::Reference { name, arguments, span } = type_node {
        if name == "EVENT" {
            return visit_event(ctx, property, arguments, *span).map(FieldOutcome::Event);
        }
    }

    let resolved = field_type(ctx, type_node)?;
    let doc = doc_of(property.doc.as_deref());
    let mut definition = PropertyDefinition {
        name: property.name.clone(),
        base_type: resolved.base_type.clone(),
        description: doc.description,
        ordinal,
        aspects: PropertyAspects {
            is_read_only: property.is_readonly,
            ..PropertyAspects::default()
        },
        remote_binding: None,
        local_binding: None,
    };
    resolved.apply_to_property(&mut definition.aspects);

    if let Some(initializer) = &property.initializer {
        definition.aspects.default_value = default_value(ctx, initializer)?;
    }

    let numeric = is_numeric(&definition.base_type);
    let relevant: Vec<_> = property
        .decorators
        .iter()
        .filter(|d| !is_permission_decorator(d))
        .cloned()
        .collect();
    for decorator in classify_all(ctx, &relevant)? {
        match decorator.kind {
            DecoratorKind::Persistent => definition.aspects.is_persistent = true,
            DecoratorKind::Logged => definition.aspects.is_logged = true,
            DecoratorKind::MinimumValue(_) | DecoratorKind::MaximumValue(_) if !numeric => {
                return Err(ctx.error(
                    decorator.span,
                    format!("@{} can only be used on numeric properties", decorator.name),
                ));
            }
            DecoratorKind::MinimumValue(value) => definition.aspects.minimum_value = Some(value),
            DecoratorKind::MaximumValue(value) => definition.aspects.maximum_value = Some(value),
            DecoratorKind::Unit(unit) => {
                if !numeric {
                    return Err(ctx.error(decorator.span, "@unit can only be used on numeric properties"));
                }
                definition.aspects.units = Some(unit);
            }
            DecoratorKind::DataChangeType { kind, threshold } => {
                definition.aspects.data_change_type = Some(kind);
                definition.aspects.data_change_threshold = threshold;
            }
            DecoratorKind::Remote { source_name, options } => {
                let mut binding = RemotePropertyBinding {
                    source_name,
                    cache_time: None,
                    fold_type: Some("NONE".to_string()),
                    push_threshold: Some(0.0),
                    push_type: Some("VALUE".to_string()),
                    start_type: Some("useDefaultValue".to_string()),
                    timeout: Some(0.0),
                };
                for (key, value) in options {
                    match (key.as_str(), value) {
                        ("cacheTime", LiteralValue::Number(n)) => {
                            binding.cache_time = Some(n);
                            definition.aspects.cache_time = Some(n);
                        }
                        ("pushThreshold", LiteralValue::Number(n)) => binding.push_threshold = Some(n),
                        ("timeout", LiteralValue::Number(n)) => binding.timeout = Some(n),
                        ("foldType", LiteralValue::String(s)) => binding.fold_type = Some(s),
                        ("pushType", LiteralValue::String(s)) => binding.push_type = Some(s),
                        ("startType", LiteralValue::String(s)) => binding.start_type = Some(s),
                        (key, _) => {
                            return Err(ctx.error(
                                decorator.span,
                                format!("The remote binding option '{}' has the wrong type", key),
                            ))
                        }
                    }
                }
                definition.aspects.is_remote = true;
                definition.remote_binding = Some(binding);
            }
            DecoratorKind::Local { thing, property: source } => {
                definition.local_binding = Some(LocalPropertyBinding {
                    source_thing_name: thing,
                    source_name: source,
                });
            }
            _ => {
                return Err(ctx.error(
                    decorator.span,
                    format!("@{} cannot be used on a property", decorator.name),
                ))
            }
        }
    }

    if definition.remote_binding.is_some() && definition.local_binding.is_some() {
        return Err(ctx.error(
            property.span,
            format!("Property '{}' cannot have both a remote and a local binding", property.name),
        ));
    }
    validate_bounds(ctx, property, &definition.aspects)?;
    Ok(FieldOutcome::Property(definition))
}

/// Checks `min <= default <= max` and `min <= max`.
fn validate_bounds(ctx: &FileContext, property: &PropertyDecl, aspects: &PropertyAspects) -> Result<(), CompilerError> {
    if let (Some(min), Some(max)) = (aspects.minimum_value, aspects.maximum_value) {
        if min > max {
            return Err(ctx.error(
                property.span,
                format!("The minimum value {} is greater than the maximum value {}", min, max),
            ));
        }
    }
    let default = aspects.default_value.as_ref().and_then(LiteralValue::as_f64);
    if let Some(default) = default {
        if let Some(min) = aspects.minimum_value {
            if default < min {
                return Err(ctx.error(
                    property.span,
                    format!("The default value {} is less than the minimum value {}", default, min),
                ));
            }
        }
        if let Some(max) = aspects.maximum_value {
            if default > max {
                return Err(ctx.error(
                    property.span,
                    format!("The default value {} is greater than the maximum value {}", default, max),
                ));
            }
        }
    }
    Ok(())
}

/// `name!: EVENT<DataShape>` with an optional `@remoteEvent`.
fn visit_event(
    ctx: &mut FileContext,
    property: &PropertyDecl,
    arguments: &[TypeNode],
    span: crate::diagnostic::Span,
) -> Result<EventDefinition, CompilerError> {
    let data_shape = match arguments {
        [argument] => entity_name_of_type(ctx, argument)?,
        _ => None,
    }
    .ok_or_else(|| ctx.error(span, "Events must be typed as EVENT<DataShape>"))?;

    if let Some(initializer) = &property.initializer {
        return Err(ctx.error(initializer.span(), "Events cannot have an initializer"));
    }

    let mut remote_binding = None;
    let relevant: Vec<_> = property
        .decorators
        .iter()
        .filter(|d| !is_permission_decorator(d))
        .cloned()
        .collect();
    for decorator in classify_all(ctx, &relevant)? {
        match decorator.kind {
            DecoratorKind::RemoteEvent { source_name } => {
                remote_binding = Some(RemoteEventBinding { source_name });
            }
            _ => {
                return Err(ctx.error(
                    decorator.span,
                    format!("@{} cannot be used on an event", decorator.name),
                ))
            }
        }
    }

    Ok(EventDefinition {
        name: property.name.clone(),
        description: doc_of(property.doc.as_deref()).description,
        data_shape,
        remote_binding,
    })
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
        parser.parse(source, Path::new("Props.ts")).unwrap()
    }

    fn visit_all(source: &str) -> Vec<Result<FieldOutcome, CompilerError>> {
        let file = parse(source);
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        class
            .members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match m {
                ClassMember::Property(p) => Some(visit_property(&mut ctx, p, i as u32)),
                _ => None,
            })
            .collect()
    }

    fn property(outcome: &Result<FieldOutcome, CompilerError>) -> &PropertyDefinition {
        match outcome {
            Ok(FieldOutcome::Property(p)) => p,
            other => panic!("expected a property, got {other:?}"),
        }
    }

    #[test]
    fn test_property_aspects() {
        let results = visit_all(
            r#"class A {
                /** Current speed */
                @persistent @logged @minimumValue(0) @maximumValue(200) @unit("km/h") @dataChangeType("VALUE", 2)
                speed: NUMBER = 10;
                readonly label: STRING = "x";
            }"#,
        );
        let speed = property(&results[0]);
        assert_eq!(speed.description, "Current speed");
        assert!(speed.aspects.is_persistent && speed.aspects.is_logged);
        assert_eq!(speed.aspects.minimum_value, Some(0.0));
        assert_eq!(speed.aspects.maximum_value, Some(200.0));
        assert_eq!(speed.aspects.units.as_deref(), Some("km/h"));
        assert_eq!(speed.aspects.data_change_threshold, Some(2.0));
        assert_eq!(speed.aspects.default_value, Some(LiteralValue::Number(10.0)));
        assert!(property(&results[1]).aspects.is_read_only);
    }

    #[test]
    fn test_remote_binding_defaults() {
        let results = visit_all(r#"class A { @remote("EdgeProp1", { pushType: "ALWAYS" }) mileage!: NUMBER; }"#);
        let mileage = property(&results[0]);
        assert!(mileage.aspects.is_remote);
        let binding = mileage.remote_binding.as_ref().unwrap();
        assert_eq!(binding.source_name, "EdgeProp1");
        assert_eq!(binding.push_type.as_deref(), Some("ALWAYS"));
        assert_eq!(binding.fold_type.as_deref(), Some("NONE"));
        assert_eq!(binding.start_type.as_deref(), Some("useDefaultValue"));
        assert_eq!(binding.timeout, Some(0.0));
        assert_eq!(binding.cache_time, None);
    }

    #[test]
    fn test_remote_and_local_are_exclusive() {
        let results = visit_all(r#"class A { @remote("a") @local("Other", "b") x!: NUMBER; }"#);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_minimum_value_validation() {
        let results = visit_all(
            r#"class A {
                @minimumValue(10) @maximumValue(5) a!: NUMBER;
                @minimumValue(0) @maximumValue(5) b: NUMBER = 7;
                @minimumValue(0) c!: STRING;
                @minimumValue(0) @maximumValue(5) d: INTEGER = 5;
            }"#,
        );
        assert!(results[0].as_ref().unwrap_err().message().contains("greater than the maximum"));
        assert!(results[1].as_ref().unwrap_err().message().contains("greater than the maximum"));
        assert!(results[2].as_ref().unwrap_err().message().contains("numeric"));
        assert_eq!(property(&results[3]).aspects.default_value, Some(LiteralValue::Number(5.0)));
    }

    #[test]
    fn test_event_definition() {
        let results = visit_all(r#"class A { @remoteEvent("edgeAlarm") alarm!: EVENT<AlertShape>; }"#);
        match &results[0] {
            Ok(FieldOutcome::Event(event)) => {
                assert_eq!(event.data_shape, "AlertShape");
                assert_eq!(event.remote_binding.as_ref().unwrap().source_name, "edgeAlarm");
            }
            other => panic!("expected an event, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let results = visit_all("class A { speed = 3; }");
        assert!(results[0].as_ref().unwrap_err().message().contains("type annotation"));
    }
}
