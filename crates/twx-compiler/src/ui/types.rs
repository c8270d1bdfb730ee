//! Base type inference for mashup bindings.

use crate::frontend::typescript::ast::{TypeLiteral, TypeNode};
use crate::model::base_type::base_type_named;
use crate::model::{FieldDefinition, ServiceDefinition};
use crate::resolve::SymbolTable;

/// Answers questions about entities outside the mashup being built.
pub trait TypeResolver {
    /// A service of an entity, by collection and exported entity name.
    fn service(&self, collection: &str, entity: &str, service: &str) -> Option<ServiceDefinition>;

    /// The fields of a data shape, by exported name.
    fn data_shape_fields(&self, data_shape: &str) -> Option<Vec<FieldDefinition>>;
}

/// A resolver that knows no entities. Every binding needs an explicit type.
#[derive(Debug, Default)]
pub struct NoEntities;

impl TypeResolver for NoEntities {
    fn service(&self, _collection: &str, _entity: &str, _service: &str) -> Option<ServiceDefinition> {
        None
    }

    fn data_shape_fields(&self, _data_shape: &str) -> Option<Vec<FieldDefinition>> {
        None
    }
}

/// Generic wrappers whose name alone decides the base type.
const WRAPPERS: &[&str] = &["INFOTABLE", "THINGNAME", "STRING", "NUMBER", "TWJSON", "FIELDNAME", "ARRAY"];

/// Base type of a type annotation or assertion.
///
/// `BindingTarget<T>` is unwrapped, `undefined`/`null` members are dropped
/// from unions and a union of literals of one primitive kind collapses to
/// that primitive.
pub fn base_type_of_type(symbols: &SymbolTable, node: &TypeNode) -> Option<String> {
    base_type_at_depth(symbols, node, 0)
}

fn base_type_at_depth(symbols: &SymbolTable, node: &TypeNode, depth: usize) -> Option<String> {
    if depth > 8 {
        return None;
    }
    match node {
        TypeNode::Keyword(keyword, _) => base_type_named(keyword).map(str::to_string),
        TypeNode::Literal(literal, _) => literal_base_type(literal).map(str::to_string),
        TypeNode::Reference { name, arguments, .. } => {
            if name == "BindingTarget" {
                return arguments.first().and_then(|a| base_type_at_depth(symbols, a, depth + 1));
            }
            if name == "ARRAY" {
                return Some("INFOTABLE".to_string());
            }
            if WRAPPERS.contains(&name.as_str()) {
                return base_type_named(name).map(str::to_string);
            }
            if let Some(alias) = symbols.type_alias(name) {
                return base_type_at_depth(symbols, alias, depth + 1);
            }
            base_type_named(name).map(str::to_string)
        }
        TypeNode::Union(members, _) => {
            let remaining: Vec<&TypeNode> = members.iter().filter(|m| !is_nullish(m)).collect();
            match remaining.as_slice() {
                [] => None,
                [single] => base_type_at_depth(symbols, single, depth + 1),
                several => {
                    let kinds: Vec<Option<String>> = several
                        .iter()
                        .map(|m| base_type_at_depth(symbols, m, depth + 1))
                        .collect();
                    let first = kinds.first().cloned().flatten()?;
                    kinds.iter().all(|k| k.as_deref() == Some(first.as_str())).then_some(first)
                }
            }
        }
        TypeNode::Intersection(members, _) => members
            .iter()
            .find_map(|m| base_type_at_depth(symbols, m, depth + 1)),
        TypeNode::Array(_, _) => Some("INFOTABLE".to_string()),
        TypeNode::ObjectLiteral(_, _) => Some("JSON".to_string()),
        TypeNode::Other(_, _) => None,
    }
}

fn is_nullish(node: &TypeNode) -> bool {
    match node {
        TypeNode::Keyword(keyword, _) => keyword == "undefined" || keyword == "null",
        TypeNode::Literal(TypeLiteral::Null | TypeLiteral::Undefined, _) => true,
        _ => false,
    }
}

fn literal_base_type(literal: &TypeLiteral) -> Option<&'static str> {
    match literal {
        TypeLiteral::String(_) => Some("STRING"),
        TypeLiteral::Number(_) => Some("NUMBER"),
        TypeLiteral::Bool(_) => Some("BOOLEAN"),
        TypeLiteral::Null | TypeLiteral::Undefined => None,
    }
}

/// Type name used in binding property maps for a base type.
pub fn property_type_of(base_type: &str) -> &'static str {
    match base_type {
        "INFOTABLE" => "InfoTable",
        _ => "property",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Span;

    fn keyword(name: &str) -> TypeNode {
        TypeNode::Keyword(name.to_string(), Span::SYNTHETIC)
    }

    fn reference(name: &str, arguments: Vec<TypeNode>) -> TypeNode {
        TypeNode::Reference {
            name: name.to_string(),
            arguments,
            span: Span::SYNTHETIC,
        }
    }

    #[test]
    fn test_wrappers_and_binding_targets() {
        let symbols = SymbolTable::new();
        let infotable = reference("INFOTABLE", vec![reference("GenericStringList", Vec::new())]);
        assert_eq!(base_type_of_type(&symbols, &infotable).as_deref(), Some("INFOTABLE"));

        let target = reference("BindingTarget", vec![reference("THINGNAME", vec![reference("Pump", Vec::new())])]);
        assert_eq!(base_type_of_type(&symbols, &target).as_deref(), Some("THINGNAME"));
        assert_eq!(base_type_of_type(&symbols, &reference("TWJSON", Vec::new())).as_deref(), Some("JSON"));
    }

    #[test]
    fn test_unions_collapse() {
        let symbols = SymbolTable::new();
        let optional = TypeNode::Union(vec![keyword("string"), keyword("undefined")], Span::SYNTHETIC);
        assert_eq!(base_type_of_type(&symbols, &optional).as_deref(), Some("STRING"));

        let literals = TypeNode::Union(
            vec![
                TypeNode::Literal(TypeLiteral::String("a".to_string()), Span::SYNTHETIC),
                TypeNode::Literal(TypeLiteral::String("b".to_string()), Span::SYNTHETIC),
            ],
            Span::SYNTHETIC,
        );
        assert_eq!(base_type_of_type(&symbols, &literals).as_deref(), Some("STRING"));

        let mixed = TypeNode::Union(vec![keyword("string"), keyword("number")], Span::SYNTHETIC);
        assert_eq!(base_type_of_type(&symbols, &mixed), None);
    }
}
