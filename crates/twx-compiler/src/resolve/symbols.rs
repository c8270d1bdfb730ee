//! Declarations shared by every file of a compilation.
//!
//! Filled by a pre-pass over all parsed files before any entity is built, so
//! enum constants and interface shapes resolve regardless of file order.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::diagnostic::Span;
use crate::frontend::typescript::ast::*;
use crate::model::LiteralValue;

/// A root-level function that can be inlined into services.
#[derive(Debug, Clone)]
pub struct GlobalFunction {
    pub name: String,
    /// Index of the declaring file in the session.
    pub unit: usize,
    pub span: Span,
}

#[derive(Debug, Clone)]
struct EnumSymbol {
    is_const: bool,
    members: IndexMap<String, LiteralValue>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    enums: HashMap<String, EnumSymbol>,
    interfaces: HashMap<String, InterfaceDecl>,
    type_aliases: HashMap<String, TypeNode>,
    classes: HashMap<String, Vec<TypeMember>>,
    functions: IndexMap<String, GlobalFunction>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the declarations of one file.
    pub fn collect(&mut self, unit: usize, file: &ParsedFile) {
        for statement in &file.statements {
            match statement {
                Statement::Enum(decl) => {
                    self.enums.insert(decl.name.clone(), enum_symbol(decl));
                }
                Statement::Interface(decl) => {
                    self.interfaces.insert(decl.name.clone(), decl.clone());
                }
                Statement::TypeAlias(alias) => {
                    self.type_aliases.insert(alias.name.clone(), alias.type_node.clone());
                }
                Statement::Class(class) => {
                    if let Some(name) = &class.name {
                        self.classes.insert(name.clone(), class_members(class));
                    }
                }
                Statement::Function(function) if !function.name.is_empty() => {
                    self.functions.insert(
                        function.name.clone(),
                        GlobalFunction {
                            name: function.name.clone(),
                            unit,
                            span: function.span,
                        },
                    );
                }
                _ => {}
            }
        }
    }

    /// Value of a `const enum` member.
    pub fn const_enum_member(&self, enum_name: &str, member: &str) -> Option<&LiteralValue> {
        self.enums
            .get(enum_name)
            .filter(|e| e.is_const)
            .and_then(|e| e.members.get(member))
    }

    /// Flattened members of a named interface, object type alias or class.
    pub fn members_of_type(&self, name: &str) -> Option<Vec<TypeMember>> {
        self.members_of_type_at_depth(name, 0)
    }

    fn members_of_type_at_depth(&self, name: &str, depth: usize) -> Option<Vec<TypeMember>> {
        if depth > 16 {
            return None;
        }
        if let Some(interface) = self.interfaces.get(name) {
            let mut members = Vec::new();
            for base in &interface.extends {
                if let Some(inherited) = self.members_of_type_at_depth(base, depth + 1) {
                    members.extend(inherited);
                }
            }
            for member in &interface.members {
                members.retain(|m: &TypeMember| m.name != member.name);
                members.push(member.clone());
            }
            return Some(members);
        }
        if let Some(alias) = self.type_aliases.get(name) {
            return match alias {
                TypeNode::ObjectLiteral(members, _) => Some(members.clone()),
                TypeNode::Reference { name, .. } => self.members_of_type_at_depth(name, depth + 1),
                _ => None,
            };
        }
        self.classes.get(name).cloned()
    }

    pub fn type_alias(&self, name: &str) -> Option<&TypeNode> {
        self.type_aliases.get(name)
    }

    pub fn global_function(&self, name: &str) -> Option<&GlobalFunction> {
        self.functions.get(name)
    }
}

fn enum_symbol(decl: &EnumDecl) -> EnumSymbol {
    let mut members = IndexMap::new();
    let mut next_number = 0.0;
    for member in &decl.members {
        let value = match member.initializer.as_ref().map(|e| e.without_assertions()) {
            None => Some(LiteralValue::Number(next_number)),
            Some(Expression::Number { value, .. }) => Some(LiteralValue::Number(*value)),
            Some(Expression::String { value, .. }) => Some(LiteralValue::String(value.clone())),
            Some(Expression::Unary { operator, argument, .. }) if operator == "-" => match argument.as_ref() {
                Expression::Number { value, .. } => Some(LiteralValue::Number(-value)),
                _ => None,
            },
            Some(Expression::Identifier { name, .. }) => members.get(name).cloned(),
            _ => None,
        };
        if let Some(value) = value {
            if let LiteralValue::Number(n) = value {
                next_number = n + 1.0;
            }
            members.insert(member.name.clone(), value);
        }
    }
    EnumSymbol {
        is_const: decl.is_const,
        members,
    }
}

fn class_members(class: &ClassDecl) -> Vec<TypeMember> {
    class
        .members
        .iter()
        .filter_map(|member| match member {
            ClassMember::Property(p) if !p.is_static => Some(TypeMember {
                name: p.name.clone(),
                type_node: p.type_node.clone(),
                optional: p.optional,
                span: p.span,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::typescript::parser::TypeScriptParser;
    use std::path::Path;

    fn table(source: &str) -> SymbolTable {
        let mut parser = TypeScriptParser::new().unwrap();
        let file = parser.parse(source, Path::new("symbols.ts")).unwrap();
        let mut symbols = SymbolTable::new();
        symbols.collect(0, &file);
        symbols
    }

    #[test]
    fn test_const_enum_values() {
        let symbols = table(
            r#"
            const enum Limits { Low = 10, Mid, High = 100 }
            const enum Units { Speed = "km/h" }
            enum Runtime { A = 1 }
            "#,
        );
        assert_eq!(symbols.const_enum_member("Limits", "Mid"), Some(&LiteralValue::Number(11.0)));
        assert_eq!(
            symbols.const_enum_member("Units", "Speed"),
            Some(&LiteralValue::String("km/h".to_string()))
        );
        assert_eq!(symbols.const_enum_member("Runtime", "A"), None);
    }

    #[test]
    fn test_interface_members_are_flattened() {
        let symbols = table(
            r#"
            interface Base { id: STRING }
            interface Params extends Base { count?: NUMBER }
            "#,
        );
        let members = symbols.members_of_type("Params").unwrap();
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["id", "count"]);
        assert!(members[1].optional);
    }

    #[test]
    fn test_root_functions_are_recorded_with_their_unit() {
        let mut parser = TypeScriptParser::new().unwrap();
        let file = parser
            .parse("function clamp(v) { return v; }\nclass A extends ThingShapeBase {}", Path::new("g.ts"))
            .unwrap();
        let mut symbols = SymbolTable::new();
        symbols.collect(3, &file);
        let clamp = symbols.global_function("clamp").unwrap();
        assert_eq!(clamp.unit, 3);
        assert!(symbols.global_function("A").is_none());
    }
}
