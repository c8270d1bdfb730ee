//! Compile-time constant resolution.

use std::path::Path;

use super::symbols::SymbolTable;
use crate::config::EnvSource;
use crate::diagnostic::Diagnostics;
use crate::frontend::typescript::ast::Expression;
use crate::model::LiteralValue;

/// Result of resolving an expression to a constant.
///
/// `ExplicitUndefined` means the author referred to something that is known
/// to have no value (a missing environment variable, a literal `undefined`);
/// callers omit the corresponding key. `Unresolved` means the expression is
/// not a compile-time constant at all, which callers usually report.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Value(LiteralValue),
    ExplicitUndefined,
    Unresolved,
}

impl ConstantValue {
    pub fn value(self) -> Option<LiteralValue> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Resolves literals, negated numbers, `const enum` members and
/// `process.env.NAME` references.
pub struct ConstantResolver<'a> {
    pub symbols: &'a SymbolTable,
    pub env: &'a EnvSource,
    pub file: &'a Path,
}

impl<'a> ConstantResolver<'a> {
    pub fn new(symbols: &'a SymbolTable, env: &'a EnvSource, file: &'a Path) -> Self {
        Self { symbols, env, file }
    }

    /// Never fails; a missing environment variable records a warning.
    pub fn constant_value(&self, expression: &Expression, diagnostics: &mut Diagnostics) -> ConstantValue {
        match expression {
            Expression::String { value, .. } => ConstantValue::Value(LiteralValue::String(value.clone())),
            Expression::Number { value, .. } => ConstantValue::Value(LiteralValue::Number(*value)),
            Expression::Bool { value, .. } => ConstantValue::Value(LiteralValue::Bool(*value)),
            Expression::Undefined(_) => ConstantValue::ExplicitUndefined,
            Expression::Unary { operator, argument, .. } => match (operator.as_str(), argument.as_ref()) {
                ("-", Expression::Number { value, .. }) => ConstantValue::Value(LiteralValue::Number(-value)),
                ("+", Expression::Number { value, .. }) => ConstantValue::Value(LiteralValue::Number(*value)),
                _ => ConstantValue::Unresolved,
            },
            Expression::As { expression, .. } => self.constant_value(expression, diagnostics),
            Expression::Member { span, .. } | Expression::Index { span, .. } => {
                let Some(path) = expression.access_path() else {
                    return ConstantValue::Unresolved;
                };
                match path.as_slice() {
                    [process, env, name] if process == "process" && env == "env" => match self.env.get(name) {
                        Some(value) => ConstantValue::Value(LiteralValue::String(value)),
                        None => {
                            diagnostics.warning(
                                self.file,
                                *span,
                                format!("Environment variable '{}' is not defined", name),
                            );
                            ConstantValue::ExplicitUndefined
                        }
                    },
                    [enum_name, member] => match self.symbols.const_enum_member(enum_name, member) {
                        Some(value) => ConstantValue::Value(value.clone()),
                        None => ConstantValue::Unresolved,
                    },
                    _ => ConstantValue::Unresolved,
                }
            }
            _ => ConstantValue::Unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::typescript::ast::{ParsedFile, Statement};
    use crate::frontend::typescript::parser::TypeScriptParser;
    use std::collections::HashMap;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("constants.ts")).unwrap()
    }

    fn initializers(file: &ParsedFile) -> Vec<Expression> {
        file.statements
            .iter()
            .filter_map(|s| match s {
                Statement::Variable(v) => v.declarators[0].initializer.clone(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_resolves_literals_enums_and_env() {
        let file = parse(
            r#"
            const enum Mode { Fast = "fast" }
            const a = -5;
            const b = Mode.Fast;
            const c = process.env.PLANT_NAME;
            const d = process.env.MISSING;
            const e = someCall();
            "#,
        );
        let mut symbols = SymbolTable::new();
        symbols.collect(0, &file);
        let env = EnvSource::Fixed(HashMap::from([("PLANT_NAME".to_string(), "Plant1".to_string())]));
        let resolver = ConstantResolver::new(&symbols, &env, Path::new("constants.ts"));
        let mut diagnostics = Diagnostics::new();

        let values: Vec<_> = initializers(&file)
            .iter()
            .map(|e| resolver.constant_value(e, &mut diagnostics))
            .collect();

        assert_eq!(values[0], ConstantValue::Value(LiteralValue::Number(-5.0)));
        assert_eq!(values[1], ConstantValue::Value(LiteralValue::String("fast".to_string())));
        assert_eq!(values[2], ConstantValue::Value(LiteralValue::String("Plant1".to_string())));
        assert_eq!(values[3], ConstantValue::ExplicitUndefined);
        assert_eq!(values[4], ConstantValue::Unresolved);

        assert_eq!(diagnostics.len(), 1);
        let warning = diagnostics.iter().next().unwrap();
        assert!(warning.message.contains("MISSING"));
        assert_eq!(warning.line, 6);
    }
}
