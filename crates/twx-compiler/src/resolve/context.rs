//! Per-file state shared by the resolvers and transformers.

use super::constant::{ConstantResolver, ConstantValue};
use super::symbols::SymbolTable;
use crate::config::CompilerConfig;
use crate::diagnostic::{CompilerError, Diagnostics, Span};
use crate::frontend::typescript::ast::{Expression, ParsedFile};
use crate::model::LiteralValue;

/// Everything a transformer needs while visiting one file.
pub struct FileContext<'a> {
    pub file: &'a ParsedFile,
    pub config: &'a CompilerConfig,
    pub symbols: &'a SymbolTable,
    pub diagnostics: Diagnostics,
}

impl<'a> FileContext<'a> {
    pub fn new(file: &'a ParsedFile, config: &'a CompilerConfig, symbols: &'a SymbolTable) -> Self {
        Self {
            file,
            config,
            symbols,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Builds a fatal error positioned at `span`.
    pub fn error(&self, span: Span, message: impl Into<String>) -> CompilerError {
        self.file.error(span, message)
    }

    pub fn text(&self, span: Span) -> &'a str {
        self.file.text(span)
    }

    pub fn constant(&mut self, expression: &Expression) -> ConstantValue {
        let config: &'a CompilerConfig = self.config;
        let resolver = ConstantResolver::new(self.symbols, &config.environment, &self.file.path);
        resolver.constant_value(expression, &mut self.diagnostics)
    }

    /// Resolves a constant that must exist; `undefined` yields `None`.
    pub fn required_constant(
        &mut self,
        expression: &Expression,
        what: &str,
    ) -> Result<Option<LiteralValue>, CompilerError> {
        match self.constant(expression) {
            ConstantValue::Value(value) => Ok(Some(value)),
            ConstantValue::ExplicitUndefined => Ok(None),
            ConstantValue::Unresolved => Err(self.error(
                expression.span(),
                format!("The {} must be a literal or a constant value", what),
            )),
        }
    }

    pub fn string_constant(&mut self, expression: &Expression, what: &str) -> Result<String, CompilerError> {
        match self.required_constant(expression, what)? {
            Some(LiteralValue::String(s)) => Ok(s),
            _ => Err(self.error(expression.span(), format!("The {} must be a string", what))),
        }
    }

    pub fn number_constant(&mut self, expression: &Expression, what: &str) -> Result<f64, CompilerError> {
        match self.required_constant(expression, what)? {
            Some(LiteralValue::Number(n)) => Ok(n),
            _ => Err(self.error(expression.span(), format!("The {} must be a number", what))),
        }
    }
}
