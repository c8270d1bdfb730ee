//! TypeScript-specific AST types.
//!
//! Only the shapes the entity and mashup transformers inspect are modelled
//! structurally. Everything else is kept as an opaque span into the source;
//! method bodies in particular are revisited through the retained
//! tree-sitter tree when they are rewritten.

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Tree};

use crate::diagnostic::{CompilerError, Span};

/// A parsed TypeScript file.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
    pub statements: Vec<Statement>,
}

impl ParsedFile {
    /// Source text covered by `span`, empty for synthetic spans.
    pub fn text(&self, span: Span) -> &str {
        span.text(&self.source).unwrap_or("")
    }

    /// Builds a positioned error for a node of this file.
    pub fn error(&self, span: Span, message: impl Into<String>) -> CompilerError {
        CompilerError::at_node(&self.path, &self.source, span, message)
    }

    /// Finds the concrete syntax node that produced `span`.
    pub fn node_at(&self, span: Span) -> Option<Node<'_>> {
        if span.is_synthetic() {
            return None;
        }
        let mut node = self.tree.root_node();
        loop {
            if node.start_byte() == span.start && node.end_byte() == span.end {
                return Some(node);
            }
            let mut cursor = node.walk();
            let next = node
                .children(&mut cursor)
                .find(|c| c.start_byte() <= span.start && c.end_byte() >= span.end)?;
            node = next;
        }
    }

    /// File name without directories or extension.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Class(class) => Some(class),
            _ => None,
        })
    }
}

pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.find('.') {
        Some(index) => name[..index].to_string(),
        None => name,
    }
}

/// A root-level statement.
#[derive(Debug, Clone)]
pub enum Statement {
    Import(ImportDecl),
    /// An expression statement consisting of a single string literal.
    Directive { value: String, span: Span },
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    TypeAlias(TypeAlias),
    Variable(VariableStatement),
    Function(FunctionDecl),
    Other { kind: String, span: Span },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Self::Import(i) => i.span,
            Self::Directive { span, .. } | Self::Other { span, .. } => *span,
            Self::Class(c) => c.span,
            Self::Interface(i) => i.span,
            Self::Enum(e) => e.span,
            Self::TypeAlias(t) => t.span,
            Self::Variable(v) => v.span,
            Self::Function(f) => f.span,
        }
    }
}

/// An import declaration.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub names: Vec<String>,
    pub source: String,
    pub span: Span,
}

/// A class declaration or anonymous class expression.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Option<String>,
    pub decorators: Vec<Decorator>,
    /// Values of the `extends` clause, in order.
    pub heritage: Vec<Expression>,
    pub members: Vec<ClassMember>,
    pub doc: Option<String>,
    pub exported: bool,
    pub span: Span,
    pub name_span: Span,
}

impl ClassDecl {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[derive(Debug, Clone)]
pub enum ClassMember {
    Property(PropertyDecl),
    Method(MethodDecl),
    Other { kind: String, span: Span },
}

impl ClassMember {
    pub fn span(&self) -> Span {
        match self {
            Self::Property(p) => p.span,
            Self::Method(m) => m.span,
            Self::Other { span, .. } => *span,
        }
    }
}

/// A class field.
#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub type_node: Option<TypeNode>,
    pub initializer: Option<Expression>,
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_override: bool,
    pub optional: bool,
    pub definite: bool,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

/// A class method.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeNode>,
    pub kind: MethodKind,
    pub is_async: bool,
    pub is_static: bool,
    pub is_override: bool,
    pub body: Option<FunctionBody>,
    pub doc: Option<String>,
    pub span: Span,
}

/// The block of a method or function.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub span: Span,
    pub is_empty: bool,
    /// Expressions of the block's own `return` statements.
    pub returns: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub pattern: Pattern,
    pub type_node: Option<TypeNode>,
    pub optional: bool,
    pub default: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier(String),
    Object(Vec<PatternProperty>),
    Other(Span),
}

/// One binding of an object destructuring pattern.
#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub name: String,
    /// Set when the property is renamed (`{ a: b }`).
    pub alias: Option<String>,
    pub default: Option<Expression>,
    pub span: Span,
}

/// A decorator, either bare (`@name`) or a factory call (`@name(args)`).
#[derive(Debug, Clone)]
pub struct Decorator {
    pub name: String,
    pub arguments: Option<Vec<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub extends: Vec<String>,
    pub members: Vec<TypeMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub is_const: bool,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub initializer: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeAlias {
    pub name: String,
    pub type_node: TypeNode,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariableStatement {
    /// `const`, `let` or `var`.
    pub kind: String,
    pub declarators: Vec<VariableDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub name: Option<String>,
    pub type_node: Option<TypeNode>,
    pub initializer: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub span: Span,
}

/// Type AST nodes.
#[derive(Debug, Clone)]
pub enum TypeNode {
    /// string, number, boolean, void, any...
    Keyword(String, Span),
    /// Named type with optional type arguments: `INFOTABLE<Shape>`.
    Reference {
        name: String,
        arguments: Vec<TypeNode>,
        span: Span,
    },
    Literal(TypeLiteral, Span),
    ObjectLiteral(Vec<TypeMember>, Span),
    Union(Vec<TypeNode>, Span),
    Intersection(Vec<TypeNode>, Span),
    Array(Box<TypeNode>, Span),
    Other(String, Span),
}

impl TypeNode {
    pub fn span(&self) -> Span {
        match self {
            Self::Keyword(_, span)
            | Self::Literal(_, span)
            | Self::ObjectLiteral(_, span)
            | Self::Union(_, span)
            | Self::Intersection(_, span)
            | Self::Array(_, span)
            | Self::Other(_, span) => *span,
            Self::Reference { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeLiteral {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Undefined,
}

/// A member of an object type or interface.
#[derive(Debug, Clone)]
pub struct TypeMember {
    pub name: String,
    pub type_node: Option<TypeNode>,
    pub optional: bool,
    pub span: Span,
}

/// Expression nodes.
#[derive(Debug, Clone)]
pub enum Expression {
    Identifier { name: String, span: Span },
    This(Span),
    String { value: String, span: Span },
    /// A template literal with substitutions.
    Template(Span),
    Number { value: f64, span: Span },
    Bool { value: bool, span: Span },
    Null(Span),
    Undefined(Span),
    Member {
        object: Box<Expression>,
        property: String,
        span: Span,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        span: Span,
    },
    New {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        span: Span,
    },
    Unary {
        operator: String,
        argument: Box<Expression>,
        span: Span,
    },
    Binary {
        left: Box<Expression>,
        operator: String,
        right: Box<Expression>,
        span: Span,
    },
    Object {
        members: Vec<ObjectMember>,
        span: Span,
    },
    Array {
        elements: Vec<Expression>,
        span: Span,
    },
    Spread {
        argument: Box<Expression>,
        span: Span,
    },
    Class(Box<ClassDecl>),
    /// Arrow functions and function expressions.
    Function { is_arrow: bool, span: Span },
    /// `expr as T`, `expr satisfies T` and `<T>expr`.
    As {
        expression: Box<Expression>,
        type_node: Option<TypeNode>,
        span: Span,
    },
    Jsx(Box<JsxElement>),
    Other(Span),
}

#[derive(Debug, Clone)]
pub enum ObjectMember {
    Property {
        key: String,
        value: Expression,
        span: Span,
    },
    Shorthand { name: String, span: Span },
    Spread(Expression),
    Other(Span),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Self::Identifier { span, .. }
            | Self::String { span, .. }
            | Self::Number { span, .. }
            | Self::Bool { span, .. }
            | Self::Member { span, .. }
            | Self::Index { span, .. }
            | Self::Call { span, .. }
            | Self::New { span, .. }
            | Self::Unary { span, .. }
            | Self::Binary { span, .. }
            | Self::Object { span, .. }
            | Self::Array { span, .. }
            | Self::Spread { span, .. }
            | Self::Function { span, .. }
            | Self::As { span, .. } => *span,
            Self::This(span)
            | Self::Template(span)
            | Self::Null(span)
            | Self::Undefined(span)
            | Self::Other(span) => *span,
            Self::Class(class) => class.span,
            Self::Jsx(element) => element.span,
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Flattens `a.b["c"].d` into `["a", "b", "c", "d"]`.
    ///
    /// Returns `None` when any link of the chain is not an identifier,
    /// a property access or a string-literal element access.
    pub fn access_path(&self) -> Option<Vec<String>> {
        match self {
            Self::Identifier { name, .. } => Some(vec![name.clone()]),
            Self::This(_) => Some(vec!["this".to_string()]),
            Self::Member { object, property, .. } => {
                let mut path = object.access_path()?;
                path.push(property.clone());
                Some(path)
            }
            Self::Index { object, index, .. } => {
                let key = index.as_string()?;
                let mut path = object.access_path()?;
                path.push(key.to_string());
                Some(path)
            }
            _ => None,
        }
    }

    /// Strips type assertions, returning the innermost expression.
    pub fn without_assertions(&self) -> &Expression {
        match self {
            Self::As { expression, .. } => expression.without_assertions(),
            other => other,
        }
    }
}

/// A JSX element, self-closing or not.
#[derive(Debug, Clone)]
pub struct JsxElement {
    pub name: String,
    pub attributes: Vec<JsxAttribute>,
    pub children: Vec<JsxChild>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct JsxAttribute {
    pub name: String,
    /// `None` for a bare attribute such as `<Button disabled />`.
    pub value: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum JsxChild {
    Element(JsxElement),
    Expression(Expression),
    Text(String, Span),
}
