//! TypeScript parser using tree-sitter.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use super::ast::*;
use crate::diagnostic::{CompilerError, Span};

fn typescript_language() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx_language() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

/// Returns true when `path` should be parsed with the TSX grammar.
pub fn is_tsx(path: &Path) -> bool {
    path.extension().map(|e| e == "tsx").unwrap_or(false)
}

/// TypeScript parser.
pub struct TypeScriptParser {
    typescript: Parser,
    tsx: Parser,
}

impl TypeScriptParser {
    /// Creates a new TypeScript parser.
    pub fn new() -> Result<Self, CompilerError> {
        let mut typescript = Parser::new();
        typescript
            .set_language(&typescript_language())
            .map_err(|_| CompilerError::ParserInitFailed)?;
        let mut tsx = Parser::new();
        tsx.set_language(&tsx_language())
            .map_err(|_| CompilerError::ParserInitFailed)?;
        Ok(Self { typescript, tsx })
    }

    /// Parses a TypeScript source file.
    pub fn parse(&mut self, source: &str, path: &Path) -> Result<ParsedFile, CompilerError> {
        let parser = if is_tsx(path) {
            &mut self.tsx
        } else {
            &mut self.typescript
        };
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| CompilerError::ParseFailed { path: path.to_path_buf() })?;
        check_syntax(&tree, source, path)?;

        let visitor = Visitor::new(source);
        let statements = visitor.visit_program(tree.root_node());

        Ok(ParsedFile {
            path: path.to_path_buf(),
            source: source.to_string(),
            tree,
            statements,
        })
    }
}

/// Parses a standalone snippet of script code, used when generated or stored
/// code needs to be inspected again.
pub fn parse_script(source: &str, path: &Path) -> Result<Tree, CompilerError> {
    let mut parser = Parser::new();
    parser
        .set_language(&typescript_language())
        .map_err(|_| CompilerError::ParserInitFailed)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CompilerError::ParseFailed { path: path.to_path_buf() })?;
    check_syntax(&tree, source, path)?;
    Ok(tree)
}

fn check_syntax(tree: &Tree, source: &str, path: &Path) -> Result<(), CompilerError> {
    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }
    let node = first_error(root).unwrap_or(root);
    let text = node.utf8_text(source.as_bytes()).unwrap_or("");
    let message = if node.is_missing() {
        format!("missing '{}'", node.kind())
    } else {
        format!("unexpected '{}'", text.lines().next().unwrap_or(""))
    };
    Err(CompilerError::SyntaxError {
        message,
        file: path.to_path_buf(),
        line: node.start_position().row + 1,
        column: node.start_position().column + 1,
    })
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error)
}

/// Converts a tree-sitter node position into a [`Span`].
pub fn span_of(node: Node) -> Span {
    Span::new(
        node.start_byte(),
        node.end_byte(),
        node.start_position().row,
        node.start_position().column,
        node.end_position().row,
        node.end_position().column,
    )
}

/// Named children of `node`, without comments.
pub fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// Decodes the value of a `string` node.
pub fn string_value(node: Node, source: &str) -> String {
    let mut out = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let text = child.utf8_text(source.as_bytes()).unwrap_or("");
        match child.kind() {
            "string_fragment" => out.push_str(text),
            "escape_sequence" => out.push_str(&unescape(text)),
            _ => {}
        }
    }
    out
}

/// Decodes a single escape sequence such as `\n` or `é`.
pub fn unescape(sequence: &str) -> String {
    let body = sequence.strip_prefix('\\').unwrap_or(sequence);
    let mut chars = body.chars();
    match chars.next() {
        Some('n') => "\n".to_string(),
        Some('t') => "\t".to_string(),
        Some('r') => "\r".to_string(),
        Some('b') => "\u{8}".to_string(),
        Some('f') => "\u{c}".to_string(),
        Some('v') => "\u{b}".to_string(),
        Some('0') if body.len() == 1 => "\0".to_string(),
        Some('x') => u32::from_str_radix(&body[1..], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default(),
        Some('u') => {
            let hex = body[1..].trim_start_matches('{').trim_end_matches('}');
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        }
        Some('\r') | Some('\n') | Some('\u{2028}') | Some('\u{2029}') => String::new(),
        Some(c) => c.to_string(),
        None => String::new(),
    }
}

/// Parses a numeric literal, including hex, octal, binary and separators.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let radix = |prefix: &str, radix: u32| {
        lower
            .strip_prefix(prefix)
            .and_then(|digits| i64::from_str_radix(digits, radix).ok())
            .map(|v| v as f64)
    };
    if lower.starts_with("0x") {
        return radix("0x", 16);
    }
    if lower.starts_with("0o") {
        return radix("0o", 8);
    }
    if lower.starts_with("0b") {
        return radix("0b", 2);
    }
    lower.trim_end_matches('n').parse::<f64>().ok()
}

/// AST visitor that builds typed declarations from tree-sitter nodes.
struct Visitor<'a> {
    source: &'a str,
}

impl<'a> Visitor<'a> {
    fn new(source: &'a str) -> Self {
        Self { source }
    }

    fn span(&self, node: Node) -> Span {
        span_of(node)
    }

    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn has_token(&self, node: Node, token: &str) -> bool {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).any(|c| c.kind() == token);
        found
    }

    fn visit_program(&self, node: Node) -> Vec<Statement> {
        let mut statements = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(statement) = self.visit_statement(child) {
                statements.push(statement);
            }
        }
        statements
    }

    fn visit_statement(&self, node: Node) -> Option<Statement> {
        match node.kind() {
            "comment" | "empty_statement" | "hash_bang_line" | ";" => None,
            "import_statement" => Some(Statement::Import(self.visit_import(node))),
            "expression_statement" => {
                let children = named_children(node);
                match children.as_slice() {
                    [only] if only.kind() == "string" => Some(Statement::Directive {
                        value: string_value(*only, self.source),
                        span: self.span(node),
                    }),
                    _ => Some(Statement::Other {
                        kind: node.kind().to_string(),
                        span: self.span(node),
                    }),
                }
            }
            "export_statement" => {
                let decorators = self.decorators_of(node);
                match node.child_by_field_name("declaration") {
                    Some(declaration) => Some(self.visit_declaration(declaration, decorators, true, node)),
                    None => Some(Statement::Other {
                        kind: node.kind().to_string(),
                        span: self.span(node),
                    }),
                }
            }
            _ => Some(self.visit_declaration(node, Vec::new(), false, node)),
        }
    }

    fn visit_declaration(
        &self,
        node: Node,
        outer_decorators: Vec<Decorator>,
        exported: bool,
        doc_anchor: Node,
    ) -> Statement {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                let mut class = self.visit_class(node, outer_decorators, doc_anchor);
                class.exported = exported;
                Statement::Class(class)
            }
            "interface_declaration" => Statement::Interface(self.visit_interface(node)),
            "enum_declaration" => Statement::Enum(self.visit_enum(node)),
            "type_alias_declaration" => Statement::TypeAlias(TypeAlias {
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.node_text(n).to_string())
                    .unwrap_or_default(),
                type_node: node
                    .child_by_field_name("value")
                    .map(|n| self.visit_type(n))
                    .unwrap_or_else(|| TypeNode::Other(String::new(), self.span(node))),
                span: self.span(node),
            }),
            "lexical_declaration" | "variable_declaration" => {
                Statement::Variable(self.visit_variable_statement(node))
            }
            "function_declaration" | "generator_function_declaration" => Statement::Function(FunctionDecl {
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.node_text(n).to_string())
                    .unwrap_or_default(),
                span: self.span(node),
            }),
            kind => Statement::Other {
                kind: kind.to_string(),
                span: self.span(node),
            },
        }
    }

    fn visit_import(&self, node: Node) -> ImportDecl {
        let mut names = Vec::new();
        let mut source = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "string" => source = string_value(child, self.source),
                "import_clause" => self.collect_import_names(child, &mut names),
                _ => {}
            }
        }
        ImportDecl {
            names,
            source,
            span: self.span(node),
        }
    }

    fn collect_import_names(&self, node: Node, names: &mut Vec<String>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "identifier" => names.push(self.node_text(child).to_string()),
                "import_specifier" => {
                    let local = child
                        .child_by_field_name("alias")
                        .or_else(|| child.child_by_field_name("name"));
                    if let Some(local) = local {
                        names.push(self.node_text(local).to_string());
                    }
                }
                "named_imports" | "namespace_import" => self.collect_import_names(child, names),
                _ => {}
            }
        }
    }

    fn visit_variable_statement(&self, node: Node) -> VariableStatement {
        let kind = node
            .child(0)
            .map(|c| self.node_text(c).to_string())
            .unwrap_or_else(|| "var".to_string());
        let mut declarators = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "variable_declarator" {
                let name = child
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.node_text(n).to_string());
                declarators.push(VariableDeclarator {
                    name,
                    type_node: child.child_by_field_name("type").map(|t| self.visit_type(t)),
                    initializer: child.child_by_field_name("value").map(|v| self.visit_expression(v)),
                    span: self.span(child),
                });
            }
        }
        VariableStatement {
            kind,
            declarators,
            span: self.span(node),
        }
    }

    fn visit_interface(&self, node: Node) -> InterfaceDecl {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string())
            .unwrap_or_default();
        let mut extends = Vec::new();
        let mut members = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "extends_type_clause" => {
                    for base in named_children(child) {
                        extends.push(self.type_name(base));
                    }
                }
                "interface_body" | "object_type" => members = self.visit_type_members(child),
                _ => {}
            }
        }
        InterfaceDecl {
            name,
            extends,
            members,
            span: self.span(node),
        }
    }

    fn type_name(&self, node: Node) -> String {
        match node.kind() {
            "generic_type" => node
                .child_by_field_name("name")
                .map(|n| self.node_text(n).to_string())
                .unwrap_or_default(),
            _ => self.node_text(node).to_string(),
        }
    }

    fn visit_enum(&self, node: Node) -> EnumDecl {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string())
            .unwrap_or_default();
        let is_const = self.has_token(node, "const");
        let mut members = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for child in named_children(body) {
                match child.kind() {
                    "enum_assignment" => {
                        let key = child
                            .child_by_field_name("name")
                            .map(|n| self.property_name(n))
                            .unwrap_or_default();
                        members.push(EnumMember {
                            name: key,
                            initializer: child.child_by_field_name("value").map(|v| self.visit_expression(v)),
                            span: self.span(child),
                        });
                    }
                    _ => members.push(EnumMember {
                        name: self.property_name(child),
                        initializer: None,
                        span: self.span(child),
                    }),
                }
            }
        }
        EnumDecl {
            name,
            is_const,
            members,
            span: self.span(node),
        }
    }

    /// Text of a property name, with string keys unquoted.
    fn property_name(&self, node: Node) -> String {
        match node.kind() {
            "string" => string_value(node, self.source),
            _ => self.node_text(node).to_string(),
        }
    }

    fn decorators_of(&self, node: Node) -> Vec<Decorator> {
        let mut cursor = node.walk();
        let decorators: Vec<_> = node
            .children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .collect();
        decorators.into_iter().map(|d| self.visit_decorator(d)).collect()
    }

    fn visit_decorator(&self, node: Node) -> Decorator {
        let span = self.span(node);
        let inner = named_children(node).into_iter().next();
        match inner {
            Some(call) if call.kind() == "call_expression" => {
                let name = call
                    .child_by_field_name("function")
                    .map(|f| self.node_text(f).to_string())
                    .unwrap_or_default();
                let arguments = call
                    .child_by_field_name("arguments")
                    .map(|a| self.visit_arguments(a))
                    .unwrap_or_default();
                Decorator {
                    name,
                    arguments: Some(arguments),
                    span,
                }
            }
            Some(other) => Decorator {
                name: self.node_text(other).to_string(),
                arguments: None,
                span,
            },
            None => Decorator {
                name: String::new(),
                arguments: None,
                span,
            },
        }
    }

    /// Returns the JSDoc block directly preceding `node`, skipping decorators.
    fn leading_doc(&self, node: Node) -> Option<String> {
        let mut previous = node.prev_sibling();
        while let Some(sibling) = previous {
            match sibling.kind() {
                "comment" => {
                    let text = self.node_text(sibling);
                    if text.starts_with("/**") {
                        return Some(text.to_string());
                    }
                    previous = sibling.prev_sibling();
                }
                "decorator" => previous = sibling.prev_sibling(),
                _ => return None,
            }
        }
        None
    }

    fn visit_class(&self, node: Node, outer_decorators: Vec<Decorator>, doc_anchor: Node) -> ClassDecl {
        let name_node = node.child_by_field_name("name");
        let mut decorators = outer_decorators;
        decorators.extend(self.decorators_of(node));

        let mut heritage = Vec::new();
        let mut members = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "class_heritage" => {
                    for clause in named_children(child) {
                        if clause.kind() == "extends_clause" {
                            let mut clause_cursor = clause.walk();
                            for value in clause.children_by_field_name("value", &mut clause_cursor) {
                                heritage.push(self.visit_expression(value));
                            }
                        }
                    }
                }
                "class_body" => members = self.visit_class_body(child),
                _ => {}
            }
        }

        let doc = self
            .leading_doc(doc_anchor)
            .or_else(|| if doc_anchor != node { self.leading_doc(node) } else { None });

        ClassDecl {
            name: name_node.map(|n| self.node_text(n).to_string()),
            decorators,
            heritage,
            members,
            doc,
            exported: false,
            span: self.span(node),
            name_span: name_node.map(|n| self.span(n)).unwrap_or_else(|| self.span(node)),
        }
    }

    fn visit_class_body(&self, node: Node) -> Vec<ClassMember> {
        let mut members = Vec::new();
        let mut pending_decorators = Vec::new();
        let mut pending_doc: Option<String> = None;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "comment" => {
                    let text = self.node_text(child);
                    if text.starts_with("/**") {
                        pending_doc = Some(text.to_string());
                    }
                }
                "decorator" => pending_decorators.push(self.visit_decorator(child)),
                "method_definition" => {
                    let decorators = std::mem::take(&mut pending_decorators);
                    let doc = pending_doc.take();
                    members.push(ClassMember::Method(self.visit_method(child, decorators, doc)));
                }
                "public_field_definition" | "property_definition" => {
                    let doc = pending_doc.take();
                    let mut decorators = std::mem::take(&mut pending_decorators);
                    decorators.extend(self.decorators_of(child));
                    members.push(ClassMember::Property(self.visit_field(child, decorators, doc)));
                }
                "{" | "}" | ";" | "," => {}
                kind => {
                    pending_decorators.clear();
                    pending_doc = None;
                    members.push(ClassMember::Other {
                        kind: kind.to_string(),
                        span: self.span(child),
                    });
                }
            }
        }
        members
    }

    fn visit_field(&self, node: Node, decorators: Vec<Decorator>, doc: Option<String>) -> PropertyDecl {
        let mut is_static = false;
        let mut is_readonly = false;
        let mut is_override = false;
        let mut optional = false;
        let mut definite = false;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "static" => is_static = true,
                "readonly" => is_readonly = true,
                "override_modifier" => is_override = true,
                "?" => optional = true,
                "!" => definite = true,
                _ => {}
            }
        }

        PropertyDecl {
            name: node
                .child_by_field_name("name")
                .map(|n| self.property_name(n))
                .unwrap_or_default(),
            decorators,
            type_node: node.child_by_field_name("type").map(|t| self.visit_type(t)),
            initializer: node.child_by_field_name("value").map(|v| self.visit_expression(v)),
            is_static,
            is_readonly,
            is_override,
            optional,
            definite,
            doc,
            span: self.span(node),
        }
    }

    fn visit_method(&self, node: Node, decorators: Vec<Decorator>, doc: Option<String>) -> MethodDecl {
        let mut kind = MethodKind::Method;
        let mut is_async = false;
        let mut is_static = false;
        let mut is_override = false;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "async" => is_async = true,
                "static" => is_static = true,
                "override_modifier" => is_override = true,
                "get" => kind = MethodKind::Getter,
                "set" => kind = MethodKind::Setter,
                _ => {}
            }
        }

        let parameters = node
            .child_by_field_name("parameters")
            .map(|p| self.visit_parameters(p))
            .unwrap_or_default();

        MethodDecl {
            name: node
                .child_by_field_name("name")
                .map(|n| self.property_name(n))
                .unwrap_or_default(),
            decorators,
            parameters,
            return_type: node.child_by_field_name("return_type").map(|t| self.visit_type(t)),
            kind,
            is_async,
            is_static,
            is_override,
            body: node.child_by_field_name("body").map(|b| self.visit_body(b)),
            doc,
            span: self.span(node),
        }
    }

    fn visit_body(&self, node: Node) -> FunctionBody {
        let statements = named_children(node);
        let returns = statements
            .iter()
            .filter(|s| s.kind() == "return_statement")
            .filter_map(|s| named_children(*s).into_iter().next())
            .map(|e| self.visit_expression(e))
            .collect();
        FunctionBody {
            span: self.span(node),
            is_empty: statements.is_empty(),
            returns,
        }
    }

    fn visit_parameters(&self, node: Node) -> Vec<Parameter> {
        let mut parameters = Vec::new();
        for child in named_children(node) {
            if child.kind() != "required_parameter" && child.kind() != "optional_parameter" {
                continue;
            }
            let pattern = match child.child_by_field_name("pattern") {
                Some(p) if p.kind() == "identifier" => Pattern::Identifier(self.node_text(p).to_string()),
                Some(p) if p.kind() == "object_pattern" => Pattern::Object(self.visit_object_pattern(p)),
                Some(p) => Pattern::Other(self.span(p)),
                None => Pattern::Other(self.span(child)),
            };
            parameters.push(Parameter {
                pattern,
                type_node: child.child_by_field_name("type").map(|t| self.visit_type(t)),
                optional: child.kind() == "optional_parameter",
                default: child.child_by_field_name("value").map(|v| self.visit_expression(v)),
                span: self.span(child),
            });
        }
        parameters
    }

    fn visit_object_pattern(&self, node: Node) -> Vec<PatternProperty> {
        let mut properties = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "shorthand_property_identifier_pattern" => properties.push(PatternProperty {
                    name: self.node_text(child).to_string(),
                    alias: None,
                    default: None,
                    span: self.span(child),
                }),
                "object_assignment_pattern" => {
                    let name = child
                        .child_by_field_name("left")
                        .map(|l| self.node_text(l).to_string())
                        .unwrap_or_default();
                    properties.push(PatternProperty {
                        name,
                        alias: None,
                        default: child.child_by_field_name("right").map(|r| self.visit_expression(r)),
                        span: self.span(child),
                    });
                }
                "pair_pattern" => {
                    let name = child
                        .child_by_field_name("key")
                        .map(|k| self.property_name(k))
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("value")
                        .map(|v| self.node_text(v).to_string());
                    properties.push(PatternProperty {
                        name,
                        alias,
                        default: None,
                        span: self.span(child),
                    });
                }
                _ => properties.push(PatternProperty {
                    name: self.node_text(child).to_string(),
                    alias: Some(String::new()),
                    default: None,
                    span: self.span(child),
                }),
            }
        }
        properties
    }

    fn visit_type_members(&self, node: Node) -> Vec<TypeMember> {
        let mut members = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "property_signature" => members.push(TypeMember {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| self.property_name(n))
                        .unwrap_or_default(),
                    type_node: child.child_by_field_name("type").map(|t| self.visit_type(t)),
                    optional: self.has_token(child, "?"),
                    span: self.span(child),
                }),
                "method_signature" => members.push(TypeMember {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| self.property_name(n))
                        .unwrap_or_default(),
                    type_node: None,
                    optional: self.has_token(child, "?"),
                    span: self.span(child),
                }),
                _ => {}
            }
        }
        members
    }

    fn visit_type(&self, node: Node) -> TypeNode {
        let span = self.span(node);
        match node.kind() {
            "type_annotation" | "parenthesized_type" => match named_children(node).into_iter().next() {
                Some(inner) => self.visit_type(inner),
                None => TypeNode::Other(self.node_text(node).to_string(), span),
            },
            "predefined_type" => TypeNode::Keyword(self.node_text(node).to_string(), span),
            "type_identifier" | "nested_type_identifier" | "identifier" => {
                let name = self.node_text(node);
                if name == "undefined" {
                    TypeNode::Literal(TypeLiteral::Undefined, span)
                } else {
                    TypeNode::Reference {
                        name: name.to_string(),
                        arguments: Vec::new(),
                        span,
                    }
                }
            }
            "generic_type" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.node_text(n).to_string())
                    .unwrap_or_default();
                let arguments = node
                    .child_by_field_name("type_arguments")
                    .map(|args| named_children(args).into_iter().map(|a| self.visit_type(a)).collect())
                    .unwrap_or_default();
                TypeNode::Reference { name, arguments, span }
            }
            "literal_type" => match named_children(node).into_iter().next() {
                Some(inner) => TypeNode::Literal(self.type_literal(inner), span),
                None => TypeNode::Other(self.node_text(node).to_string(), span),
            },
            "string" | "number" | "true" | "false" | "null" | "undefined" => {
                TypeNode::Literal(self.type_literal(node), span)
            }
            "object_type" => TypeNode::ObjectLiteral(self.visit_type_members(node), span),
            "union_type" => {
                let mut variants = Vec::new();
                for child in named_children(node) {
                    match self.visit_type(child) {
                        TypeNode::Union(nested, _) => variants.extend(nested),
                        other => variants.push(other),
                    }
                }
                TypeNode::Union(variants, span)
            }
            "intersection_type" => TypeNode::Intersection(
                named_children(node).into_iter().map(|c| self.visit_type(c)).collect(),
                span,
            ),
            "array_type" => match named_children(node).into_iter().next() {
                Some(inner) => TypeNode::Array(Box::new(self.visit_type(inner)), span),
                None => TypeNode::Other(self.node_text(node).to_string(), span),
            },
            _ => TypeNode::Other(self.node_text(node).to_string(), span),
        }
    }

    fn type_literal(&self, node: Node) -> TypeLiteral {
        match node.kind() {
            "string" => TypeLiteral::String(string_value(node, self.source)),
            "number" => TypeLiteral::Number(parse_number(self.node_text(node)).unwrap_or(0.0)),
            "unary_expression" => {
                let value = node
                    .child_by_field_name("argument")
                    .and_then(|a| parse_number(self.node_text(a)))
                    .unwrap_or(0.0);
                TypeLiteral::Number(-value)
            }
            "true" => TypeLiteral::Bool(true),
            "false" => TypeLiteral::Bool(false),
            "null" => TypeLiteral::Null,
            _ => TypeLiteral::Undefined,
        }
    }

    fn visit_arguments(&self, node: Node) -> Vec<Expression> {
        named_children(node)
            .into_iter()
            .map(|a| self.visit_expression(a))
            .collect()
    }

    fn visit_expression(&self, node: Node) -> Expression {
        let span = self.span(node);
        match node.kind() {
            "identifier" | "property_identifier" | "shorthand_property_identifier" => {
                let name = self.node_text(node);
                if name == "undefined" {
                    Expression::Undefined(span)
                } else {
                    Expression::Identifier {
                        name: name.to_string(),
                        span,
                    }
                }
            }
            "undefined" => Expression::Undefined(span),
            "this" => Expression::This(span),
            "string" => Expression::String {
                value: string_value(node, self.source),
                span,
            },
            "template_string" => {
                let has_substitution = named_children(node)
                    .iter()
                    .any(|c| c.kind() == "template_substitution");
                if has_substitution {
                    Expression::Template(span)
                } else {
                    let mut value = String::new();
                    let mut cursor = node.walk();
                    for child in node.children(&mut cursor) {
                        match child.kind() {
                            "string_fragment" => value.push_str(self.node_text(child)),
                            "escape_sequence" => value.push_str(&unescape(self.node_text(child))),
                            _ => {}
                        }
                    }
                    Expression::String { value, span }
                }
            }
            "number" => Expression::Number {
                value: parse_number(self.node_text(node)).unwrap_or(f64::NAN),
                span,
            },
            "true" => Expression::Bool { value: true, span },
            "false" => Expression::Bool { value: false, span },
            "null" => Expression::Null(span),
            "member_expression" => {
                let object = node
                    .child_by_field_name("object")
                    .map(|o| self.visit_expression(o))
                    .unwrap_or(Expression::Other(span));
                let property = node
                    .child_by_field_name("property")
                    .map(|p| self.node_text(p).to_string())
                    .unwrap_or_default();
                Expression::Member {
                    object: Box::new(object),
                    property,
                    span,
                }
            }
            "subscript_expression" => {
                let object = node
                    .child_by_field_name("object")
                    .map(|o| self.visit_expression(o))
                    .unwrap_or(Expression::Other(span));
                let index = node
                    .child_by_field_name("index")
                    .map(|i| self.visit_expression(i))
                    .unwrap_or(Expression::Other(span));
                Expression::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                    span,
                }
            }
            "call_expression" => {
                let callee = node
                    .child_by_field_name("function")
                    .map(|f| self.visit_expression(f))
                    .unwrap_or(Expression::Other(span));
                let arguments = node
                    .child_by_field_name("arguments")
                    .filter(|a| a.kind() == "arguments")
                    .map(|a| self.visit_arguments(a))
                    .unwrap_or_default();
                Expression::Call {
                    callee: Box::new(callee),
                    arguments,
                    span,
                }
            }
            "new_expression" => {
                let callee = node
                    .child_by_field_name("constructor")
                    .map(|f| self.visit_expression(f))
                    .unwrap_or(Expression::Other(span));
                let arguments = node
                    .child_by_field_name("arguments")
                    .map(|a| self.visit_arguments(a))
                    .unwrap_or_default();
                Expression::New {
                    callee: Box::new(callee),
                    arguments,
                    span,
                }
            }
            "unary_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|o| self.node_text(o).to_string())
                    .unwrap_or_default();
                let argument = node
                    .child_by_field_name("argument")
                    .map(|a| self.visit_expression(a))
                    .unwrap_or(Expression::Other(span));
                Expression::Unary {
                    operator,
                    argument: Box::new(argument),
                    span,
                }
            }
            "binary_expression" => {
                let left = node
                    .child_by_field_name("left")
                    .map(|l| self.visit_expression(l))
                    .unwrap_or(Expression::Other(span));
                let right = node
                    .child_by_field_name("right")
                    .map(|r| self.visit_expression(r))
                    .unwrap_or(Expression::Other(span));
                let operator = node
                    .child_by_field_name("operator")
                    .map(|o| self.node_text(o).to_string())
                    .unwrap_or_default();
                Expression::Binary {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                    span,
                }
            }
            "parenthesized_expression" => match named_children(node).into_iter().next() {
                Some(inner) => self.visit_expression(inner),
                None => Expression::Other(span),
            },
            "object" => Expression::Object {
                members: self.visit_object_members(node),
                span,
            },
            "array" => Expression::Array {
                elements: named_children(node)
                    .into_iter()
                    .map(|e| self.visit_expression(e))
                    .collect(),
                span,
            },
            "spread_element" => {
                let argument = named_children(node)
                    .into_iter()
                    .next()
                    .map(|a| self.visit_expression(a))
                    .unwrap_or(Expression::Other(span));
                Expression::Spread {
                    argument: Box::new(argument),
                    span,
                }
            }
            "class" => Expression::Class(Box::new(self.visit_class(node, Vec::new(), node))),
            "arrow_function" => Expression::Function { is_arrow: true, span },
            "function_expression" | "function" | "generator_function" => {
                Expression::Function { is_arrow: false, span }
            }
            "as_expression" | "satisfies_expression" | "type_assertion" => {
                let children = named_children(node);
                let (expression, type_node) = if node.kind() == "type_assertion" {
                    let type_node = children
                        .first()
                        .and_then(|t| named_children(*t).into_iter().next())
                        .map(|t| self.visit_type(t));
                    (children.get(1).copied(), type_node)
                } else {
                    let type_node = children.get(1).map(|t| self.visit_type(*t));
                    (children.first().copied(), type_node)
                };
                let expression = expression
                    .map(|e| self.visit_expression(e))
                    .unwrap_or(Expression::Other(span));
                Expression::As {
                    expression: Box::new(expression),
                    type_node,
                    span,
                }
            }
            "non_null_expression" => match named_children(node).into_iter().next() {
                Some(inner) => self.visit_expression(inner),
                None => Expression::Other(span),
            },
            "jsx_element" | "jsx_self_closing_element" => Expression::Jsx(Box::new(self.visit_jsx_element(node))),
            _ => Expression::Other(span),
        }
    }

    fn visit_object_members(&self, node: Node) -> Vec<ObjectMember> {
        let mut members = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "pair" => {
                    let key = child.child_by_field_name("key");
                    let value = child.child_by_field_name("value");
                    match (key, value) {
                        (Some(key), Some(value)) if key.kind() != "computed_property_name" => {
                            members.push(ObjectMember::Property {
                                key: self.property_name(key),
                                value: self.visit_expression(value),
                                span: self.span(child),
                            })
                        }
                        _ => members.push(ObjectMember::Other(self.span(child))),
                    }
                }
                "shorthand_property_identifier" => members.push(ObjectMember::Shorthand {
                    name: self.node_text(child).to_string(),
                    span: self.span(child),
                }),
                "spread_element" => {
                    if let Some(argument) = named_children(child).into_iter().next() {
                        members.push(ObjectMember::Spread(self.visit_expression(argument)));
                    }
                }
                _ => members.push(ObjectMember::Other(self.span(child))),
            }
        }
        members
    }

    fn visit_jsx_element(&self, node: Node) -> JsxElement {
        let (tag, children) = if node.kind() == "jsx_element" {
            let open = node.child_by_field_name("open_tag").unwrap_or(node);
            let children = named_children(node)
                .into_iter()
                .filter(|c| c.kind() != "jsx_opening_element" && c.kind() != "jsx_closing_element")
                .filter_map(|c| self.visit_jsx_child(c))
                .collect();
            (open, children)
        } else {
            (node, Vec::new())
        };

        let name = tag
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string())
            .unwrap_or_default();

        let mut attributes = Vec::new();
        let mut cursor = tag.walk();
        for attribute in tag.children_by_field_name("attribute", &mut cursor) {
            if attribute.kind() == "jsx_attribute" {
                attributes.push(self.visit_jsx_attribute(attribute));
            }
        }

        JsxElement {
            name,
            attributes,
            children,
            span: self.span(node),
        }
    }

    fn visit_jsx_attribute(&self, node: Node) -> JsxAttribute {
        let children = named_children(node);
        let name = children
            .first()
            .map(|n| self.node_text(*n).to_string())
            .unwrap_or_default();
        let value = children.get(1).map(|v| match v.kind() {
            "jsx_expression" => match named_children(*v).into_iter().next() {
                Some(inner) => self.visit_expression(inner),
                None => Expression::Other(self.span(*v)),
            },
            _ => self.visit_expression(*v),
        });
        JsxAttribute {
            name,
            value,
            span: self.span(node),
        }
    }

    fn visit_jsx_child(&self, node: Node) -> Option<JsxChild> {
        match node.kind() {
            "jsx_element" | "jsx_self_closing_element" => Some(JsxChild::Element(self.visit_jsx_element(node))),
            "jsx_expression" => named_children(node)
                .into_iter()
                .next()
                .map(|e| JsxChild::Expression(self.visit_expression(e))),
            "jsx_text" => {
                let text = self.node_text(node).trim();
                if text.is_empty() {
                    None
                } else {
                    Some(JsxChild::Text(text.to_string(), self.span(node)))
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, &PathBuf::from("Test.ts")).unwrap()
    }

    fn only_class(file: &ParsedFile) -> &ClassDecl {
        file.classes().next().expect("a class")
    }

    #[test]
    fn test_class_with_decorators_and_heritage() {
        let file = parse(
            r#"
            /** A test thing */
            @ThingDefinition
            @valueStream("MyStream")
            class MyThing extends GenericThing {
                @persistent @logged color: STRING = "red";
            }
            "#,
        );
        let class = only_class(&file);
        assert_eq!(class.name.as_deref(), Some("MyThing"));
        assert_eq!(class.decorators.len(), 2);
        assert_eq!(class.decorators[0].name, "ThingDefinition");
        assert!(class.decorators[0].arguments.is_none());
        assert_eq!(class.decorators[1].name, "valueStream");
        assert_eq!(class.decorators[1].arguments.as_ref().unwrap().len(), 1);
        assert_eq!(class.heritage[0].as_identifier(), Some("GenericThing"));
        assert_eq!(class.doc.as_deref(), Some("/** A test thing */"));

        match &class.members[0] {
            ClassMember::Property(p) => {
                assert_eq!(p.name, "color");
                assert_eq!(p.decorators.len(), 2);
                assert!(matches!(p.type_node, Some(TypeNode::Reference { ref name, .. }) if name == "STRING"));
                assert_eq!(p.initializer.as_ref().and_then(|i| i.as_string()), Some("red"));
            }
            other => panic!("unexpected member {other:?}"),
        }
    }

    #[test]
    fn test_method_decorators_and_destructured_parameter() {
        let file = parse(
            r#"
            class A extends B {
                /**
                 * Does a thing.
                 */
                @final
                @override
                async doIt({ a, b = "x" }: { a: STRING; b?: STRING }) {
                    return 1;
                }
            }
            "#,
        );
        let class = only_class(&file);
        match &class.members[0] {
            ClassMember::Method(m) => {
                assert_eq!(m.name, "doIt");
                assert!(m.is_async);
                assert_eq!(m.decorators.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), ["final", "override"]);
                assert!(m.doc.as_deref().unwrap_or("").contains("Does a thing."));
                match &m.parameters[0].pattern {
                    Pattern::Object(props) => {
                        assert_eq!(props.len(), 2);
                        assert_eq!(props[1].name, "b");
                        assert!(props[1].default.is_some());
                    }
                    other => panic!("unexpected pattern {other:?}"),
                }
                match &m.parameters[0].type_node {
                    Some(TypeNode::ObjectLiteral(members, _)) => {
                        assert_eq!(members.len(), 2);
                        assert!(members[1].optional);
                    }
                    other => panic!("unexpected type {other:?}"),
                }
                assert_eq!(m.body.as_ref().unwrap().returns.len(), 1);
            }
            other => panic!("unexpected member {other:?}"),
        }
    }

    #[test]
    fn test_directive_and_const_enum() {
        let file = parse(
            r#"
            "use MyThing";
            const enum Color { Red = "red", Green = "green" }
            "#,
        );
        assert!(matches!(&file.statements[0], Statement::Directive { value, .. } if value == "use MyThing"));
        match &file.statements[1] {
            Statement::Enum(e) => {
                assert!(e.is_const);
                assert_eq!(e.members.len(), 2);
                assert_eq!(e.members[1].name, "Green");
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let mut parser = TypeScriptParser::new().unwrap();
        let result = parser.parse("class { ", &PathBuf::from("Broken.ts"));
        assert!(matches!(result, Err(CompilerError::SyntaxError { .. })));
    }

    #[test]
    fn test_jsx_elements() {
        let mut parser = TypeScriptParser::new().unwrap();
        let file = parser
            .parse(
                r#"
                class M extends MashupBase {
                    renderMashup() {
                        return <Mashup><Button ref={button} Label="Go" Clicked={[svc]} /></Mashup>;
                    }
                }
                "#,
                &PathBuf::from("M.tsx"),
            )
            .unwrap();
        let class = only_class(&file);
        let ClassMember::Method(method) = &class.members[0] else {
            panic!("expected method");
        };
        let body = method.body.as_ref().unwrap();
        match &body.returns[0] {
            Expression::Jsx(root) => {
                assert_eq!(root.name, "Mashup");
                let JsxChild::Element(button) = &root.children[0] else {
                    panic!("expected element");
                };
                assert_eq!(button.name, "Button");
                assert_eq!(button.attributes.len(), 3);
                assert_eq!(button.attributes[1].value.as_ref().and_then(|v| v.as_string()), Some("Go"));
                assert!(matches!(button.attributes[2].value, Some(Expression::Array { .. })));
            }
            other => panic!("unexpected return {other:?}"),
        }
    }

    #[test]
    fn test_access_path() {
        let file = parse("const x = Things[\"My Thing\"].GetData;");
        let Statement::Variable(v) = &file.statements[0] else {
            panic!("expected variable");
        };
        let path = v.declarators[0].initializer.as_ref().unwrap().access_path().unwrap();
        assert_eq!(path, vec!["Things", "My Thing", "GetData"]);
    }

    #[test]
    fn test_node_at_finds_method_body() {
        let file = parse("class A extends B { run() { return this.x; } }");
        let class = only_class(&file);
        let ClassMember::Method(method) = &class.members[0] else {
            panic!("expected method");
        };
        let body = method.body.as_ref().unwrap();
        let node = file.node_at(body.span).unwrap();
        assert_eq!(node.kind(), "statement_block");
    }

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("0x10"), Some(16.0));
        assert_eq!(parse_number("1_000"), Some(1000.0));
        assert_eq!(parse_number("2.5"), Some(2.5));
    }
}
