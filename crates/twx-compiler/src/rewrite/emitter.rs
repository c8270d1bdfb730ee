//! Rewrites method bodies into plain script for the target runtime.
//!
//! The emitter walks the concrete syntax tree and copies source text between
//! children verbatim, so formatting and comments survive. Nodes that need a
//! different shape are re-emitted:
//!
//! - `this` becomes `me` unless a non-arrow function or class rebinds it
//! - type-only syntax is erased and `let`/`const` become `var`, renaming
//!   block-scoped bindings that would clash once hoisted
//! - template strings become string concatenation
//! - array, call and object spread become `__spread`/`__assign` calls
//! - in debug builds, statement-level expressions get a checkpoint call

use tree_sitter::Node;

use super::breakpoints::FileBreakpoints;
use super::scope::{self, Renames};
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::ParsedFile;
use crate::frontend::typescript::parser::{named_children, span_of, unescape};

pub const SELF_REFERENCE: &str = "me";

/// Nodes that give `this` a new meaning.
const FUNCTION_BOUNDARIES: &[&str] = &[
    "function_expression",
    "function",
    "function_declaration",
    "generator_function",
    "generator_function_declaration",
    "method_definition",
    "class",
    "class_declaration",
    "abstract_class_declaration",
];

/// Type-only nodes removed from the output.
const ERASED: &[&str] = &[
    "type_annotation",
    "type_arguments",
    "type_parameters",
    "interface_declaration",
    "type_alias_declaration",
    "accessibility_modifier",
    "override_modifier",
    "decorator",
    "import_statement",
    "ambient_declaration",
    "asserts_annotation",
    "type_predicate_annotation",
];

pub struct Emitter<'f, 'b> {
    file: &'f ParsedFile,
    breakpoints: Option<&'b mut FileBreakpoints>,
    me_scope: Vec<bool>,
    renames: Renames,
}

impl<'f, 'b> Emitter<'f, 'b> {
    /// Checkpoints are inserted when `breakpoints` is given.
    pub fn new(file: &'f ParsedFile, breakpoints: Option<&'b mut FileBreakpoints>) -> Self {
        Self {
            file,
            breakpoints,
            me_scope: vec![false],
            renames: Renames::default(),
        }
    }

    /// Emits the statements of a block without its braces.
    pub fn emit_block_contents(&mut self, block: Node<'f>) -> Result<String, CompilerError> {
        let inner: Vec<Node<'f>> = children(block)
            .into_iter()
            .filter(|c| c.kind() != "{" && c.kind() != "}")
            .collect();
        self.renames = scope::analyze(self.file, block)?;
        self.emit_in_me_scope(&inner)
    }

    /// Emits a whole program without its leading directive.
    pub fn emit_program(&mut self, root: Node<'f>) -> Result<String, CompilerError> {
        let mut statements = children(root);
        let directive = statements
            .iter()
            .position(|c| c.kind() != "comment")
            .filter(|&i| is_directive(statements[i]));
        if let Some(index) = directive {
            statements.remove(index);
        }
        self.renames = scope::analyze(self.file, root)?;
        self.emit_in_me_scope(&statements)
    }

    /// Emits one declaration on its own.
    pub fn emit(&mut self, node: Node<'f>) -> Result<String, CompilerError> {
        self.renames = scope::analyze(self.file, node)?;
        self.emit_text(node)
    }

    fn emit_text(&mut self, node: Node<'f>) -> Result<String, CompilerError> {
        let mut out = String::new();
        self.emit_into(node, &mut out)?;
        Ok(out)
    }

    fn emit_in_me_scope(&mut self, nodes: &[Node<'f>]) -> Result<String, CompilerError> {
        let mut out = String::new();
        let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
            return Ok(out);
        };
        self.me_scope.push(true);
        let mut cursor = first.start_byte();
        for node in nodes {
            out.push_str(self.slice(cursor, node.start_byte()));
            self.emit_into(*node, &mut out)?;
            cursor = node.end_byte();
        }
        out.push_str(self.slice(cursor, last.end_byte()));
        self.me_scope.pop();
        Ok(out)
    }

    fn emit_into(&mut self, node: Node<'f>, out: &mut String) -> Result<(), CompilerError> {
        let kind = node.kind();
        if ERASED.contains(&kind) {
            return Ok(());
        }
        match kind {
            "this" => {
                out.push_str(if self.in_me_scope() { SELF_REFERENCE } else { "this" });
                Ok(())
            }
            "identifier" => {
                out.push_str(self.renames.get(node).unwrap_or_else(|| self.text(node)));
                Ok(())
            }
            "shorthand_property_identifier" | "shorthand_property_identifier_pattern" => {
                match self.renames.get(node) {
                    Some(renamed) => out.push_str(&format!("{}: {}", self.text(node), renamed)),
                    None => out.push_str(self.text(node)),
                }
                Ok(())
            }
            "as_expression" | "satisfies_expression" | "non_null_expression" | "await_expression" => {
                match named_children(node).first() {
                    Some(inner) => self.emit_into(*inner, out),
                    None => Ok(()),
                }
            }
            "type_assertion" => match named_children(node).last() {
                Some(inner) => self.emit_into(*inner, out),
                None => Ok(()),
            },
            "export_statement" => match node.child_by_field_name("declaration") {
                Some(declaration) => self.emit_into(declaration, out),
                None => Ok(()),
            },
            "template_string" => self.lower_template(node, out),
            "array" if has_spread(node) => {
                let segments = self.spread_segments(node)?;
                out.push_str(&format!("__spread({})", segments.join(", ")));
                Ok(())
            }
            "object" if has_spread(node) => self.lower_object_spread(node, out),
            "call_expression" => self.emit_call(node, out),
            "new_expression" => {
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    if has_spread(arguments) {
                        return Err(self.error(node, "Spread arguments cannot be used with 'new'"));
                    }
                }
                self.emit_generic(node, out)
            }
            _ if FUNCTION_BOUNDARIES.contains(&kind) => {
                self.me_scope.push(false);
                let result = self.emit_generic(node, out);
                self.me_scope.pop();
                result
            }
            _ => self.emit_generic(node, out),
        }
    }

    fn emit_generic(&mut self, node: Node<'f>, out: &mut String) -> Result<(), CompilerError> {
        let nodes = children(node);
        if nodes.is_empty() {
            out.push_str(self.text(node));
            return Ok(());
        }
        let mut cursor = node.start_byte();
        for child in nodes {
            out.push_str(self.slice(cursor, child.start_byte()));
            cursor = child.end_byte();
            if child.is_named() {
                if self.checkpoints_enabled() && is_checkpoint_position(node, child) {
                    self.emit_checkpoint(child, out)?;
                } else {
                    self.emit_into(child, out)?;
                }
                continue;
            }
            match (node.kind(), child.kind()) {
                (_, "async") | (_, "declare") | (_, "readonly") => {}
                ("optional_parameter", "?") | ("variable_declarator", "!") | ("public_field_definition", "!") => {}
                ("lexical_declaration", "let" | "const") | ("for_in_statement", "let" | "const") => {
                    out.push_str("var");
                }
                _ => out.push_str(self.text(child)),
            }
        }
        out.push_str(self.slice(cursor, node.end_byte()));
        Ok(())
    }

    fn emit_checkpoint(&mut self, node: Node<'f>, out: &mut String) -> Result<(), CompilerError> {
        let id = match self.breakpoints.as_deref_mut() {
            Some(breakpoints) => breakpoints.record(span_of(node)),
            None => return self.emit_into(node, out),
        };
        out.push_str(&format!("(__d.checkpoint(\"{}\"), ", id));
        self.emit_into(node, out)?;
        out.push(')');
        Ok(())
    }

    fn emit_call(&mut self, node: Node<'f>, out: &mut String) -> Result<(), CompilerError> {
        let (Some(callee), Some(arguments)) = (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) else {
            return self.emit_generic(node, out);
        };
        if arguments.kind() == "template_string" {
            return Err(self.error(node, "Tagged template literals are not supported"));
        }
        if !has_spread(arguments) {
            return self.emit_generic(node, out);
        }

        let spread = format!("__spread({})", self.spread_segments(arguments)?.join(", "));
        let callee_text = self.emit_text(callee)?;
        match callee.kind() {
            "member_expression" | "subscript_expression" => {
                let receiver = callee
                    .child_by_field_name("object")
                    .filter(|r| matches!(r.kind(), "identifier" | "this"))
                    .ok_or_else(|| {
                        self.error(
                            node,
                            "Spread arguments require the method to be called on a variable or 'this'",
                        )
                    })?;
                let receiver_text = self.emit_text(receiver)?;
                out.push_str(&format!("{}.apply({}, {})", callee_text, receiver_text, spread));
            }
            _ => out.push_str(&format!("{}.apply(void 0, {})", callee_text, spread)),
        }
        Ok(())
    }

    /// Splits array elements or call arguments into `[plain, ...]` runs and
    /// spread operands.
    fn spread_segments(&mut self, node: Node<'f>) -> Result<Vec<String>, CompilerError> {
        let mut segments = Vec::new();
        let mut pending = Vec::new();
        for element in named_children(node) {
            if element.kind() == "spread_element" {
                if !pending.is_empty() {
                    segments.push(format!("[{}]", pending.join(", ")));
                    pending.clear();
                }
                segments.push(self.emit_spread_operand(element)?);
            } else {
                pending.push(self.emit_text(element)?);
            }
        }
        if !pending.is_empty() {
            segments.push(format!("[{}]", pending.join(", ")));
        }
        Ok(segments)
    }

    fn lower_object_spread(&mut self, node: Node<'f>, out: &mut String) -> Result<(), CompilerError> {
        let mut segments = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for member in named_children(node) {
            if member.kind() == "spread_element" {
                if !pending.is_empty() {
                    segments.push(format!("{{ {} }}", pending.join(", ")));
                    pending.clear();
                }
                if segments.is_empty() {
                    segments.push("{}".to_string());
                }
                segments.push(self.emit_spread_operand(member)?);
            } else {
                pending.push(self.emit_text(member)?);
            }
        }
        if !pending.is_empty() {
            segments.push(format!("{{ {} }}", pending.join(", ")));
        }

        let mut segments = segments.into_iter();
        let mut merged = segments.next().unwrap_or_else(|| "{}".to_string());
        for segment in segments {
            merged = format!("__assign({}, {})", merged, segment);
        }
        out.push_str(&merged);
        Ok(())
    }

    fn emit_spread_operand(&mut self, spread: Node<'f>) -> Result<String, CompilerError> {
        match named_children(spread).first() {
            Some(operand) => self.emit_text(*operand),
            None => Err(self.error(spread, "Spread element without an operand")),
        }
    }

    fn lower_template(&mut self, node: Node<'f>, out: &mut String) -> Result<(), CompilerError> {
        let end = node.end_byte().saturating_sub(1);
        let mut cursor = node.start_byte() + 1;
        let mut parts: Vec<String> = Vec::new();
        let mut literal = String::new();
        for child in children(node) {
            match child.kind() {
                "template_substitution" => {
                    literal.push_str(self.slice(cursor, child.start_byte()));
                    if !literal.is_empty() || parts.is_empty() {
                        parts.push(quote(&literal));
                    }
                    literal.clear();
                    if let Some(expression) = named_children(child).first() {
                        parts.push(format!("({})", self.emit_text(*expression)?));
                    }
                    cursor = child.end_byte();
                }
                "escape_sequence" => {
                    literal.push_str(self.slice(cursor, child.start_byte()));
                    literal.push_str(&unescape(self.text(child)));
                    cursor = child.end_byte();
                }
                _ => {}
            }
        }
        literal.push_str(self.slice(cursor, end));
        if !literal.is_empty() || parts.is_empty() {
            parts.push(quote(&literal));
        }

        if parts.len() == 1 {
            out.push_str(&parts[0]);
        } else {
            out.push('(');
            out.push_str(&parts.join(" + "));
            out.push(')');
        }
        Ok(())
    }

    fn in_me_scope(&self) -> bool {
        self.me_scope.last().copied().unwrap_or(false)
    }

    fn checkpoints_enabled(&self) -> bool {
        self.breakpoints.is_some()
    }

    fn text(&self, node: Node) -> &'f str {
        self.slice(node.start_byte(), node.end_byte())
    }

    fn slice(&self, start: usize, end: usize) -> &'f str {
        let source: &'f str = &self.file.source;
        if start >= end {
            return "";
        }
        source.get(start..end).unwrap_or("")
    }

    fn error(&self, node: Node, message: &str) -> CompilerError {
        self.file.error(span_of(node), message)
    }
}

/// Whether `child` of `parent` is a statement-level expression that gets a
/// debug checkpoint.
fn is_checkpoint_position(parent: Node, child: Node) -> bool {
    if child.kind() == "comment" {
        return false;
    }
    match parent.kind() {
        "expression_statement" | "return_statement" | "throw_statement" => true,
        "variable_declarator" => parent.child_by_field_name("value") == Some(child),
        "for_statement" => {
            child.kind() != "empty_statement"
                && (parent.child_by_field_name("condition") == Some(child)
                    || parent.child_by_field_name("increment") == Some(child))
        }
        "for_in_statement" => parent.child_by_field_name("right") == Some(child),
        "parenthesized_expression" => {
            let field = match parent.parent().map(|grand| grand.kind()) {
                Some("if_statement" | "while_statement" | "do_statement") => "condition",
                Some("switch_statement") => "value",
                _ => return false,
            };
            parent.parent().and_then(|grand| grand.child_by_field_name(field)) == Some(parent)
        }
        _ => false,
    }
}

fn is_directive(statement: Node) -> bool {
    statement.kind() == "expression_statement"
        && named_children(statement)
            .first()
            .map(|expression| expression.kind() == "string")
            .unwrap_or(false)
}

fn has_spread(node: Node) -> bool {
    named_children(node).iter().any(|c| c.kind() == "spread_element")
}

fn children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::typescript::ast::ClassMember;
    use crate::frontend::typescript::parser::TypeScriptParser;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("Entity.ts")).unwrap()
    }

    fn first_body(file: &ParsedFile) -> Node<'_> {
        let class = file.classes().next().unwrap();
        let ClassMember::Method(method) = &class.members[0] else {
            panic!("expected a method");
        };
        file.node_at(method.body.as_ref().unwrap().span).unwrap()
    }

    fn emit_body(source: &str) -> Result<String, CompilerError> {
        let file = parse(source);
        let body = first_body(&file);
        Emitter::new(&file, None).emit_block_contents(body)
    }

    #[test]
    fn test_this_stops_at_function_boundaries() {
        let code = emit_body(
            r#"class A { run() {
                this.x = 1;
                const f = function () { return this.y; };
                const g = () => this.z;
                const o = { m() { return this.w; } };
            } }"#,
        )
        .unwrap();
        assert!(code.contains("me.x = 1;"));
        assert!(code.contains("var f = function () { return this.y; };"));
        assert!(code.contains("var g = () => me.z;"));
        assert!(code.contains("return this.w;"));
    }

    #[test]
    fn test_type_syntax_is_erased() {
        let code = emit_body(
            r#"class A { async run() {
                let a: number = <number>b as any;
                const c = d!;
                const e = await this.load<STRING>(c);
            } }"#,
        )
        .unwrap();
        assert!(code.contains("var a = b;"));
        assert!(code.contains("var c = d;"));
        assert!(code.contains("var e = me.load(c);"));
    }

    #[test]
    fn test_template_strings_become_concatenation() {
        let code = emit_body("class A { run() { const s = `a${this.b}c\\n`; const t = `${x}`; } }").unwrap();
        assert!(code.contains(r#"var s = ("a" + (me.b) + "c\n");"#));
        assert!(code.contains(r#"var t = ("" + (x));"#));
    }

    #[test]
    fn test_spread_lowering() {
        let code = emit_body(
            r#"class A { run() {
                f(...xs);
                this.m(1, ...ys);
                const arr = [1, ...xs, 2];
                const o = { a: 1, ...p, b: 2 };
                const q = { ...p };
            } }"#,
        )
        .unwrap();
        assert!(code.contains("f.apply(void 0, __spread(xs));"));
        assert!(code.contains("me.m.apply(me, __spread([1], ys));"));
        assert!(code.contains("var arr = __spread([1], xs, [2]);"));
        assert!(code.contains("var o = __assign(__assign({ a: 1 }, p), { b: 2 });"));
        assert!(code.contains("var q = __assign({}, p);"));
    }

    #[test]
    fn test_unsupported_spread_and_tags() {
        assert!(emit_body("class A { run() { new Foo(...xs); } }").is_err());
        assert!(emit_body("class A { run() { a.b().c(...xs); } }").is_err());
        assert!(emit_body("class A { run() { tag`x`; } }").is_err());
    }

    #[test]
    fn test_checkpoints_and_dedup() {
        let file = parse(
            r#"class A { run() {
                let a = 1;
                if (a > 0) {
                    this.b(a);
                }
                return a;
            } }"#,
        );
        let body = first_body(&file);
        let mut breakpoints = FileBreakpoints::new(Path::new("Entity.ts"), "Entity");
        let code = Emitter::new(&file, Some(&mut breakpoints))
            .emit_block_contents(body)
            .unwrap();
        assert!(code.contains(r#"var a = (__d.checkpoint("Entity-1"), 1);"#));
        assert!(code.contains(r#"if ((__d.checkpoint("Entity-2"), a > 0))"#));
        assert!(code.contains(r#"(__d.checkpoint("Entity-3"), me.b(a));"#));
        assert!(code.contains(r#"return (__d.checkpoint("Entity-4"), a);"#));

        let again = Emitter::new(&file, Some(&mut breakpoints))
            .emit_block_contents(body)
            .unwrap();
        assert_eq!(again, code);
        assert_eq!(breakpoints.breakpoints.len(), 4);
    }

    #[test]
    fn test_loop_and_switch_checkpoints() {
        let file = parse(
            r#"class A { run() {
                for (let i = 0; i < this.n; i++) { this.step(i); }
                for (const k in this.o) {}
                switch (this.s) { case 1: break; }
            } }"#,
        );
        let body = first_body(&file);
        let mut breakpoints = FileBreakpoints::new(Path::new("Entity.ts"), "Entity");
        let code = Emitter::new(&file, Some(&mut breakpoints))
            .emit_block_contents(body)
            .unwrap();
        assert!(code.contains(
            r#"for (var i = (__d.checkpoint("Entity-1"), 0); (__d.checkpoint("Entity-2"), i < me.n); (__d.checkpoint("Entity-3"), i++))"#
        ));
        assert!(code.contains(r#"(__d.checkpoint("Entity-4"), me.step(i));"#));
        assert!(code.contains(r#"for (var k in (__d.checkpoint("Entity-5"), me.o))"#));
        assert!(code.contains(r#"switch ((__d.checkpoint("Entity-6"), me.s))"#));
        assert_eq!(breakpoints.breakpoints.len(), 6);
    }

    #[test]
    fn test_empty_loop_clauses_get_no_checkpoint() {
        let file = parse("class A { run() { for (;;) { break; } } }");
        let body = first_body(&file);
        let mut breakpoints = FileBreakpoints::new(Path::new("Entity.ts"), "Entity");
        let code = Emitter::new(&file, Some(&mut breakpoints))
            .emit_block_contents(body)
            .unwrap();
        assert!(code.contains("for (;;) { break; }"));
        assert!(breakpoints.breakpoints.is_empty());
    }

    #[test]
    fn test_shadowing_block_bindings_are_renamed() {
        let code = emit_body("class A { run() { let x = 1; { let x = 2; } return x; } }").unwrap();
        assert!(code.contains("var x = 1;"));
        assert!(code.contains("{ var x_1 = 2; }"));
        assert!(code.contains("return x;"));

        let code = emit_body("class A { run(x) { if (x) { const x = 2; return x; } return x; } }").unwrap();
        assert!(code.contains("{ var x_1 = 2; return x_1; }"));
        assert!(code.ends_with("return x;"));
    }

    #[test]
    fn test_renamed_shorthand_keeps_its_key() {
        let code = emit_body("class A { run() { const x = 1; { const x = 2; use({ x }); } } }").unwrap();
        assert!(code.contains("use({ x: x_1 });"));
    }

    #[test]
    fn test_sibling_blocks_get_distinct_names() {
        let code = emit_body("class A { run() { { let y = 1; f(y); } { let y = 2; f(y); } } }").unwrap();
        assert!(code.contains("{ var y_1 = 1; f(y_1); }"));
        assert!(code.contains("{ var y_2 = 2; f(y_2); }"));
    }

    #[test]
    fn test_loop_binding_captured_by_closure_is_rejected() {
        let err = emit_body("class A { run() { for (let i = 0; i < 3; i++) { fs.push(() => i); } } }").unwrap_err();
        assert!(err.to_string().contains("'i' is declared with let or const inside a loop"));
        assert!(emit_body("class A { run() { for (const k in o) { fs.push(function () { return k; }); } } }").is_err());
        assert!(emit_body("class A { run() { for (var i = 0; i < 3; i++) { fs.push(() => i); } } }").is_ok());
        assert!(emit_body("class A { run() { for (let i = 0; i < 3; i++) { const j = i; fs.push(j); } } }").is_ok());
    }
}
