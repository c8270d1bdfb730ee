//! Stored service code back to a TypeScript method body.
//!
//! The code is parsed as script. When it has the shape the compiler emits,
//! `var result = (function () { ... }).apply(me);` optionally inside the
//! debugger's `try`/`finally`, only the inner statements are kept. The
//! statements are then re-emitted with free references to `me` turned back
//! into `this` (a local or parameter named `me` is left alone), string
//! literals double quoted and spacing normalized around binary operators
//! and inside object literals.

use std::path::Path;

use tree_sitter::Node;

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::parser::{named_children, parse_script, string_value};
use crate::rewrite::emitter::SELF_REFERENCE;

/// Functions that rebind `this`, so `me` inside them must stay `me`.
const REBINDING: &[&str] = &[
    "function_expression",
    "function",
    "function_declaration",
    "generator_function",
    "generator_function_declaration",
    "method_definition",
];

/// Method body statements for `code`, without surrounding braces.
pub fn method_body(code: &str) -> Result<String, CompilerError> {
    if code.trim().is_empty() {
        return Ok(String::new());
    }
    let tree = parse_script(code, Path::new("<service>"))?;
    let root = tree.root_node();
    let statements = match find_wrapped_body(root, code) {
        Some(block) => block_statements(block),
        None => named_children(root),
    };
    let printer = CodePrinter { source: code };
    let rebound = statements.iter().any(|statement| printer.declares_self(*statement));
    let mut lines = Vec::new();
    for statement in statements {
        let mut out = String::new();
        printer.print(statement, rebound, &mut out);
        lines.push(dedent_continuation(&out, statement.start_position().column));
    }
    Ok(lines.join("\n"))
}

/// The block of the compiler-generated IIFE, if `root` has that shape.
fn find_wrapped_body<'t>(root: Node<'t>, source: &str) -> Option<Node<'t>> {
    let statements = named_children(root);
    for statement in &statements {
        if let Some(block) = iife_block(*statement, source) {
            return Some(block);
        }
        if statement.kind() == "try_statement" {
            let body = statement.child_by_field_name("body")?;
            for inner in block_statements(body) {
                if let Some(block) = iife_block(inner, source) {
                    return Some(block);
                }
            }
        }
    }
    None
}

/// `var result = (function () {...}).apply(me);` or the bare call.
fn iife_block<'t>(statement: Node<'t>, source: &str) -> Option<Node<'t>> {
    let call = match statement.kind() {
        "variable_declaration" | "lexical_declaration" => {
            let declarators = named_children(statement);
            let [declarator] = declarators.as_slice() else {
                return None;
            };
            declarator.child_by_field_name("value")?
        }
        "expression_statement" => named_children(statement).into_iter().next()?,
        _ => return None,
    };
    if call.kind() != "call_expression" {
        return None;
    }
    let callee = call.child_by_field_name("function")?;
    if callee.kind() != "member_expression" {
        return None;
    }
    let method = callee.child_by_field_name("property")?;
    if method.utf8_text(source.as_bytes()).ok()? != "apply" {
        return None;
    }
    let mut function = callee.child_by_field_name("object")?;
    while function.kind() == "parenthesized_expression" {
        function = named_children(function).into_iter().next()?;
    }
    if function.kind() != "function_expression" && function.kind() != "function" {
        return None;
    }
    function.child_by_field_name("body")
}

fn block_statements(block: Node) -> Vec<Node> {
    named_children(block)
}

/// Strips the indentation continuation lines carried from their original
/// nesting depth. Only ASCII spaces and tabs count as indentation.
fn dedent_continuation(text: &str, column: usize) -> String {
    let mut lines = text.lines();
    let mut out = vec![lines.next().unwrap_or("").to_string()];
    for line in lines {
        let indent = line.bytes().take_while(|b| *b == b' ' || *b == b'\t').count();
        out.push(line[indent.min(column)..].to_string());
    }
    out.join("\n")
}

struct CodePrinter<'s> {
    source: &'s str,
}

impl<'s> CodePrinter<'s> {
    fn text(&self, node: Node) -> &'s str {
        self.source.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }

    /// Whether `node` declares a variable or function named `me` in the
    /// function scope it belongs to.
    fn declares_self(&self, node: Node) -> bool {
        match node.kind() {
            "variable_declarator" => {
                node.child_by_field_name("name").is_some_and(|name| self.binds_self(name))
                    || node.child_by_field_name("value").is_some_and(|value| self.declares_self(value))
            }
            "function_declaration" | "generator_function_declaration" => node
                .child_by_field_name("name")
                .is_some_and(|name| self.text(name) == SELF_REFERENCE),
            "arrow_function" => false,
            kind if REBINDING.contains(&kind) => false,
            _ => named_children(node).into_iter().any(|child| self.declares_self(child)),
        }
    }

    /// Whether a binding pattern or parameter list introduces `me`.
    fn binds_self(&self, pattern: Node) -> bool {
        match pattern.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => self.text(pattern) == SELF_REFERENCE,
            "pair_pattern" => pattern.child_by_field_name("value").is_some_and(|v| self.binds_self(v)),
            "assignment_pattern" | "object_assignment_pattern" => {
                pattern.child_by_field_name("left").is_some_and(|l| self.binds_self(l))
            }
            "required_parameter" | "optional_parameter" => {
                pattern.child_by_field_name("pattern").is_some_and(|p| self.binds_self(p))
            }
            "formal_parameters" | "object_pattern" | "array_pattern" | "rest_pattern" => {
                named_children(pattern).into_iter().any(|child| self.binds_self(child))
            }
            _ => false,
        }
    }

    fn arrow_rebinds(&self, arrow: Node) -> bool {
        let parameters = arrow
            .child_by_field_name("parameters")
            .or_else(|| arrow.child_by_field_name("parameter"));
        parameters.is_some_and(|p| self.binds_self(p))
            || arrow
                .child_by_field_name("body")
                .filter(|body| body.kind() == "statement_block")
                .is_some_and(|body| named_children(body).into_iter().any(|s| self.declares_self(s)))
    }

    fn print(&self, node: Node, rebound: bool, out: &mut String) {
        match node.kind() {
            "identifier" if !rebound && self.text(node) == SELF_REFERENCE => out.push_str("this"),
            "shorthand_property_identifier" if !rebound && self.text(node) == SELF_REFERENCE => {
                out.push_str("me: this")
            }
            "arrow_function" => self.copy_through(node, rebound || self.arrow_rebinds(node), out),
            "catch_clause" => {
                let shadowed = node.child_by_field_name("parameter").is_some_and(|p| self.binds_self(p));
                self.copy_through(node, rebound || shadowed, out)
            }
            "string" => out.push_str(&quote(&string_value(node, self.source))),
            "comment" => out.push_str(self.text(node)),
            "binary_expression" => {
                let (Some(left), Some(operator), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("right"),
                ) else {
                    return self.copy_through(node, rebound, out);
                };
                self.print(left, rebound, out);
                out.push(' ');
                out.push_str(self.text(operator));
                out.push(' ');
                self.print(right, rebound, out);
            }
            "object" if !self.text(node).contains('\n') => {
                let members = named_children(node);
                if members.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{ ");
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    self.print(*member, rebound, out);
                }
                out.push_str(" }");
            }
            "pair" => {
                let (Some(key), Some(value)) = (node.child_by_field_name("key"), node.child_by_field_name("value"))
                else {
                    return self.copy_through(node, rebound, out);
                };
                self.print(key, rebound, out);
                out.push_str(": ");
                self.print(value, rebound, out);
            }
            "parenthesized_expression" => match debug_checkpoint_value(node, self.source) {
                Some(value) => self.print(value, rebound, out),
                None => self.copy_through(node, rebound, out),
            },
            kind if REBINDING.contains(&kind) => self.copy_through(node, true, out),
            _ => self.copy_through(node, rebound, out),
        }
    }

    /// Copies the text between children and prints the children.
    fn copy_through(&self, node: Node, rebound: bool, out: &mut String) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        if children.is_empty() {
            out.push_str(self.text(node));
            return;
        }
        let mut position = node.start_byte();
        for child in children {
            out.push_str(self.source.get(position..child.start_byte()).unwrap_or(""));
            self.print(child, rebound, out);
            position = child.end_byte();
        }
        out.push_str(self.source.get(position..node.end_byte()).unwrap_or(""));
    }
}

/// `(__d.checkpoint("id"), expr)` yields `expr`.
fn debug_checkpoint_value<'t>(node: Node<'t>, source: &str) -> Option<Node<'t>> {
    let sequence = named_children(node).into_iter().next()?;
    if sequence.kind() != "sequence_expression" {
        return None;
    }
    let parts = named_children(sequence);
    let [first, second] = parts.as_slice() else {
        return None;
    };
    let callee = first.child_by_field_name("function")?;
    let text = callee.utf8_text(source.as_bytes()).ok()?;
    (text == "__d.checkpoint").then_some(*second)
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_me_becomes_this() {
        let code = "me.x = 1;\nvar y = me['x'];\nvar z = me['a'+'b'];\nme.service({t:3});\nvar other = mine.me;";
        assert_eq!(
            method_body(code).unwrap(),
            "this.x = 1;\nvar y = this[\"x\"];\nvar z = this[\"a\" + \"b\"];\nthis.service({ t: 3 });\nvar other = mine.me;"
        );
    }

    #[test]
    fn test_nested_functions_keep_me() {
        let code = "var f = function () { return me.x; };\nvar g = () => me.y;";
        assert_eq!(
            method_body(code).unwrap(),
            "var f = function () { return me.x; };\nvar g = () => this.y;"
        );
    }

    #[test]
    fn test_iife_is_unwrapped() {
        let code = "var result = (function () {\n    var rpm = speed;\n    me.rpm = rpm;\n    return me.rpm;\n}).apply(me);";
        assert_eq!(method_body(code).unwrap(), "var rpm = speed;\nthis.rpm = rpm;\nreturn this.rpm;");
    }

    #[test]
    fn test_debug_wrapper_is_unwrapped() {
        let code = "var __d = BMDebugServer.retain(me);\ntry {\n    __d.enterService(\"Pump\", \"start\");\n    var result = (function () {\n        (__d.checkpoint(\"Pump-1\"), me.start());\n        return (__d.checkpoint(\"Pump-2\"), 1);\n    }).apply(me);\n} finally {\n    __d.exitService();\n    BMDebugServer.release(__d);\n}";
        assert_eq!(method_body(code).unwrap(), "this.start();\nreturn 1;");
    }

    #[test]
    fn test_multiline_statements_keep_relative_indent() {
        let code = "var result = (function () {\n    if (me.a) {\n        me.b();\n    }\n}).apply(me);";
        assert_eq!(method_body(code).unwrap(), "if (this.a) {\n    this.b();\n}");
    }

    #[test]
    fn test_declared_me_is_not_rewritten() {
        let code = "var me = load();\nreturn me.name;";
        assert_eq!(method_body(code).unwrap(), code);

        let code = "var result = (function () {\n    function me() { return 1; }\n    return me();\n}).apply(me);";
        assert_eq!(method_body(code).unwrap(), "function me() { return 1; }\nreturn me();");
    }

    #[test]
    fn test_me_keys_and_shorthand() {
        let code = "var o = { me: me.x, me };";
        assert_eq!(method_body(code).unwrap(), "var o = { me: this.x, me: this };");
    }

    #[test]
    fn test_parameters_named_me_shadow() {
        let code = "var f = (me) => me.x;\nvar g = me => me.y;\nreturn me.z;";
        assert_eq!(method_body(code).unwrap(), "var f = (me) => me.x;\nvar g = me => me.y;\nreturn this.z;");

        let code = "try { a(); } catch (me) { log(me); }\nme.done = true;";
        assert_eq!(
            method_body(code).unwrap(),
            "try { a(); } catch (me) { log(me); }\nthis.done = true;"
        );
    }

    #[test]
    fn test_non_ascii_indentation_is_kept() {
        assert_eq!(
            dedent_continuation("if (a) {\n\u{a0}\u{a0}b();\n    }", 3),
            "if (a) {\n\u{a0}\u{a0}b();\n }"
        );
        assert_eq!(dedent_continuation("f(\n\t\tx)", 1), "f(\n\tx)");
    }
}
