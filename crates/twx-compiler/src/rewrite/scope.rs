//! Block scoping of `let`/`const` once they are emitted as `var`.
//!
//! A `var` belongs to the whole function, so a block-scoped binding whose
//! name is also used elsewhere in its function is renamed (`x` becomes
//! `x_1`), together with every reference that resolves to it. A lowered
//! binding declared in a loop and captured by a function would be shared by
//! every iteration; that is rejected.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use tree_sitter::Node;

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::ParsedFile;
use crate::frontend::typescript::parser::{named_children, span_of};

/// Nodes with their own function scope.
const FUNCTIONS: &[&str] = &[
    "function_expression",
    "function",
    "function_declaration",
    "generator_function",
    "generator_function_declaration",
    "arrow_function",
    "method_definition",
];

const LOOPS: &[&str] = &["for_statement", "for_in_statement", "while_statement", "do_statement"];

/// Identifier nodes that name a variable.
const NAMES: &[&str] = &[
    "identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// `var`, parameters and function names.
    Hoisted,
    /// Catch parameters, block scoped in the target runtime too.
    Native,
    /// `let` and `const`.
    Lowered,
}

#[derive(Debug)]
struct Binding {
    name: String,
    scope: usize,
    kind: Kind,
    in_loop: bool,
    start: usize,
}

#[derive(Debug)]
struct Scope {
    range: Range<usize>,
    /// Nearest enclosing function scope, itself for function scopes.
    function: usize,
}

#[derive(Debug)]
struct Occurrence<'t> {
    node: Node<'t>,
    name: String,
}

/// New names of identifiers, keyed by the identifier's start byte.
#[derive(Debug, Default)]
pub struct Renames {
    names: HashMap<usize, String>,
}

impl Renames {
    pub fn get(&self, node: Node) -> Option<&str> {
        self.names.get(&node.start_byte()).map(String::as_str)
    }
}

/// Computes the renames needed to emit `root` with `var` declarations.
///
/// `root` is a function body block, a program or a single declaration. The
/// parameters of the function owning a body block belong to its scope.
pub fn analyze(file: &ParsedFile, root: Node) -> Result<Renames, CompilerError> {
    let mut analyzer = Analyzer {
        source: &file.source,
        scopes: Vec::new(),
        bindings: Vec::new(),
        occurrences: Vec::new(),
    };
    let top = analyzer.open(root.byte_range(), None);
    match root.kind() {
        "statement_block" | "program" => {
            if let Some(owner) = root.parent().filter(|p| FUNCTIONS.contains(&p.kind())) {
                analyzer.bind_parameters(owner, top);
            }
            for child in named_children(root) {
                analyzer.collect(child, top, false);
            }
        }
        _ => analyzer.collect(root, top, false),
    }
    analyzer.resolve(file)
}

struct Analyzer<'t, 's> {
    source: &'s str,
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
    occurrences: Vec<Occurrence<'t>>,
}

impl<'t, 's> Analyzer<'t, 's> {
    /// Opens a scope; `parent` is `None` for function scopes.
    fn open(&mut self, range: Range<usize>, parent: Option<usize>) -> usize {
        let index = self.scopes.len();
        let function = parent.map(|p| self.scopes[p].function).unwrap_or(index);
        self.scopes.push(Scope { range, function });
        index
    }

    fn text(&self, node: Node) -> String {
        self.source.get(node.byte_range()).unwrap_or("").to_string()
    }

    fn bind(&mut self, node: Node<'t>, scope: usize, kind: Kind, in_loop: bool) {
        let scope = match kind {
            Kind::Hoisted => self.scopes[scope].function,
            Kind::Native | Kind::Lowered => scope,
        };
        self.bindings.push(Binding {
            name: self.text(node),
            scope,
            kind,
            in_loop,
            start: node.start_byte(),
        });
    }

    /// Binds every name introduced by a declaration target or parameter.
    fn bind_pattern(&mut self, node: Node<'t>, scope: usize, kind: Kind, in_loop: bool) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => self.bind(node, scope, kind, in_loop),
            "pair_pattern" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.bind_pattern(value, scope, kind, in_loop);
                }
            }
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.bind_pattern(left, scope, kind, in_loop);
                }
            }
            "required_parameter" | "optional_parameter" => {
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    self.bind_pattern(pattern, scope, kind, in_loop);
                }
            }
            "object_pattern" | "array_pattern" | "rest_pattern" | "formal_parameters" => {
                for child in named_children(node) {
                    self.bind_pattern(child, scope, kind, in_loop);
                }
            }
            _ => {}
        }
    }

    fn bind_parameters(&mut self, function: Node<'t>, scope: usize) {
        if let Some(parameters) = function.child_by_field_name("parameters") {
            self.bind_pattern(parameters, scope, Kind::Hoisted, false);
        }
        if let Some(parameter) = function.child_by_field_name("parameter") {
            self.bind_pattern(parameter, scope, Kind::Hoisted, false);
        }
    }

    fn collect(&mut self, node: Node<'t>, scope: usize, in_loop: bool) {
        let kind = node.kind();
        if NAMES.contains(&kind) {
            self.occurrences.push(Occurrence {
                node,
                name: self.text(node),
            });
            return;
        }

        if FUNCTIONS.contains(&kind) {
            let name = node.child_by_field_name("name");
            let inner = self.open(node.byte_range(), None);
            if let Some(name) = name.filter(|n| n.kind() == "identifier") {
                let owner = if kind.ends_with("_declaration") { scope } else { inner };
                self.bind(name, owner, Kind::Hoisted, false);
            }
            self.bind_parameters(node, inner);
            for child in named_children(node) {
                if child.kind() == "statement_block" {
                    for statement in named_children(child) {
                        self.collect(statement, inner, false);
                    }
                } else {
                    self.collect(child, inner, false);
                }
            }
            return;
        }

        match kind {
            "lexical_declaration" | "variable_declaration" => {
                let binding = if kind == "lexical_declaration" { Kind::Lowered } else { Kind::Hoisted };
                for declarator in named_children(node) {
                    if let Some(name) = declarator.child_by_field_name("name") {
                        self.bind_pattern(name, scope, binding, in_loop);
                    }
                    for child in named_children(declarator) {
                        self.collect(child, scope, in_loop);
                    }
                }
            }
            "statement_block" | "switch_body" | "catch_clause" | "for_statement" | "for_in_statement" => {
                let inner = self.open(node.byte_range(), Some(scope));
                let in_loop = in_loop || LOOPS.contains(&kind);
                if kind == "for_in_statement" {
                    if let (Some(declared), Some(left)) =
                        (node.child_by_field_name("kind"), node.child_by_field_name("left"))
                    {
                        let binding = if self.text(declared) == "var" { Kind::Hoisted } else { Kind::Lowered };
                        self.bind_pattern(left, inner, binding, true);
                    }
                }
                if kind == "catch_clause" {
                    if let Some(parameter) = node.child_by_field_name("parameter") {
                        self.bind_pattern(parameter, inner, Kind::Native, in_loop);
                    }
                }
                for child in named_children(node) {
                    self.collect(child, inner, in_loop);
                }
            }
            _ => {
                let in_loop = in_loop || LOOPS.contains(&kind);
                for child in named_children(node) {
                    self.collect(child, scope, in_loop);
                }
            }
        }
    }

    /// The binding an occurrence refers to: the one of its name in the
    /// innermost scope containing it.
    fn binding_of(&self, occurrence: &Occurrence) -> Option<usize> {
        let at = occurrence.node.start_byte();
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.name == occurrence.name && self.scopes[b.scope].range.contains(&at))
            .min_by_key(|(_, b)| self.scopes[b.scope].range.len())
            .map(|(index, _)| index)
    }

    fn resolve(self, file: &ParsedFile) -> Result<Renames, CompilerError> {
        let resolved: Vec<Option<usize>> = self.occurrences.iter().map(|o| self.binding_of(o)).collect();
        let mut taken: HashSet<String> = self.occurrences.iter().map(|o| o.name.clone()).collect();
        let mut new_names: HashMap<usize, String> = HashMap::new();

        for (index, binding) in self.bindings.iter().enumerate() {
            if binding.kind != Kind::Lowered {
                continue;
            }
            let scope = &self.scopes[binding.scope];
            let function = &self.scopes[scope.function];

            if binding.in_loop {
                let captured = self.occurrences.iter().zip(&resolved).find(|(o, r)| {
                    **r == Some(index) && self.crosses_function(o.node.start_byte(), &scope.range)
                });
                if let Some((occurrence, _)) = captured {
                    return Err(file.error(
                        span_of(occurrence.node),
                        format!(
                            "'{}' is declared with let or const inside a loop and captured by a function; declare it with var or move the loop body into a function",
                            binding.name
                        ),
                    ));
                }
            }

            if binding.scope == scope.function {
                continue;
            }
            let clashes = self.occurrences.iter().any(|o| {
                let at = o.node.start_byte();
                o.name == binding.name && function.range.contains(&at) && !scope.range.contains(&at)
            }) || self.bindings.iter().any(|b| {
                b.name == binding.name && b.scope == scope.function && b.start != binding.start
            });
            if clashes {
                let fresh = fresh_name(&binding.name, &taken);
                log::trace!("renaming block-scoped {} to {}", binding.name, fresh);
                taken.insert(fresh.clone());
                new_names.insert(index, fresh);
            }
        }

        let mut renames = Renames::default();
        for (occurrence, binding) in self.occurrences.iter().zip(resolved) {
            if let Some(name) = binding.and_then(|b| new_names.get(&b)) {
                renames.names.insert(occurrence.node.start_byte(), name.clone());
            }
        }
        Ok(renames)
    }

    /// Whether a function scope lies between `at` and the scope `range`.
    fn crosses_function(&self, at: usize, range: &Range<usize>) -> bool {
        self.scopes.iter().enumerate().any(|(index, s)| {
            s.function == index
                && s.range.contains(&at)
                && range.start <= s.range.start
                && s.range.end <= range.end
                && s.range != *range
        })
    }
}

fn fresh_name(name: &str, taken: &HashSet<String>) -> String {
    (1..)
        .map(|n| format!("{}_{}", name, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{}_", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::typescript::parser::TypeScriptParser;
    use std::path::Path;

    fn renames_of(source: &str) -> Result<Vec<String>, CompilerError> {
        let mut parser = TypeScriptParser::new().unwrap();
        let file = parser.parse(source, Path::new("Entity.ts")).unwrap();
        let renames = analyze(&file, file.tree.root_node())?;
        let mut names: Vec<String> = renames.names.into_values().collect();
        names.sort();
        Ok(names)
    }

    #[test]
    fn test_fresh_name_skips_taken_names() {
        let taken: HashSet<String> = ["x".to_string(), "x_1".to_string()].into_iter().collect();
        assert_eq!(fresh_name("x", &taken), "x_2");
    }

    #[test]
    fn test_hoisted_and_catch_bindings_keep_their_names() {
        let names = renames_of("function f(e) { var e = 1; try { g(); } catch (e) { h(e); } return e; }").unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_every_reference_of_a_renamed_binding_follows() {
        let names = renames_of("function f() { const a = 1; { const a = 2; g(a, a); } }").unwrap();
        assert_eq!(names, vec!["a_1", "a_1", "a_1"]);
    }

    #[test]
    fn test_nested_function_scopes_are_separate() {
        let names = renames_of("function f() { let a = 1; return function () { let a = 2; return a; }; }").unwrap();
        assert!(names.is_empty());
    }
}
