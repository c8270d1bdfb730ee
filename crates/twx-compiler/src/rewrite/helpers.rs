//! Inlining of runtime helpers and global functions.
//!
//! The target runtime has no module system, so every function a body calls
//! that is not provided by the platform must be pasted in front of it.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use tree_sitter::Node;

use super::breakpoints::Breakpoints;
use super::emitter::Emitter;
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::ParsedFile;
use crate::frontend::typescript::parser::parse_script;
use crate::resolve::SymbolTable;

/// A support function introduced by down-level lowering.
#[derive(Debug)]
pub struct Helper {
    pub name: &'static str,
    pub dependencies: &'static [&'static str],
    pub source: &'static str,
}

pub const HELPERS: &[Helper] = &[
    Helper {
        name: "__assign",
        dependencies: &[],
        source: r#"var __assign = Object.assign || function (target) {
    for (var s, i = 1, n = arguments.length; i < n; i++) {
        s = arguments[i];
        for (var p in s) if (Object.prototype.hasOwnProperty.call(s, p)) target[p] = s[p];
    }
    return target;
};
"#,
    },
    // No Symbol.iterator on the target runtime; array-likes only.
    Helper {
        name: "__read",
        dependencies: &[],
        source: r#"var __read = function (o, n) {
    var ar = [];
    for (var i = 0; i < o.length && (n === undefined || i < n); i++) ar.push(o[i]);
    return ar;
};
"#,
    },
    Helper {
        name: "__spread",
        dependencies: &["__read"],
        source: r#"var __spread = function () {
    for (var ar = [], i = 0; i < arguments.length; i++) ar = ar.concat(__read(arguments[i]));
    return ar;
};
"#,
    },
];

pub fn helper_named(name: &str) -> Option<&'static Helper> {
    HELPERS.iter().find(|h| h.name == name)
}

/// Names of plain identifiers called anywhere in `code`, in source order.
pub fn called_functions(code: &str) -> Result<Vec<String>, CompilerError> {
    let tree = parse_script(code, Path::new("<generated>"))?;
    let mut names = Vec::new();
    collect_callees(tree.root_node(), code, &mut names);
    Ok(names)
}

fn collect_callees(node: Node, code: &str, names: &mut Vec<String>) {
    if node.kind() == "call_expression" {
        if let Some(callee) = node.child_by_field_name("function") {
            if callee.kind() == "identifier" {
                let name = callee.utf8_text(code.as_bytes()).unwrap_or("").to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_callees(child, code, names);
    }
}

/// Collects the definitions a body depends on, dependencies first.
pub struct Inliner<'s> {
    units: &'s [ParsedFile],
    symbols: &'s SymbolTable,
    breakpoints: Option<&'s mut Breakpoints>,
    included: IndexMap<String, String>,
    visiting: HashSet<String>,
}

impl<'s> Inliner<'s> {
    /// Global functions are instrumented when `breakpoints` is given.
    pub fn new(units: &'s [ParsedFile], symbols: &'s SymbolTable, breakpoints: Option<&'s mut Breakpoints>) -> Self {
        Self {
            units,
            symbols,
            breakpoints,
            included: IndexMap::new(),
            visiting: HashSet::new(),
        }
    }

    /// The text to place before `code`.
    pub fn prelude(mut self, code: &str) -> Result<String, CompilerError> {
        for name in called_functions(code)? {
            self.include(&name)?;
        }
        Ok(self.included.into_values().collect::<Vec<_>>().join("\n"))
    }

    fn include(&mut self, name: &str) -> Result<(), CompilerError> {
        if self.included.contains_key(name) || !self.visiting.insert(name.to_string()) {
            return Ok(());
        }
        if let Some(helper) = helper_named(name) {
            for dependency in helper.dependencies {
                self.include(dependency)?;
            }
            self.included.insert(name.to_string(), helper.source.to_string());
            return Ok(());
        }
        let Some(function) = self.symbols.global_function(name).cloned() else {
            return Ok(());
        };
        let Some(unit) = self.units.get(function.unit) else {
            return Ok(());
        };
        let node = unit
            .node_at(function.span)
            .ok_or_else(|| unit.error(function.span, format!("Cannot locate global function '{}'", name)))?;
        let breakpoints = self
            .breakpoints
            .as_deref_mut()
            .map(|b| b.file_mut(&unit.path, &unit.stem()));
        let text = Emitter::new(unit, breakpoints).emit(node)?;
        log::debug!("inlining global function {} from {}", name, unit.path.display());

        for callee in called_functions(&text)? {
            self.include(&callee)?;
        }
        self.included.insert(name.to_string(), format!("{}\n", text));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::typescript::parser::TypeScriptParser;

    #[test]
    fn test_called_functions_in_order() {
        let names = called_functions("var a = __spread([1], b); f(); me.g(); f();").unwrap();
        assert_eq!(names, vec!["__spread", "f"]);
    }

    #[test]
    fn test_helper_dependencies_come_first() {
        let symbols = SymbolTable::new();
        let prelude = Inliner::new(&[], &symbols, None).prelude("var a = __spread(b);").unwrap();
        let read = prelude.find("var __read").unwrap();
        let spread = prelude.find("var __spread").unwrap();
        assert!(read < spread);
        assert!(!prelude.contains("__assign ="));
    }

    #[test]
    fn test_global_functions_are_inlined_transitively() {
        let mut parser = TypeScriptParser::new().unwrap();
        let unit = parser
            .parse(
                "function double(x: number): number { return twice(x); }\nfunction twice(x: number) { return [...[x], x]; }\n",
                Path::new("globals.ts"),
            )
            .unwrap();
        let mut symbols = SymbolTable::new();
        symbols.collect(0, &unit);
        let units = vec![unit];

        let prelude = Inliner::new(&units, &symbols, None).prelude("return double(1);").unwrap();
        let read = prelude.find("var __read").unwrap();
        let twice = prelude.find("function twice(x) { return __spread([x], [x]); }").unwrap();
        let double = prelude.find("function double(x) { return twice(x); }").unwrap();
        assert!(read < twice && twice < double);
    }
}
