//! Finalize pass: method bodies to runtime script.
//!
//! Runs after every entity of the session is known. Each [`CodeJob`] left by
//! the structural pass is turned into the `code` of its service or
//! subscription.

pub mod breakpoints;
pub mod emitter;
pub mod helpers;
pub mod scope;

pub use breakpoints::{Breakpoint, Breakpoints, FileBreakpoints};

use crate::config::CompilerConfig;
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::ParsedFile;
use crate::resolve::SymbolTable;
use crate::transform::CodeJob;
use emitter::Emitter;
use helpers::Inliner;

const INDENT: &str = "    ";

pub struct BodyRewriter<'s> {
    units: &'s [ParsedFile],
    symbols: &'s SymbolTable,
    config: &'s CompilerConfig,
    breakpoints: &'s mut Breakpoints,
}

impl<'s> BodyRewriter<'s> {
    pub fn new(
        units: &'s [ParsedFile],
        symbols: &'s SymbolTable,
        config: &'s CompilerConfig,
        breakpoints: &'s mut Breakpoints,
    ) -> Self {
        Self {
            units,
            symbols,
            config,
            breakpoints,
        }
    }

    /// Code of the service or subscription described by `job`, declared in
    /// `units[unit]` on the entity exported as `entity`.
    pub fn service_code(&mut self, unit: usize, job: &CodeJob, entity: &str) -> Result<String, CompilerError> {
        let file = self.unit(unit)?;
        let block = file
            .node_at(job.body)
            .ok_or_else(|| file.error(job.body, "Cannot locate the method body"))?;

        let body = {
            let breakpoints = self.file_breakpoints(file);
            Emitter::new(file, breakpoints).emit_block_contents(block)?
        };
        let prelude = self.prelude(&body)?;

        let mut inner = String::new();
        for (parameter, local) in &job.aliases {
            inner.push_str(&format!("var {} = {};\n", local, parameter));
        }
        if !prelude.is_empty() {
            inner.push_str(&prelude);
            inner.push('\n');
        }
        inner.push_str(&reindent(&body, ""));

        let call = format!(
            "var result = (function () {{\n{}\n}}).apply(me);",
            reindent(&inner, INDENT)
        );
        if !self.config.debug {
            return Ok(call);
        }
        log::trace!("instrumenting {}.{}", entity, job.target.name());
        Ok(format!(
            "var __d = BMDebugServer.retain(me);\ntry {{\n{indent}__d.enterService({entity}, {member});\n{call}\n}} finally {{\n{indent}__d.exitService();\n{indent}BMDebugServer.release(__d);\n}}",
            indent = INDENT,
            entity = quote(entity),
            member = quote(job.target.name()),
            call = reindent(&call, INDENT),
        ))
    }

    /// Script of a global code file: every statement after its directive.
    pub fn global_code(&mut self, unit: usize) -> Result<String, CompilerError> {
        let file = self.unit(unit)?;
        let body = {
            let breakpoints = self.file_breakpoints(file);
            Emitter::new(file, breakpoints).emit_program(file.tree.root_node())?
        };
        let prelude = self.prelude(&body)?;
        let body = reindent(&body, "");
        if prelude.is_empty() {
            Ok(body)
        } else {
            Ok(format!("{}\n{}", prelude, body))
        }
    }

    fn unit(&self, unit: usize) -> Result<&'s ParsedFile, CompilerError> {
        let units: &'s [ParsedFile] = self.units;
        units.get(unit).ok_or_else(|| CompilerError::File {
            message: format!("Unknown source unit {}", unit),
            file: Default::default(),
        })
    }

    fn file_breakpoints(&mut self, file: &ParsedFile) -> Option<&mut FileBreakpoints> {
        if self.config.debug {
            Some(self.breakpoints.file_mut(&file.path, &file.stem()))
        } else {
            None
        }
    }

    fn prelude(&mut self, body: &str) -> Result<String, CompilerError> {
        let breakpoints = if self.config.debug {
            Some(&mut *self.breakpoints)
        } else {
            None
        };
        Inliner::new(self.units, self.symbols, breakpoints).prelude(body)
    }
}

/// Shifts `code` so its least indented line starts at `indent`.
///
/// The first line is taken as already trimmed, since block contents start
/// at the first statement.
pub(crate) fn reindent(code: &str, indent: &str) -> String {
    let code = code.trim_end().trim_start_matches(['\n', '\r']);
    let mut lines = code.lines();
    let first = lines.next().unwrap_or("").trim_start();
    let rest: Vec<&str> = lines.collect();
    let margin = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out = Vec::with_capacity(rest.len() + 1);
    out.push(format!("{}{}", indent, first));
    for line in rest {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            let strip = margin.min(line.len() - line.trim_start().len());
            out.push(format!("{}{}", indent, &line[strip..]));
        }
    }
    out.join("\n")
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::typescript::ast::ClassMember;
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::transform::CodeTarget;
    use std::path::Path;

    fn unit(source: &str, name: &str) -> ParsedFile {
        TypeScriptParser::new().unwrap().parse(source, Path::new(name)).unwrap()
    }

    fn job(file: &ParsedFile, aliases: Vec<(String, String)>) -> CodeJob {
        let class = file.classes().next().unwrap();
        let ClassMember::Method(method) = &class.members[0] else {
            panic!("expected a method");
        };
        CodeJob {
            class_name: class.display_name().to_string(),
            target: CodeTarget::Service(method.name.clone()),
            body: method.body.as_ref().unwrap().span,
            aliases,
        }
    }

    #[test]
    fn test_service_is_wrapped_in_iife() {
        let file = unit(
            "class Pump extends Thing {\n    start({ speed: rpm }: { speed: NUMBER }) {\n        this.rpm = rpm;\n        return this.rpm;\n    }\n}\n",
            "Pump.ts",
        );
        let job = job(&file, vec![("speed".to_string(), "rpm".to_string())]);
        let units = vec![file];
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut breakpoints = Breakpoints::new();
        let code = BodyRewriter::new(&units, &symbols, &config, &mut breakpoints)
            .service_code(0, &job, "Pump")
            .unwrap();
        assert_eq!(
            code,
            "var result = (function () {\n    var rpm = speed;\n    me.rpm = rpm;\n    return me.rpm;\n}).apply(me);"
        );
        assert!(breakpoints.is_empty());
    }

    #[test]
    fn test_debug_wraps_with_debugger_session() {
        let file = unit("class Pump extends Thing {\n    stop() {\n        this.rpm = 0;\n    }\n}\n", "Pump.ts");
        let job = job(&file, Vec::new());
        let units = vec![file];
        let symbols = SymbolTable::new();
        let config = CompilerConfig {
            debug: true,
            ..Default::default()
        };
        let mut breakpoints = Breakpoints::new();
        let code = BodyRewriter::new(&units, &symbols, &config, &mut breakpoints)
            .service_code(0, &job, "Main Pump")
            .unwrap();
        assert!(code.starts_with("var __d = BMDebugServer.retain(me);\ntry {\n    __d.enterService(\"Main Pump\", \"stop\");"));
        assert!(code.contains("        (__d.checkpoint(\"Pump-1\"), me.rpm = 0);"));
        assert!(code.ends_with("} finally {\n    __d.exitService();\n    BMDebugServer.release(__d);\n}"));
        assert_eq!(breakpoints.into_vec()[0].breakpoints.len(), 1);
    }

    #[test]
    fn test_helpers_are_prepended() {
        let file = unit("class Pump extends Thing {\n    all() {\n        return [...this.items];\n    }\n}\n", "Pump.ts");
        let job = job(&file, Vec::new());
        let units = vec![file];
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut breakpoints = Breakpoints::new();
        let code = BodyRewriter::new(&units, &symbols, &config, &mut breakpoints)
            .service_code(0, &job, "Pump")
            .unwrap();
        assert!(code.contains("    var __read = function (o, n) {"));
        assert!(code.contains("    return __spread(me.items);"));
    }

    #[test]
    fn test_global_code_skips_directive() {
        let file = unit(
            "\"use Pump\";\nimport { x } from './x';\nconst speed: number = 3;\nthis.rpm = speed;\n",
            "PumpStartup.ts",
        );
        let units = vec![file];
        let symbols = SymbolTable::new();
        let config = CompilerConfig::default();
        let mut breakpoints = Breakpoints::new();
        let code = BodyRewriter::new(&units, &symbols, &config, &mut breakpoints)
            .global_code(0)
            .unwrap();
        assert_eq!(code, "var speed = 3;\nme.rpm = speed;");
    }

    #[test]
    fn test_reindent() {
        assert_eq!(reindent("a;\n        if (b) {\n            c;\n        }\n    ", "  "), "  a;\n  if (b) {\n      c;\n  }");
    }
}
