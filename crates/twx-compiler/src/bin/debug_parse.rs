//! Debug script to see what the parser produces for a source file.
//!
//! Usage: `debug_parse <file.ts>`; without an argument a built-in sample is
//! parsed.

use std::path::PathBuf;

use twx_compiler::frontend::typescript::ast::{ClassMember, Statement};
use twx_compiler::frontend::typescript::parser::TypeScriptParser;
use twx_compiler::CompilerError;

const SAMPLE: &str = r#"
@ThingDefinition
class Pump extends GenericThing {
    @persistent speed: NUMBER = 3;
    overheated!: EVENT<AlertShape>;

    start({ rpm }: { rpm: NUMBER }): NOTHING {
        this.speed = rpm;
    }
}
"#;

fn main() -> miette::Result<()> {
    let (path, source) = match std::env::args().nth(1) {
        Some(arg) => {
            let path = PathBuf::from(arg);
            let source = std::fs::read_to_string(&path).map_err(|e| CompilerError::io(&path, e.to_string()))?;
            (path, source)
        }
        None => (PathBuf::from("sample.ts"), SAMPLE.to_string()),
    };

    let mut parser = TypeScriptParser::new()?;
    let parsed = parser.parse(&source, &path)?;
    println!("Parsed file: {:?}", parsed.path);

    for statement in &parsed.statements {
        match statement {
            Statement::Class(class) => {
                println!("\nClass {} (exported: {})", class.display_name(), class.exported);
                for decorator in &class.decorators {
                    println!("  @{}", decorator.name);
                }
                for member in &class.members {
                    match member {
                        ClassMember::Property(property) => {
                            println!("  property {}: {:?}", property.name, property.type_node);
                        }
                        ClassMember::Method(method) => {
                            println!("  method {} ({} parameters)", method.name, method.parameters.len());
                        }
                        ClassMember::Other { kind, .. } => println!("  other {}", kind),
                    }
                }
            }
            other => println!("\n{:?}", other),
        }
    }
    Ok(())
}
