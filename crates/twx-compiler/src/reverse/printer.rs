//! Pretty printer for synthesized declarations.

use crate::model::{format_number, LiteralValue};

use super::synth::{
    SynthClass, SynthDecorator, SynthHeritage, SynthMethod, SynthParameters, SynthProperty, SynthType, SynthValue,
};

const INDENT: &str = "    ";

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

fn print_literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Bool(b) => b.to_string(),
        LiteralValue::Number(n) => format_number(*n),
        LiteralValue::String(s) => quote(s),
    }
}

pub fn print_value(value: &SynthValue) -> String {
    match value {
        SynthValue::Literal(literal) => print_literal(literal),
        SynthValue::Object(entries) if entries.is_empty() => "{}".to_string(),
        SynthValue::Object(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", key, print_value(value)))
                .collect();
            format!("{{ {} }}", entries.join(", "))
        }
    }
}

pub fn print_type(type_node: &SynthType) -> String {
    match type_node {
        SynthType::Reference { name, arguments } if arguments.is_empty() => name.clone(),
        SynthType::Reference { name, arguments } => {
            let arguments: Vec<String> = arguments.iter().map(print_type).collect();
            format!("{}<{}>", name, arguments.join(", "))
        }
        SynthType::StringLiteral(value) => quote(value),
        SynthType::Undefined => "undefined".to_string(),
        SynthType::Object(members) => {
            let members: Vec<String> = members
                .iter()
                .map(|m| {
                    format!(
                        "{}{}: {}",
                        m.name,
                        if m.optional { "?" } else { "" },
                        print_type(&m.type_node)
                    )
                })
                .collect();
            format!("{{ {} }}", members.join("; "))
        }
    }
}

pub fn print_decorator(decorator: &SynthDecorator) -> String {
    if decorator.arguments.is_empty() {
        return format!("@{}", decorator.name);
    }
    let arguments: Vec<String> = decorator.arguments.iter().map(print_value).collect();
    format!("@{}({})", decorator.name, arguments.join(", "))
}

fn print_doc(doc: &[String], out: &mut Vec<String>) {
    match doc {
        [] => {}
        [line] if !line.starts_with('@') => out.push(format!("/** {} */", line)),
        lines => {
            out.push("/**".to_string());
            out.extend(lines.iter().map(|l| format!(" * {}", l)));
            out.push(" */".to_string());
        }
    }
}

/// Prints a property, field or event declaration, unindented.
pub fn print_property(property: &SynthProperty) -> String {
    let mut lines = Vec::new();
    print_doc(&property.doc, &mut lines);
    lines.extend(property.decorators.iter().map(print_decorator));
    let readonly = if property.readonly { "readonly " } else { "" };
    let declaration = match &property.initializer {
        Some(value) => format!(
            "{}{}: {} = {};",
            readonly,
            property.name,
            print_type(&property.type_node),
            print_value(value)
        ),
        None => format!("{}{}!: {};", readonly, property.name, print_type(&property.type_node)),
    };
    lines.push(declaration);
    lines.join("\n")
}

/// Prints a method with its body, unindented.
pub fn print_method(method: &SynthMethod) -> String {
    let mut lines = Vec::new();
    print_doc(&method.doc, &mut lines);
    lines.extend(method.decorators.iter().map(print_decorator));

    let parameters = match &method.parameters {
        SynthParameters::None => String::new(),
        SynthParameters::Positional(names) => names.join(", "),
        SynthParameters::Destructured { bindings, type_node } => {
            let bindings: Vec<String> = bindings
                .iter()
                .map(|b| match &b.default {
                    Some(value) => format!("{} = {}", b.name, print_value(value)),
                    None => b.name.clone(),
                })
                .collect();
            format!("{{ {} }}: {}", bindings.join(", "), print_type(type_node))
        }
    };
    let return_type = method
        .return_type
        .as_ref()
        .map(|t| format!(": {}", print_type(t)))
        .unwrap_or_default();
    let signature = format!(
        "{}{}({}){}",
        if method.is_async { "async " } else { "" },
        method.name,
        parameters,
        return_type
    );
    if method.body.trim().is_empty() {
        lines.push(format!("{} {{}}", signature));
    } else {
        lines.push(format!("{} {{", signature));
        lines.push(indent(&method.body));
        lines.push("}".to_string());
    }
    lines.join("\n")
}

fn print_heritage(heritage: &SynthHeritage) -> String {
    match heritage {
        SynthHeritage::Identifier(name) => name.clone(),
        SynthHeritage::String(value) => quote(value),
        SynthHeritage::Call { callee, arguments } => {
            let arguments: Vec<String> = arguments.iter().map(print_heritage).collect();
            format!("{}({})", callee, arguments.join(", "))
        }
    }
}

/// Prints a whole class: properties first, then methods, separated by blank
/// lines.
pub fn print_class(class: &SynthClass) -> String {
    let mut lines = Vec::new();
    print_doc(&class.doc, &mut lines);
    lines.extend(class.decorators.iter().map(print_decorator));
    lines.push(format!("class {} extends {} {{", class.name, print_heritage(&class.heritage)));

    let members: Vec<String> = class
        .properties
        .iter()
        .map(print_property)
        .chain(class.methods.iter().map(print_method))
        .map(|member| indent(&member))
        .collect();
    lines.push(members.join("\n\n"));
    lines.push("}".to_string());
    let mut out = lines.into_iter().filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n");
    out.push('\n');
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", INDENT, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reverse::synth::{SynthBinding, SynthTypeMember};

    #[test]
    fn test_types() {
        let infotable = SynthType::Reference {
            name: "INFOTABLE".to_string(),
            arguments: vec![SynthType::named("GenericStringList")],
        };
        assert_eq!(print_type(&infotable), "INFOTABLE<GenericStringList>");
        let thing = SynthType::Reference {
            name: "THINGNAME".to_string(),
            arguments: vec![SynthType::Undefined, SynthType::StringLiteral("Flow Shape".to_string())],
        };
        assert_eq!(print_type(&thing), "THINGNAME<undefined, \"Flow Shape\">");
    }

    #[test]
    fn test_method_layout() {
        let method = SynthMethod {
            doc: vec!["Starts the pump".to_string(), "@param speed Target speed".to_string()],
            decorators: vec![SynthDecorator::flag("final")],
            is_async: false,
            name: "start".to_string(),
            parameters: SynthParameters::Destructured {
                bindings: vec![SynthBinding {
                    name: "speed".to_string(),
                    default: Some(SynthValue::number(1.0)),
                }],
                type_node: SynthType::Object(vec![SynthTypeMember {
                    name: "speed".to_string(),
                    optional: true,
                    type_node: SynthType::named("NUMBER"),
                }]),
            },
            return_type: Some(SynthType::named("NOTHING")),
            body: "if (speed) {\n    this.speed = speed;\n}".to_string(),
        };
        assert_eq!(
            print_method(&method),
            "/**\n * Starts the pump\n * @param speed Target speed\n */\n@final\nstart({ speed = 1 }: { speed?: NUMBER }): NOTHING {\n    if (speed) {\n        this.speed = speed;\n    }\n}"
        );
    }
}
