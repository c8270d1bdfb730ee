//! Core UI controllers: a mashup class whose fields and methods run in the
//! browser through a class host widget.
//!
//! Fields decorated with `@property(...)` are binding targets fed by the
//! listed sources. Fields decorated with `@twevent(...)` are events of the
//! host that invoke the listed handlers.

use serde_json::{json, Value};

use super::bindings::{BindingGraph, BindingResolver, Trigger};
use super::references::CLASS_HOST_ID;
use super::types::base_type_of_type;
use super::widgets::{widget_type, CLASS_HOST};
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{ClassDecl, ClassMember, ParsedFile};
use crate::model::UIWidget;
use crate::resolve::{classify_all, DecoratorKind, FileContext};
use crate::rewrite::emitter::Emitter;
use crate::rewrite::helpers::Inliner;
use crate::rewrite::reindent;

/// Members that describe the mashup rather than the controller.
pub const MASHUP_MEMBERS: &[&str] = &["renderMashup", "css"];

/// Wires the controller fields into `graph` and returns the host widget.
pub fn controller_host(
    ctx: &mut FileContext,
    class: &ClassDecl,
    resolver: &BindingResolver,
    graph: &mut BindingGraph,
    units: &[ParsedFile],
) -> Result<UIWidget, CompilerError> {
    let class_name = class.display_name().to_string();
    let mut properties = Vec::new();
    let mut events = Vec::new();
    let mut services = Vec::new();

    for member in &class.members {
        match member {
            ClassMember::Property(property) if property.is_static => {}
            ClassMember::Property(property) => {
                let mut is_event = false;
                for decorator in classify_all(ctx, &property.decorators)? {
                    match decorator.kind {
                        DecoratorKind::BindingSources(sources) => {
                            for source in &sources {
                                let endpoint = resolver.source_in(ctx, graph, source)?;
                                let target = resolver.controller_target(ctx, &class_name, &property.name, &endpoint);
                                graph.bind(endpoint, target);
                            }
                        }
                        DecoratorKind::EventTargets(targets) => {
                            is_event = true;
                            let trigger = Trigger::widget(CLASS_HOST_ID, &property.name);
                            for target in &targets {
                                let handler = resolver.handler(ctx, graph, target)?;
                                graph.connect(&trigger, handler);
                            }
                        }
                        _ => {
                            return Err(ctx.error(
                                decorator.span,
                                format!("@{} cannot be used on a controller field", decorator.name),
                            ))
                        }
                    }
                }
                if is_event {
                    events.push(Value::String(property.name.clone()));
                } else {
                    let base_type = property
                        .type_node
                        .as_ref()
                        .and_then(|t| base_type_of_type(ctx.symbols, t))
                        .unwrap_or_else(|| "VARIANT".to_string());
                    properties.push(json!({ "name": property.name, "baseType": base_type }));
                }
            }
            ClassMember::Method(method) if MASHUP_MEMBERS.contains(&method.name.as_str()) => {}
            ClassMember::Method(method) => {
                if let Some(decorator) = method.decorators.first() {
                    return Err(ctx.error(decorator.span, "Controller methods cannot be decorated"));
                }
                services.push(Value::String(method.name.clone()));
            }
            ClassMember::Other { span, .. } => {
                return Err(ctx.error(*span, "Unsupported controller member"));
            }
        }
    }

    let code = controller_code(ctx.file, class, units, ctx.symbols)?;
    log::debug!("controller {}: {} properties, {} events", class_name, properties.len(), events.len());

    let host = widget_type(CLASS_HOST).ok_or_else(|| ctx.error(class.span, "The class host widget is not available"))?;
    let mut widget = UIWidget {
        properties: host.properties_for(CLASS_HOST_ID),
        widgets: Vec::new(),
    };
    widget.properties.insert("Class".to_string(), Value::String(class_name));
    widget.properties.insert("Code".to_string(), Value::String(code));
    widget.properties.insert("ClassProperties".to_string(), Value::Array(properties));
    widget.properties.insert("ClassEvents".to_string(), Value::Array(events));
    widget.properties.insert("ClassServices".to_string(), Value::Array(services));
    Ok(widget)
}

/// Runtime source of the controller: the class without its mashup members,
/// decorators or types.
fn controller_code(
    file: &ParsedFile,
    class: &ClassDecl,
    units: &[ParsedFile],
    symbols: &crate::resolve::SymbolTable,
) -> Result<String, CompilerError> {
    let mut members = Vec::new();
    for member in &class.members {
        let name = match member {
            ClassMember::Property(p) => p.name.as_str(),
            ClassMember::Method(m) => m.name.as_str(),
            ClassMember::Other { .. } => continue,
        };
        if MASHUP_MEMBERS.contains(&name) {
            continue;
        }
        let node = file
            .node_at(member.span())
            .ok_or_else(|| file.error(member.span(), "Cannot locate the class member"))?;
        let mut text = reindent(&Emitter::new(file, None).emit(node)?, "    ");
        if matches!(member, ClassMember::Property(_)) && !text.ends_with(';') {
            text.push(';');
        }
        members.push(text);
    }
    let code = format!("class {} {{\n{}\n}}", class.display_name(), members.join("\n"));
    let prelude = Inliner::new(units, symbols, None).prelude(&code)?;
    Ok(if prelude.is_empty() {
        code
    } else {
        format!("{}\n{}", prelude, code)
    })
}
