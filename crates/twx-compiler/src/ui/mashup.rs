//! Mashup classes to mashup entities.
//!
//! The single JSX tree returned by `renderMashup()` becomes the widget tree.
//! `<Service ref={...}/>` elements directly under the root declare data
//! services and their parameters instead of widgets.

use std::collections::HashMap;

use serde_json::Value;

use super::bindings::{BindingGraph, BindingResolver, Trigger, AREA_DATA};
use super::controller::controller_host;
use super::references::{collect_references, MASHUP_ROOT_ID};
use super::types::TypeResolver;
use super::widgets::{widget_type, WidgetType, MASHUP};
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{ClassDecl, ClassMember, Expression, JsxAttribute, JsxChild, JsxElement, ParsedFile};
use crate::frontend::typescript::jsdoc::doc_of;
use crate::model::{
    EntityAspects, EntityBody, EntityDescriptor, EntityKind, MashupContent, MashupModel, UIReference,
    UIReferenceKind, UIWidget,
};
use crate::resolve::{classify_all, ConstantValue, DecoratorKind, FileContext};

pub const SERVICE_ELEMENT: &str = "Service";
pub const REFRESH_INTERVAL: &str = "RefreshInterval";
const CONTROLLER_BASE: &str = "MashupController";

/// Builds the mashup entity declared by `class_name` in the file of `ctx`.
pub fn build_mashup(
    ctx: &mut FileContext,
    class_name: &str,
    types: &dyn TypeResolver,
    units: &[ParsedFile],
) -> Result<EntityDescriptor, CompilerError> {
    let file = ctx.file;
    let references = collect_references(ctx)?;
    let class = file
        .classes()
        .find(|c| c.name.as_deref() == Some(class_name))
        .ok_or_else(|| CompilerError::UnknownEntity {
            name: class_name.to_string(),
        })?;

    let is_controller = class.heritage.first().and_then(|h| h.as_identifier()) == Some(CONTROLLER_BASE);
    if is_controller && !ctx.config.core_ui {
        return Err(ctx.error(class.name_span, "MashupController requires Core UI mode"));
    }

    let mut exported_name = class_name.to_string();
    for decorator in classify_all(ctx, &class.decorators)? {
        match decorator.kind {
            DecoratorKind::ExportName(name) => exported_name = name,
            _ => {
                return Err(ctx.error(
                    decorator.span,
                    format!("@{} cannot be used on a mashup", decorator.name),
                ))
            }
        }
    }

    let (root, css) = mashup_members(ctx, class, is_controller)?;

    let resolver = BindingResolver {
        references: &references,
        types,
        controller: is_controller.then_some(class_name),
    };
    let mut builder = TreeBuilder {
        resolver: &resolver,
        graph: BindingGraph::new(),
        counters: HashMap::new(),
    };
    let mut ui = builder.root(ctx, root)?;
    if is_controller {
        let host = controller_host(ctx, class, &resolver, &mut builder.graph, units)?;
        ui.widgets.push(host);
    }
    let graph = builder.graph;
    log::debug!(
        "mashup {}: {} data sources, {} bindings, {} events",
        exported_name,
        graph.data.len(),
        graph.bindings.len(),
        graph.events.len()
    );

    let doc = doc_of(class.doc.as_deref());
    Ok(EntityDescriptor {
        kind: EntityKind::Mashup,
        name: class_name.to_string(),
        exported_name,
        description: doc.description,
        project: ctx.config.project_name.clone(),
        tags: ctx.config.default_tags.clone(),
        file: file.path.clone(),
        aspects: EntityAspects::default(),
        body: EntityBody::Mashup(MashupModel {
            content: MashupContent {
                data: graph.data,
                data_bindings: graph.bindings,
                events: graph.events,
                ui,
                mashup_type: MASHUP.to_string(),
                custom_mashup_css: css,
            },
            parameters: references.mashup_parameters(),
        }),
    })
}

/// The JSX returned by `renderMashup()` and the `static css` text.
fn mashup_members<'c>(
    ctx: &mut FileContext,
    class: &'c ClassDecl,
    is_controller: bool,
) -> Result<(&'c JsxElement, Option<String>), CompilerError> {
    let mut root = None;
    let mut css = None;
    for member in &class.members {
        match member {
            ClassMember::Property(property) if property.is_static && property.name == "css" => {
                let initializer = property
                    .initializer
                    .as_ref()
                    .ok_or_else(|| ctx.error(property.span, "'css' must be initialized with a string"))?;
                css = Some(ctx.string_constant(initializer, "mashup css")?);
            }
            ClassMember::Method(method) if method.name == "renderMashup" => {
                let returns = method.body.as_ref().map(|b| b.returns.as_slice()).unwrap_or_default();
                let nested = method
                    .body
                    .as_ref()
                    .and_then(|b| ctx.file.node_at(b.span))
                    .map(count_returns)
                    .unwrap_or(0);
                let ([Expression::Jsx(element)], 1) = (returns, nested) else {
                    return Err(ctx.error(
                        method.span,
                        "renderMashup() must contain exactly one return statement returning JSX",
                    ));
                };
                root = Some(element.as_ref());
            }
            _ if is_controller => {}
            other => {
                return Err(ctx.error(
                    other.span(),
                    "Mashups can only declare renderMashup() and a static css property",
                ))
            }
        }
    }
    let root = root.ok_or_else(|| ctx.error(class.name_span, "Mashups must implement renderMashup()"))?;
    Ok((root, css))
}

/// Return statements anywhere in `node`, not counting nested functions.
fn count_returns(node: tree_sitter::Node) -> usize {
    let mut count = usize::from(node.kind() == "return_statement");
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !matches!(
            child.kind(),
            "function_expression" | "arrow_function" | "function_declaration" | "method_definition" | "class"
        ) {
            count += count_returns(child);
        }
    }
    count
}

struct TreeBuilder<'r> {
    resolver: &'r BindingResolver<'r>,
    graph: BindingGraph,
    counters: HashMap<&'static str, usize>,
}

impl<'r> TreeBuilder<'r> {
    fn root(&mut self, ctx: &mut FileContext, element: &JsxElement) -> Result<UIWidget, CompilerError> {
        let widget = self.widget_type(ctx, element)?;
        if widget.name != MASHUP {
            return Err(ctx.error(element.span, "The root element of a mashup must be <Mashup>"));
        }
        if let Some(attribute) = element.attributes.iter().find(|a| a.name == "ref") {
            return Err(ctx.error(attribute.span, "The mashup root cannot take a ref"));
        }
        self.widget(ctx, element, widget, MASHUP_ROOT_ID.to_string(), true)
    }

    fn widget_type(&self, ctx: &FileContext, element: &JsxElement) -> Result<&'static WidgetType, CompilerError> {
        widget_type(&element.name).ok_or_else(|| ctx.error(element.span, format!("Unknown widget <{}>", element.name)))
    }

    fn child(&mut self, ctx: &mut FileContext, element: &JsxElement) -> Result<UIWidget, CompilerError> {
        let widget = self.widget_type(ctx, element)?;
        if widget.name == MASHUP {
            return Err(ctx.error(element.span, "<Mashup> can only be the root element"));
        }
        let id = match element.attributes.iter().find(|a| a.name == "ref") {
            Some(attribute) => self.widget_ref(ctx, attribute, widget)?,
            None => {
                let counter = self.counters.entry(widget.name).or_insert(0);
                *counter += 1;
                format!("{}-{}", widget.name, counter)
            }
        };
        self.widget(ctx, element, widget, id, false)
    }

    /// Id given by `ref={widget}`, checked against the element's type.
    fn widget_ref(
        &self,
        ctx: &FileContext,
        attribute: &JsxAttribute,
        widget: &WidgetType,
    ) -> Result<String, CompilerError> {
        let reference = attribute
            .value
            .as_ref()
            .and_then(|v| v.as_identifier())
            .and_then(|name| self.resolver.references.get(name))
            .ok_or_else(|| ctx.error(attribute.span, "ref must name a widget declared with defineWidget"))?;
        match &reference.kind {
            UIReferenceKind::Widget { widget_type } if widget_type == widget.name => Ok(reference.id.clone()),
            UIReferenceKind::Widget { widget_type } => Err(ctx.error(
                attribute.span,
                format!("ref refers to a {} but the element is a {}", widget_type, widget.name),
            )),
            _ => Err(ctx.error(attribute.span, "ref must name a widget declared with defineWidget")),
        }
    }

    fn widget(
        &mut self,
        ctx: &mut FileContext,
        element: &JsxElement,
        widget: &'static WidgetType,
        id: String,
        is_root: bool,
    ) -> Result<UIWidget, CompilerError> {
        let mut properties = widget.properties_for(&id);
        for attribute in element.attributes.iter().filter(|a| a.name != "ref") {
            let Some(value) = &attribute.value else {
                properties.insert(attribute.name.clone(), Value::Bool(true));
                continue;
            };
            if let Expression::Array { elements, .. } = value {
                let trigger = Trigger::widget(&id, &attribute.name);
                for handler in elements {
                    let handler = self.resolver.handler(ctx, &mut self.graph, handler)?;
                    self.graph.connect(&trigger, handler);
                }
            } else if self.resolver.is_binding(value) {
                let source = self.resolver.source_in(ctx, &mut self.graph, value)?;
                let target = self.resolver.widget_target(&id, widget.name, &attribute.name, &source);
                self.graph.bind(source, target);
            } else if let Some(json) = static_value(ctx, value)? {
                properties.insert(attribute.name.clone(), json);
            }
        }

        let mut widgets = Vec::new();
        for child in &element.children {
            match child {
                JsxChild::Element(inner) if inner.name == SERVICE_ELEMENT => {
                    if !is_root {
                        return Err(ctx.error(inner.span, "<Service> elements must be direct children of <Mashup>"));
                    }
                    self.service(ctx, inner)?;
                }
                JsxChild::Element(inner) => widgets.push(self.child(ctx, inner)?),
                JsxChild::Expression(expression) => {
                    return Err(ctx.error(expression.span(), "Mashup elements cannot contain expressions"))
                }
                JsxChild::Text(_, span) => return Err(ctx.error(*span, "Mashup elements cannot contain text")),
            }
        }
        Ok(UIWidget { properties, widgets })
    }

    /// `<Service ref={svc} .../>`: parameters, bindings and triggers of a
    /// data service.
    fn service(&mut self, ctx: &mut FileContext, element: &JsxElement) -> Result<(), CompilerError> {
        let reference = self.service_ref(ctx, element)?;
        if let Some(child) = element.children.first() {
            let span = match child {
                JsxChild::Element(e) => e.span,
                JsxChild::Expression(e) => e.span(),
                JsxChild::Text(_, span) => *span,
            };
            return Err(ctx.error(span, "<Service> elements cannot have children"));
        }
        self.graph.ensure_service(&reference);
        let section = reference.data_name().unwrap_or_default();

        for attribute in element.attributes.iter().filter(|a| a.name != "ref") {
            let Some(value) = &attribute.value else {
                self.set_parameter(&reference, &attribute.name, Value::Bool(true));
                continue;
            };
            if attribute.name == REFRESH_INTERVAL {
                let seconds = ctx.number_constant(value, "refresh interval")?;
                if let Some(service) = self.graph.ensure_service(&reference) {
                    service.refresh_interval = seconds.max(0.0) as u32;
                }
            } else if let Expression::Array { elements, .. } = value {
                let trigger = Trigger {
                    area: AREA_DATA.to_string(),
                    section: section.clone(),
                    id: reference.id.clone(),
                    event: attribute.name.clone(),
                };
                for handler in elements {
                    let handler = self.resolver.handler(ctx, &mut self.graph, handler)?;
                    self.graph.connect(&trigger, handler);
                }
            } else if self.resolver.is_binding(value) {
                let source = self.resolver.source_in(ctx, &mut self.graph, value)?;
                let target = self.resolver.parameter_target(&reference, &attribute.name, &source);
                self.graph.bind(source, target);
            } else if let Some(json) = static_value(ctx, value)? {
                self.set_parameter(&reference, &attribute.name, json);
            }
        }
        Ok(())
    }

    fn service_ref(&self, ctx: &FileContext, element: &JsxElement) -> Result<UIReference, CompilerError> {
        let reference = element
            .attributes
            .iter()
            .find(|a| a.name == "ref")
            .and_then(|a| a.value.as_ref())
            .and_then(|v| v.as_identifier())
            .and_then(|name| self.resolver.references.get(name))
            .filter(|r| matches!(r.kind, UIReferenceKind::Service { .. }))
            .ok_or_else(|| ctx.error(element.span, "<Service> needs ref={...} naming a defineService reference"))?;
        Ok(reference.clone())
    }

    fn set_parameter(&mut self, reference: &UIReference, name: &str, value: Value) {
        if let Some(service) = self.graph.ensure_service(reference) {
            service.parameters.insert(name.to_string(), value);
        }
    }
}

/// JSON value of a static attribute. `undefined` yields `None`.
fn static_value(ctx: &mut FileContext, value: &Expression) -> Result<Option<Value>, CompilerError> {
    match ctx.constant(value) {
        ConstantValue::Value(literal) => Ok(Some(literal.to_json())),
        ConstantValue::ExplicitUndefined => Ok(None),
        ConstantValue::Unresolved => Err(ctx.error(
            value.span(),
            format!(
                "'{}' is neither a constant, a binding nor a list of event targets",
                ctx.text(value.span())
            ),
        )),
    }
}
