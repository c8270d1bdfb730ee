//! Data sources, property bindings and event bindings of a mashup.
//!
//! Binding endpoints are resolved from access chains rooted at a UI
//! reference: `getData.AllData.name`, `textField.Text`, `params.plant` or,
//! for a Core UI controller, `this.speed`.

use indexmap::IndexMap;

use super::references::{ReferenceTable, CLASS_HOST_ID, MASHUP_ROOT_ID};
use super::types::{base_type_of_type, property_type_of, TypeResolver};
use super::widgets::widget_type;
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::Expression;
use crate::model::ui::{MashupDataService, MashupDataSource, PropertyMap, UIMashupBinding, UIMashupEventBinding};
use crate::model::{FieldDefinition, ServiceDefinition, UIReference, UIReferenceKind};
use crate::resolve::FileContext;

pub const AREA_UI: &str = "UI";
pub const AREA_DATA: &str = "Data";
pub const AREA_MASHUP: &str = "Mashup";

pub const ALL_DATA: &str = "AllData";
pub const SELECTED_ROWS: &str = "SelectedRows";

/// One side of a property binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub area: String,
    pub section: String,
    pub id: String,
    pub details: String,
    pub property: String,
    pub property_type: String,
    pub base_type: String,
}

impl Endpoint {
    fn ui(id: &str, property: &str, base_type: &str) -> Self {
        Self {
            area: AREA_UI.to_string(),
            section: String::new(),
            id: id.to_string(),
            details: String::new(),
            property: property.to_string(),
            property_type: property_type_of(base_type).to_string(),
            base_type: base_type.to_string(),
        }
    }
}

/// The object raising an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub area: String,
    pub section: String,
    pub id: String,
    pub event: String,
}

impl Trigger {
    pub fn widget(id: &str, event: &str) -> Self {
        Self {
            area: AREA_UI.to_string(),
            section: String::new(),
            id: id.to_string(),
            event: event.to_string(),
        }
    }
}

/// The service or function invoked by an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    pub area: String,
    pub id: String,
    pub service: String,
}

/// Everything the bindings of one mashup produce.
#[derive(Debug, Default)]
pub struct BindingGraph {
    pub data: IndexMap<String, MashupDataSource>,
    pub bindings: Vec<UIMashupBinding>,
    pub events: Vec<UIMashupEventBinding>,
}

impl BindingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data service of a service reference, created on first use.
    pub fn ensure_service(&mut self, reference: &UIReference) -> Option<&mut MashupDataService> {
        let UIReferenceKind::Service {
            collection,
            entity,
            service,
            dynamic,
        } = &reference.kind
        else {
            return None;
        };
        let data_name = reference.data_name()?;
        let source = self.data.entry(data_name.clone()).or_insert_with(|| MashupDataSource {
            data_name: data_name.clone(),
            entity_name: if *dynamic { String::new() } else { entity.clone() },
            entity_type: collection.clone(),
            id: data_name.clone(),
            refresh_interval: 0,
            services: Vec::new(),
        });
        let index = match source.services.iter().position(|s| s.name == *service) {
            Some(index) => index,
            None => {
                source.services.push(MashupDataService {
                    api_method: "post".to_string(),
                    characteristic: "Services".to_string(),
                    id: service.clone(),
                    name: service.clone(),
                    parameters: IndexMap::new(),
                    refresh_interval: 0,
                    target: service.clone(),
                });
                source.services.len() - 1
            }
        };
        source.services.get_mut(index)
    }

    pub fn bind(&mut self, source: Endpoint, target: Endpoint) {
        let id = format!("binding-{}", self.bindings.len() + 1);
        log::trace!("{}: {}.{} -> {}.{}", id, source.id, source.property, target.id, target.property);
        self.bindings.push(UIMashupBinding {
            id,
            property_maps: vec![PropertyMap {
                source_property: source.property,
                source_property_base_type: source.base_type,
                source_property_type: source.property_type,
                target_property: target.property,
                target_property_base_type: target.base_type,
                target_property_type: target.property_type,
            }],
            source_area: source.area,
            source_details: source.details,
            source_id: source.id,
            source_section: source.section,
            target_area: target.area,
            target_id: target.id,
            target_section: target.section,
        });
    }

    pub fn connect(&mut self, trigger: &Trigger, handler: Handler) {
        let id = format!("event-{}", self.events.len() + 1);
        self.events.push(UIMashupEventBinding {
            event_handler_area: handler.area,
            event_handler_id: handler.id,
            event_handler_service: handler.service,
            event_trigger_area: trigger.area.clone(),
            event_trigger_event: trigger.event.clone(),
            event_trigger_id: trigger.id.clone(),
            event_trigger_section: trigger.section.clone(),
            id,
        });
    }
}

/// Resolves binding endpoints of one mashup file.
pub struct BindingResolver<'r> {
    pub references: &'r ReferenceTable,
    pub types: &'r dyn TypeResolver,
    /// Class whose fields `this.x` refers to, in Core UI mode.
    pub controller: Option<&'r str>,
}

impl<'r> BindingResolver<'r> {
    /// Whether `expression` is an access chain the resolver understands.
    pub fn is_binding(&self, expression: &Expression) -> bool {
        let inner = expression.without_assertions();
        match inner.access_path() {
            Some(path) => match path.first().map(String::as_str) {
                Some("this") => self.controller.is_some(),
                Some(head) => self.references.get(head).is_some(),
                None => false,
            },
            None => false,
        }
    }

    /// Source endpoint of a binding expression.
    pub fn source(&self, ctx: &FileContext, expression: &Expression) -> Result<Endpoint, CompilerError> {
        let (inner, asserted) = match expression {
            Expression::As {
                expression,
                type_node: Some(type_node),
                ..
            } => {
                let base = base_type_of_type(ctx.symbols, type_node).ok_or_else(|| {
                    ctx.error(
                        type_node.span(),
                        format!("Cannot determine the base type of '{}'", ctx.text(type_node.span())),
                    )
                })?;
                (expression.without_assertions(), Some(base))
            }
            other => (other.without_assertions(), None),
        };
        let path = inner
            .access_path()
            .ok_or_else(|| ctx.error(inner.span(), "Bindings must be property access chains"))?;
        let head = path[0].as_str();

        if head == "this" {
            let class_name = self
                .controller
                .ok_or_else(|| ctx.error(inner.span(), "'this' can only be bound in Core UI mode"))?;
            return self.member_source(ctx, inner, &path, CLASS_HOST_ID, asserted, |property| {
                controller_field_type(ctx, class_name, property)
            });
        }

        let reference = self
            .references
            .get(head)
            .ok_or_else(|| ctx.error(inner.span(), format!("'{}' is not a UI reference", head)))?;
        match &reference.kind {
            UIReferenceKind::Service {
                collection,
                entity,
                service,
                ..
            } => {
                let data_name = reference.data_name().unwrap_or_default();
                let definition = self.types.service(collection, entity, service);
                let shape = definition.as_ref().and_then(|d| d.result_type.aspects.data_shape.clone());
                let mut endpoint = self.infotable_source(ctx, inner, &path[1..], shape, asserted, 3)?;
                endpoint.area = AREA_DATA.to_string();
                endpoint.section = data_name;
                endpoint.id = service.clone();
                Ok(endpoint)
            }
            UIReferenceKind::Widget { widget_type: tag } => {
                let widget = widget_type(tag);
                self.member_source(ctx, inner, &path, &reference.id, asserted, |property| {
                    widget.and_then(|w| w.property_type(property)).map(str::to_string)
                })
            }
            UIReferenceKind::Script { class_name } => {
                self.member_source(ctx, inner, &path, CLASS_HOST_ID, asserted, |property| {
                    controller_field_type(ctx, class_name, property)
                })
            }
            UIReferenceKind::Mashup { parameters } => {
                let Some(name) = path.get(1) else {
                    return Err(ctx.error(inner.span(), "Bind to a mashup parameter, not the parameter list"));
                };
                let parameter = parameters
                    .iter()
                    .find(|p| &p.name == name)
                    .ok_or_else(|| ctx.error(inner.span(), format!("Unknown mashup parameter '{}'", name)))?;
                let mut endpoint = if path.len() == 2 {
                    let base_type = asserted.unwrap_or_else(|| parameter.base_type.clone());
                    Endpoint::ui(MASHUP_ROOT_ID, name, &base_type)
                } else {
                    if parameter.base_type != "INFOTABLE" {
                        return Err(ctx.error(
                            inner.span(),
                            format!("Mashup parameter '{}' is not an infotable", name),
                        ));
                    }
                    let shape = parameter.aspects.data_shape.clone();
                    let mut endpoint = self.infotable_source(ctx, inner, &path[2..], shape, asserted, 3)?;
                    endpoint.property = if endpoint.property.is_empty() {
                        name.clone()
                    } else {
                        format!("{}.{}", name, endpoint.property)
                    };
                    endpoint.id = MASHUP_ROOT_ID.to_string();
                    endpoint
                };
                endpoint.area = AREA_MASHUP.to_string();
                Ok(endpoint)
            }
        }
    }

    /// Like [`Self::source`], registering the data service a service
    /// source reads from.
    pub fn source_in(
        &self,
        ctx: &FileContext,
        graph: &mut BindingGraph,
        expression: &Expression,
    ) -> Result<Endpoint, CompilerError> {
        let endpoint = self.source(ctx, expression)?;
        if endpoint.area == AREA_DATA {
            let head = expression.without_assertions().access_path().and_then(|p| p.into_iter().next());
            if let Some(reference) = head.and_then(|h| self.references.get(&h)) {
                graph.ensure_service(reference);
            }
        }
        Ok(endpoint)
    }

    /// A `reference.property` source of a widget or controller.
    fn member_source(
        &self,
        ctx: &FileContext,
        inner: &Expression,
        path: &[String],
        id: &str,
        asserted: Option<String>,
        declared: impl Fn(&str) -> Option<String>,
    ) -> Result<Endpoint, CompilerError> {
        let [_, property] = path else {
            return Err(ctx.error(
                inner.span(),
                "Widget and controller bindings must name exactly one property",
            ));
        };
        let base_type = match asserted.or_else(|| declared(property)) {
            Some(base_type) => base_type,
            None => return Err(untyped(ctx, inner)),
        };
        Ok(Endpoint::ui(id, property, &base_type))
    }

    /// `AllData[.field]` or `SelectedRows[.field...]` of an infotable.
    fn infotable_source(
        &self,
        ctx: &FileContext,
        inner: &Expression,
        rest: &[String],
        data_shape: Option<String>,
        asserted: Option<String>,
        all_data_depth: usize,
    ) -> Result<Endpoint, CompilerError> {
        let Some(details) = rest.first() else {
            return Err(ctx.error(inner.span(), "Bind to AllData or SelectedRows of a service result"));
        };
        let fields = &rest[1..];
        match details.as_str() {
            ALL_DATA if rest.len() + 1 > all_data_depth => {
                return Err(ctx.error(inner.span(), "AllData bindings can reach at most one field deep"));
            }
            ALL_DATA | SELECTED_ROWS => {}
            other => {
                return Err(ctx.error(
                    inner.span(),
                    format!("Expected AllData or SelectedRows, found '{}'", other),
                ))
            }
        }
        let (property, property_type, base_type) = if fields.is_empty() {
            (String::new(), "InfoTable".to_string(), "INFOTABLE".to_string())
        } else {
            let base_type = match asserted {
                Some(base_type) => base_type,
                None => self
                    .field_type(data_shape, fields)
                    .ok_or_else(|| untyped(ctx, inner))?,
            };
            (fields.join("."), "Field".to_string(), base_type)
        };
        Ok(Endpoint {
            area: String::new(),
            section: String::new(),
            id: String::new(),
            details: details.clone(),
            property,
            property_type,
            base_type,
        })
    }

    /// Follows `fields` through nested infotable data shapes.
    fn field_type(&self, data_shape: Option<String>, fields: &[String]) -> Option<String> {
        let mut shape = data_shape?;
        let mut found: Option<FieldDefinition> = None;
        for (index, name) in fields.iter().enumerate() {
            if index > 0 {
                let previous = found.take()?;
                if previous.base_type != "INFOTABLE" {
                    return None;
                }
                shape = previous.aspects.data_shape?;
            }
            found = self.types.data_shape_fields(&shape)?.into_iter().find(|f| &f.name == name);
        }
        found.map(|f| f.base_type)
    }

    /// Target endpoint of a widget attribute.
    pub fn widget_target(&self, widget_id: &str, tag: &str, property: &str, source: &Endpoint) -> Endpoint {
        let base_type = widget_type(tag)
            .and_then(|w| w.property_type(property))
            .unwrap_or(source.base_type.as_str());
        Endpoint::ui(widget_id, property, base_type)
    }

    /// Target endpoint of a service parameter.
    pub fn parameter_target(&self, reference: &UIReference, parameter: &str, source: &Endpoint) -> Endpoint {
        let base_type = self
            .service_definition(reference)
            .and_then(|d| d.parameter_definitions.into_iter().find(|p| p.name == parameter))
            .map(|p| p.base_type)
            .unwrap_or_else(|| source.base_type.clone());
        Endpoint {
            area: AREA_DATA.to_string(),
            section: reference.data_name().unwrap_or_default(),
            id: reference.id.clone(),
            details: String::new(),
            property: parameter.to_string(),
            property_type: property_type_of(&base_type).to_string(),
            base_type,
        }
    }

    /// Target endpoint of a controller field.
    pub fn controller_target(&self, ctx: &FileContext, class_name: &str, field: &str, source: &Endpoint) -> Endpoint {
        let base_type = controller_field_type(ctx, class_name, field).unwrap_or_else(|| source.base_type.clone());
        Endpoint::ui(CLASS_HOST_ID, field, &base_type)
    }

    fn service_definition(&self, reference: &UIReference) -> Option<ServiceDefinition> {
        match &reference.kind {
            UIReferenceKind::Service {
                collection,
                entity,
                service,
                ..
            } => self.types.service(collection, entity, service),
            _ => None,
        }
    }

    /// Handler invoked by one element of an event target array.
    pub fn handler(&self, ctx: &FileContext, graph: &mut BindingGraph, expression: &Expression) -> Result<Handler, CompilerError> {
        let path = expression
            .access_path()
            .ok_or_else(|| ctx.error(expression.span(), "Event targets must be services or widget functions"))?;
        let head = path[0].as_str();
        if head == "this" {
            if self.controller.is_none() {
                return Err(ctx.error(expression.span(), "'this' can only be an event target in Core UI mode"));
            }
            let [_, method] = path.as_slice() else {
                return Err(ctx.error(expression.span(), "Controller event targets must name one method"));
            };
            return Ok(Handler {
                area: AREA_UI.to_string(),
                id: CLASS_HOST_ID.to_string(),
                service: method.clone(),
            });
        }
        let reference = self
            .references
            .get(head)
            .ok_or_else(|| ctx.error(expression.span(), format!("'{}' is not a UI reference", head)))?;
        match (&reference.kind, path.as_slice()) {
            (UIReferenceKind::Service { service, .. }, [_]) => {
                graph.ensure_service(reference);
                Ok(Handler {
                    area: AREA_DATA.to_string(),
                    id: reference.data_name().unwrap_or_default(),
                    service: service.clone(),
                })
            }
            (UIReferenceKind::Widget { .. }, [_, function]) => Ok(Handler {
                area: AREA_UI.to_string(),
                id: reference.id.clone(),
                service: function.clone(),
            }),
            (UIReferenceKind::Script { .. }, [_, method]) => Ok(Handler {
                area: AREA_UI.to_string(),
                id: CLASS_HOST_ID.to_string(),
                service: method.clone(),
            }),
            _ => Err(ctx.error(
                expression.span(),
                "Event targets must be a service reference or a single widget function",
            )),
        }
    }
}

fn controller_field_type(ctx: &FileContext, class_name: &str, field: &str) -> Option<String> {
    let members = ctx.symbols.members_of_type(class_name)?;
    let member = members.into_iter().find(|m| m.name == field)?;
    base_type_of_type(ctx.symbols, &member.type_node?)
}

fn untyped(ctx: &FileContext, expression: &Expression) -> CompilerError {
    ctx.error(
        expression.span(),
        format!(
            "Cannot infer the base type of '{}'. Add an explicit type assertion, e.g. '{} as STRING'",
            ctx.text(expression.span()),
            ctx.text(expression.span())
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::frontend::typescript::ast::{ParsedFile, Statement};
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::model::FieldAspects;
    use crate::resolve::SymbolTable;
    use crate::ui::references::collect_references;
    use std::path::Path;

    struct Plant;

    impl TypeResolver for Plant {
        fn service(&self, collection: &str, entity: &str, service: &str) -> Option<ServiceDefinition> {
            if (collection, entity, service) != ("Things", "Plant", "GetData") {
                return None;
            }
            let mut result = FieldDefinition::new("result", "INFOTABLE");
            result.aspects = FieldAspects {
                data_shape: Some("PlantRow".to_string()),
                ..Default::default()
            };
            Some(ServiceDefinition {
                name: "GetData".to_string(),
                description: String::new(),
                parameter_definitions: vec![FieldDefinition::new("limit", "INTEGER")],
                result_type: result,
                aspects: Default::default(),
                is_allow_override: true,
                is_overriden: false,
                code: String::new(),
                remote_binding: None,
            })
        }

        fn data_shape_fields(&self, data_shape: &str) -> Option<Vec<FieldDefinition>> {
            (data_shape == "PlantRow").then(|| vec![FieldDefinition::new("name", "STRING")])
        }
    }

    const REFERENCES: &str = r#"
        const getData = defineService(Things.Plant.GetData);
        const field = defineWidget(Ptcstextfield);
        const params = defineMashup(class { plant!: STRING; });
    "#;

    fn parse(source: &str) -> ParsedFile {
        TypeScriptParser::new().unwrap().parse(source, Path::new("Overview.tsx")).unwrap()
    }

    /// Initializer of the last root variable, used as the binding under test.
    fn last_initializer(file: &ParsedFile) -> Expression {
        file.statements
            .iter()
            .rev()
            .find_map(|s| match s {
                Statement::Variable(v) => v.declarators[0].initializer.clone(),
                _ => None,
            })
            .unwrap()
    }

    fn resolve(binding: &str) -> Result<Endpoint, CompilerError> {
        let file = parse(REFERENCES);
        let config = CompilerConfig::default();
        let symbols = SymbolTable::new();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let references = collect_references(&mut ctx).unwrap();

        let probe = parse(&format!("let probe = {};", binding));
        let expression = last_initializer(&probe);
        let probe_ctx = FileContext::new(&probe, &config, &symbols);
        let resolver = BindingResolver {
            references: &references,
            types: &Plant,
            controller: None,
        };
        resolver.source(&probe_ctx, &expression)
    }

    #[test]
    fn test_service_sources() {
        let all = resolve("getData.AllData").unwrap();
        assert_eq!(all.area, "Data");
        assert_eq!(all.section, "Things_Plant");
        assert_eq!(all.id, "GetData");
        assert_eq!(all.details, "AllData");
        assert_eq!(all.base_type, "INFOTABLE");

        let field = resolve("getData.SelectedRows.name").unwrap();
        assert_eq!(field.details, "SelectedRows");
        assert_eq!(field.property, "name");
        assert_eq!(field.base_type, "STRING");

        assert!(resolve("getData.Result").is_err());
        assert!(resolve("getData.AllData.name.length").is_err());
        assert!(resolve("getData.AllData.unknown").is_err());
        assert_eq!(resolve("getData.AllData.unknown as NUMBER").unwrap().base_type, "NUMBER");
    }

    #[test]
    fn test_widget_and_parameter_sources() {
        let text = resolve("field.Text").unwrap();
        assert_eq!((text.area.as_str(), text.id.as_str(), text.base_type.as_str()), ("UI", "field", "STRING"));
        assert!(resolve("field.Text.length").is_err());
        assert!(resolve("field.Unknown").is_err());

        let plant = resolve("params.plant").unwrap();
        assert_eq!(plant.area, "Mashup");
        assert_eq!(plant.id, MASHUP_ROOT_ID);
        assert_eq!(plant.base_type, "STRING");
        assert!(resolve("this.plant").is_err());
    }

    #[test]
    fn test_graph_ids_and_data_sources() {
        let reference = UIReference {
            kind: UIReferenceKind::Service {
                collection: "Things".to_string(),
                entity: "Plant".to_string(),
                service: "GetData".to_string(),
                dynamic: false,
            },
            id: "GetData".to_string(),
        };
        let mut graph = BindingGraph::new();
        graph.ensure_service(&reference);
        graph.ensure_service(&reference);
        assert_eq!(graph.data.len(), 1);
        assert_eq!(graph.data["Things_Plant"].services.len(), 1);

        graph.bind(Endpoint::ui("a", "Text", "STRING"), Endpoint::ui("b", "Label", "STRING"));
        graph.connect(
            &Trigger::widget("b", "Clicked"),
            Handler {
                area: "Data".to_string(),
                id: "Things_Plant".to_string(),
                service: "GetData".to_string(),
            },
        );
        assert_eq!(graph.bindings[0].id, "binding-1");
        assert_eq!(graph.events[0].id, "event-1");
        assert_eq!(graph.events[0].event_trigger_event, "Clicked");
    }
}
