//! File-level visitor.
//!
//! A file is either global code (a leading `"use <Thing>"` directive), a
//! mashup, a model file with exactly one entity class, or a file that only
//! contributes declarations. The visitor moves through [`FileState`] while
//! it decides which and rejects any root statement the target runtime has
//! no equivalent for.

use std::collections::HashSet;

use super::configuration::{configuration_table_definitions, configuration_tables};
use super::data_shape::visit_data_shape;
use super::organization::visit_organization;
use super::permission::{is_permission_decorator, permissions_of_node};
use super::property::{visit_property, FieldOutcome};
use super::service::{visit_method, MethodOutcome};
use super::user_list::visit_user_list;
use crate::diagnostic::{CompilerError, Span};
use crate::frontend::typescript::ast::{ClassDecl, ClassMember, Expression, Statement};
use crate::frontend::typescript::jsdoc::doc_of;
use crate::model::{EntityAspects, EntityBody, EntityDescriptor, EntityKind, ThingModel};
use crate::resolve::{classify_all, DecoratorKind, FileContext};

/// Base classes that make a class a mashup.
pub const MASHUP_BASES: &[&str] = &["MashupBase", "MashupController"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Unvisited,
    DeterminingFileKind,
    GlobalCodeBlock,
    SingleEntityClass,
    MemberVisitation,
    Finalized,
}

/// The member whose `code` a [`CodeJob`] fills in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeTarget {
    Service(String),
    Subscription(String),
}

impl CodeTarget {
    pub fn name(&self) -> &str {
        match self {
            Self::Service(name) | Self::Subscription(name) => name,
        }
    }
}

/// A method body to rewrite once every entity is known.
#[derive(Debug, Clone)]
pub struct CodeJob {
    pub class_name: String,
    pub target: CodeTarget,
    pub body: Span,
    /// Renamed destructured parameters, `(parameter, local)`.
    pub aliases: Vec<(String, String)>,
}

#[derive(Debug)]
pub enum FileOutcome {
    Entity {
        descriptor: Box<EntityDescriptor>,
        jobs: Vec<CodeJob>,
    },
    /// Script attached to the startup of `thing`.
    GlobalCode { thing: String },
    /// Built by the mashup builder once the entity store is complete.
    Mashup { class_name: String },
    /// Only interfaces, enums, type aliases or functions.
    Declarations,
}

/// How the heritage clause of an entity class was read.
enum Heritage {
    Kind(EntityKind),
    Template {
        template: Option<String>,
        shapes: Vec<String>,
        data_shape: Option<String>,
    },
}

pub struct EntityVisitor<'c, 'a> {
    ctx: &'c mut FileContext<'a>,
    state: FileState,
}

impl<'c, 'a> EntityVisitor<'c, 'a> {
    pub fn new(ctx: &'c mut FileContext<'a>) -> Self {
        Self {
            ctx,
            state: FileState::Unvisited,
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    fn enter(&mut self, state: FileState) {
        log::trace!("{}: {:?} -> {:?}", self.ctx.file.path.display(), self.state, state);
        self.state = state;
    }

    pub fn visit_file(&mut self) -> Result<FileOutcome, CompilerError> {
        self.enter(FileState::DeterminingFileKind);
        let file = self.ctx.file;

        if let Some(Statement::Directive { value, .. }) = file.statements.first() {
            if let Some(thing) = global_code_target(value) {
                self.enter(FileState::GlobalCodeBlock);
                self.enter(FileState::Finalized);
                return Ok(FileOutcome::GlobalCode {
                    thing: thing.to_string(),
                });
            }
        }

        let mut classes = file.classes();
        let class = classes.next();
        if let Some(second) = classes.next() {
            return Err(self.ctx.error(second.span, "Only one class can be declared per file"));
        }
        let is_mashup = class.map(is_mashup_class).unwrap_or(false);
        self.check_root_statements(is_mashup)?;

        let Some(class) = class else {
            self.enter(FileState::Finalized);
            return Ok(FileOutcome::Declarations);
        };
        let class_name = class
            .name
            .clone()
            .ok_or_else(|| self.ctx.error(class.span, "Entity classes must be named"))?;

        if is_mashup {
            self.enter(FileState::Finalized);
            return Ok(FileOutcome::Mashup { class_name });
        }

        self.enter(FileState::SingleEntityClass);
        let heritage = self.visit_heritage(class)?;
        let (descriptor, jobs) = self.visit_entity_class(class, &class_name, heritage)?;
        self.enter(FileState::Finalized);
        log::debug!("built {:?} '{}'", descriptor.kind, descriptor.exported_name);
        Ok(FileOutcome::Entity {
            descriptor: Box::new(descriptor),
            jobs,
        })
    }

    fn check_root_statements(&self, is_mashup: bool) -> Result<(), CompilerError> {
        for statement in &self.ctx.file.statements {
            match statement {
                Statement::Import(_) | Statement::Interface(_) | Statement::TypeAlias(_) | Statement::Class(_) => {}
                Statement::Directive { value, .. } if value == "use strict" => {}
                Statement::Enum(decl) if decl.is_const => {}
                Statement::Enum(decl) => {
                    return Err(self.ctx.error(
                        decl.span,
                        "Only const enums can be declared; regular enums have no runtime equivalent",
                    ))
                }
                Statement::Function(function) if self.ctx.config.experimental_globals => {
                    log::trace!("global function '{}'", function.name);
                }
                Statement::Variable(_) if is_mashup => {}
                Statement::Other { kind, .. } if kind == "ambient_declaration" => {}
                other => {
                    return Err(self.ctx.error(
                        other.span(),
                        "Only a single class, interfaces, type aliases, const enums and imports may appear at the root of a file",
                    ))
                }
            }
        }
        Ok(())
    }

    fn visit_heritage(&mut self, class: &ClassDecl) -> Result<Heritage, CompilerError> {
        let Some(base) = class.heritage.first() else {
            return Err(self.ctx.error(
                class.name_span,
                "Entity classes must extend a base class that determines their kind",
            ));
        };
        match base.without_assertions() {
            Expression::Identifier { name, .. } => Ok(match name.as_str() {
                "ThingShapeBase" => Heritage::Kind(EntityKind::ThingShape),
                "DataShapeBase" => Heritage::Kind(EntityKind::DataShape),
                "UserList" => Heritage::Kind(EntityKind::UserList),
                "OrganizationBase" => Heritage::Kind(EntityKind::Organization),
                template => Heritage::Template {
                    template: Some(template.to_string()),
                    shapes: Vec::new(),
                    data_shape: None,
                },
            }),
            Expression::Call { callee, arguments, span } => {
                let callee_name = callee.as_identifier().unwrap_or_default();
                match callee_name {
                    "DataShapeBase" => Err(self.ctx.error(*span, "Data shape inheritance is not supported")),
                    "ThingTemplateWithShapes" | "ThingTemplateWithShapesReference" => {
                        let by_reference = callee_name.ends_with("Reference");
                        let Some((first, rest)) = arguments.split_first() else {
                            return Err(self.ctx.error(
                                *span,
                                format!("{} requires a thing template argument", callee_name),
                            ));
                        };
                        let (template, data_shape) = self.template_argument(first, by_reference)?;
                        let mut shapes = Vec::new();
                        for shape in rest {
                            shapes.push(self.entity_argument(shape, by_reference)?);
                        }
                        Ok(Heritage::Template {
                            template: Some(template),
                            shapes,
                            data_shape,
                        })
                    }
                    "ThingTemplateReference" => match arguments.as_slice() {
                        [Expression::String { value, .. }] => Ok(Heritage::Template {
                            template: Some(value.clone()),
                            shapes: Vec::new(),
                            data_shape: None,
                        }),
                        _ => Err(self.ctx.error(
                            *span,
                            "ThingTemplateReference requires a single string literal template name",
                        )),
                    },
                    _ => Err(self.ctx.error(
                        *span,
                        "Unsupported base class call; use ThingTemplateWithShapes, ThingTemplateWithShapesReference or ThingTemplateReference",
                    )),
                }
            }
            other => Err(self.ctx.error(other.span(), "Unsupported base class expression")),
        }
    }

    /// The first argument of a shapes heritage: a template or `DataThing(Template, DataShape)`.
    fn template_argument(
        &mut self,
        expression: &Expression,
        by_reference: bool,
    ) -> Result<(String, Option<String>), CompilerError> {
        if let Expression::Call { callee, arguments, span } = expression.without_assertions() {
            if callee.as_identifier() == Some("DataThing") {
                let [template, data_shape] = arguments.as_slice() else {
                    return Err(self.ctx.error(
                        *span,
                        "DataThing requires a thing template and a data shape argument",
                    ));
                };
                return Ok((
                    self.entity_argument(template, by_reference)?,
                    Some(self.entity_argument(data_shape, by_reference)?),
                ));
            }
        }
        Ok((self.entity_argument(expression, by_reference)?, None))
    }

    fn entity_argument(&mut self, expression: &Expression, by_reference: bool) -> Result<String, CompilerError> {
        match (expression.without_assertions(), by_reference) {
            (Expression::Identifier { name, .. }, false) => Ok(name.clone()),
            (Expression::String { value, .. }, true) => Ok(value.clone()),
            (other, false) => Err(self.ctx.error(other.span(), "Expected an entity class identifier")),
            (other, true) => Err(self.ctx.error(other.span(), "Expected a string literal entity name")),
        }
    }

    fn visit_entity_class(
        &mut self,
        class: &ClassDecl,
        class_name: &str,
        heritage: Heritage,
    ) -> Result<(EntityDescriptor, Vec<CodeJob>), CompilerError> {
        let relevant: Vec<_> = class
            .decorators
            .iter()
            .filter(|d| !is_permission_decorator(d))
            .cloned()
            .collect();
        let decorators = classify_all(self.ctx, &relevant)?;

        let mut aspects = EntityAspects::default();
        let kind = match heritage {
            Heritage::Kind(kind) => kind,
            Heritage::Template {
                template,
                shapes,
                data_shape,
            } => {
                let thing = decorators
                    .iter()
                    .filter(|d| matches!(d.kind, DecoratorKind::ThingDefinition))
                    .count();
                let template_definition = decorators
                    .iter()
                    .filter(|d| matches!(d.kind, DecoratorKind::ThingTemplateDefinition))
                    .count();
                aspects.thing_template = template;
                aspects.implemented_shapes = shapes;
                aspects.data_shape = data_shape;
                match (thing, template_definition) {
                    (1, 0) => EntityKind::Thing,
                    (0, 1) => EntityKind::ThingTemplate,
                    _ => {
                        return Err(self.ctx.error(
                            class.name_span,
                            "Classes extending a thing template require exactly one of @ThingDefinition or @ThingTemplateDefinition",
                        ))
                    }
                }
            }
        };

        let mut exported_name = class_name.to_string();
        let mut thing = ThingModel::default();
        let is_thing_like = matches!(
            kind,
            EntityKind::Thing | EntityKind::ThingTemplate | EntityKind::ThingShape
        );
        for decorator in decorators {
            match decorator.kind {
                DecoratorKind::ExportName(name) => exported_name = name,
                DecoratorKind::ThingDefinition | DecoratorKind::ThingTemplateDefinition
                    if kind == EntityKind::Thing || kind == EntityKind::ThingTemplate => {}
                DecoratorKind::Published if is_thing_like => aspects.published = true,
                DecoratorKind::Editable if is_thing_like => aspects.editable = true,
                DecoratorKind::ValueStream(name) if kind != EntityKind::ThingShape && is_thing_like => {
                    aspects.value_stream = Some(name)
                }
                DecoratorKind::Identifier(id) if kind == EntityKind::Thing => aspects.identifier = Some(id),
                DecoratorKind::ConfigurationTables(tables) if is_thing_like => {
                    thing.configuration_table_definitions = configuration_table_definitions(self.ctx, &tables)?;
                }
                DecoratorKind::Config(values) if kind == EntityKind::Thing || kind == EntityKind::ThingTemplate => {
                    thing.configuration_tables = configuration_tables(self.ctx, &values)?;
                }
                DecoratorKind::Visible { instance, principals } if is_thing_like => {
                    if instance {
                        thing.visibility.instance.extend(principals);
                    } else {
                        thing.visibility.runtime.extend(principals);
                    }
                }
                _ => {
                    return Err(self.ctx.error(
                        decorator.span,
                        format!("@{} cannot be used on a {}", decorator.name, kind.element()),
                    ))
                }
            }
        }

        let doc = doc_of(class.doc.as_deref());
        let mut descriptor = EntityDescriptor {
            kind,
            name: class_name.to_string(),
            exported_name,
            description: doc.description,
            project: self.ctx.config.project_name.clone(),
            tags: self.ctx.config.default_tags.clone(),
            file: self.ctx.file.path.clone(),
            aspects,
            body: EntityBody::Thing(ThingModel::default()),
        };

        self.enter(FileState::MemberVisitation);
        let mut jobs = Vec::new();
        let body = match kind {
            EntityKind::DataShape => EntityBody::DataShape(visit_data_shape(self.ctx, class)?),
            EntityKind::UserList => EntityBody::UserList(visit_user_list(self.ctx, class)?),
            EntityKind::Organization => EntityBody::Organization(visit_organization(self.ctx, class)?),
            EntityKind::Mashup => {
                return Err(self.ctx.error(class.span, "Mashups are built by the mashup builder"));
            }
            _ => {
                thing.permissions = permissions_of_node(self.ctx, &class.decorators, None)?;
                self.visit_thing_members(class, &descriptor, &mut thing, &mut jobs)?;
                EntityBody::Thing(thing)
            }
        };
        descriptor.body = body;
        if !is_thing_like {
            if let Some(decorator) = class.decorators.iter().find(|d| is_permission_decorator(d)) {
                return Err(self.ctx.error(
                    decorator.span,
                    format!("Permissions cannot be declared on a {}", kind.element()),
                ));
            }
        }
        Ok((descriptor, jobs))
    }

    fn visit_thing_members(
        &mut self,
        class: &ClassDecl,
        descriptor: &EntityDescriptor,
        thing: &mut ThingModel,
        jobs: &mut Vec<CodeJob>,
    ) -> Result<(), CompilerError> {
        let mut names = HashSet::new();
        let mut ordinal = 0;
        for member in &class.members {
            let (name, decorators, span) = match member {
                ClassMember::Property(property) => (&property.name, &property.decorators, property.span),
                ClassMember::Method(method) => (&method.name, &method.decorators, method.span),
                ClassMember::Other { kind, span } => {
                    return Err(self.ctx.error(*span, format!("Unsupported class member '{}'", kind)));
                }
            };
            if !names.insert(name.clone()) {
                return Err(self.ctx.error(span, format!("Duplicate member '{}'", name)));
            }

            match member {
                ClassMember::Property(property) => match visit_property(self.ctx, property, ordinal)? {
                    FieldOutcome::Property(definition) => {
                        ordinal += 1;
                        thing.properties.push(definition);
                    }
                    FieldOutcome::Event(event) => thing.events.push(event),
                },
                ClassMember::Method(method) => {
                    let visited = visit_method(self.ctx, method, descriptor.kind, &descriptor.exported_name)?;
                    thing.deployment_endpoints.extend(visited.deployment_endpoint);
                    let target = match visited.outcome {
                        MethodOutcome::Service(service) => {
                            let target = CodeTarget::Service(service.name.clone());
                            thing.services.push(service);
                            target
                        }
                        MethodOutcome::Subscription(subscription) => {
                            let target = CodeTarget::Subscription(subscription.name.clone());
                            thing.subscriptions.push(subscription);
                            target
                        }
                    };
                    if let Some(body) = visited.body {
                        jobs.push(CodeJob {
                            class_name: descriptor.name.clone(),
                            target,
                            body,
                            aliases: visited.aliases,
                        });
                    }
                }
                ClassMember::Other { .. } => {}
            }

            let permissions = permissions_of_node(self.ctx, decorators, Some(name))?;
            thing
                .permissions
                .merge(permissions)
                .map_err(|conflict| self.ctx.error(span, conflict.to_string()))?;
        }
        Ok(())
    }
}

/// `"use Name"` names the thing that receives a global code block.
pub fn global_code_target(directive: &str) -> Option<&str> {
    let target = directive.strip_prefix("use ")?.trim();
    (!target.is_empty() && target != "strict").then_some(target)
}

pub fn is_mashup_class(class: &ClassDecl) -> bool {
    class
        .heritage
        .first()
        .and_then(|base| base.as_identifier())
        .map(|name| MASHUP_BASES.contains(&name))
        .unwrap_or(false)
}
