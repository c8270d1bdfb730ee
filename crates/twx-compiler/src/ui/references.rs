//! Root-level `define*` constants of a mashup file.
//!
//! ```text
//! const getData = defineService(Things.Plant.GetData);
//! const speedOf = defineDynamicService(dynamicEntity(ThingTemplates.Pump).GetSpeed);
//! const ok = defineWidget(Ptcsbutton);
//! const params = defineMashup(class { plant!: STRING; });
//! ```
//!
//! Each constant becomes a [`UIReference`] that JSX attributes refer to by
//! identifier. The declarations have no runtime meaning of their own.

use indexmap::IndexMap;

use super::widgets::widget_type;
use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{ClassMember, Expression, Statement};
use crate::model::{FieldDefinition, UIReference, UIReferenceKind};
use crate::resolve::decorator::is_entity_collection;
use crate::resolve::FileContext;
use crate::transform::field_type::field_type;

pub const FACTORIES: &[&str] = &[
    "defineWidget",
    "defineService",
    "defineDynamicService",
    "defineMashup",
    "defineController",
];

/// Id of the root widget, also the source id of mashup parameter bindings.
pub const MASHUP_ROOT_ID: &str = "mashup-root";
/// Id of the Core UI controller host widget.
pub const CLASS_HOST_ID: &str = "controller-host";

#[derive(Debug, Default)]
pub struct ReferenceTable {
    references: IndexMap<String, UIReference>,
}

impl ReferenceTable {
    pub fn get(&self, name: &str) -> Option<&UIReference> {
        self.references.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UIReference)> {
        self.references.iter().map(|(name, r)| (name.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn mashup_parameters(&self) -> Vec<FieldDefinition> {
        self.references
            .values()
            .find_map(|r| match &r.kind {
                UIReferenceKind::Mashup { parameters } => Some(parameters.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Collects the references declared at the root of the file.
pub fn collect_references(ctx: &mut FileContext) -> Result<ReferenceTable, CompilerError> {
    let file = ctx.file;
    let mut table = ReferenceTable::default();
    for statement in &file.statements {
        let Statement::Variable(variable) = statement else {
            continue;
        };
        if variable.kind != "const" {
            return Err(ctx.error(variable.span, "UI references must be declared with 'const'"));
        }
        for declarator in &variable.declarators {
            let Some(name) = &declarator.name else {
                return Err(ctx.error(declarator.span, "UI references cannot be destructured"));
            };
            let Some(Expression::Call { callee, arguments, span }) = &declarator.initializer else {
                return Err(ctx.error(
                    declarator.span,
                    "Only define* calls may be assigned to constants in a mashup file",
                ));
            };
            let factory = callee.as_identifier().unwrap_or_default();
            if !FACTORIES.contains(&factory) {
                return Err(ctx.error(*span, format!("'{}' is not a UI reference factory", ctx.text(callee.span()))));
            }
            let [argument] = arguments.as_slice() else {
                return Err(ctx.error(*span, format!("{} expects exactly one argument", factory)));
            };

            let reference = match factory {
                "defineService" => service_reference(ctx, argument)?,
                "defineDynamicService" => dynamic_service_reference(ctx, argument)?,
                "defineWidget" => widget_reference(ctx, name, argument)?,
                "defineMashup" => {
                    if table.references.values().any(|r| matches!(r.kind, UIReferenceKind::Mashup { .. })) {
                        return Err(ctx.error(*span, "A mashup file can declare its parameters only once"));
                    }
                    mashup_reference(ctx, argument)?
                }
                _ => controller_reference(ctx, argument)?,
            };
            log::trace!("UI reference {} -> {:?}", name, reference.kind);
            table.references.insert(name.clone(), reference);
        }
    }
    Ok(table)
}

fn service_reference(ctx: &FileContext, argument: &Expression) -> Result<UIReference, CompilerError> {
    let path = argument.access_path().unwrap_or_default();
    let [collection, entity, service] = path.as_slice() else {
        return Err(ctx.error(
            argument.span(),
            "defineService expects a reference of the form Collection.Entity.Service",
        ));
    };
    if !is_entity_collection(collection) {
        return Err(ctx.error(argument.span(), format!("'{}' is not an entity collection", collection)));
    }
    Ok(UIReference {
        kind: UIReferenceKind::Service {
            collection: collection.clone(),
            entity: entity.clone(),
            service: service.clone(),
            dynamic: false,
        },
        id: service.clone(),
    })
}

fn dynamic_service_reference(ctx: &FileContext, argument: &Expression) -> Result<UIReference, CompilerError> {
    let invalid = || {
        ctx.error(
            argument.span(),
            "defineDynamicService expects a reference of the form dynamicEntity(Collection.Template).Service",
        )
    };
    let Expression::Member { object, property, .. } = argument else {
        return Err(invalid());
    };
    let Expression::Call { callee, arguments, .. } = object.as_ref() else {
        return Err(invalid());
    };
    if callee.as_identifier() != Some("dynamicEntity") || arguments.len() != 1 {
        return Err(invalid());
    }
    let path = arguments[0].access_path().unwrap_or_default();
    let [collection, template] = path.as_slice() else {
        return Err(invalid());
    };
    if collection != "ThingTemplates" && collection != "ThingShapes" {
        return Err(ctx.error(
            arguments[0].span(),
            "Dynamic services must come from a thing template or thing shape",
        ));
    }
    Ok(UIReference {
        kind: UIReferenceKind::Service {
            collection: collection.clone(),
            entity: template.clone(),
            service: property.clone(),
            dynamic: true,
        },
        id: property.clone(),
    })
}

fn widget_reference(ctx: &FileContext, name: &str, argument: &Expression) -> Result<UIReference, CompilerError> {
    let Some(class_name) = argument.as_identifier() else {
        return Err(ctx.error(argument.span(), "defineWidget expects a widget class"));
    };
    let widget = widget_type(class_name)
        .ok_or_else(|| ctx.error(argument.span(), format!("Unknown widget '{}'", class_name)))?;
    Ok(UIReference {
        kind: UIReferenceKind::Widget {
            widget_type: widget.name.to_string(),
        },
        id: name.to_string(),
    })
}

fn mashup_reference(ctx: &mut FileContext, argument: &Expression) -> Result<UIReference, CompilerError> {
    let Expression::Class(class) = argument else {
        return Err(ctx.error(argument.span(), "defineMashup expects an anonymous class of parameters"));
    };
    let mut parameters = Vec::new();
    for (ordinal, member) in class.members.iter().enumerate() {
        let ClassMember::Property(property) = member else {
            return Err(ctx.error(member.span(), "Mashup parameters can only be properties"));
        };
        let Some(type_node) = &property.type_node else {
            return Err(ctx.error(property.span, "Mashup parameters must have a type annotation"));
        };
        let mut field = field_type(ctx, type_node)?.into_field(&property.name);
        field.ordinal = ordinal as u32;
        field.aspects.is_required = !property.optional;
        if let Some(initializer) = &property.initializer {
            field.aspects.default_value = ctx.required_constant(initializer, "parameter default value")?;
        }
        parameters.push(field);
    }
    Ok(UIReference {
        kind: UIReferenceKind::Mashup { parameters },
        id: MASHUP_ROOT_ID.to_string(),
    })
}

fn controller_reference(ctx: &FileContext, argument: &Expression) -> Result<UIReference, CompilerError> {
    if !ctx.config.core_ui {
        return Err(ctx.error(argument.span(), "defineController is only available in Core UI mode"));
    }
    let Some(class_name) = argument.as_identifier() else {
        return Err(ctx.error(argument.span(), "defineController expects the controller class"));
    };
    Ok(UIReference {
        kind: UIReferenceKind::Script {
            class_name: class_name.to_string(),
        },
        id: CLASS_HOST_ID.to_string(),
    })
}
