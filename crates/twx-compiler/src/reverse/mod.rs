//! Decompiler: normalized entity JSON back to annotated TypeScript.
//!
//! Members are first synthesized into small declaration nodes
//! ([`synth`]) and then printed ([`printer`]). Stored service code is parsed
//! again and rewritten from the runtime's `me` back to `this` ([`code`]).

pub mod code;
pub mod input;
pub mod printer;
pub mod synth;

use crate::diagnostic::CompilerError;
use crate::model::{EntityKind, PropertyDefinition, ServiceDefinition};

pub use input::EntityJson;
pub use printer::{print_class, print_method, print_property};
pub use synth::{parse_property_definition, parse_service_definition};

use input::from_json;
use synth::{
    is_identifier, parse_event_definition, parse_field_definition, parse_subscription_definition, SynthClass,
    SynthDecorator, SynthHeritage, SynthValue,
};

const DEFAULT_TEMPLATE: &str = "GenericThing";

/// Decompiles a single property definition given as JSON.
pub fn decompile_property(json: &str) -> Result<String, CompilerError> {
    let definition: PropertyDefinition = from_json(json)?;
    Ok(print_property(&parse_property_definition(&definition)))
}

/// Decompiles a single service definition given as JSON.
pub fn decompile_service(json: &str) -> Result<String, CompilerError> {
    let definition: ServiceDefinition = from_json(json)?;
    Ok(print_method(&parse_service_definition(&definition)?))
}

/// Decompiles a whole entity given as JSON into the source of one class.
pub fn decompile_entity(json: &str) -> Result<String, CompilerError> {
    let entity: EntityJson = from_json(json)?;
    Ok(print_class(&synthesize_class(&entity)?))
}

pub fn synthesize_class(entity: &EntityJson) -> Result<SynthClass, CompilerError> {
    log::debug!("decompiling {:?} {}", entity.kind, entity.name);
    let mut decorators = Vec::new();
    let heritage = match entity.kind {
        EntityKind::Thing => {
            decorators.push(SynthDecorator::flag("ThingDefinition"));
            template_heritage(entity)
        }
        EntityKind::ThingTemplate => {
            decorators.push(SynthDecorator::flag("ThingTemplateDefinition"));
            template_heritage(entity)
        }
        EntityKind::ThingShape => SynthHeritage::Identifier("ThingShapeBase".to_string()),
        EntityKind::DataShape => SynthHeritage::Identifier("DataShapeBase".to_string()),
        other => {
            return Err(CompilerError::InvalidEntityJson {
                message: format!("{:?} entities cannot be decompiled", other),
            })
        }
    };

    let name = class_name(&entity.name);
    if name != entity.name {
        decorators.push(SynthDecorator::call("exportName", vec![SynthValue::string(entity.name.clone())]));
    }

    let mut properties = Vec::new();
    let mut methods = Vec::new();
    if entity.kind == EntityKind::DataShape {
        let mut fields: Vec<_> = entity.field_definitions.iter().collect();
        fields.sort_by_key(|f| f.ordinal);
        properties.extend(fields.into_iter().enumerate().map(|(index, f)| parse_field_definition(f, index)));
    } else {
        let mut definitions: Vec<_> = entity.property_definitions.iter().collect();
        definitions.sort_by_key(|p| p.ordinal);
        properties.extend(definitions.into_iter().map(parse_property_definition));
        properties.extend(entity.event_definitions.iter().map(parse_event_definition));
        for service in &entity.service_definitions {
            methods.push(parse_service_definition(service)?);
        }
        for subscription in &entity.subscriptions {
            methods.push(parse_subscription_definition(subscription)?);
        }
    }

    Ok(SynthClass {
        doc: entity
            .description
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect(),
        decorators,
        name,
        heritage,
        properties,
        methods,
    })
}

/// The class name for an entity, with characters that cannot appear in an
/// identifier removed.
fn class_name(entity_name: &str) -> String {
    if is_identifier(entity_name) {
        return entity_name.to_string();
    }
    let cleaned: String = entity_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    if is_identifier(&cleaned) {
        cleaned
    } else {
        format!("_{}", cleaned)
    }
}

fn template_heritage(entity: &EntityJson) -> SynthHeritage {
    let template = entity.thing_template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    let by_reference = !std::iter::once(template)
        .chain(entity.implemented_shapes.iter().map(String::as_str))
        .chain(entity.data_shape.as_deref())
        .all(is_identifier);
    let name = |value: &str| {
        if by_reference {
            SynthHeritage::String(value.to_string())
        } else {
            SynthHeritage::Identifier(value.to_string())
        }
    };

    if entity.implemented_shapes.is_empty() && entity.data_shape.is_none() {
        return if by_reference {
            SynthHeritage::Call {
                callee: "ThingTemplateReference".to_string(),
                arguments: vec![name(template)],
            }
        } else {
            name(template)
        };
    }

    let first = match &entity.data_shape {
        Some(data_shape) => SynthHeritage::Call {
            callee: "DataThing".to_string(),
            arguments: vec![name(template), name(data_shape.as_str())],
        },
        None => name(template),
    };
    let mut arguments = vec![first];
    arguments.extend(entity.implemented_shapes.iter().map(|s| name(s.as_str())));
    SynthHeritage::Call {
        callee: if by_reference {
            "ThingTemplateWithShapesReference".to_string()
        } else {
            "ThingTemplateWithShapes".to_string()
        },
        arguments,
    }
}
