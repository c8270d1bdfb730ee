//! Declaration nodes synthesized from entity members.
//!
//! These are the decompiler's own tree: small, print-only and independent of
//! the parsed source AST.

use crate::diagnostic::CompilerError;
use crate::model::{
    EventDefinition, FieldDefinition, LiteralValue, PropertyDefinition, ServiceDefinition, SubscriptionDefinition,
};
use crate::transform::service::SUBSCRIPTION_PARAMETERS;

use super::code::method_body;

#[derive(Debug, Clone, PartialEq)]
pub enum SynthValue {
    Literal(LiteralValue),
    Object(Vec<(String, SynthValue)>),
}

impl SynthValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(LiteralValue::String(value.into()))
    }

    pub fn number(value: f64) -> Self {
        Self::Literal(LiteralValue::Number(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthDecorator {
    pub name: String,
    pub arguments: Vec<SynthValue>,
}

impl SynthDecorator {
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arguments: Vec::new(),
        }
    }

    pub fn call(name: &str, arguments: Vec<SynthValue>) -> Self {
        Self {
            name: name.to_string(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthType {
    Reference { name: String, arguments: Vec<SynthType> },
    /// An entity name that is not a valid identifier.
    StringLiteral(String),
    Undefined,
    Object(Vec<SynthTypeMember>),
}

impl SynthType {
    pub fn named(name: &str) -> Self {
        Self::Reference {
            name: name.to_string(),
            arguments: Vec::new(),
        }
    }

    /// A reference to an entity, quoted when its name is not an identifier.
    pub fn entity(name: &str) -> Self {
        if is_identifier(name) {
            Self::named(name)
        } else {
            Self::StringLiteral(name.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthTypeMember {
    pub name: String,
    pub optional: bool,
    pub type_node: SynthType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthProperty {
    pub doc: Vec<String>,
    pub decorators: Vec<SynthDecorator>,
    pub readonly: bool,
    pub name: String,
    pub type_node: SynthType,
    pub initializer: Option<SynthValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthBinding {
    pub name: String,
    pub default: Option<SynthValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthParameters {
    None,
    /// `{ a, b = 1 }: { a: STRING; b?: NUMBER }`
    Destructured {
        bindings: Vec<SynthBinding>,
        type_node: SynthType,
    },
    Positional(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthMethod {
    pub doc: Vec<String>,
    pub decorators: Vec<SynthDecorator>,
    pub is_async: bool,
    pub name: String,
    pub parameters: SynthParameters,
    pub return_type: Option<SynthType>,
    /// Body statements, one line per entry, unindented.
    pub body: String,
}

/// Heritage of a synthesized class.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthHeritage {
    Identifier(String),
    Call { callee: String, arguments: Vec<SynthHeritage> },
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthClass {
    pub doc: Vec<String>,
    pub decorators: Vec<SynthDecorator>,
    pub name: String,
    pub heritage: SynthHeritage,
    pub properties: Vec<SynthProperty>,
    pub methods: Vec<SynthMethod>,
}

/// Whether `name` can be written as a bare identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `INFOTABLE<DataShape>`, `THINGNAME<Template, Shape>` or the bare base type.
fn base_type_node(
    base_type: &str,
    data_shape: Option<&str>,
    thing_template: Option<&str>,
    thing_shape: Option<&str>,
) -> SynthType {
    let mut arguments = Vec::new();
    if let Some(data_shape) = data_shape {
        arguments.push(SynthType::entity(data_shape));
    } else if thing_template.is_some() || thing_shape.is_some() {
        arguments.push(thing_template.map(SynthType::entity).unwrap_or(SynthType::Undefined));
        if let Some(shape) = thing_shape {
            arguments.push(SynthType::entity(shape));
        }
    }
    SynthType::Reference {
        name: base_type.to_string(),
        arguments,
    }
}

fn field_type_node(field: &FieldDefinition) -> SynthType {
    base_type_node(
        &field.base_type,
        field.aspects.data_shape.as_deref(),
        field.aspects.thing_template.as_deref(),
        field.aspects.thing_shape.as_deref(),
    )
}

fn description_lines(description: &str) -> Vec<String> {
    description
        .lines()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Builds the declaration of a property.
///
/// Decorators are always produced in the order persistent, logged,
/// minimumValue, maximumValue, unit, dataChangeType, remote, local.
pub fn parse_property_definition(definition: &PropertyDefinition) -> SynthProperty {
    let aspects = &definition.aspects;
    let mut decorators = Vec::new();
    if aspects.is_persistent {
        decorators.push(SynthDecorator::flag("persistent"));
    }
    if aspects.is_logged {
        decorators.push(SynthDecorator::flag("logged"));
    }
    if let Some(min) = aspects.minimum_value {
        decorators.push(SynthDecorator::call("minimumValue", vec![SynthValue::number(min)]));
    }
    if let Some(max) = aspects.maximum_value {
        decorators.push(SynthDecorator::call("maximumValue", vec![SynthValue::number(max)]));
    }
    if let Some(unit) = &aspects.units {
        decorators.push(SynthDecorator::call("unit", vec![SynthValue::string(unit.clone())]));
    }
    if let Some(kind) = &aspects.data_change_type {
        let mut arguments = vec![SynthValue::string(kind.clone())];
        if let Some(threshold) = aspects.data_change_threshold {
            arguments.push(SynthValue::number(threshold));
        }
        decorators.push(SynthDecorator::call("dataChangeType", arguments));
    }
    if let Some(binding) = &definition.remote_binding {
        let mut options = Vec::new();
        let mut option = |key: &str, value: Option<LiteralValue>| {
            if let Some(value) = value {
                options.push((key.to_string(), SynthValue::Literal(value)));
            }
        };
        option("cacheTime", binding.cache_time.map(LiteralValue::Number));
        option("foldType", binding.fold_type.clone().map(LiteralValue::String));
        option("pushThreshold", binding.push_threshold.map(LiteralValue::Number));
        option("pushType", binding.push_type.clone().map(LiteralValue::String));
        option("startType", binding.start_type.clone().map(LiteralValue::String));
        option("timeout", binding.timeout.map(LiteralValue::Number));
        let mut arguments = vec![SynthValue::string(binding.source_name.clone())];
        if !options.is_empty() {
            arguments.push(SynthValue::Object(options));
        }
        decorators.push(SynthDecorator::call("remote", arguments));
    }
    if let Some(binding) = &definition.local_binding {
        decorators.push(SynthDecorator::call(
            "local",
            vec![
                SynthValue::string(binding.source_thing_name.clone()),
                SynthValue::string(binding.source_name.clone()),
            ],
        ));
    }

    SynthProperty {
        doc: description_lines(&definition.description),
        decorators,
        readonly: aspects.is_read_only,
        name: definition.name.clone(),
        type_node: base_type_node(
            &definition.base_type,
            aspects.data_shape.as_deref(),
            aspects.thing_template.as_deref(),
            aspects.thing_shape.as_deref(),
        ),
        initializer: aspects.default_value.clone().map(SynthValue::Literal),
    }
}

/// Builds the declaration of a data shape field.
pub fn parse_field_definition(field: &FieldDefinition, index: usize) -> SynthProperty {
    let mut decorators = Vec::new();
    if field.aspects.is_primary_key {
        decorators.push(SynthDecorator::flag("primaryKey"));
    }
    if field.ordinal as usize != index {
        decorators.push(SynthDecorator::call("ordinal", vec![SynthValue::number(field.ordinal as f64)]));
    }
    SynthProperty {
        doc: description_lines(&field.description),
        decorators,
        readonly: false,
        name: field.name.clone(),
        type_node: field_type_node(field),
        initializer: field.aspects.default_value.clone().map(SynthValue::Literal),
    }
}

/// Builds the `name!: EVENT<DataShape>` declaration of an event.
pub fn parse_event_definition(event: &EventDefinition) -> SynthProperty {
    let decorators = event
        .remote_binding
        .iter()
        .map(|b| SynthDecorator::call("remoteEvent", vec![SynthValue::string(b.source_name.clone())]))
        .collect();
    SynthProperty {
        doc: description_lines(&event.description),
        decorators,
        readonly: false,
        name: event.name.clone(),
        type_node: SynthType::Reference {
            name: "EVENT".to_string(),
            arguments: vec![SynthType::entity(&event.data_shape)],
        },
        initializer: None,
    }
}

/// Builds the method of a service. The body is decompiled from the stored
/// code, or left empty for remote services.
pub fn parse_service_definition(service: &ServiceDefinition) -> Result<SynthMethod, CompilerError> {
    let mut decorators = Vec::new();
    if !service.is_allow_override {
        decorators.push(SynthDecorator::flag("final"));
    }
    if service.is_overriden {
        decorators.push(SynthDecorator::flag("override"));
    }
    if let Some(binding) = &service.remote_binding {
        let mut options = Vec::new();
        if let Some(enable_queue) = binding.enable_queue {
            options.push(("enableQueue".to_string(), SynthValue::Literal(LiteralValue::Bool(enable_queue))));
        }
        if let Some(timeout) = binding.timeout {
            options.push(("timeout".to_string(), SynthValue::number(timeout)));
        }
        let mut arguments = vec![SynthValue::string(binding.source_name.clone())];
        if !options.is_empty() {
            arguments.push(SynthValue::Object(options));
        }
        decorators.push(SynthDecorator::call("remoteService", arguments));
    }

    let mut parameters: Vec<&FieldDefinition> = service.parameter_definitions.iter().collect();
    parameters.sort_by_key(|p| p.ordinal);

    let mut doc = description_lines(&service.description);
    for parameter in &parameters {
        if !parameter.description.is_empty() {
            doc.push(format!("@param {} {}", parameter.name, parameter.description));
        }
    }
    if !service.result_type.description.is_empty() {
        doc.push(format!("@returns {}", service.result_type.description));
    }

    let synth_parameters = if parameters.is_empty() {
        SynthParameters::None
    } else {
        SynthParameters::Destructured {
            bindings: parameters
                .iter()
                .map(|p| SynthBinding {
                    name: p.name.clone(),
                    default: p.aspects.default_value.clone().map(SynthValue::Literal),
                })
                .collect(),
            type_node: SynthType::Object(
                parameters
                    .iter()
                    .map(|p| SynthTypeMember {
                        name: p.name.clone(),
                        optional: !p.aspects.is_required,
                        type_node: field_type_node(p),
                    })
                    .collect(),
            ),
        }
    };

    let body = if service.remote_binding.is_some() {
        String::new()
    } else {
        method_body(&service.code)?
    };

    Ok(SynthMethod {
        doc,
        decorators,
        is_async: service.aspects.is_async,
        name: service.name.clone(),
        parameters: synth_parameters,
        return_type: (!service.aspects.is_async).then(|| field_type_node(&service.result_type)),
        body,
    })
}

/// Builds the method of a subscription. Only the event payload names used by
/// the code become parameters.
pub fn parse_subscription_definition(subscription: &SubscriptionDefinition) -> Result<SynthMethod, CompilerError> {
    let mut arguments = Vec::new();
    let name = if subscription.source.is_empty() {
        "localSubscription"
    } else {
        arguments.push(SynthValue::string(subscription.source.clone()));
        "subscription"
    };
    arguments.push(SynthValue::string(subscription.event_name.clone()));
    if !subscription.source_property.is_empty() {
        arguments.push(SynthValue::string(subscription.source_property.clone()));
    }

    let body = method_body(&subscription.code)?;
    let parameters: Vec<String> = SUBSCRIPTION_PARAMETERS
        .iter()
        .filter(|name| mentions(&body, name))
        .map(|name| name.to_string())
        .collect();

    Ok(SynthMethod {
        doc: description_lines(&subscription.description),
        decorators: vec![SynthDecorator::call(name, arguments)],
        is_async: false,
        name: subscription.name.clone(),
        parameters: if parameters.is_empty() {
            SynthParameters::None
        } else {
            SynthParameters::Positional(parameters)
        },
        return_type: None,
        body,
    })
}

/// Whether `code` uses `name` as a whole word.
fn mentions(code: &str, name: &str) -> bool {
    code.match_indices(name).any(|(start, _)| {
        let before = code[..start].chars().next_back();
        let after = code[start + name.len()..].chars().next();
        let boundary = |c: Option<char>| !matches!(c, Some(c) if c.is_alphanumeric() || c == '_' || c == '$');
        boundary(before) && boundary(after) && before != Some('.')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyAspects, RemotePropertyBinding};

    fn property(name: &str, base_type: &str, aspects: PropertyAspects) -> PropertyDefinition {
        PropertyDefinition {
            name: name.to_string(),
            base_type: base_type.to_string(),
            description: String::new(),
            ordinal: 0,
            aspects,
            remote_binding: None,
            local_binding: None,
        }
    }

    #[test]
    fn test_decorator_order() {
        let mut definition = property(
            "speed",
            "NUMBER",
            PropertyAspects {
                is_persistent: true,
                is_logged: true,
                minimum_value: Some(0.0),
                maximum_value: Some(10.0),
                units: Some("rpm".to_string()),
                data_change_type: Some("VALUE".to_string()),
                is_remote: true,
                ..PropertyAspects::default()
            },
        );
        definition.remote_binding = Some(RemotePropertyBinding {
            source_name: "Speed".to_string(),
            ..RemotePropertyBinding::default()
        });
        let names: Vec<_> = parse_property_definition(&definition)
            .decorators
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            ["persistent", "logged", "minimumValue", "maximumValue", "unit", "dataChangeType", "remote"]
        );
    }

    #[test]
    fn test_entity_type_arguments() {
        let mut definition = property("owner", "THINGNAME", PropertyAspects::default());
        definition.aspects.thing_shape = Some("Flow Shape".to_string());
        assert_eq!(
            parse_property_definition(&definition).type_node,
            SynthType::Reference {
                name: "THINGNAME".to_string(),
                arguments: vec![SynthType::Undefined, SynthType::StringLiteral("Flow Shape".to_string())],
            }
        );
    }

    #[test]
    fn test_subscription_parameters_from_code() {
        let subscription = SubscriptionDefinition {
            name: "onAlert".to_string(),
            description: String::new(),
            enabled: true,
            event_name: "Alert".to_string(),
            source: "Pump".to_string(),
            source_type: "Thing".to_string(),
            source_property: String::new(),
            code: "me.last = eventData.message; me.source = eventTime;".to_string(),
        };
        let method = parse_subscription_definition(&subscription).unwrap();
        assert_eq!(
            method.parameters,
            SynthParameters::Positional(vec!["eventData".to_string(), "eventTime".to_string()])
        );
        assert_eq!(method.decorators[0].name, "subscription");
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("GenericThing"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("Line Sensor"));
        assert!(!is_identifier("1st"));
    }
}
