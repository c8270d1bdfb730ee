//! Methods of things, templates and shapes: services and subscriptions.

use super::field_type::{default_value, field_type};
use super::permission::is_permission_decorator;
use crate::diagnostic::{CompilerError, Span};
use crate::frontend::typescript::ast::{MethodDecl, MethodKind, Parameter, Pattern, TypeMember, TypeNode};
use crate::frontend::typescript::jsdoc::{doc_of, JsDoc};
use crate::model::{
    EntityKind, FieldDefinition, LiteralValue, RemoteServiceBinding, ServiceAspects, ServiceDefinition,
    SubscriptionDefinition,
};
use crate::resolve::{classify_all, ClassifiedDecorator, DecoratorKind, FileContext};

/// Names a subscription handler may declare as parameters.
pub const SUBSCRIPTION_PARAMETERS: &[&str] = &[
    "alertName",
    "eventData",
    "eventName",
    "eventTime",
    "source",
    "sourceProperty",
];

#[derive(Debug, Clone)]
pub enum MethodOutcome {
    Service(ServiceDefinition),
    Subscription(SubscriptionDefinition),
}

/// A visited method and what the finalize pass needs to build its code.
#[derive(Debug, Clone)]
pub struct VisitedMethod {
    pub outcome: MethodOutcome,
    /// Body to compile into `code`; `None` for remote services.
    pub body: Option<Span>,
    /// Destructured parameters bound under another name, `(parameter, local)`.
    pub aliases: Vec<(String, String)>,
    pub deployment_endpoint: Option<String>,
}

pub fn visit_method(
    ctx: &mut FileContext,
    method: &MethodDecl,
    kind: EntityKind,
    exported_name: &str,
) -> Result<VisitedMethod, CompilerError> {
    if method.kind != MethodKind::Method || method.is_static || method.name == "constructor" {
        return Err(ctx.error(
            method.span,
            "Only instance methods can be declared on entities; getters, setters, constructors and static methods are not supported",
        ));
    }
    let Some(body) = &method.body else {
        return Err(ctx.error(method.span, format!("Method '{}' requires a body", method.name)));
    };

    let is_subscription = method
        .decorators
        .iter()
        .any(|d| d.name == "subscription" || d.name == "localSubscription");
    if is_subscription {
        let subscription = visit_subscription(ctx, method)?;
        return Ok(VisitedMethod {
            outcome: MethodOutcome::Subscription(subscription),
            body: Some(body.span),
            aliases: Vec::new(),
            deployment_endpoint: None,
        });
    }

    let doc = doc_of(method.doc.as_deref());
    let (parameter_definitions, aliases) = match method.parameters.as_slice() {
        [] => (Vec::new(), Vec::new()),
        [parameter] => service_parameters(ctx, parameter, &doc)?,
        [_, extra, ..] => {
            return Err(ctx.error(
                extra.span,
                "Services take at most one parameter, which must be a destructured object",
            ))
        }
    };

    let mut result_type = if method.is_async {
        if let Some(annotation) = &method.return_type {
            return Err(ctx.error(
                annotation.span(),
                "Async services cannot declare a return type; their result is always NOTHING",
            ));
        }
        FieldDefinition::new("result", "NOTHING")
    } else {
        let Some(annotation) = &method.return_type else {
            return Err(ctx.error(
                method.span,
                format!("Service '{}' requires a return type annotation", method.name),
            ));
        };
        field_type(ctx, annotation)?.into_field("result")
    };
    result_type.description = doc.returns.clone().unwrap_or_default();

    let mut service = ServiceDefinition {
        name: method.name.clone(),
        description: doc.description.clone(),
        parameter_definitions,
        result_type,
        aspects: ServiceAspects {
            is_async: method.is_async,
        },
        is_allow_override: true,
        is_overriden: method.is_override,
        code: String::new(),
        remote_binding: None,
    };

    let mut deployment_endpoint = None;
    for decorator in relevant_decorators(ctx, method)? {
        match decorator.kind {
            DecoratorKind::Final => service.is_allow_override = false,
            DecoratorKind::Override => service.is_overriden = true,
            DecoratorKind::Deploy => {
                if kind != EntityKind::Thing {
                    return Err(ctx.error(decorator.span, "@deploy can only be used on services of things"));
                }
                deployment_endpoint = Some(format!("Things/{}/Services/{}", exported_name, method.name));
            }
            DecoratorKind::RemoteService { source_name, options } => {
                let mut binding = RemoteServiceBinding {
                    source_name,
                    enable_queue: None,
                    timeout: None,
                };
                for (key, value) in options {
                    match (key.as_str(), value) {
                        ("enableQueue", LiteralValue::Bool(b)) => binding.enable_queue = Some(b),
                        ("timeout", LiteralValue::Number(n)) => binding.timeout = Some(n),
                        (key, _) => {
                            return Err(ctx.error(
                                decorator.span,
                                format!("The remote service option '{}' has the wrong type", key),
                            ))
                        }
                    }
                }
                service.remote_binding = Some(binding);
            }
            _ => {
                return Err(ctx.error(
                    decorator.span,
                    format!("@{} cannot be used on a service", decorator.name),
                ))
            }
        }
    }

    let body_span = if service.remote_binding.is_some() {
        if !body.is_empty {
            return Err(ctx.error(
                body.span,
                "Remote services must have an empty body; their implementation is provided by the remote source",
            ));
        }
        None
    } else {
        Some(body.span)
    };

    Ok(VisitedMethod {
        outcome: MethodOutcome::Service(service),
        body: body_span,
        aliases,
        deployment_endpoint,
    })
}

fn relevant_decorators(ctx: &mut FileContext, method: &MethodDecl) -> Result<Vec<ClassifiedDecorator>, CompilerError> {
    let relevant: Vec<_> = method
        .decorators
        .iter()
        .filter(|d| !is_permission_decorator(d))
        .cloned()
        .collect();
    classify_all(ctx, &relevant)
}

/// Reads `{ a, b = 1 }: { a: STRING; b?: NUMBER }` into parameter definitions.
fn service_parameters(
    ctx: &mut FileContext,
    parameter: &Parameter,
    doc: &JsDoc,
) -> Result<(Vec<FieldDefinition>, Vec<(String, String)>), CompilerError> {
    let Pattern::Object(bindings) = &parameter.pattern else {
        return Err(ctx.error(
            parameter.span,
            "The service parameter must be an object destructuring pattern",
        ));
    };
    let members: Vec<TypeMember> = match &parameter.type_node {
        Some(TypeNode::ObjectLiteral(members, _)) => members.clone(),
        Some(TypeNode::Reference { name, arguments, span }) if arguments.is_empty() => {
            ctx.symbols.members_of_type(name).ok_or_else(|| {
                ctx.error(*span, format!("Cannot resolve the members of the parameter type '{}'", name))
            })?
        }
        Some(other) => {
            return Err(ctx.error(
                other.span(),
                "The service parameter type must be a type literal or a named interface",
            ))
        }
        None => {
            return Err(ctx.error(
                parameter.span,
                "The destructured service parameter requires a type annotation",
            ))
        }
    };

    if bindings.len() != members.len() {
        return Err(ctx.error(
            parameter.span,
            format!(
                "The destructuring pattern names {} parameters but its type declares {}",
                bindings.len(),
                members.len()
            ),
        ));
    }

    let mut aliases = Vec::new();
    for binding in bindings {
        if !members.iter().any(|m| m.name == binding.name) {
            return Err(ctx.error(
                binding.span,
                format!("Parameter '{}' is not declared in the parameter type", binding.name),
            ));
        }
        match binding.alias.as_deref() {
            Some("") => {
                return Err(ctx.error(binding.span, "Only simple names can be destructured from service parameters"))
            }
            Some(alias) => aliases.push((binding.name.clone(), alias.to_string())),
            None => {}
        }
    }

    let mut definitions = Vec::new();
    for (ordinal, member) in members.iter().enumerate() {
        let Some(type_node) = &member.type_node else {
            return Err(ctx.error(member.span, format!("Parameter '{}' requires a type", member.name)));
        };
        let mut definition = field_type(ctx, type_node)?.into_field(&member.name);
        definition.ordinal = ordinal as u32;
        definition.aspects.is_required = !member.optional;
        definition.description = doc.params.get(&member.name).cloned().unwrap_or_default();
        let default = bindings
            .iter()
            .find(|b| b.name == member.name)
            .and_then(|b| b.default.as_ref());
        if let Some(default) = default {
            definition.aspects.default_value = default_value(ctx, default)?;
        }
        definitions.push(definition);
    }
    Ok((definitions, aliases))
}

fn visit_subscription(ctx: &mut FileContext, method: &MethodDecl) -> Result<SubscriptionDefinition, CompilerError> {
    if let Some(permission) = method.decorators.iter().find(|d| is_permission_decorator(d)) {
        return Err(ctx.error(permission.span, "Permissions cannot be declared on subscriptions"));
    }

    let mut subscription = SubscriptionDefinition {
        name: method.name.clone(),
        description: doc_of(method.doc.as_deref()).description,
        enabled: true,
        event_name: String::new(),
        source: String::new(),
        source_type: String::new(),
        source_property: String::new(),
        code: String::new(),
    };

    let mut seen: Option<Span> = None;
    for decorator in classify_all(ctx, &method.decorators)? {
        let (source, event, property) = match decorator.kind {
            DecoratorKind::Subscription { source, event, property } => (Some(source), event, property),
            DecoratorKind::LocalSubscription { event, property } => (None, event, property),
            DecoratorKind::Deploy => {
                return Err(ctx.error(decorator.span, "@deploy cannot be used on subscriptions"));
            }
            _ => {
                return Err(ctx.error(
                    decorator.span,
                    format!("@{} cannot be used on a subscription", decorator.name),
                ))
            }
        };
        if seen.is_some() {
            return Err(ctx.error(
                decorator.span,
                "A method can only have one @subscription or @localSubscription decorator",
            ));
        }
        seen = Some(decorator.span);

        if event == "DataChange" && property.is_none() {
            return Err(ctx.error(
                decorator.span,
                "DataChange subscriptions must name the property they observe",
            ));
        }
        if let Some(source) = source {
            subscription.source = source;
            subscription.source_type = "Thing".to_string();
        }
        subscription.event_name = event;
        subscription.source_property = property.unwrap_or_default();
    }

    for parameter in &method.parameters {
        match &parameter.pattern {
            Pattern::Identifier(name) if SUBSCRIPTION_PARAMETERS.contains(&name.as_str()) => {}
            _ => {
                return Err(ctx.error(
                    parameter.span,
                    format!(
                        "Subscription parameters must be chosen from {}",
                        SUBSCRIPTION_PARAMETERS.join(", ")
                    ),
                ))
            }
        }
    }
    Ok(subscription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::frontend::typescript::ast::{ClassMember, ParsedFile};
    use crate::frontend::typescript::parser::TypeScriptParser;
    use crate::resolve::SymbolTable;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, Path::new("Services.ts")).unwrap()
    }

    fn visit_all(source: &str, kind: EntityKind) -> Vec<Result<VisitedMethod, CompilerError>> {
        let file = parse(source);
        let mut symbols = SymbolTable::new();
        symbols.collect(0, &file);
        let config = CompilerConfig::default();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let class = file.classes().next().unwrap();
        class
            .members
            .iter()
            .filter_map(|m| match m {
                ClassMember::Method(method) => Some(visit_method(&mut ctx, method, kind, "Exported")),
                _ => None,
            })
            .collect()
    }

    fn service(visited: &Result<VisitedMethod, CompilerError>) -> &ServiceDefinition {
        match visited {
            Ok(VisitedMethod {
                outcome: MethodOutcome::Service(service),
                ..
            }) => service,
            other => panic!("expected a service, got {other:?}"),
        }
    }

    #[test]
    fn test_service_with_destructured_parameters() {
        let results = visit_all(
            r#"class A {
                /**
                 * Looks things up.
                 * @param table Rows to scan
                 * @return The match count
                 */
                @final
                find({ table, thing, label = "testValue" }: {
                    table?: INFOTABLE<GenericStringList>;
                    thing: THINGNAME<GenericThing>;
                    label?: STRING;
                }): NUMBER {
                    return 1;
                }
            }"#,
            EntityKind::Thing,
        );
        let find = service(&results[0]);
        assert!(!find.is_allow_override);
        assert_eq!(find.description, "Looks things up.");
        assert_eq!(find.result_type.base_type, "NUMBER");
        assert_eq!(find.result_type.description, "The match count");

        let params = &find.parameter_definitions;
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].aspects.data_shape.as_deref(), Some("GenericStringList"));
        assert!(!params[0].aspects.is_required);
        assert_eq!(params[0].description, "Rows to scan");
        assert_eq!(params[1].aspects.thing_template.as_deref(), Some("GenericThing"));
        assert!(params[1].aspects.is_required);
        assert_eq!(
            params[2].aspects.default_value,
            Some(LiteralValue::String("testValue".to_string()))
        );
    }

    #[test]
    fn test_parameter_names_must_match_type() {
        let results = visit_all(
            "class A { run({ a }: { b: STRING }): NOTHING {} }",
            EntityKind::Thing,
        );
        assert!(results[0].as_ref().unwrap_err().message().contains("'a'"));
    }

    #[test]
    fn test_interface_parameter_type() {
        let results = visit_all(
            r#"
            interface RunParams { speed: NUMBER; name?: STRING }
            class A { run({ speed, name: label }: RunParams): NOTHING {} }
            "#,
            EntityKind::Thing,
        );
        let visited = results[0].as_ref().unwrap();
        assert_eq!(visited.aliases, vec![("name".to_string(), "label".to_string())]);
        assert_eq!(service(&results[0]).parameter_definitions.len(), 2);
    }

    #[test]
    fn test_async_services() {
        let results = visit_all(
            r#"class A {
                async later(): NOTHING {}
                async fine() {}
            }"#,
            EntityKind::Thing,
        );
        assert!(results[0].is_err());
        let fine = service(&results[1]);
        assert!(fine.aspects.is_async);
        assert_eq!(fine.result_type.base_type, "NOTHING");
    }

    #[test]
    fn test_remote_service_requires_empty_body() {
        let results = visit_all(
            r#"class A {
                @remoteService("EdgeRun", { enableQueue: true }) run(): NOTHING {}
                @remoteService("EdgeStop") stop(): NOTHING { return; }
            }"#,
            EntityKind::ThingTemplate,
        );
        let run = results[0].as_ref().unwrap();
        assert!(run.body.is_none());
        assert_eq!(service(&results[0]).remote_binding.as_ref().unwrap().enable_queue, Some(true));
        assert!(results[1].is_err());
    }

    #[test]
    fn test_deploy_endpoint() {
        let source = "class A { @deploy setup(): NOTHING {} }";
        let on_thing = visit_all(source, EntityKind::Thing);
        assert_eq!(
            on_thing[0].as_ref().unwrap().deployment_endpoint.as_deref(),
            Some("Things/Exported/Services/setup")
        );
        assert!(visit_all(source, EntityKind::ThingTemplate)[0].is_err());
    }

    #[test]
    fn test_subscriptions() {
        let results = visit_all(
            r#"class A {
                @subscription("Sensor", "DataChange", "temperature")
                onTemp(eventData, source) {}
                @localSubscription("DataChange")
                broken() {}
                @allow(Permission.ServiceInvoke, Users.bob)
                @localSubscription("ThingStart")
                guarded() {}
                @localSubscription("ThingStart")
                wrongParams(payload) {}
            }"#,
            EntityKind::Thing,
        );
        match &results[0].as_ref().unwrap().outcome {
            MethodOutcome::Subscription(s) => {
                assert_eq!(s.source, "Sensor");
                assert_eq!(s.source_type, "Thing");
                assert_eq!(s.source_property, "temperature");
                assert!(s.enabled);
            }
            other => panic!("expected a subscription, got {other:?}"),
        }
        assert!(results[1].as_ref().unwrap_err().message().contains("DataChange"));
        assert!(results[2].as_ref().unwrap_err().message().contains("Permissions"));
        assert!(results[3].is_err());
    }
}
