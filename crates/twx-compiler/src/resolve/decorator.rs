//! Decorator lookup and classification.
//!
//! Decorators are matched by the textual name of their callee. A single
//! classification pass turns each one into a [`DecoratorKind`] with its
//! arguments already resolved, so the transformers only ever match on the
//! closed set of kinds.

use indexmap::IndexMap;

use super::context::FileContext;
use crate::diagnostic::{CompilerError, Span};
use crate::frontend::typescript::ast::{ClassDecl, Decorator, Expression, ObjectMember};
use crate::model::{LiteralValue, VisibilityKind, VisibilityPrincipal};

/// Finds a decorator by name, bare or factory form.
pub fn decorator_named<'d>(name: &str, decorators: &'d [Decorator]) -> Option<&'d Decorator> {
    decorators.iter().find(|d| d.name == name)
}

/// Arguments of a factory-style decorator. Bare decorators yield `None`.
pub fn arguments_of_decorator_named<'d>(name: &str, decorators: &'d [Decorator]) -> Option<&'d [Expression]> {
    decorator_named(name, decorators).and_then(|d| d.arguments.as_deref())
}

pub fn has_decorator(name: &str, decorators: &[Decorator]) -> bool {
    decorator_named(name, decorators).is_some()
}

/// Option keys accepted by `@remote`.
pub const REMOTE_PROPERTY_OPTIONS: &[&str] = &[
    "cacheTime",
    "foldType",
    "pushThreshold",
    "pushType",
    "startType",
    "timeout",
];

/// Option keys accepted by `@remoteService`.
pub const REMOTE_SERVICE_OPTIONS: &[&str] = &["enableQueue", "timeout"];

#[derive(Debug, Clone)]
pub enum DecoratorKind {
    // Entity
    ThingDefinition,
    ThingTemplateDefinition,
    Published,
    Editable,
    ValueStream(String),
    Identifier(String),
    ExportName(String),
    ConfigurationTables(Box<ClassDecl>),
    Config(Expression),
    Visible {
        instance: bool,
        principals: Vec<VisibilityPrincipal>,
    },
    /// `@allow`, `@deny`, `@allowInstance`, `@denyInstance`; arguments are
    /// read by the permission extractor.
    Permission {
        instance: bool,
        allow: bool,
    },

    // Property
    Persistent,
    Logged,
    MinimumValue(f64),
    MaximumValue(f64),
    Unit(String),
    DataChangeType {
        kind: String,
        threshold: Option<f64>,
    },
    Remote {
        source_name: String,
        options: IndexMap<String, LiteralValue>,
    },
    Local {
        thing: String,
        property: String,
    },
    RemoteEvent {
        source_name: String,
    },

    // Data shape field
    PrimaryKey,
    Ordinal(u32),

    // Service
    Final,
    Override,
    Deploy,
    RemoteService {
        source_name: String,
        options: IndexMap<String, LiteralValue>,
    },
    Subscription {
        source: String,
        event: String,
        property: Option<String>,
    },
    LocalSubscription {
        event: String,
        property: Option<String>,
    },

    // Core UI controller fields
    BindingSources(Vec<Expression>),
    EventTargets(Vec<Expression>),
}

#[derive(Debug, Clone)]
pub struct ClassifiedDecorator {
    pub name: String,
    pub kind: DecoratorKind,
    pub span: Span,
}

/// Classifies every decorator of a node, failing on the first unknown one.
pub fn classify_all(
    ctx: &mut FileContext,
    decorators: &[Decorator],
) -> Result<Vec<ClassifiedDecorator>, CompilerError> {
    decorators.iter().map(|d| classify(ctx, d)).collect()
}

pub fn classify(ctx: &mut FileContext, decorator: &Decorator) -> Result<ClassifiedDecorator, CompilerError> {
    let name = decorator.name.as_str();
    let kind = match name {
        "ThingDefinition" => flag(ctx, decorator, DecoratorKind::ThingDefinition)?,
        "ThingTemplateDefinition" => flag(ctx, decorator, DecoratorKind::ThingTemplateDefinition)?,
        "published" => flag(ctx, decorator, DecoratorKind::Published)?,
        "editable" => flag(ctx, decorator, DecoratorKind::Editable)?,
        "persistent" => flag(ctx, decorator, DecoratorKind::Persistent)?,
        "logged" => flag(ctx, decorator, DecoratorKind::Logged)?,
        "primaryKey" => flag(ctx, decorator, DecoratorKind::PrimaryKey)?,
        "final" => flag(ctx, decorator, DecoratorKind::Final)?,
        "override" => flag(ctx, decorator, DecoratorKind::Override)?,
        "deploy" => flag(ctx, decorator, DecoratorKind::Deploy)?,
        "valueStream" => DecoratorKind::ValueStream(entity_name_argument(ctx, decorator, 0)?),
        "identifier" => DecoratorKind::Identifier(string_argument(ctx, decorator, 0)?),
        "exportName" => DecoratorKind::ExportName(string_argument(ctx, decorator, 0)?),
        "minimumValue" => DecoratorKind::MinimumValue(number_argument(ctx, decorator, 0)?),
        "maximumValue" => DecoratorKind::MaximumValue(number_argument(ctx, decorator, 0)?),
        "unit" => DecoratorKind::Unit(string_argument(ctx, decorator, 0)?),
        "ordinal" => DecoratorKind::Ordinal(number_argument(ctx, decorator, 0)?.max(0.0) as u32),
        "dataChangeType" => {
            let kind = string_argument(ctx, decorator, 0)?;
            let threshold = match argument(ctx, decorator, 1).ok() {
                Some(expression) => Some(ctx.number_constant(expression, "data change threshold")?),
                None => None,
            };
            DecoratorKind::DataChangeType { kind, threshold }
        }
        "remote" => DecoratorKind::Remote {
            source_name: string_argument(ctx, decorator, 0)?,
            options: options_argument(ctx, decorator, 1, REMOTE_PROPERTY_OPTIONS)?,
        },
        "remoteService" => DecoratorKind::RemoteService {
            source_name: string_argument(ctx, decorator, 0)?,
            options: options_argument(ctx, decorator, 1, REMOTE_SERVICE_OPTIONS)?,
        },
        "remoteEvent" => DecoratorKind::RemoteEvent {
            source_name: string_argument(ctx, decorator, 0)?,
        },
        "local" => DecoratorKind::Local {
            thing: entity_name_argument(ctx, decorator, 0)?,
            property: string_argument(ctx, decorator, 1)?,
        },
        "subscription" => DecoratorKind::Subscription {
            source: entity_name_argument(ctx, decorator, 0)?,
            event: string_argument(ctx, decorator, 1)?,
            property: optional_string_argument(ctx, decorator, 2)?,
        },
        "localSubscription" => DecoratorKind::LocalSubscription {
            event: string_argument(ctx, decorator, 0)?,
            property: optional_string_argument(ctx, decorator, 1)?,
        },
        "allow" | "deny" | "allowInstance" | "denyInstance" => {
            if decorator.arguments.as_ref().map(|a| a.is_empty()).unwrap_or(true) {
                return Err(ctx.error(
                    decorator.span,
                    format!("@{} requires a permission and at least one user or group", name),
                ));
            }
            DecoratorKind::Permission {
                instance: name.ends_with("Instance"),
                allow: name.starts_with("allow"),
            }
        }
        "visible" | "visibleInstance" => DecoratorKind::Visible {
            instance: name == "visibleInstance",
            principals: visibility_arguments(ctx, decorator)?,
        },
        "ConfigurationTables" => match argument(ctx, decorator, 0)? {
            Expression::Class(class) => DecoratorKind::ConfigurationTables(class.clone()),
            other => {
                return Err(ctx.error(
                    other.span(),
                    "@ConfigurationTables expects an anonymous class expression",
                ))
            }
        },
        "config" => match argument(ctx, decorator, 0)? {
            object @ Expression::Object { .. } => DecoratorKind::Config(object.clone()),
            other => return Err(ctx.error(other.span(), "@config expects an object literal")),
        },
        "property" => DecoratorKind::BindingSources(decorator.arguments.clone().unwrap_or_default()),
        "twevent" => DecoratorKind::EventTargets(decorator.arguments.clone().unwrap_or_default()),
        _ => {
            return Err(ctx.error(decorator.span, format!("Unknown decorator '@{}'", name)));
        }
    };
    Ok(ClassifiedDecorator {
        name: name.to_string(),
        kind,
        span: decorator.span,
    })
}

fn flag(ctx: &FileContext, decorator: &Decorator, kind: DecoratorKind) -> Result<DecoratorKind, CompilerError> {
    match &decorator.arguments {
        Some(arguments) if !arguments.is_empty() => Err(ctx.error(
            decorator.span,
            format!("@{} does not take arguments", decorator.name),
        )),
        _ => Ok(kind),
    }
}

fn argument<'d>(ctx: &FileContext, decorator: &'d Decorator, index: usize) -> Result<&'d Expression, CompilerError> {
    decorator
        .arguments
        .as_ref()
        .and_then(|a| a.get(index))
        .ok_or_else(|| {
            ctx.error(
                decorator.span,
                format!("@{} is missing argument {}", decorator.name, index + 1),
            )
        })
}

fn string_argument(ctx: &mut FileContext, decorator: &Decorator, index: usize) -> Result<String, CompilerError> {
    let expression = argument(ctx, decorator, index)?;
    ctx.string_constant(expression, &format!("argument {} of @{}", index + 1, decorator.name))
}

fn optional_string_argument(
    ctx: &mut FileContext,
    decorator: &Decorator,
    index: usize,
) -> Result<Option<String>, CompilerError> {
    match decorator.arguments.as_ref().and_then(|a| a.get(index)) {
        Some(expression) => Ok(Some(
            ctx.string_constant(expression, &format!("argument {} of @{}", index + 1, decorator.name))?,
        )),
        None => Ok(None),
    }
}

fn number_argument(ctx: &mut FileContext, decorator: &Decorator, index: usize) -> Result<f64, CompilerError> {
    let expression = argument(ctx, decorator, index)?;
    ctx.number_constant(expression, &format!("argument {} of @{}", index + 1, decorator.name))
}

/// An entity name given as a string or as `Collection.Name`.
fn entity_name_argument(ctx: &mut FileContext, decorator: &Decorator, index: usize) -> Result<String, CompilerError> {
    let expression = argument(ctx, decorator, index)?;
    if let Some(path) = expression.without_assertions().access_path() {
        if let [collection, name] = path.as_slice() {
            if is_entity_collection(collection) {
                return Ok(name.clone());
            }
        }
    }
    ctx.string_constant(expression, &format!("argument {} of @{}", index + 1, decorator.name))
}

pub fn is_entity_collection(name: &str) -> bool {
    matches!(
        name,
        "Things" | "ThingTemplates" | "ThingShapes" | "DataShapes" | "Mashups" | "Organizations" | "Users" | "Groups"
    )
}

fn options_argument(
    ctx: &mut FileContext,
    decorator: &Decorator,
    index: usize,
    allowed: &[&str],
) -> Result<IndexMap<String, LiteralValue>, CompilerError> {
    let mut options = IndexMap::new();
    let Some(expression) = decorator.arguments.as_ref().and_then(|a| a.get(index)) else {
        return Ok(options);
    };
    let Expression::Object { members, .. } = expression else {
        return Err(ctx.error(
            expression.span(),
            format!("The options of @{} must be an object literal", decorator.name),
        ));
    };
    for member in members {
        match member {
            ObjectMember::Property { key, value, span } => {
                if !allowed.contains(&key.as_str()) {
                    return Err(ctx.error(
                        *span,
                        format!("Unknown option '{}' for @{}", key, decorator.name),
                    ));
                }
                if let Some(value) = ctx.required_constant(value, &format!("option '{}'", key))? {
                    options.insert(key.clone(), value);
                }
            }
            ObjectMember::Shorthand { span, .. } | ObjectMember::Other(span) => {
                return Err(ctx.error(*span, "Options must be written as 'key: value' pairs"));
            }
            ObjectMember::Spread(inner) => {
                return Err(ctx.error(inner.span(), "Spread is not supported in decorator options"));
            }
        }
    }
    Ok(options)
}

fn visibility_arguments(
    ctx: &FileContext,
    decorator: &Decorator,
) -> Result<Vec<VisibilityPrincipal>, CompilerError> {
    let arguments = decorator.arguments.as_deref().unwrap_or(&[]);
    if arguments.is_empty() {
        return Err(ctx.error(
            decorator.span,
            format!("@{} requires at least one organization", decorator.name),
        ));
    }
    arguments
        .iter()
        .map(|argument| {
            let path = argument.access_path().unwrap_or_default();
            match path.as_slice() {
                [root, organization] if root == "Organizations" => Ok(VisibilityPrincipal {
                    name: organization.clone(),
                    kind: VisibilityKind::Organization,
                }),
                [root, organization, unit] if root == "Organizations" => Ok(VisibilityPrincipal {
                    name: format!("{}:{}", organization, unit),
                    kind: VisibilityKind::OrganizationalUnit,
                }),
                _ => Err(ctx.error(
                    argument.span(),
                    "Visibility must be given as Organizations.Name or Organizations.Name.Unit",
                )),
            }
        })
        .collect()
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
        parser.parse(source, Path::new("Decorated.ts")).unwrap()
    }

    fn property_decorators(file: &ParsedFile) -> Vec<Decorator> {
        let class = file.classes().next().unwrap();
        match &class.members[0] {
            ClassMember::Property(p) => p.decorators.clone(),
            ClassMember::Method(m) => m.decorators.clone(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let file = parse("class A { @unit(\"km\") @persistent speed: NUMBER; }");
        let decorators = property_decorators(&file);
        assert!(has_decorator("persistent", &decorators));
        assert!(arguments_of_decorator_named("persistent", &decorators).is_none());
        assert_eq!(arguments_of_decorator_named("unit", &decorators).map(|a| a.len()), Some(1));
        assert!(decorator_named("logged", &decorators).is_none());
    }

    #[test]
    fn test_classify_remote_with_options() {
        let file = parse(
            r#"class A { @remote("Edge", { pushType: "ALWAYS", timeout: 5 }) @minimumValue(-1) speed: NUMBER; }"#,
        );
        let decorators = property_decorators(&file);
        let config = CompilerConfig::default();
        let symbols = SymbolTable::new();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let classified = classify_all(&mut ctx, &decorators).unwrap();
        match &classified[0].kind {
            DecoratorKind::Remote { source_name, options } => {
                assert_eq!(source_name, "Edge");
                assert_eq!(options.get("pushType"), Some(&LiteralValue::String("ALWAYS".to_string())));
                assert_eq!(options.get("timeout"), Some(&LiteralValue::Number(5.0)));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(matches!(classified[1].kind, DecoratorKind::MinimumValue(v) if v == -1.0));
    }

    #[test]
    fn test_unknown_decorator_is_fatal() {
        let file = parse("class A { @sparkle speed: NUMBER; }");
        let decorators = property_decorators(&file);
        let config = CompilerConfig::default();
        let symbols = SymbolTable::new();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let err = classify_all(&mut ctx, &decorators).unwrap_err();
        assert!(err.message().contains("@sparkle"));
    }

    #[test]
    fn test_unknown_remote_option_is_fatal() {
        let file = parse(r#"class A { @remote("Edge", { speed: 1 }) x: NUMBER; }"#);
        let decorators = property_decorators(&file);
        let config = CompilerConfig::default();
        let symbols = SymbolTable::new();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        assert!(classify_all(&mut ctx, &decorators).is_err());
    }

    #[test]
    fn test_visibility_units() {
        let file = parse("class A { @visible(Organizations.Acme, Organizations.Acme.Sales) x: NUMBER; }");
        let decorators = property_decorators(&file);
        let config = CompilerConfig::default();
        let symbols = SymbolTable::new();
        let mut ctx = FileContext::new(&file, &config, &symbols);
        let classified = classify_all(&mut ctx, &decorators).unwrap();
        match &classified[0].kind {
            DecoratorKind::Visible { instance, principals } => {
                assert!(!instance);
                assert_eq!(principals[1].name, "Acme:Sales");
                assert_eq!(principals[1].kind, VisibilityKind::OrganizationalUnit);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
