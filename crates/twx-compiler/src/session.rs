//! Compilation session: every source unit of one compiler invocation.
//!
//! A session runs in explicit phases. All files are parsed while
//! `Collecting`, the structural pass turns each of them into an entity
//! descriptor, and only once every descriptor is in the [`EntityStore`] does
//! the finalize pass compile method bodies, attach global code and build
//! mashups, all of which may look at other files' entities.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::config::CompilerConfig;
use crate::diagnostic::{CompilerError, Diagnostic, Diagnostics};
use crate::frontend::typescript::ast::ParsedFile;
use crate::frontend::{create_frontend, Frontend};
use crate::model::{
    EntityBody, EntityDescriptor, EntityKind, FieldDefinition, ServiceDefinition, SubscriptionDefinition,
};
use crate::resolve::{FileContext, SymbolTable};
use crate::rewrite::{BodyRewriter, Breakpoints, FileBreakpoints};
use crate::transform::{declaration_of, CodeJob, CodeTarget, EntityVisitor, FileOutcome};
use crate::ui::{build_mashup, TypeResolver};
use crate::xml::entity_document;

/// Event that runs global code on its thing.
const GLOBAL_CODE_EVENT: &str = "ThingStart";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Structural,
    Finalizing,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collecting => "collecting",
            Self::Structural => "structural",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Descriptors of the session by class name, in the order they were built.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: IndexMap<String, EntityDescriptor>,
    /// Exported name to class name.
    exported: HashMap<String, String>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: EntityDescriptor) -> Result<(), CompilerError> {
        if let Some(existing) = self.entities.get(&descriptor.name) {
            return Err(CompilerError::DuplicateEntity {
                name: descriptor.name.clone(),
                first: existing.file.clone(),
                second: descriptor.file.clone(),
            });
        }
        log::debug!("registered {:?} {}", descriptor.kind, descriptor.name);
        self.exported
            .insert(descriptor.exported_name.clone(), descriptor.name.clone());
        self.entities.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, class_name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(class_name)
    }

    pub fn get_mut(&mut self, class_name: &str) -> Option<&mut EntityDescriptor> {
        self.entities.get_mut(class_name)
    }

    /// Looks an entity up by exported name, then by class name.
    pub fn resolve(&self, name: &str) -> Option<&EntityDescriptor> {
        self.exported
            .get(name)
            .and_then(|class| self.entities.get(class))
            .or_else(|| self.entities.get(name))
    }

    fn resolve_class(&self, name: &str) -> Option<String> {
        self.resolve(name).map(|d| d.name.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Answers mashup binding questions from the entities of the session.
struct StoreTypes<'s> {
    store: &'s EntityStore,
}

impl StoreTypes<'_> {
    /// Finds a service on `entity` or, for things and templates, on the
    /// templates and shapes it derives from.
    fn find_service(&self, entity: &EntityDescriptor, service: &str, depth: usize) -> Option<ServiceDefinition> {
        if depth > 8 {
            return None;
        }
        if let Some(found) = entity.thing().and_then(|t| t.services.iter().find(|s| s.name == service)) {
            return Some(found.clone());
        }
        entity
            .aspects
            .thing_template
            .iter()
            .chain(entity.aspects.implemented_shapes.iter())
            .filter_map(|name| self.store.resolve(name))
            .find_map(|parent| self.find_service(parent, service, depth + 1))
    }
}

impl TypeResolver for StoreTypes<'_> {
    fn service(&self, collection: &str, entity: &str, service: &str) -> Option<ServiceDefinition> {
        let descriptor = self.store.resolve(entity)?;
        if descriptor.kind.collection() != collection {
            return None;
        }
        self.find_service(descriptor, service, 0)
    }

    fn data_shape_fields(&self, data_shape: &str) -> Option<Vec<FieldDefinition>> {
        match &self.store.resolve(data_shape)?.body {
            EntityBody::DataShape(shape) => Some(shape.fields.clone()),
            _ => None,
        }
    }
}

/// One compiled entity and its emitted text.
#[derive(Debug, Clone)]
pub struct EntityArtifact {
    /// Exported name of the entity.
    pub name: String,
    pub kind: EntityKind,
    pub file: PathBuf,
    pub xml: String,
    pub declaration: String,
}

#[derive(Debug, Default)]
pub struct CompileOutput {
    pub artifacts: Vec<EntityArtifact>,
    pub breakpoints: Vec<FileBreakpoints>,
    pub deployment_endpoints: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Work left by the structural pass for the finalize pass.
#[derive(Debug, Default)]
struct Pending {
    jobs: Vec<(usize, CodeJob)>,
    global_code: Vec<(usize, String)>,
    mashups: Vec<(usize, String)>,
}

pub struct Session {
    config: CompilerConfig,
    frontend: Box<dyn Frontend>,
    units: Vec<ParsedFile>,
    symbols: SymbolTable,
    store: EntityStore,
    diagnostics: Diagnostics,
    breakpoints: Breakpoints,
    pending: Pending,
    phase: Phase,
}

impl Session {
    pub fn new(config: CompilerConfig) -> Result<Self, CompilerError> {
        let frontend = create_frontend(&config.language)?;
        log::debug!("{} frontend, project {}", frontend.language(), config.project_name);
        Ok(Self {
            config,
            frontend,
            units: Vec::new(),
            symbols: SymbolTable::new(),
            store: EntityStore::new(),
            diagnostics: Diagnostics::new(),
            breakpoints: Breakpoints::new(),
            pending: Pending::default(),
            phase: Phase::Collecting,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Whether the session's frontend compiles `path`.
    pub fn accepts(&self, path: &Path) -> bool {
        self.frontend.accepts(path)
    }

    fn require_phase(&self, phase: Phase, attempted: &str) -> Result<(), CompilerError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(CompilerError::PhaseOrder {
                attempted: attempted.to_string(),
                current: self.phase.to_string(),
            })
        }
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("session phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Parses a source file into the session.
    pub fn add_source(&mut self, path: impl AsRef<Path>, text: &str) -> Result<(), CompilerError> {
        self.require_phase(Phase::Collecting, "add_source")?;
        let unit = self.frontend.parse_source(text, path.as_ref())?;
        self.units.push(unit);
        Ok(())
    }

    /// Runs every remaining pass and emits the artifacts.
    pub fn run(mut self) -> Result<CompileOutput, CompilerError> {
        self.structural_pass()?;
        self.finalize_pass()?;
        self.emit()
    }

    /// Collects declarations and turns every unit into a descriptor.
    pub fn structural_pass(&mut self) -> Result<(), CompilerError> {
        self.require_phase(Phase::Collecting, "structural")?;
        self.enter(Phase::Structural);

        for (index, unit) in self.units.iter().enumerate() {
            self.symbols.collect(index, unit);
        }

        for (index, unit) in self.units.iter().enumerate() {
            let mut ctx = FileContext::new(unit, &self.config, &self.symbols);
            let outcome = EntityVisitor::new(&mut ctx).visit_file()?;
            self.diagnostics.extend(ctx.diagnostics);
            match outcome {
                FileOutcome::Entity { descriptor, jobs } => {
                    self.store.insert(*descriptor)?;
                    self.pending.jobs.extend(jobs.into_iter().map(|job| (index, job)));
                }
                FileOutcome::GlobalCode { thing } => self.pending.global_code.push((index, thing)),
                FileOutcome::Mashup { class_name } => self.pending.mashups.push((index, class_name)),
                FileOutcome::Declarations => log::trace!("{}: declarations only", unit.path.display()),
            }
        }
        Ok(())
    }

    /// Compiles bodies, attaches global code and builds mashups.
    pub fn finalize_pass(&mut self) -> Result<(), CompilerError> {
        self.require_phase(Phase::Structural, "finalize")?;
        self.enter(Phase::Finalizing);
        self.rewrite_bodies()?;
        self.attach_global_code()?;
        self.build_mashups()?;
        self.remap_exported_names();
        Ok(())
    }

    fn rewrite_bodies(&mut self) -> Result<(), CompilerError> {
        let jobs = std::mem::take(&mut self.pending.jobs);
        let mut rewriter = BodyRewriter::new(&self.units, &self.symbols, &self.config, &mut self.breakpoints);
        for (unit, job) in &jobs {
            let descriptor = self.store.get_mut(&job.class_name).ok_or_else(|| CompilerError::UnknownEntity {
                name: job.class_name.clone(),
            })?;
            let code = rewriter.service_code(*unit, job, &descriptor.exported_name)?;
            let thing = descriptor.thing_mut().ok_or_else(|| CompilerError::UnknownEntity {
                name: job.class_name.clone(),
            })?;
            let slot = match &job.target {
                CodeTarget::Service(name) => thing.service_mut(name).map(|s| &mut s.code),
                CodeTarget::Subscription(name) => thing.subscription_mut(name).map(|s| &mut s.code),
            };
            match slot {
                Some(slot) => *slot = code,
                None => {
                    return Err(CompilerError::UnknownEntity {
                        name: format!("{}.{}", job.class_name, job.target.name()),
                    })
                }
            }
        }
        Ok(())
    }

    fn attach_global_code(&mut self) -> Result<(), CompilerError> {
        let blocks = std::mem::take(&mut self.pending.global_code);
        let mut rewriter = BodyRewriter::new(&self.units, &self.symbols, &self.config, &mut self.breakpoints);
        for (unit, thing) in &blocks {
            let code = rewriter.global_code(*unit)?;
            let class = self
                .store
                .resolve_class(thing)
                .ok_or_else(|| CompilerError::UnknownEntity { name: thing.clone() })?;
            let stem = self.units[*unit].stem();
            let file = self.units[*unit].path.clone();
            let model = self
                .store
                .get_mut(&class)
                .filter(|d| d.kind == EntityKind::Thing)
                .and_then(|d| d.thing_mut())
                .ok_or_else(|| CompilerError::File {
                    message: format!("Global code can only be attached to a thing, and '{}' is not one", thing),
                    file,
                })?;
            log::debug!("attaching global code of {} to {}", stem, thing);
            model.subscriptions.push(SubscriptionDefinition {
                name: format!("GlobalCode_{}", stem),
                description: String::new(),
                enabled: true,
                event_name: GLOBAL_CODE_EVENT.to_string(),
                source: String::new(),
                source_type: String::new(),
                source_property: String::new(),
                code,
            });
        }
        Ok(())
    }

    fn build_mashups(&mut self) -> Result<(), CompilerError> {
        let mashups = std::mem::take(&mut self.pending.mashups);
        for (unit, class_name) in &mashups {
            let file = &self.units[*unit];
            let mut ctx = FileContext::new(file, &self.config, &self.symbols);
            let descriptor = {
                let types = StoreTypes { store: &self.store };
                build_mashup(&mut ctx, class_name, &types, &self.units)?
            };
            self.diagnostics.extend(ctx.diagnostics);
            self.store.insert(descriptor)?;
        }
        Ok(())
    }

    /// Rewrites references to classes of this session into the names the
    /// entities are exported under.
    fn remap_exported_names(&mut self) {
        let renamed: HashMap<String, String> = self
            .store
            .iter()
            .filter(|d| d.name != d.exported_name)
            .map(|d| (d.name.clone(), d.exported_name.clone()))
            .collect();
        if renamed.is_empty() {
            return;
        }
        let remap = |name: &mut String| {
            if let Some(exported) = renamed.get(name.as_str()) {
                *name = exported.clone();
            }
        };
        let remap_option = |name: &mut Option<String>| {
            if let Some(name) = name.as_mut() {
                remap(name);
            }
        };
        for descriptor in self.store.entities.values_mut() {
            remap_option(&mut descriptor.aspects.thing_template);
            remap_option(&mut descriptor.aspects.data_shape);
            remap_option(&mut descriptor.aspects.value_stream);
            descriptor.aspects.implemented_shapes.iter_mut().for_each(remap);
            match &mut descriptor.body {
                EntityBody::Thing(thing) => {
                    for property in &mut thing.properties {
                        remap_option(&mut property.aspects.data_shape);
                        remap_option(&mut property.aspects.thing_template);
                        remap_option(&mut property.aspects.thing_shape);
                        if let Some(binding) = property.local_binding.as_mut() {
                            remap(&mut binding.source_thing_name);
                        }
                    }
                    for service in &mut thing.services {
                        for field in service
                            .parameter_definitions
                            .iter_mut()
                            .chain(std::iter::once(&mut service.result_type))
                        {
                            remap_option(&mut field.aspects.data_shape);
                            remap_option(&mut field.aspects.thing_template);
                            remap_option(&mut field.aspects.thing_shape);
                        }
                    }
                    for event in &mut thing.events {
                        remap(&mut event.data_shape);
                    }
                    for subscription in &mut thing.subscriptions {
                        remap(&mut subscription.source);
                    }
                }
                EntityBody::DataShape(shape) => {
                    for field in &mut shape.fields {
                        remap_option(&mut field.aspects.data_shape);
                        remap_option(&mut field.aspects.thing_template);
                        remap_option(&mut field.aspects.thing_shape);
                    }
                }
                _ => {}
            }
        }
    }

    /// Serializes every entity of the store.
    pub fn emit(mut self) -> Result<CompileOutput, CompilerError> {
        self.require_phase(Phase::Finalizing, "emit")?;
        self.enter(Phase::Done);

        let mut output = CompileOutput::default();
        for descriptor in self.store.iter() {
            log::info!("emitting {} {}", descriptor.kind.element(), descriptor.exported_name);
            if let Some(thing) = descriptor.thing() {
                output.deployment_endpoints.extend(thing.deployment_endpoints.iter().cloned());
            }
            output.artifacts.push(EntityArtifact {
                name: descriptor.exported_name.clone(),
                kind: descriptor.kind,
                file: descriptor.file.clone(),
                xml: entity_document(descriptor),
                declaration: declaration_of(descriptor),
            });
        }
        output.breakpoints = self.breakpoints.into_vec();
        output.diagnostics = self.diagnostics.into_vec();
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSource;

    fn session() -> Session {
        Session::new(CompilerConfig {
            project_name: "Plant".to_string(),
            environment: EnvSource::Fixed(HashMap::new()),
            ..CompilerConfig::default()
        })
        .unwrap()
    }

    const PUMP: &str = r#"
@ThingDefinition
@exportName("Main Pump")
class Pump extends GenericThing {
    @subscription("Sensor", "Alert")
    onAlert() {
        this.stop();
    }

    stop(): NOTHING {
        const speed = 0;
        this.speed = speed;
    }
}
"#;

    #[test]
    fn test_bodies_are_compiled_after_all_entities() {
        let mut session = session();
        session.add_source("Pump.ts", PUMP).unwrap();
        session
            .add_source("Sensor.ts", "@ThingDefinition class Sensor extends GenericThing { alert!: EVENT<Alert>; }")
            .unwrap();
        let output = session.run().unwrap();

        assert_eq!(output.artifacts.len(), 2);
        let pump = &output.artifacts[0];
        assert_eq!(pump.name, "Main Pump");
        assert!(pump.xml.contains("var result = (function () {"));
        assert!(pump.xml.contains("me.speed = speed;"));
        assert_eq!(pump.declaration, "declare interface Things { \"Main Pump\": Pump }\n");
    }

    #[test]
    fn test_global_code_is_attached() {
        let mut session = session();
        session.add_source("Pump.ts", PUMP).unwrap();
        session
            .add_source("startup.ts", "\"use Main Pump\";\nlet started = true;\n")
            .unwrap();
        session.structural_pass().unwrap();
        session.finalize_pass().unwrap();
        let thing = session.store().get("Pump").unwrap().thing().unwrap();
        let global = thing.subscriptions.iter().find(|s| s.name == "GlobalCode_startup").unwrap();
        assert_eq!(global.event_name, "ThingStart");
        assert_eq!(global.code, "var started = true;");
    }

    #[test]
    fn test_unknown_global_code_target() {
        let mut session = session();
        session.add_source("startup.ts", "\"use Missing\";\nlet x = 1;\n").unwrap();
        let err = session.run().unwrap_err();
        assert!(matches!(err, CompilerError::UnknownEntity { name } if name == "Missing"));
    }

    #[test]
    fn test_phase_order() {
        let mut session = session();
        assert!(matches!(session.finalize_pass(), Err(CompilerError::PhaseOrder { .. })));
        session.structural_pass().unwrap();
        assert_eq!(session.phase(), Phase::Structural);
        assert!(matches!(
            session.add_source("Late.ts", "class A extends ThingShapeBase {}"),
            Err(CompilerError::PhaseOrder { .. })
        ));
        assert!(matches!(session.structural_pass(), Err(CompilerError::PhaseOrder { .. })));
    }

    #[test]
    fn test_duplicate_classes() {
        let mut session = session();
        session.add_source("a/Row.ts", "class Row extends DataShapeBase { id: STRING; }").unwrap();
        session.add_source("b/Row.ts", "class Row extends DataShapeBase { id: STRING; }").unwrap();
        assert!(matches!(session.run(), Err(CompilerError::DuplicateEntity { .. })));
    }

    #[test]
    fn test_exported_names_are_remapped() {
        let mut session = session();
        session.add_source("Pump.ts", PUMP).unwrap();
        session
            .add_source(
                "Station.ts",
                "@ThingDefinition class Station extends GenericThing { pump!: THINGNAME<Pump>; }",
            )
            .unwrap();
        session.structural_pass().unwrap();
        session.finalize_pass().unwrap();
        let station = session.store().get("Station").unwrap().thing().unwrap();
        assert_eq!(station.properties[0].aspects.thing_template.as_deref(), Some("Main Pump"));
    }

    #[test]
    fn test_mashup_services_are_typed_from_the_store() {
        let mut session = session();
        session
            .add_source(
                "Row.ts",
                "class Row extends DataShapeBase { label: STRING; }",
            )
            .unwrap();
        session
            .add_source(
                "Plant.ts",
                "@ThingDefinition class Plant extends GenericThing { rows(): INFOTABLE<Row> { return undefined; } }",
            )
            .unwrap();
        session
            .add_source(
                "Overview.tsx",
                r#"
const rows = defineService(Things.Plant.rows);
const label = defineWidget(Ptcslabel);

class Overview extends MashupBase {
    renderMashup() {
        return <Mashup>
            <Service ref={rows} />
            <Ptcslabel ref={label} LabelText={rows.AllData.label} />
        </Mashup>;
    }
}
"#,
            )
            .unwrap();
        let output = session.run().unwrap();
        let mashup = output.artifacts.iter().find(|a| a.kind == EntityKind::Mashup).unwrap();
        assert_eq!(mashup.name, "Overview");
        assert!(mashup.xml.contains("Things_Plant"));
    }
}
