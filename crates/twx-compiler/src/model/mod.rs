//! In-memory entity model produced by the transformers.

pub mod base_type;
pub mod configuration;
pub mod entity;
pub mod permission;
pub mod ui;

pub use configuration::{ConfigurationField, ConfigurationTable, ConfigurationTableDefinition};
pub use entity::*;
pub use permission::{
    PermissionConflict, PermissionKind, PermissionList, PermissionSet, Principal, PrincipalType, VisibilityKind,
    VisibilityPrincipal, VisibilitySet,
};
pub use ui::{MashupContent, MashupModel, UIReference, UIReferenceKind, UIWidget};
