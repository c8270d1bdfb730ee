//! Structural pass: one source file to one entity descriptor.
//!
//! Each submodule handles one kind of class member or one entity kind.
//! [`entity::EntityVisitor`] drives them and decides what a file is.

pub mod configuration;
pub mod data_shape;
pub mod declaration;
pub mod entity;
pub mod field_type;
pub mod organization;
pub mod permission;
pub mod property;
pub mod service;
pub mod user_list;

pub use declaration::declaration_of;
pub use entity::{CodeJob, CodeTarget, EntityVisitor, FileOutcome, FileState};
