//! Mashup builder: `define*` references, the JSX widget tree, bindings and
//! Core UI controllers.

pub mod bindings;
pub mod controller;
pub mod mashup;
pub mod references;
pub mod types;
pub mod widgets;

pub use mashup::build_mashup;
pub use references::{collect_references, ReferenceTable};
pub use types::{NoEntities, TypeResolver};
