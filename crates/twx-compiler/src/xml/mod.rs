//! XML serialization of the entity model.

pub mod entity;
pub mod mashup;
pub mod writer;

pub use entity::{entity_document, entity_element};
pub use writer::{XmlElement, XmlNode};
