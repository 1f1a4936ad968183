//! Domain entities and the entity table.

mod id;
mod kind;
mod record;
mod store;
mod value;

pub use id::EntityId;
pub use kind::EntityKind;
pub use record::Entity;
pub use store::EntityStore;
pub use value::FieldValue;
