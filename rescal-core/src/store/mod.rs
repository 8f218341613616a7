//! SQL-backed event and resource stores.

mod events;
mod resources;
mod row;

pub use events::{EventCondition, EventStore};
pub use resources::ResourceStore;
