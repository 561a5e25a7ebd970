//! In-memory collaborators, used by tests and local wiring.

mod catalog;
mod store;

pub use catalog::{InMemoryCatalog, StaticCatalogProvider};
pub use store::InMemoryStore;
