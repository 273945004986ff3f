//! In-memory task store.

mod store;

pub use store::InMemoryTaskStore;
