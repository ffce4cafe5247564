pub mod file_provider;
pub mod memory_provider;
pub mod provider;

pub use file_provider::FileSnapshot;
pub use memory_provider::{MemoryStore, StoreState};
pub use provider::EntityStore;
