pub mod editions;
pub mod lock_manager;
pub mod memory;
pub mod store_traits;

// Re-export the main types for convenience
pub use editions::EditionRegistry;
pub use lock_manager::InMemoryLockManager;
pub use memory::InMemoryStore;
pub use store_traits::{CurioStore, CurioStoreIterator};
