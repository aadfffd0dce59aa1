pub mod memory;
pub mod record;
pub mod store;

pub use memory::MemoryStore;
pub use record::{Patch, Record};
pub use store::{DataStore, StoreError};
