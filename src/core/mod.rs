

pub mod config;
pub mod error;
pub mod events;

pub use config::ErasureConfig;
pub use error::{ErasureError, Result};
pub use events::{Event, EventBus, EventHandler};
