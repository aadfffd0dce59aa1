

pub mod base;
pub mod bus;

pub use base::{Event, USER_DELETION_COMPLETED, USER_DELETION_FAILED};
pub use bus::{EventBus, EventHandler};
