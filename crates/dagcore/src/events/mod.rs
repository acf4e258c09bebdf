// crates/dagcore/src/events/mod.rs

mod bus;

pub use bus::{EventBus, ExecutionEvent, ExecutionId};
