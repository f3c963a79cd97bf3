//! The flat adapter and its in-memory key-value backend.
mod flat_adapter;
mod memory;

pub use flat_adapter::*;
pub use memory::*;
