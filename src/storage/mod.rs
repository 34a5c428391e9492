pub mod state;

pub use state::{ExecutionState, StateStore};
