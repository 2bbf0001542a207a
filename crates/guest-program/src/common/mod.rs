mod error;
mod execution;

pub use error::ExecutionError;
pub use execution::{BatchExecutionResult, execute_blocks};
