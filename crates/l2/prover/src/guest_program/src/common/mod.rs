mod error;
mod execution;

pub use error::ExecutionError;
pub use execution::{BlockExecutionResult, execute_blocks};
