mod input;
mod output;
mod program;

pub use input::ProgramInput;
pub use output::ProgramOutput;
pub use program::execution_program;
