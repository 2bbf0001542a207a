pub mod account_proof;
pub mod block;
pub mod block_identifier;
pub mod fork_choice;
pub mod payload;
pub mod receipt;
pub mod simulate;
pub mod transaction;
