pub mod actor;
pub mod ingress;

pub mod constants;
mod crypto;
mod handshake;
pub mod packet;
pub mod utils;

pub use actor::{Actor, Config, Error};
pub use ingress::Mailbox;
