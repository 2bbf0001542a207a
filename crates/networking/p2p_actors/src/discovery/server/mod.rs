pub mod actor;
pub mod ingress;

pub use actor::{Actor, Config, Error};
pub use ingress::Mailbox;
