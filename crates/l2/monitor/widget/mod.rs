pub mod batches;
pub mod blocks;
pub mod chain_status;
pub mod l1_to_l2_messages;
pub mod l2_to_l1_messages;
pub mod mempool;
pub mod node_status;

pub use batches::BatchesTable;
pub use blocks::BlocksTable;
pub use chain_status::GlobalChainStatusTable;
pub use l1_to_l2_messages::L1ToL2MessagesTable;
pub use l2_to_l1_messages::L2ToL1MessagesTable;
pub use mempool::MempoolTable;
pub use node_status::NodeStatusTable;
