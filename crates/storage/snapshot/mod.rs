mod difflayer;
mod disklayer;
mod layer;
mod tree;
pub use disklayer::DiskLayer;
pub use layer::SnapshotLayer;
pub use tree::SnapshotTree;
