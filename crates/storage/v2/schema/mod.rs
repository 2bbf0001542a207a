mod registry;
mod serializers;
mod tables;

pub use registry::{SchemaRegistry, TableBatchOp, TableDefinition};
pub use serializers::Rlp;
pub use tables::DBTable;
