// Keep H256, H160, H512, H64, Address, Bloom from ethereum_types
pub use ethereum_types::{Address, Bloom, H128, H160, H256, H264, H32, H512, H520, H64, Signature};
pub use ruint::ParseError as FromStrRadixErr;
// Use ruint for U256/U512
pub use ruint::aliases::{U256, U512};
pub mod constants;
pub mod serde_utils;
pub mod types;
pub use bytes::Bytes;
pub mod base64;
pub use ethrex_trie::{TrieLogger, TrieWitness};
pub mod errors;
pub mod evm;
pub mod fd_limit;
pub mod genesis_utils;
pub mod rkyv_utils;
pub mod tracing;
pub mod utils;
pub use utils::{BigEndianHash, U256Ext};

pub use errors::EcdsaError;
