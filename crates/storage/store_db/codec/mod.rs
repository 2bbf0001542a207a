pub mod account_address;
#[cfg(feature = "libmdbx")] // TODO: remove this feature flag once other implementations are ready
pub mod account_info_log_entry;
pub mod account_storage_key_bytes;
pub mod account_storage_log_entry;
pub mod account_storage_value_bytes;
pub mod block_num_hash;
pub mod encodable_account_info;
pub mod flat_tables_block_metadata_key;
