use super::{BatchOp, StorageBackend, StorageError};

/// LibMDBX storage backend implementation
///
/// This adapter translates generic storage operations to LibMDBX tables.
/// Each namespace corresponds to a LibMDBX table.
#[derive(Debug)]
pub struct LibmdbxBackend {
    // We'll implement this later using the existing LibMDBX infrastructure
}

impl LibmdbxBackend {
    pub fn new(_path: &str) -> Result<Self, StorageError> {
        // TODO: Implement LibMDBX initialization
        todo!("LibMDBX backend implementation pending")
    }
}

#[async_trait::async_trait]
impl StorageBackend for LibmdbxBackend {
    fn get_sync(&self, _namespace: &str, _key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        todo!("LibMDBX get_sync implementation pending")
    }

    async fn get_async(
        &self,
        _namespace: &str,
        _key: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        todo!("LibMDBX get_async implementation pending")
    }

    async fn get_async_batch(
        &self,
        _namespace: &str,
        _keys: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, StorageError> {
        todo!("LibMDBX get_async_batch implementation pending")
    }

    async fn put(&self, _namespace: &str, _key: &[u8], _value: &[u8]) -> Result<(), StorageError> {
        todo!("LibMDBX put implementation pending")
    }

    async fn delete(&self, _namespace: &str, _key: &[u8]) -> Result<(), StorageError> {
        todo!("LibMDBX delete implementation pending")
    }

    async fn batch_write(&self, _ops: Vec<BatchOp>) -> Result<(), StorageError> {
        todo!("LibMDBX batch_write implementation pending")
    }

    async fn init_namespace(&self, _namespace: &str) -> Result<(), StorageError> {
        todo!("LibMDBX init_namespace implementation pending")
    }

    async fn range(
        &self,
        _namespace: &str,
        _start_key: &[u8],
        _end_key: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        todo!("LibMDBX range implementation pending")
    }
}
