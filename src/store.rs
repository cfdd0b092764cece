//! Defines the object storage seam used by the handler.

use anyhow::Result;
use async_trait::async_trait;

/// Whole-object reads and writes against a bucketed key space.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full body of an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Create or replace an object.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}
