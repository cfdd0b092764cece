//! Defines the global S3 client.

use crate::store::ObjectStore;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::{from_env, SdkConfig};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use once_cell::sync::OnceCell;
use std::env;

/// Downloads a single object from storage into memory.
pub async fn download(client: &Client, bucket: &str, key: &str) -> Result<Vec<u8>> {
    let body = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .with_context(|| {
            format!(
                "Failed to download object {:?} from bucket {:?}",
                key, bucket
            )
        })?
        .body
        .collect()
        .await
        .with_context(|| {
            format!(
                "Failed to read the contents of remote object {:?} from bucket {:?}",
                key, bucket
            )
        })?;
    Ok(body.into_bytes().to_vec())
}

/// Uploads a single CSV object to storage.
pub async fn upload(client: &Client, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type("text/csv")
        .body(ByteStream::from(body))
        .send()
        .await
        .with_context(|| {
            format!(
                "Failed to upload remote object {:?} in bucket {:?}",
                key, bucket
            )
        })?;
    Ok(())
}

#[async_trait]
impl ObjectStore for Client {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        download(self, bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        upload(self, bucket, key, body).await
    }
}

/// Normalize an endpoint override, defaulting to https.
fn endpoint_url(raw: String) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw
    } else {
        format!("https://{}", raw)
    }
}

/// Load the shared AWS configuration, honouring `AWS_ENDPOINT_URL`
/// for S3-compatible services.
pub async fn aws_service_config() -> SdkConfig {
    if let Ok(raw) = env::var("AWS_ENDPOINT_URL") {
        from_env()
            .endpoint_url(endpoint_url(raw))
            .region("us-east-1") // should be OK since the endpoint was overridden
            .load()
            .await
    } else {
        from_env().load().await
    }
}

/// Global S3 client instance.
static CURRENT: OnceCell<Client> = OnceCell::new();

/// Initialize the global S3 client.
pub async fn init() -> Result<()> {
    let client = Client::new(&aws_service_config().await);
    CURRENT
        .set(client)
        .map_err(|_| anyhow!("client::CURRENT was already initialized"))
}

/// Get the current S3 client instance, or panic if it hasn't been initialized.
pub fn current() -> &'static Client {
    CURRENT.get().expect("client is not initialized")
}
