use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;

use crate::core::config::Settings;

/// Read side of the object store; the upload flow owns the write side.
#[async_trait]
pub(crate) trait BlobStore: Send + Sync {
    async fn fetch(&self, object_key: &str) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub(crate) struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        if settings.s3().access_key.is_empty() || settings.s3().secret_key.is_empty() {
            return Ok(None);
        }

        let creds = Credentials::new(
            settings.s3().access_key.clone(),
            settings.s3().secret_key.clone(),
            None,
            None,
            "redink-static",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(settings.s3().endpoint.clone())
            .region(aws_config::Region::new(settings.s3().region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        // MinIO-style endpoints resolve buckets by path, not subdomain.
        let s3_config =
            aws_sdk_s3::config::Builder::from(&config).force_path_style(true).build();

        Ok(Some(Self { client: Client::from_conf(s3_config), bucket: settings.s3().bucket.clone() }))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn fetch(&self, object_key: &str) -> anyhow::Result<Vec<u8>> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch object {object_key}"))?;

        let bytes = object
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read object body for {object_key}"))?;

        Ok(bytes.into_bytes().to_vec())
    }
}
