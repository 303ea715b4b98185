/// S3-backed object store
///
/// Production implementation of [`ObjectStore`]/[`AssetStore`] against S3 or
/// any S3-compatible endpoint (MinIO, R2). Error strings from the SDK are
/// inspected to distinguish missing objects from real failures.
use crate::config::S3Config;
use crate::error::{AppError, Result};
use crate::storage::{
    AssetStore, ListPage, ObjectBody, ObjectHead, ObjectStore, ObjectSummary,
};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

/// Initialize an S3 client with credentials from config.
///
/// Uses the default credential chain when no explicit keys are configured;
/// a custom endpoint enables S3-compatible storage.
pub async fn build_client(config: &S3Config) -> Client {
    use aws_sdk_s3::config::Region;

    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "photo_service_s3",
        );
        builder = builder.credentials_provider(credentials);
    }

    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    Client::new(&builder.load().await)
}

fn is_not_found(message: &str) -> bool {
    message.contains("404") || message.contains("NotFound") || message.contains("NoSuchKey")
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts.secs(), ts.subsec_nanos()).single()
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Startup connectivity probe: validates credentials and bucket access.
    pub async fn health_check(&self) -> Result<()> {
        match self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, "S3 connection validated");
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                let guidance = if error_msg.contains("InvalidAccessKeyId") {
                    "Invalid AWS Access Key ID. Check AWS_ACCESS_KEY_ID."
                } else if error_msg.contains("SignatureDoesNotMatch") {
                    "Invalid AWS Secret Access Key. Check AWS_SECRET_ACCESS_KEY."
                } else if error_msg.contains("NoSuchBucket") {
                    "Bucket does not exist. Check S3_BUCKET."
                } else if error_msg.contains("AccessDenied") {
                    "Access denied. Ensure the IAM user/role has S3 permissions."
                } else {
                    "Ensure the S3 bucket is accessible and credentials are valid."
                };
                tracing::error!(bucket = %self.bucket, error = %error_msg, guidance, "S3 health check failed");
                Err(AppError::Storage(format!(
                    "S3 health check failed: {error_msg}. {guidance}"
                )))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()))
            .send()
            .await
            .map_err(|e| {
                let error_msg = e.to_string();
                if error_msg.contains("403") || error_msg.contains("Forbidden") {
                    AppError::Internal("S3 auth failed (403): check AWS credentials".to_string())
                } else if error_msg.contains("NoSuchBucket") {
                    AppError::Internal(format!("S3 bucket not found: {}", self.bucket))
                } else {
                    AppError::Internal(format!("S3 upload failed: {e}"))
                }
            })?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<ObjectBody>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if is_not_found(&e.to_string()) => return Ok(None),
            Err(e) => return Err(AppError::Internal(format!("S3 get failed: {e}"))),
        };

        let content_type = resp.content_type().map(|s| s.to_string());
        let metadata = resp.metadata().cloned().unwrap_or_default();
        let last_modified = resp.last_modified().and_then(to_chrono);

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read S3 object body: {e}")))?
            .into_bytes();

        Ok(Some(ObjectBody {
            data,
            content_type,
            metadata,
            last_modified,
        }))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => Ok(Some(ObjectHead {
                content_type: resp.content_type().map(|s| s.to_string()),
                size: resp.content_length().unwrap_or(0).max(0) as u64,
                last_modified: resp.last_modified().and_then(to_chrono),
            })),
            Err(e) if is_not_found(&e.to_string()) => Ok(None),
            Err(e) => Err(AppError::Internal(format!("S3 head failed: {e}"))),
        }
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<ListPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(limit as i32)
            .set_continuation_token(cursor.map(|c| c.to_string()))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("S3 list failed: {e}")))?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(ObjectSummary {
                    key: obj.key()?.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj.last_modified().and_then(to_chrono),
                    // S3 listings never carry custom metadata; callers fall
                    // back to key-derived values.
                    metadata: None,
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            cursor: resp.next_continuation_token().map(|t| t.to_string()),
            has_more: resp.is_truncated().unwrap_or(false),
        })
    }
}

/// Branding assets stored under a fixed prefix in the same bucket.
#[derive(Clone)]
pub struct S3AssetStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3AssetStore {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn fetch(&self, name: &str) -> Result<Option<Bytes>> {
        let key = format!("{}/{}", self.prefix, name);
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if is_not_found(&e.to_string()) => return Ok(None),
            Err(e) => return Err(AppError::Internal(format!("Asset fetch failed: {e}"))),
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read asset body: {e}")))?
            .into_bytes();

        Ok(Some(data))
    }
}
