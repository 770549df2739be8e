//! S3/MinIO object store publisher

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use video_digest_common::{PipelineError, Publisher, Result, VideoInfo};

use crate::output_filename;

/// S3/MinIO configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Bucket name
    pub bucket: String,

    /// AWS region, or any value for `MinIO`
    pub region: String,

    /// Custom endpoint for `MinIO`; empty for AWS S3
    #[serde(default)]
    pub endpoint: Option<String>,

    pub access_key_id: String,
    pub secret_access_key: String,

    /// Key prefix prepended to every upload (e.g. `digests/`)
    #[serde(default)]
    pub prefix: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "video-digests".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            prefix: String::new(),
        }
    }
}

/// Publisher backed by an S3-compatible bucket
pub struct ObjectStorePublisher {
    client: Client,
    bucket: String,
    prefix: String,
}

impl ObjectStorePublisher {
    /// Create a client for the configured bucket.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "video-digest-publisher",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .behavior_version_latest();

        // MinIO needs path-style addressing.
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        info!("object store publisher using bucket {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }

    fn key_for(&self, category: &str, user: &str, filename: &str) -> String {
        format!("{}{category}/{user}/{filename}", self.prefix)
    }

    async fn upload(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
        suffix: &str,
    ) -> Result<String> {
        let filename = output_filename(info.title.as_deref(), request_id, suffix);
        let key = self.key_for(category, user, &filename);

        let data = tokio::fs::read(path).await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("text/plain")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| PipelineError::Publish(format!("failed to upload {key}: {err}")))?;

        info!("uploaded {key} for request {request_id}");

        // The artifact is safely stored; drop the local copy. Cleanup
        // tolerates the file already being gone.
        if let Err(err) = tokio::fs::remove_file(path).await {
            warn!("failed to remove {} after upload: {err}", path.display());
        }

        Ok(key)
    }
}

#[async_trait]
impl Publisher for ObjectStorePublisher {
    async fn upload_summary(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String> {
        self.upload(request_id, info, path, category, user, "summary.txt")
            .await
    }

    async fn upload_transcript(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String> {
        self.upload(request_id, info, path, category, user, "transcript.txt")
            .await
    }
}
