//! Object storage for recorded pitch audio.
//!
//! Uploads go to an S3-compatible bucket (MinIO locally, S3 or Supabase
//! storage in production). Objects are publicly readable through
//! `S3_PUBLIC_URL`; the SPA plays them back directly.

use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;

/// Upper bound on a single recording.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Accepted recording formats and the file extension each is stored under.
const AUDIO_TYPES: &[(&str, &str)] = &[
    ("audio/webm", "webm"),
    ("audio/ogg", "ogg"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/mp4", "m4a"),
    ("audio/x-m4a", "m4a"),
];

/// Returns the storage extension for a supported audio mime type.
/// Parameters such as `;codecs=opus` are ignored.
pub fn audio_extension(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next()?.trim().to_ascii_lowercase();
    AUDIO_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

#[derive(Clone)]
pub struct AudioStorage {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl AudioStorage {
    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn from_config(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "pitchcoach-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
            .force_path_style(true)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            public_url: config.s3_public_url.clone(),
        }
    }

    #[cfg(test)]
    pub fn for_tests(config: &Config) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .endpoint_url(&config.s3_endpoint)
            .force_path_style(true)
            .build();
        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            public_url: config.s3_public_url.clone(),
        }
    }

    pub fn object_key(user_id: Uuid, extension: &str) -> String {
        format!("pitches/{user_id}/{}.{extension}", Uuid::new_v4())
    }

    pub fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    /// Inverse of [`public_url_for`](Self::public_url_for). `None` for URLs
    /// that do not point into this bucket.
    pub fn key_from_public_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_url.as_str())?
            .strip_prefix('/')
            .filter(|k| !k.is_empty())
    }

    /// Uploads a recording and returns its public URL.
    pub async fn upload_audio(
        &self,
        user_id: Uuid,
        body: Bytes,
        mime_type: &str,
    ) -> Result<String, AppError> {
        let extension = audio_extension(mime_type)
            .ok_or_else(|| AppError::Validation(format!("Unsupported audio type '{mime_type}'")))?;
        let key = Self::object_key(user_id, extension);
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

        info!("Uploaded {size} bytes of audio to s3://{}/{}", self.bucket, key);
        Ok(self.public_url_for(&key))
    }

    /// Removes a recording. Failures are logged, not returned: a dangling
    /// object must not block deleting the pitch that referenced it.
    pub async fn delete_audio(&self, url: &str) {
        let Some(key) = self.key_from_public_url(url) else {
            warn!("Not deleting audio outside the configured bucket: {url}");
            return;
        };
        if let Err(e) = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            warn!("Failed to delete s3://{}/{}: {e}", self.bucket, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_extension() {
        assert_eq!(audio_extension("audio/webm;codecs=opus"), Some("webm"));
        assert_eq!(audio_extension("AUDIO/MPEG"), Some("mp3"));
        assert_eq!(audio_extension("audio/x-m4a"), Some("m4a"));
        assert_eq!(audio_extension("video/mp4"), None);
        assert_eq!(audio_extension(""), None);
    }

    #[test]
    fn test_object_key_layout() {
        let user = Uuid::new_v4();
        let key = AudioStorage::object_key(user, "webm");
        assert!(key.starts_with(&format!("pitches/{user}/")));
        assert!(key.ends_with(".webm"));
    }

    #[test]
    fn test_public_url_round_trip() {
        let storage = AudioStorage::for_tests(&Config::for_tests());
        let url = storage.public_url_for("pitches/u/a.webm");
        assert_eq!(url, "http://cdn.test/pitches/pitches/u/a.webm");
        assert_eq!(storage.key_from_public_url(&url), Some("pitches/u/a.webm"));
        assert_eq!(storage.key_from_public_url("https://elsewhere/a.webm"), None);
    }

    #[tokio::test]
    async fn test_unsupported_type_rejected_before_upload() {
        let storage = AudioStorage::for_tests(&Config::for_tests());
        let result = storage
            .upload_audio(Uuid::new_v4(), Bytes::from_static(b"x"), "text/plain")
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
