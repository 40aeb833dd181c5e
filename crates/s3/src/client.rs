//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from ms-core.

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use jiff::Timestamp;
use ms_core::{
    EndpointConfig, EndpointIdentity, Error, ListOptions, ListResult, ObjectData, ObjectMetadata,
    ObjectRecord, ObjectStore, Result,
};
use tracing::debug;

/// S3 client wrapper bound to one endpoint
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    endpoint: EndpointIdentity,
}

impl S3Client {
    /// Create a client from one side of the configuration
    ///
    /// Fails with `Error::Configuration` before any request when the endpoint
    /// or credentials are missing.
    pub async fn new(config: &EndpointConfig) -> Result<Self> {
        let endpoint = config.validate("endpoint")?;

        let credentials = aws_credential_types::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None, // session token
            None, // expiry
            "msync-static-credentials",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        debug!(endpoint = %endpoint, region = %config.region, "S3 client created");

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            endpoint,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &SdkError<E>) -> String {
        match error {
            SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let meta = service_err.raw();
                let mut msg = format!("Service error: {}", err);
                if let Some(code) = meta.headers().get("x-amz-error-code")
                    && let Ok(code_str) = std::str::from_utf8(code.as_bytes())
                {
                    msg.push_str(&format!(" (code: {})", code_str));
                }
                msg
            }
            SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {:?}", err)
            }
            SdkError::TimeoutError(_) => "Request timeout".to_string(),
            SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {:?}", err)
            }
            SdkError::ResponseError(err) => {
                format!("Response error: {:?}", err)
            }
            _ => error.to_string(),
        }
    }

    /// Map an SDK failure onto the engine's error taxonomy
    ///
    /// Missing keys and buckets become `NotFound`, transport and credential
    /// failures become `Connection`, everything else is a `Transfer` error.
    fn classify<E>(error: SdkError<E>, target: &str) -> Error
    where
        E: ProvideErrorMetadata + std::fmt::Display,
    {
        let message = Self::format_sdk_error(&error);
        match &error {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
                Error::Connection(format!("{target}: {message}"))
            }
            SdkError::ServiceError(service_err) => {
                let code = service_err.err().code();
                if service_err.raw().status().as_u16() == 404
                    || matches!(code, Some("NoSuchKey" | "NotFound" | "NoSuchBucket"))
                {
                    Error::NotFound(target.to_string())
                } else if matches!(
                    code,
                    Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch")
                ) {
                    Error::Connection(format!("{target}: {message}"))
                } else {
                    Error::Transfer(format!("{target}: {message}"))
                }
            }
            _ => Error::Transfer(format!("{target}: {message}")),
        }
    }
}

/// `CopySource` header value: bucket and URL-encoded key
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", urlencoding::encode(key))
}

fn to_timestamp(dt: &aws_smithy_types::DateTime) -> Option<Timestamp> {
    Timestamp::new(dt.secs(), dt.subsec_nanos() as i32).ok()
}

#[async_trait]
impl ObjectStore for S3Client {
    fn endpoint(&self) -> EndpointIdentity {
        self.endpoint.clone()
    }

    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);

        if let Some(p) = options.prefix.filter(|p| !p.is_empty()) {
            request = request.prefix(p);
        }
        if let Some(max) = options.max_keys {
            request = request.max_keys(max);
        }
        if let Some(token) = &options.continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::classify(e, &format!("bucket {bucket}")))?;

        let items = response
            .contents()
            .iter()
            .map(|object| ObjectRecord {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0).max(0) as u64,
                last_modified: object.last_modified().and_then(to_timestamp),
                etag: ms_core::traits::normalize_etag(object.e_tag().unwrap_or_default()),
            })
            .collect();

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::classify(e, &format!("{bucket}/{key}")))?;

        Ok(ObjectMetadata {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            last_modified: response.last_modified().and_then(to_timestamp),
            etag: response.e_tag().unwrap_or_default().to_string(),
            content_type: response.content_type().map(|ct| ct.to_string()),
            metadata: response.metadata().cloned().unwrap_or_default(),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::classify(e, &format!("{bucket}/{key}")))?;

        let content_type = response.content_type().map(|ct| ct.to_string());
        let metadata = response.metadata().cloned().unwrap_or_default();
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Transfer(format!("{bucket}/{key}: reading body: {e}")))?
            .into_bytes();

        Ok(ObjectData {
            body,
            content_type,
            metadata,
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, data: ObjectData) -> Result<String> {
        let mut request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data.body));

        if let Some(ct) = data.content_type {
            request = request.content_type(ct);
        }
        if !data.metadata.is_empty() {
            request = request.set_metadata(Some(data.metadata));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::classify(e, &format!("{bucket}/{key}")))?;

        Ok(ms_core::traits::normalize_etag(
            response.e_tag().unwrap_or_default(),
        ))
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<String> {
        let response = self
            .inner
            .copy_object()
            .copy_source(copy_source(src_bucket, src_key))
            .bucket(dest_bucket)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| Self::classify(e, &format!("{src_bucket}/{src_key}")))?;

        let etag = response
            .copy_object_result()
            .and_then(|r| r.e_tag())
            .unwrap_or_default();
        Ok(ms_core::traits::normalize_etag(etag))
    }
}
