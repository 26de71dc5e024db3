//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from seg-core.
//! Every request goes through seg-core's retry policy; the SDK's own retry
//! layer is disabled so attempts are counted in one place.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use seg_core::{
    Error, ListOptions, ListResult, ObjectInfo, ObjectStore, RemotePath, Result, RetryConfig,
    StoreConfig, is_retryable_error, retry_with_backoff,
};

const DEFAULT_REGION: &str = "us-east-1";

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    retry: RetryConfig,
}

impl S3Client {
    /// Create a client from the `[store]` section of the configuration
    pub async fn new(store: &StoreConfig) -> Result<Self> {
        let region = store
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .retry_config(aws_smithy_types::retry::RetryConfig::disabled());

        match (&store.access_key, &store.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = aws_credential_types::Credentials::new(
                    access_key,
                    secret_key,
                    None, // session token
                    None, // expiry
                    "segregator-static-credentials",
                );
                loader = loader.credentials_provider(credentials);
            }
            (None, None) => {}
            _ => {
                return Err(Error::Config(
                    "store.access_key and store.secret_key must be set together".to_string(),
                ));
            }
        }

        if let Some(endpoint) = &store.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(store.force_path_style)
            .build();

        tracing::debug!(
            endpoint = store.endpoint.as_deref().unwrap_or("default"),
            force_path_style = store.force_path_style,
            max_attempts = store.retry.max_attempts,
            "Created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            retry: store.retry.clone(),
        })
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &SdkError<E>) -> String {
        match error {
            SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let meta = service_err.raw();
                let mut msg = format!("Service error: {err} (status: {})", meta.status().as_u16());
                if let Some(code) = meta.headers().get("x-amz-error-code") {
                    msg.push_str(&format!(" (code: {code})"));
                }
                msg
            }
            SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {err:?}")
            }
            SdkError::TimeoutError(_) => "Request timeout".to_string(),
            SdkError::DispatchFailure(err) => format!("Network dispatch error: {err:?}"),
            SdkError::ResponseError(err) => format!("Response error: {err:?}"),
            _ => error.to_string(),
        }
    }

    /// Map an SDK error onto the core taxonomy
    fn map_sdk_error<E: std::fmt::Display>(error: SdkError<E>, path: &RemotePath) -> Error {
        let msg = Self::format_sdk_error(&error);
        classify(msg, path)
    }
}

/// Value of `x-amz-copy-source`: bucket/key with each key segment
/// percent-encoded, since S3 decodes the header before resolving the key
fn copy_source(src: &RemotePath) -> String {
    let key = src
        .key
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{key}", src.bucket)
}

fn classify(msg: String, path: &RemotePath) -> Error {
    if msg.contains("NoSuchKey") || msg.contains("NoSuchBucket") || msg.contains("NotFound") {
        Error::NotFound(format!("{path}: {msg}"))
    } else if msg.contains("AccessDenied")
        || msg.contains("InvalidAccessKeyId")
        || msg.contains("SignatureDoesNotMatch")
    {
        Error::Auth(msg)
    } else {
        Error::Network(msg)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects(&self, path: &RemotePath, options: ListOptions) -> Result<ListResult> {
        let response = retry_with_backoff(
            &self.retry,
            || {
                let mut request = self
                    .inner
                    .list_objects_v2()
                    .bucket(&path.bucket)
                    .prefix(&path.key);

                if let Some(delimiter) = &options.delimiter {
                    request = request.delimiter(delimiter);
                }
                if let Some(max) = options.max_keys {
                    request = request.max_keys(max);
                }
                if let Some(after) = &options.start_after {
                    request = request.start_after(after);
                }
                if let Some(token) = &options.continuation_token {
                    request = request.continuation_token(token);
                }

                async move {
                    request
                        .send()
                        .await
                        .map_err(|e| Self::map_sdk_error(e, path))
                }
            },
            is_retryable_error,
        )
        .await?;

        let items = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(ObjectInfo::new))
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(ListResult {
            items,
            common_prefixes,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<()> {
        let copy_source = copy_source(src);

        retry_with_backoff(
            &self.retry,
            || {
                let request = self
                    .inner
                    .copy_object()
                    .copy_source(&copy_source)
                    .bucket(&dst.bucket)
                    .key(&dst.key);
                async move { request.send().await.map_err(|e| Self::map_sdk_error(e, src)) }
            },
            is_retryable_error,
        )
        .await?;

        Ok(())
    }

    async fn delete_object(&self, path: &RemotePath) -> Result<()> {
        retry_with_backoff(
            &self.retry,
            || {
                let request = self
                    .inner
                    .delete_object()
                    .bucket(&path.bucket)
                    .key(&path.key);
                async move { request.send().await.map_err(|e| Self::map_sdk_error(e, path)) }
            },
            is_retryable_error,
        )
        .await?;

        Ok(())
    }
}
