use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::Client;
use futures::StreamExt;
use tracing::debug;

use super::{LookupResult, MediaStore, ObjectInfo, UpstreamBody};
use crate::error::UpstreamError;
use crate::media::{ByteRange, MediaReference, UpstreamLocator};

/// Upper bound for resolving credentials at startup (IMDS lookups can stall).
const CREDENTIALS_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// S3-backed implementation of [`MediaStore`].
///
/// The media identifier (under an optional prefix) is the object key. The
/// metadata lookup is a HEAD request, which already yields size and content
/// type, so `probe` is rarely needed.
#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    timeout: Duration,
    has_credentials: bool,
}

impl S3MediaStore {
    /// Create a store for the given bucket.
    ///
    /// `has_credentials` reflects whether credentials could be resolved at
    /// startup; without them every call fails with
    /// [`UpstreamError::MissingCredentials`] before touching the network.
    pub fn new(
        client: Client,
        bucket: String,
        prefix: Option<String>,
        timeout: Duration,
        has_credentials: bool,
    ) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            client,
            bucket,
            prefix,
            timeout,
            has_credentials,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether AWS credentials were resolved for this store.
    pub fn has_credentials(&self) -> bool {
        self.has_credentials
    }

    /// Object key for an identifier.
    pub fn key_for(&self, media_id: &MediaReference) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, media_id.as_str()),
            None => media_id.as_str().to_string(),
        }
    }

    fn endpoint(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    fn check_credentials(&self) -> Result<(), UpstreamError> {
        if self.has_credentials {
            Ok(())
        } else {
            Err(UpstreamError::MissingCredentials("AWS credentials"))
        }
    }

    fn timeout_error(&self, key: &str) -> UpstreamError {
        UpstreamError::Timeout {
            endpoint: self.endpoint(key),
            timeout: self.timeout,
        }
    }

    fn map_sdk_error<E>(&self, key: &str, err: SdkError<E, HttpResponse>) -> UpstreamError
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let endpoint = self.endpoint(key);

        let status = err.raw_response().map(|r| r.status().as_u16());
        let code = err.as_service_error().and_then(|e| e.code());

        if status == Some(404) || matches!(code, Some("NoSuchKey" | "NotFound")) {
            return UpstreamError::NotFound(endpoint);
        }

        match err {
            SdkError::TimeoutError(_) => self.timeout_error(key),
            SdkError::ServiceError(_) => UpstreamError::Status {
                endpoint,
                status: status.unwrap_or(500),
            },
            other => UpstreamError::Connection {
                endpoint,
                message: other.to_string(),
            },
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectInfo, UpstreamError> {
        let head = tokio::time::timeout(
            self.timeout,
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send(),
        )
        .await
        .map_err(|_| self.timeout_error(key))?
        .map_err(|e| self.map_sdk_error(key, e))?;

        Ok(ObjectInfo {
            size: head.content_length().and_then(|len| u64::try_from(len).ok()),
            content_type: head.content_type().map(str::to_string),
        })
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn lookup(&self, media_id: &MediaReference) -> Result<LookupResult, UpstreamError> {
        self.check_credentials()?;
        let key = self.key_for(media_id);
        let info = self.head(&key).await?;

        Ok(LookupResult {
            locator: UpstreamLocator::new(key),
            size: info.size,
            content_type: info.content_type,
        })
    }

    async fn probe(&self, locator: &UpstreamLocator) -> Result<ObjectInfo, UpstreamError> {
        self.check_credentials()?;
        self.head(locator.as_str()).await
    }

    async fn open(
        &self,
        locator: &UpstreamLocator,
        range: Option<ByteRange>,
    ) -> Result<UpstreamBody, UpstreamError> {
        self.check_credentials()?;
        let key = locator.as_str();

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(range) = range {
            request = request.range(range.to_header_value());
        }

        let output = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| self.timeout_error(key))?
            .map_err(|e| self.map_sdk_error(key, e))?;

        let range_applied = range.is_none() || output.content_range().is_some();
        let stream = futures::stream::unfold(output.body, |mut body: S3Body| async move {
            body.next()
                .await
                .map(|chunk| (chunk.map_err(|e| UpstreamError::Stream(e.to_string())), body))
        })
        .boxed();

        Ok(UpstreamBody {
            stream,
            range_applied,
        })
    }

    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("s3 store at s3://{}/{}", self.bucket, prefix),
            None => format!("s3 store at s3://{}", self.bucket),
        }
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Returns the client together with whether credentials could actually be
/// resolved. Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let (client, has_credentials) = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> (Client, bool) {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;
    let has_credentials =
        credentials_available(sdk_config.credentials_provider(), CREDENTIALS_CHECK_TIMEOUT).await;

    // For S3-compatible services, we often need to use path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    (Client::from_conf(s3_config), has_credentials)
}

/// Ask the provider chain for credentials once.
///
/// The default chain always exists and resolves lazily, so only a successful
/// resolution counts.
pub async fn credentials_available(
    provider: Option<SharedCredentialsProvider>,
    timeout: Duration,
) -> bool {
    let Some(provider) = provider else {
        return false;
    };

    match tokio::time::timeout(timeout, provider.provide_credentials()).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("AWS credentials could not be resolved: {}", e);
            false
        }
        Err(_) => {
            debug!("AWS credential resolution timed out after {:?}", timeout);
            false
        }
    }
}
