use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{redact, LookupResult, MediaStore, ObjectInfo, UpstreamBody};
use crate::error::UpstreamError;
use crate::media::{ByteRange, MediaReference, UpstreamLocator};

/// Default base URL of the upstream file API.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.telegram.org";

const CREDENTIAL_NAME: &str = "upstream bot token";

/// Envelope returned by `getFile`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    result: Option<FileRecord>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileRecord {
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Media store speaking the Bot API file protocol.
///
/// - metadata: `GET {base}/bot{token}/getFile?file_id={id}`
/// - probe:    `HEAD {base}/file/bot{token}/{file_path}`
/// - bytes:    `GET {base}/file/bot{token}/{file_path}` (with `Range` when partial)
///
/// The token is part of every URL, so every endpoint that ends up in an error
/// or a log line is passed through [`redact`] first.
#[derive(Clone)]
pub struct HttpMediaStore {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpMediaStore {
    /// Create a store for the given API base URL.
    ///
    /// `timeout` bounds each individual upstream call. An empty token is
    /// treated as missing.
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, base_url, token, timeout)
    }

    /// Create a store that reuses an existing HTTP client.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let token = token.filter(|t| !t.trim().is_empty());
        Self {
            client,
            base_url,
            token,
            timeout,
        }
    }

    /// Whether the required credential is present.
    pub fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn token(&self) -> Result<&str, UpstreamError> {
        self.token
            .as_deref()
            .ok_or(UpstreamError::MissingCredentials(CREDENTIAL_NAME))
    }

    fn metadata_url(&self, token: &str, media_id: &MediaReference) -> String {
        format!(
            "{}/bot{}/getFile?file_id={}",
            self.base_url,
            token,
            media_id.encoded()
        )
    }

    fn file_url(&self, token: &str, locator: &UpstreamLocator) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.base_url,
            token,
            locator.as_str().trim_start_matches('/')
        )
    }

    fn endpoint(&self, url: &str) -> String {
        redact(url, self.token.as_deref())
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> UpstreamError {
        let endpoint = self.endpoint(url);
        if err.is_timeout() {
            UpstreamError::Timeout {
                endpoint,
                timeout: self.timeout,
            }
        } else {
            UpstreamError::Connection {
                endpoint,
                message: redact(&err.without_url().to_string(), self.token.as_deref()),
            }
        }
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn lookup(&self, media_id: &MediaReference) -> Result<LookupResult, UpstreamError> {
        let token = self.token()?;
        let url = self.metadata_url(token, media_id);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        let envelope = match response.json::<ApiEnvelope>().await {
            Ok(envelope) => envelope,
            Err(e) if e.is_timeout() => return Err(self.transport_error(&url, e)),
            Err(_) if status == StatusCode::NOT_FOUND => {
                return Err(UpstreamError::NotFound(media_id.to_string()))
            }
            Err(_) if !status.is_success() => {
                return Err(UpstreamError::Status {
                    endpoint: self.endpoint(&url),
                    status: status.as_u16(),
                })
            }
            Err(e) => {
                return Err(UpstreamError::Connection {
                    endpoint: self.endpoint(&url),
                    message: format!(
                        "invalid metadata response: {}",
                        redact(&e.without_url().to_string(), self.token.as_deref())
                    ),
                })
            }
        };

        if !envelope.ok {
            let code = envelope.error_code.unwrap_or(status.as_u16());
            return match code {
                400 | 404 => Err(UpstreamError::NotFound(
                    envelope
                        .description
                        .unwrap_or_else(|| media_id.to_string()),
                )),
                _ => Err(UpstreamError::Status {
                    endpoint: self.endpoint(&url),
                    status: code,
                }),
            };
        }

        let record = envelope
            .result
            .ok_or_else(|| UpstreamError::NoLocator(media_id.to_string()))?;
        let file_path = record
            .file_path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| UpstreamError::NoLocator(media_id.to_string()))?;

        Ok(LookupResult {
            locator: UpstreamLocator::new(file_path),
            size: record.file_size,
            content_type: record.mime_type,
        })
    }

    async fn probe(&self, locator: &UpstreamLocator) -> Result<ObjectInfo, UpstreamError> {
        let token = self.token()?;
        let url = self.file_url(token, locator);

        let response = self
            .client
            .head(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(locator.to_string()));
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                endpoint: self.endpoint(&url),
                status: status.as_u16(),
            });
        }

        // HEAD responses have an empty body, so read the header directly
        // rather than trusting the body size hint.
        let headers = response.headers();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(ObjectInfo { size, content_type })
    }

    async fn open(
        &self,
        locator: &UpstreamLocator,
        range: Option<ByteRange>,
    ) -> Result<UpstreamBody, UpstreamError> {
        let token = self.token()?;
        let url = self.file_url(token, locator);

        let mut request = self.client.get(&url);
        if let Some(range) = range {
            request = request.header(RANGE, range.to_header_value());
        }

        // Only the open is bounded; the body itself may stream for as long
        // as the client keeps reading.
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| UpstreamError::Timeout {
                endpoint: self.endpoint(&url),
                timeout: self.timeout,
            })?
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(locator.to_string()));
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                endpoint: self.endpoint(&url),
                status: status.as_u16(),
            });
        }

        let range_applied = range.is_none() || status == StatusCode::PARTIAL_CONTENT;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| UpstreamError::Stream(e.without_url().to_string())))
            .boxed();

        Ok(UpstreamBody {
            stream,
            range_applied,
        })
    }

    fn describe(&self) -> String {
        format!("http store at {}", self.base_url)
    }
}
