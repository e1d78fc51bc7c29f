use super::{FrameRequest, FrameSource};
use crate::config::SourceConfig;
use crate::error::AcquisitionError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, trace};

/// Camera board reached over HTTP at `{base_url}/capture`
pub struct HttpFrameSource {
    client: reqwest::Client,
    capture_url: String,
}

impl HttpFrameSource {
    pub fn new(config: &SourceConfig) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AcquisitionError::Unavailable {
                details: format!("Failed to build HTTP client: {}", e),
            })?;

        let capture_url = capture_url(&config.base_url);
        info!(
            "HTTP frame source targeting {} (timeout {:?})",
            capture_url,
            config.request_timeout()
        );

        Ok(Self {
            client,
            capture_url,
        })
    }

    pub fn capture_url(&self) -> &str {
        &self.capture_url
    }
}

/// Join the base URL and the capture path without doubling slashes
pub fn capture_url(base_url: &str) -> String {
    format!("{}/capture", base_url.trim().trim_end_matches('/'))
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn fetch_frame(&self, request: FrameRequest) -> Result<RawFrame, AcquisitionError> {
        trace!(
            "GET {}?_ts={} (frame {})",
            self.capture_url,
            request.token,
            request.id
        );

        let response = self
            .client
            .get(&self.capture_url)
            .query(&[("_ts", request.token)])
            .send()
            .await
            .map_err(|e| AcquisitionError::Request {
                url: self.capture_url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                url: self.capture_url.clone(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let data = response
            .bytes()
            .await
            .map_err(|e| AcquisitionError::Request {
                url: self.capture_url.clone(),
                source: e,
            })?;

        if data.is_empty() {
            return Err(AcquisitionError::EmptyFrame);
        }

        debug!(
            "Fetched frame {} ({} bytes, {})",
            request.id,
            data.len(),
            content_type.as_deref().unwrap_or("unknown type")
        );

        Ok(RawFrame::new(request.id, request.token, content_type, data))
    }

    fn describe(&self) -> String {
        format!("http {}", self.capture_url)
    }
}
