use super::{FrameRequest, FrameSource};
use crate::error::AcquisitionError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// What the scripted device answers for one request
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Success with this payload
    Frame(Bytes),
    /// Non-success HTTP status
    Status(u16),
    /// Transport failure
    Unavailable,
}

/// Frame source that replays a fixed script, for running the loop without hardware
///
/// Once the script is exhausted every request gets the fallback response.
/// The source records how many requests overlapped so tests can check the
/// fetch guard.
pub struct ScriptedFrameSource {
    script: Mutex<VecDeque<ScriptedResponse>>,
    fallback: ScriptedResponse,
    latency: Duration,
    requests: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    tokens: Mutex<Vec<u64>>,
}

impl ScriptedFrameSource {
    pub fn new(fallback: ScriptedResponse) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            requests: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    /// Simulated time each request takes before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Responses to hand out, in order, before falling back
    pub fn with_script<I>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = ScriptedResponse>,
    {
        let script = responses.into_iter().collect();
        Self {
            script: Mutex::new(script),
            ..self
        }
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Tokens received so far, in request order
    pub async fn tokens(&self) -> Vec<u64> {
        self.tokens.lock().await.clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn fetch_frame(&self, request: FrameRequest) -> Result<RawFrame, AcquisitionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let sequence = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.tokens.lock().await.push(request.token);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let response = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        debug!("Scripted request {} for frame {}", sequence, request.id);

        match response {
            ScriptedResponse::Frame(data) if data.is_empty() => Err(AcquisitionError::EmptyFrame),
            ScriptedResponse::Frame(data) => Ok(RawFrame::new(
                request.id,
                request.token,
                Some("image/jpeg".to_string()),
                data,
            )),
            ScriptedResponse::Status(status) => Err(AcquisitionError::Status {
                url: "scripted://capture".to_string(),
                status,
            }),
            ScriptedResponse::Unavailable => Err(AcquisitionError::Unavailable {
                details: "scripted transport failure".to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
