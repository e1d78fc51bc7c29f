//! Stand-in for the camera board, serving synthetic frames on `/capture`.

use crate::error::SimulatorError;
use crate::source::synthetic_jpeg;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Simulator settings
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub ip: String,
    /// Port to listen on; 0 picks a free port
    pub port: u16,
    pub width: u32,
    pub height: u32,
    /// Delay before each frame is answered
    pub latency: Duration,
    /// Answer every Nth request with 503
    pub fail_every: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 0,
            width: 320,
            height: 240,
            latency: Duration::from_millis(40),
            fail_every: None,
        }
    }
}

#[derive(Clone)]
struct SimulatorState {
    config: Arc<SimulatorConfig>,
    requests: Arc<AtomicU64>,
    last_token: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
struct CaptureQuery {
    #[serde(rename = "_ts")]
    ts: Option<u64>,
}

/// Builds and starts simulated devices
pub struct DeviceSimulator;

impl DeviceSimulator {
    /// Bind the listener and serve in a background task
    pub async fn start(config: SimulatorConfig) -> Result<RunningSimulator, SimulatorError> {
        let address = format!("{}:{}", config.ip, config.port);
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| SimulatorError::BindFailed {
                address: address.clone(),
                source: e,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SimulatorError::BindFailed { address, source: e })?;

        let state = SimulatorState {
            config: Arc::new(config),
            requests: Arc::new(AtomicU64::new(0)),
            last_token: Arc::new(AtomicU64::new(0)),
        };

        let app = Router::new()
            .route("/capture", get(capture_handler))
            .route("/health", get(health_handler))
            .with_state(state.clone());

        let cancellation_token = CancellationToken::new();
        let shutdown = cancellation_token.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        info!("Camera simulator listening on {}", local_addr);

        Ok(RunningSimulator {
            addr: local_addr,
            requests: state.requests,
            last_token: state.last_token,
            cancellation_token,
            task,
        })
    }
}

/// Handle to a simulator serving in the background
pub struct RunningSimulator {
    addr: SocketAddr,
    requests: Arc<AtomicU64>,
    last_token: Arc<AtomicU64>,
    cancellation_token: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl RunningSimulator {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL to point a frame source at
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Most recent `_ts` token received, 0 if none yet
    pub fn last_token(&self) -> u64 {
        self.last_token.load(Ordering::SeqCst)
    }

    /// Stop accepting requests and wait for the server task to finish
    pub async fn shutdown(self) -> Result<(), SimulatorError> {
        self.cancellation_token.cancel();
        match self.task.await {
            Ok(Ok(())) => {
                info!("Camera simulator on {} stopped", self.addr);
                Ok(())
            }
            Ok(Err(e)) => Err(SimulatorError::Stopped {
                details: e.to_string(),
            }),
            Err(e) => Err(SimulatorError::Stopped {
                details: e.to_string(),
            }),
        }
    }
}

async fn capture_handler(
    State(state): State<SimulatorState>,
    Query(query): Query<CaptureQuery>,
) -> Response {
    let sequence = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(ts) = query.ts {
        state.last_token.store(ts, Ordering::SeqCst);
    }

    if !state.config.latency.is_zero() {
        tokio::time::sleep(state.config.latency).await;
    }

    if let Some(every) = state.config.fail_every {
        if every > 0 && sequence % every == 0 {
            debug!("Simulator failing request {} on purpose", sequence);
            return (StatusCode::SERVICE_UNAVAILABLE, "camera busy").into_response();
        }
    }

    match synthetic_jpeg(state.config.width, state.config.height, sequence as u32) {
        Ok(jpeg) => {
            debug!("Simulator served frame {} ({} bytes)", sequence, jpeg.len());
            (
                [
                    (header::CONTENT_TYPE, "image/jpeg"),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                jpeg,
            )
                .into_response()
        }
        Err(e) => {
            error!("Simulator failed to build frame {}: {}", sequence, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}
