use super::*;
use crate::config::SourceConfig;
use bytes::Bytes;
use std::time::Duration;

fn jpeg_bytes() -> Bytes {
    Bytes::from(synthetic_jpeg(64, 48, 0).unwrap())
}

#[test]
fn test_capture_url_joining() {
    assert_eq!(http::capture_url("http://192.168.4.1"), "http://192.168.4.1/capture");
    assert_eq!(http::capture_url("http://192.168.4.1/"), "http://192.168.4.1/capture");
    assert_eq!(http::capture_url(" http://cam.local:8080// "), "http://cam.local:8080/capture");
}

#[test]
fn test_frame_request_token_is_epoch_millis() {
    let before = chrono::Utc::now().timestamp_millis() as u64;
    let request = FrameRequest::new(3);
    let after = chrono::Utc::now().timestamp_millis() as u64;

    assert_eq!(request.id, 3);
    assert!(request.token >= before && request.token <= after);
}

#[test]
fn test_synthetic_jpeg_decodes() {
    let jpeg = synthetic_jpeg(80, 60, 5).unwrap();
    let image = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((image.width(), image.height()), (80, 60));
}

#[tokio::test]
async fn test_scripted_source_replays_then_falls_back() {
    let source = ScriptedFrameSource::new(ScriptedResponse::Frame(jpeg_bytes())).with_script([
        ScriptedResponse::Status(503),
        ScriptedResponse::Unavailable,
        ScriptedResponse::Frame(Bytes::new()),
    ]);

    let first = source.fetch_frame(FrameRequest::new(1)).await;
    assert!(matches!(first, Err(AcquisitionError::Status { status: 503, .. })));

    let second = source.fetch_frame(FrameRequest::new(2)).await;
    assert!(matches!(second, Err(AcquisitionError::Unavailable { .. })));

    let third = source.fetch_frame(FrameRequest::new(3)).await;
    assert!(matches!(third, Err(AcquisitionError::EmptyFrame)));

    let fourth = source.fetch_frame(FrameRequest::new(4)).await.unwrap();
    assert_eq!(fourth.id, 4);
    assert!(fourth.looks_like_jpeg());

    assert_eq!(source.request_count(), 4);
    assert_eq!(source.tokens().await.len(), 4);
}

#[tokio::test]
async fn test_scripted_source_tracks_overlap() {
    let source = std::sync::Arc::new(
        ScriptedFrameSource::new(ScriptedResponse::Frame(jpeg_bytes()))
            .with_latency(Duration::from_millis(20)),
    );

    let a = tokio::spawn({
        let source = std::sync::Arc::clone(&source);
        async move { source.fetch_frame(FrameRequest::new(1)).await }
    });
    let b = tokio::spawn({
        let source = std::sync::Arc::clone(&source);
        async move { source.fetch_frame(FrameRequest::new(2)).await }
    });

    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
    assert_eq!(source.max_in_flight(), 2);
}

#[tokio::test]
async fn test_http_source_reports_unreachable_device() {
    let config = SourceConfig {
        // Port 9 (discard) on localhost is closed on test machines
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_ms: 500,
    };
    let source = HttpFrameSource::new(&config).unwrap();

    let result = source.fetch_frame(FrameRequest::new(1)).await;
    assert!(matches!(result, Err(AcquisitionError::Request { .. })));
}

#[cfg(feature = "simulator")]
mod against_simulator {
    use super::*;
    use crate::simulator::{DeviceSimulator, SimulatorConfig};

    fn source_for(base_url: String) -> HttpFrameSource {
        HttpFrameSource::new(&SourceConfig {
            base_url,
            request_timeout_ms: 2000,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_source_fetches_frame() {
        let simulator = DeviceSimulator::start(SimulatorConfig {
            latency: Duration::ZERO,
            ..Default::default()
        })
        .await
        .unwrap();
        let source = source_for(simulator.base_url());

        let request = FrameRequest::new(11);
        let frame = source.fetch_frame(request).await.unwrap();

        assert_eq!(frame.id, 11);
        assert!(frame.looks_like_jpeg());
        assert_eq!(frame.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(simulator.last_token(), request.token);
        assert_eq!(simulator.request_count(), 1);

        simulator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_http_source_rejects_non_success_status() {
        let simulator = DeviceSimulator::start(SimulatorConfig {
            latency: Duration::ZERO,
            fail_every: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
        let source = source_for(simulator.base_url());

        assert!(source.fetch_frame(FrameRequest::new(1)).await.is_ok());
        let failed = source.fetch_frame(FrameRequest::new(2)).await;
        assert!(matches!(failed, Err(AcquisitionError::Status { status: 503, .. })));
        assert!(source.fetch_frame(FrameRequest::new(3)).await.is_ok());

        simulator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_http_source_times_out_on_slow_device() {
        let simulator = DeviceSimulator::start(SimulatorConfig {
            latency: Duration::from_millis(500),
            ..Default::default()
        })
        .await
        .unwrap();
        let source = HttpFrameSource::new(&SourceConfig {
            base_url: simulator.base_url(),
            request_timeout_ms: 50,
        })
        .unwrap();

        let result = source.fetch_frame(FrameRequest::new(1)).await;
        assert!(matches!(result, Err(AcquisitionError::Request { .. })));

        simulator.shutdown().await.unwrap();
    }
}
