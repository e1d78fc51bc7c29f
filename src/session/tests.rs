use super::*;
use std::time::SystemTime;

fn session() -> Session {
    Session::new(1000, 200)
}

fn still(id: u64) -> CapturedFrame {
    CapturedFrame::new(id, SystemTime::now(), 96, 96, vec![id as u8; 8])
}

fn fetch_ticket(effects: &[Effect]) -> FetchTicket {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Fetch(ticket) => Some(*ticket),
            _ => None,
        })
        .expect("start should dispatch a fetch")
}

/// Run one recording tick to completion with the given result
fn tick(session: &mut Session, result: impl FnOnce(u64) -> FetchResult) -> FetchDisposition {
    let ticket = session.request_frame(true).expect("guard should be free");
    let id = ticket.request.id;
    session.complete_fetch(ticket, result(id))
}

#[test]
fn test_new_session_is_idle() {
    let session = session();
    let snapshot = session.snapshot();

    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.status, "Idle");
    assert_eq!(snapshot.captured, 0);
    assert_eq!(snapshot.interval_control, "1000");
    assert!(!snapshot.fetch_in_flight);
}

#[test]
fn test_start_dispatches_fetch_then_arms_timer() {
    let mut session = session();
    let effects = session.start();

    assert_eq!(effects.len(), 2);
    assert!(matches!(effects[0], Effect::Fetch(ticket) if ticket.for_recording()));
    assert_eq!(effects[1], Effect::ArmRecordingTimer(Duration::from_millis(1000)));
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.status().to_string(), "Recording...");
    assert!(session.recording_id().is_some());
}

#[test]
fn test_start_clamps_and_rewrites_interval() {
    let mut session = session();
    session.set_interval_control("50");

    let effects = session.start();

    assert!(effects.contains(&Effect::ArmRecordingTimer(Duration::from_millis(200))));
    assert_eq!(session.interval_control(), "200");
    assert_eq!(session.effective_interval(), Some(Duration::from_millis(200)));
}

#[test]
fn test_below_floor_default_starts_at_floor() {
    let config = {
        let mut config = crate::config::TmCaptureConfig::default();
        config.acquisition.default_interval_ms = 50;
        config
    };
    assert!(config.validate().is_ok());

    let mut session = Session::new(
        config.acquisition.default_interval_ms,
        config.acquisition.min_interval_ms,
    );
    assert_eq!(session.interval_control(), "50");

    let effects = session.start();
    assert_eq!(
        effects.last(),
        Some(&Effect::ArmRecordingTimer(Duration::from_millis(200)))
    );
    assert_eq!(session.interval_control(), "200");
    assert_eq!(session.effective_interval(), Some(Duration::from_millis(200)));
}

#[test]
fn test_start_with_non_numeric_interval_uses_floor() {
    let mut session = session();
    session.set_interval_control("soon");

    session.start();
    assert_eq!(session.interval_control(), "200");
}

#[test]
fn test_interval_edit_while_recording_applies_next_start() {
    let mut session = session();
    session.start();
    session.set_interval_control("5000");

    assert_eq!(session.effective_interval(), Some(Duration::from_millis(1000)));
    assert_eq!(session.snapshot().interval_control, "5000");
}

#[test]
fn test_start_while_recording_is_noop() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());
    session.complete_fetch(ticket, FetchResult::Captured(still(ticket.request.id)));
    assert_eq!(session.buffer().len(), 1);

    let effects = session.start();

    assert!(effects.is_empty());
    assert_eq!(session.buffer().len(), 1);
    assert_eq!(session.state(), SessionState::Recording);
}

#[test]
fn test_stop_while_idle_is_noop() {
    let mut session = session();
    let before = session.snapshot();

    assert!(session.stop().is_empty());
    assert_eq!(session.snapshot(), before);
}

#[test]
fn test_stop_with_empty_buffer_returns_to_idle() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());
    session.complete_fetch(
        ticket,
        FetchResult::AcquisitionFailed(AcquisitionError::EmptyFrame),
    );

    let effects = session.stop();

    assert_eq!(effects, vec![Effect::DisarmRecordingTimer]);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.status(), &Status::Idle);
}

#[test]
fn test_stop_with_frames_requests_export() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());
    session.complete_fetch(ticket, FetchResult::Captured(still(1)));

    let effects = session.stop();

    assert_eq!(effects, vec![Effect::DisarmRecordingTimer, Effect::Export]);
    assert_eq!(session.state(), SessionState::Exporting);
    assert_eq!(session.status().to_string(), "Preparing ZIP...");
    assert_eq!(session.buffer().len(), 1);
}

#[test]
fn test_guard_allows_one_fetch_at_a_time() {
    let mut session = session();

    let first = session.request_frame(false).unwrap();
    assert!(session.request_frame(false).is_none());
    assert!(session.request_frame(true).is_none());
    assert!(session.fetch_guard().is_in_flight());

    assert_eq!(
        session.complete_fetch(first, FetchResult::Previewed),
        FetchDisposition::Previewed
    );
    assert_eq!(session.fetch_guard(), FetchGuard::Idle);

    let second = session.request_frame(false).unwrap();
    assert!(second.request.id > first.request.id);
}

#[test]
fn test_guard_released_on_failure() {
    let mut session = session();
    let ticket = session.request_frame(false).unwrap();

    let disposition = session.complete_fetch(
        ticket,
        FetchResult::AcquisitionFailed(AcquisitionError::Status {
            url: "http://cam/capture".to_string(),
            status: 500,
        }),
    );

    assert_eq!(disposition, FetchDisposition::Failed);
    assert_eq!(session.fetch_guard(), FetchGuard::Idle);
    assert_eq!(session.status(), &Status::CameraError);
}

#[test]
fn test_start_while_fetch_in_flight_only_arms_timer() {
    let mut session = session();
    let preview = session.request_frame(false).unwrap();

    let effects = session.start();
    assert_eq!(effects, vec![Effect::ArmRecordingTimer(Duration::from_millis(1000))]);

    // The preview result still releases the guard
    session.complete_fetch(preview, FetchResult::Previewed);
    assert!(session.request_frame(true).is_some());
}

#[test]
fn test_failed_tick_keeps_recording() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());
    session.complete_fetch(ticket, FetchResult::Captured(still(ticket.request.id)));

    let failed = tick(&mut session, |_| {
        FetchResult::AcquisitionFailed(AcquisitionError::Unavailable {
            details: "unplugged".to_string(),
        })
    });
    assert_eq!(failed, FetchDisposition::Failed);
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.status(), &Status::CameraError);

    let appended = tick(&mut session, |id| FetchResult::Captured(still(id)));
    assert_eq!(appended, FetchDisposition::Appended(2));

    let ids: Vec<u64> = session.buffer().frames().iter().map(|f| f.source_id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_transform_failure_appends_nothing() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());

    let disposition = session.complete_fetch(
        ticket,
        FetchResult::TransformFailed(TransformError::Decode {
            details: "bad huffman table".to_string(),
        }),
    );

    assert_eq!(disposition, FetchDisposition::Failed);
    assert!(session.buffer().is_empty());
    assert_eq!(session.state(), SessionState::Recording);
}

#[test]
fn test_result_arriving_after_stop_is_discarded() {
    let mut session = session();
    let first = fetch_ticket(&session.start());
    session.complete_fetch(first, FetchResult::Captured(still(1)));

    let late = session.request_frame(true).unwrap();
    session.stop();

    let disposition = session.complete_fetch(late, FetchResult::Captured(still(late.request.id)));
    assert_eq!(disposition, FetchDisposition::Discarded);
    assert_eq!(session.buffer().len(), 1);
}

#[test]
fn test_result_from_previous_recording_not_appended_to_next() {
    let mut session = session();
    let first = fetch_ticket(&session.start());
    session.complete_fetch(first, FetchResult::AcquisitionFailed(AcquisitionError::EmptyFrame));

    let late = session.request_frame(true).unwrap();
    session.stop();
    // The late fetch is still in flight, so the new start cannot dispatch
    let effects = session.start();
    assert_eq!(effects.len(), 1);

    let disposition = session.complete_fetch(late, FetchResult::Captured(still(late.request.id)));
    assert_eq!(disposition, FetchDisposition::Discarded);
    assert!(session.buffer().is_empty());
}

#[test]
fn test_stale_completion_does_not_release_guard() {
    let mut session = session();
    let current = session.request_frame(false).unwrap();
    let bogus = FetchTicket {
        request: FrameRequest::new(999),
        recording_epoch: None,
    };

    assert_eq!(
        session.complete_fetch(bogus, FetchResult::Previewed),
        FetchDisposition::Stale
    );
    assert_eq!(session.fetch_guard(), FetchGuard::FetchInFlight(current));
}

#[test]
fn test_three_ticks_keep_capture_order() {
    let mut session = session();
    let first = fetch_ticket(&session.start());
    session.complete_fetch(first, FetchResult::Captured(still(first.request.id)));
    tick(&mut session, |id| FetchResult::Captured(still(id)));
    tick(&mut session, |id| FetchResult::Captured(still(id)));

    let ids: Vec<u64> = session.buffer().frames().iter().map(|f| f.source_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(session.snapshot().captured, 3);
}

#[test]
fn test_export_success_clears_buffer_and_settles() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());
    session.complete_fetch(ticket, FetchResult::Captured(still(1)));
    session.stop();

    let effects = session.finish_export(&Ok::<(), ExportError>(()));

    assert_eq!(effects, vec![Effect::ScheduleSettle { generation: 1 }]);
    assert!(session.buffer().is_empty());
    assert_eq!(session.status().to_string(), "Download ready");
    assert_eq!(session.state(), SessionState::Exporting);

    assert!(session.settle(1));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.status(), &Status::Idle);
}

#[test]
fn test_export_failure_reports_message_and_clears_buffer() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());
    session.complete_fetch(ticket, FetchResult::Captured(still(1)));
    session.stop();

    session.finish_export(&Err::<(), _>(ExportError::Archive {
        details: "disk full".to_string(),
    }));

    assert!(session.buffer().is_empty());
    assert_eq!(session.status().to_string(), "Failed to build archive: disk full");
}

#[test]
fn test_empty_export_message_falls_back() {
    assert_eq!(Status::ExportFailed(String::new()).to_string(), "ZIP failed");
    assert_eq!(Status::ExportFailed("  ".to_string()).to_string(), "ZIP failed");
}

#[test]
fn test_stale_settle_ignored_after_restart() {
    let mut session = session();
    let ticket = fetch_ticket(&session.start());
    session.complete_fetch(ticket, FetchResult::Captured(still(1)));
    session.stop();
    session.finish_export(&Ok::<(), ExportError>(()));

    // Operator starts again before the status delay elapses
    let effects = session.start();
    assert!(!effects.is_empty());

    assert!(!session.settle(1));
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.status(), &Status::Recording);
}

#[test]
fn test_adjust_interval_control() {
    let mut session = session();

    session.adjust_interval_control(100);
    assert_eq!(session.interval_control(), "1100");

    session.adjust_interval_control(-2000);
    assert_eq!(session.interval_control(), "0");

    // Clamping still happens at start
    session.start();
    assert_eq!(session.interval_control(), "200");
}
