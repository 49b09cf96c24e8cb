use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::Duration;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_queue_cell::*;
use shared_utils::test_utils::MockClinicResponses;

use super::{idle_signal, TestDisplay, BOOKINGS_PATH, MAPPING_ID};

fn morning_queue() -> Vec<Value> {
    vec![
        MockClinicResponses::booking(11, 2, 2, "Ravi Kumar", "A1"),
        MockClinicResponses::booking(13, 4, 1, "Lakshmi Rao", "A1"),
        MockClinicResponses::booking(12, 3, 1, "Meera Iyer", "A1"),
        MockClinicResponses::booking(10, 1, 3, "Arjun Das", "A1"),
    ]
}

async fn mount_status_update(server: &MockServer, expected_calls: u64) {
    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::ok_response()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn status_updates(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == "PATCH")
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_call_next_completes_current_then_starts_next() {
    let t = TestDisplay::new().await;
    let queue = t.loaded_queue(morning_queue()).await;
    mount_status_update(&t.server, 2).await;

    let called = queue.call_next(&idle_signal()).await.unwrap();

    assert_eq!(called.called.booking_id, 12);
    assert_eq!(called.completed.map(|b| b.booking_id), Some(11));
    assert_eq!(
        status_updates(&t.server).await,
        vec![
            json!({ "booking_id": 11, "status": 3 }),
            json!({ "booking_id": 12, "status": 2 }),
        ]
    );
}

#[tokio::test]
async fn test_call_next_without_current_patient_issues_one_update() {
    let t = TestDisplay::new().await;
    let queue = t
        .loaded_queue(vec![
            MockClinicResponses::booking(21, 7, 1, "Farah Khan", "A1"),
            MockClinicResponses::booking(22, 5, 1, "John Mathew", "A1"),
        ])
        .await;

    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .and(body_json(json!({ "booking_id": 22, "status": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::ok_response()))
        .expect(1)
        .mount(&t.server)
        .await;

    let called = queue.call_next(&idle_signal()).await.unwrap();

    assert_eq!(called.called.full_name, "John Mathew");
    assert!(called.completed.is_none());
}

#[tokio::test]
async fn test_call_next_with_empty_queue_is_a_no_op() {
    let t = TestDisplay::new().await;
    let queue = t
        .loaded_queue(vec![MockClinicResponses::booking(11, 2, 2, "Ravi Kumar", "A1")])
        .await;
    mount_status_update(&t.server, 0).await;

    let result = queue.call_next(&idle_signal()).await;

    assert_matches!(result, Err(BookingQueueError::NoWaitingPatient));
}

#[tokio::test]
async fn test_call_next_failure_is_published_without_rollback() {
    let t = TestDisplay::new().await;
    let queue = t.loaded_queue(morning_queue()).await;
    let mut events = t.context.notifications.subscribe();

    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .and(body_json(json!({ "booking_id": 11, "status": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::ok_response()))
        .expect(1)
        .mount(&t.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .and(body_json(json!({ "booking_id": 12, "status": 2 })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(MockClinicResponses::error_response("Booking already started")),
        )
        .expect(1)
        .mount(&t.server)
        .await;

    let result = queue.call_next(&idle_signal()).await;

    assert_matches!(result, Err(BookingQueueError::Api { status: 400, ref message }) if message == "Booking already started");
    assert_eq!(
        events.recv().await.unwrap(),
        QueueEvent::CallNextFailed {
            mapping_id: MAPPING_ID.to_string(),
            message: "Booking already started".to_string(),
        }
    );
    assert_eq!(status_updates(&t.server).await.len(), 2);
    assert!(t.announcer.spoken().is_empty());
}

#[tokio::test]
async fn test_failed_completion_still_calls_next_patient() {
    let t = TestDisplay::new().await;
    let queue = t.loaded_queue(morning_queue()).await;
    let mut events = t.context.notifications.subscribe();

    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .and(body_json(json!({ "booking_id": 11, "status": 3 })))
        .respond_with(ResponseTemplate::new(500).set_body_json(MockClinicResponses::error_response("Database busy")))
        .expect(1)
        .mount(&t.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .and(body_json(json!({ "booking_id": 12, "status": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::ok_response()))
        .expect(1)
        .mount(&t.server)
        .await;

    let called = queue.call_next(&idle_signal()).await.unwrap();

    assert_eq!(called.called.booking_id, 12);
    assert!(called.completed.is_none());
    assert_eq!(
        status_updates(&t.server).await,
        vec![
            json!({ "booking_id": 11, "status": 3 }),
            json!({ "booking_id": 12, "status": 2 }),
        ]
    );
    assert_eq!(
        events.recv().await.unwrap(),
        QueueEvent::CallNextFailed {
            mapping_id: MAPPING_ID.to_string(),
            message: "Database busy".to_string(),
        }
    );
    assert_matches!(events.recv().await.unwrap(), QueueEvent::PatientCalled { booking_id: 12, .. });
}

#[tokio::test]
async fn test_call_next_gives_up_on_a_stalled_poll() {
    let t = TestDisplay::with_config(|config| config.call_next_wait_ms = 100).await;
    let queue = Arc::new(t.loaded_queue(morning_queue()).await);

    t.server.reset().await;
    Mock::given(method("GET"))
        .and(path(BOOKINGS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockClinicResponses::booking_list_response(morning_queue()))
                .set_delay(StdDuration::from_secs(30)),
        )
        .mount(&t.server)
        .await;
    mount_status_update(&t.server, 0).await;

    let _tick = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.tick(&idle_signal()).await })
    };
    tokio::time::sleep(StdDuration::from_millis(50)).await;

    let result = tokio::time::timeout(StdDuration::from_secs(2), queue.call_next(&idle_signal()))
        .await
        .expect("call next waited on the poll tick");

    assert_matches!(result, Err(BookingQueueError::CallInProgress));
    assert!(status_updates(&t.server).await.is_empty());
}

#[tokio::test]
async fn test_successful_call_is_announced_and_published() {
    let t = TestDisplay::new().await;
    let queue = t.loaded_queue(morning_queue()).await;
    let mut events = t.context.notifications.subscribe();
    mount_status_update(&t.server, 2).await;

    queue.call_next(&idle_signal()).await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        QueueEvent::PatientCalled {
            mapping_id: MAPPING_ID.to_string(),
            booking_id: 12,
            token_number: 3,
            full_name: "Meera Iyer".to_string(),
        }
    );

    let spoken = t.announcer.wait_for_speech(1).await;
    assert_eq!(
        spoken,
        vec![("Next patient is Meera Iyer".to_string(), Some("Samantha".to_string()))]
    );
}

#[tokio::test]
async fn test_concurrent_call_next_is_rejected() {
    let t = TestDisplay::new().await;
    let queue = Arc::new(t.loaded_queue(morning_queue()).await);

    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockClinicResponses::ok_response())
                .set_delay(StdDuration::from_millis(300)),
        )
        .expect(2)
        .mount(&t.server)
        .await;

    let first = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.call_next(&idle_signal()).await })
    };
    tokio::time::sleep(StdDuration::from_millis(50)).await;

    let second = queue.call_next(&idle_signal()).await;

    assert_matches!(second, Err(BookingQueueError::CallInProgress));
    assert!(first.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_call_next_requires_a_live_session() {
    let t = TestDisplay::new().await;
    let queue = t.loaded_queue(morning_queue()).await;
    mount_status_update(&t.server, 0).await;

    t.clock.advance(Duration::hours(3) + Duration::minutes(30));

    assert_matches!(
        queue.call_next(&idle_signal()).await,
        Err(BookingQueueError::NoActiveSession)
    );
}
