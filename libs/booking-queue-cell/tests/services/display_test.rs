use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use booking_queue_cell::*;
use shared_models::auth::SignInCredentials;
use shared_utils::test_utils::MockClinicResponses;

use super::{TestDisplay, BOOKINGS_PATH, HOSPITAL_ID, MAPPING_ID};

async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(StdDuration::from_secs(2), async {
        while !condition().await {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_select_starts_polling_and_stop_tears_down() {
    let t = TestDisplay::new().await;
    t.mount_availability().await;
    t.mount_bookings(vec![MockClinicResponses::booking(1, 1, 1, "Ravi Kumar", "A1")])
        .await;
    let service = t.display_service();

    let view = service.select(HOSPITAL_ID, MAPPING_ID).await.unwrap();

    assert_eq!(view.mapping_id, MAPPING_ID);
    assert_matches!(view.state, DisplayState::Live { waiting_total: 1, .. });
    assert!(service.is_polling().await);

    assert!(service.stop().await);
    assert!(!service.stop().await);
    assert_matches!(service.current_view().await, Err(BookingQueueError::NoDisplay));
}

#[tokio::test]
async fn test_operations_without_display_fail() {
    let t = TestDisplay::new().await;
    let service = t.display_service();

    assert_matches!(service.call_next().await, Err(BookingQueueError::NoDisplay));
    assert!(!service.is_polling().await);
}

#[tokio::test]
async fn test_selecting_unknown_mapping_reports_error() {
    let t = TestDisplay::new().await;
    Mock::given(method("GET"))
        .and(path("/doctor/availability/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_json(MockClinicResponses::error_response("Unknown mapping")))
        .mount(&t.server)
        .await;
    let service = t.display_service();

    let result = service.select(HOSPITAL_ID, "unknown").await;

    assert_matches!(result, Err(BookingQueueError::Availability(ref message)) if message.contains("Unknown mapping"));
    assert!(!service.is_polling().await);
    assert_eq!(service.current_view().await.unwrap().state, DisplayState::Loading);
}

#[tokio::test]
async fn test_call_next_through_display_service() {
    let t = TestDisplay::new().await;
    t.mount_availability().await;
    t.mount_bookings(vec![
        MockClinicResponses::booking(1, 1, 2, "Ravi Kumar", "A1"),
        MockClinicResponses::booking(2, 2, 1, "Meera Iyer", "A1"),
    ])
    .await;
    Mock::given(method("PATCH"))
        .and(path("/booking/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockClinicResponses::ok_response()))
        .expect(2)
        .mount(&t.server)
        .await;
    let service = t.display_service();
    service.select(HOSPITAL_ID, MAPPING_ID).await.unwrap();

    let called = service.call_next().await.unwrap();

    assert_eq!(called.called.full_name, "Meera Iyer");
    assert_eq!(called.completed.map(|b| b.booking_id), Some(1));
}

#[tokio::test]
async fn test_logout_and_sign_in_follow_auth_events() {
    let t = TestDisplay::new().await;
    t.mount_availability().await;
    t.mount_bookings(vec![MockClinicResponses::booking(1, 1, 1, "Ravi Kumar", "A1")])
        .await;
    let service = t.display_service();
    let _listener = service.spawn_auth_listener();
    service.select(HOSPITAL_ID, MAPPING_ID).await.unwrap();

    t.client.sign_out().await.unwrap();

    eventually(|| async { !service.is_polling().await }).await;
    assert_eq!(service.current_view().await.unwrap().state, DisplayState::SignedOut);

    t.client
        .sign_in(&SignInCredentials {
            access_token: "access-9".to_string(),
            refresh_token: "refresh-9".to_string(),
            user_id: Some(HOSPITAL_ID.to_string()),
        })
        .await
        .unwrap();

    eventually(|| async { service.is_polling().await }).await;
    assert_matches!(
        service.current_view().await.unwrap().state,
        DisplayState::Live { waiting_total: 1, .. }
    );
}

#[tokio::test]
async fn test_display_stays_responsive_while_selecting() {
    let t = TestDisplay::new().await;
    t.mount_availability().await;
    Mock::given(method("GET"))
        .and(path(BOOKINGS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockClinicResponses::booking_list_response(vec![MockClinicResponses::booking(
                    1, 1, 1, "Ravi Kumar", "A1",
                )]))
                .set_delay(StdDuration::from_millis(500)),
        )
        .mount(&t.server)
        .await;
    let service = t.display_service();

    let selecting = {
        let service = service.clone();
        tokio::spawn(async move { service.select(HOSPITAL_ID, MAPPING_ID).await })
    };
    tokio::time::sleep(StdDuration::from_millis(100)).await;

    let polling = tokio::time::timeout(StdDuration::from_millis(100), service.is_polling())
        .await
        .expect("display lock held while loading");
    assert!(!polling);

    let view = selecting.await.unwrap().unwrap();
    assert_matches!(view.state, DisplayState::Live { waiting_total: 1, .. });
    assert!(service.is_polling().await);
}
