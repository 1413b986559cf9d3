use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{
    AppointmentError, AppointmentScheduler, AppointmentStatus, Bookability, CancelAppointmentRequest,
    CompleteAppointmentRequest, RejectionReason, ScheduleAppointmentRequest, ServiceType,
};
use notification_cell::{EventBus, EventFilter, ScheduleEventKind};
use shared_database::BackendClient;
use shared_models::auth::Session;
use shared_utils::test_utils::{MockBackendResponses, TestConfig};

const DATE: &str = "2024-06-01";

fn scheduler(server: &MockServer, events: EventBus) -> AppointmentScheduler {
    let config = TestConfig::with_backend(&server.uri()).to_app_config();
    AppointmentScheduler::with_backend(Arc::new(BackendClient::new(&config)), events)
}

fn booking(time: &str) -> ScheduleAppointmentRequest {
    ScheduleAppointmentRequest {
        provider_id: Some(5),
        client_id: Some(40),
        date: Some(DATE.to_string()),
        time: Some(time.to_string()),
        reason: Some("Headache".to_string()),
        ..Default::default()
    }
}

async fn mount_provider(server: &MockServer, role: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("id", "eq.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::provider_response(5, "Nurse Joy", role)
        ])))
        .mount(server)
        .await;
}

async fn mount_slots(server: &MockServer, slots: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("provider_id", "eq.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(slots))
        .mount(server)
        .await;
}

async fn mount_day_appointments(server: &MockServer, body: serde_json::Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("provider_id", "eq.5"))
        .and(query_param("date", format!("eq.{}", DATE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));

    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn mount_appointment(server: &MockServer, id: i64, status: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::appointment_response(id, 5, 40, DATE, "09:00:00", status)
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_clinic_booking_is_physical_and_upcoming() {
    let server = MockServer::start().await;
    mount_provider(&server, "clinic").await;
    mount_slots(&server, MockBackendResponses::full_day_slots(1, 5, DATE)).await;
    mount_day_appointments(&server, json!([]), None).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "provider_id": 5,
            "client_id": 40,
            "created_by_id": 40,
            "date": DATE,
            "time": "09:00:00",
            "service_type": "physical",
            "status": "upcoming",
            "referral": "Direct"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockBackendResponses::appointment_response(100, 5, 40, DATE, "09:00:00", "upcoming")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let events = EventBus::default();
    let mut subscription = events.subscribe(EventFilter::User(5));

    let appointment = scheduler(&server, events.clone())
        .schedule_appointment(booking("09:00:00"), None, &Session::from_token("token"))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Upcoming);
    assert_eq!(appointment.service_type, Some(ServiceType::Physical));

    let event = tokio::time::timeout(Duration::from_secs(1), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert_matches!(event.kind, ScheduleEventKind::AppointmentCreated { appointment_id: 100, .. });
}

#[tokio::test]
async fn test_second_booking_of_same_slot_is_occupied() {
    let server = MockServer::start().await;
    mount_provider(&server, "counselor").await;
    mount_slots(&server, MockBackendResponses::full_day_slots(1, 5, DATE)).await;
    mount_day_appointments(&server, json!([]), Some(1)).await;
    mount_day_appointments(
        &server,
        json!([MockBackendResponses::appointment_response(100, 5, 40, DATE, "09:00:00", "upcoming")]),
        None,
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockBackendResponses::appointment_response(100, 5, 40, DATE, "09:00:00", "upcoming")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let scheduler = scheduler(&server, EventBus::default());
    let session = Session::from_token("token");

    scheduler
        .schedule_appointment(booking("9:00 AM"), None, &session)
        .await
        .unwrap();

    let second = scheduler
        .schedule_appointment(booking("09:00:00"), Some(41), &session)
        .await;

    assert_matches!(second, Err(AppointmentError::NotBookable(RejectionReason::SlotOccupied)));
}

#[tokio::test]
async fn test_disabled_slot_is_never_submitted() {
    let server = MockServer::start().await;
    mount_provider(&server, "clinic").await;

    let mut slots = MockBackendResponses::full_day_slots(1, 5, DATE);
    slots[5]["available"] = json!(false);
    mount_slots(&server, slots).await;
    mount_day_appointments(&server, json!([]), None).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let result = scheduler(&server, EventBus::default())
        .schedule_appointment(booking("13:00:00"), None, &Session::from_token("token"))
        .await;

    assert_matches!(result, Err(AppointmentError::NotBookable(RejectionReason::SlotDisabled)));
}

#[tokio::test]
async fn test_backend_duplicate_rejection_is_occupied() {
    let server = MockServer::start().await;
    mount_provider(&server, "clinic").await;
    mount_slots(&server, MockBackendResponses::full_day_slots(1, 5, DATE)).await;
    mount_day_appointments(&server, json!([]), None).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockBackendResponses::error_response("duplicate key value", "23505"),
        ))
        .mount(&server)
        .await;

    let result = scheduler(&server, EventBus::default())
        .schedule_appointment(booking("10:00:00"), None, &Session::from_token("token"))
        .await;

    assert_matches!(result, Err(AppointmentError::NotBookable(RejectionReason::SlotOccupied)));
}

#[tokio::test]
async fn test_validation_happens_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let mut request = booking("09:00:00");
    request.client_id = None;

    let result = scheduler(&server, EventBus::default())
        .schedule_appointment(request, None, &Session::from_token("token"))
        .await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
}

#[tokio::test]
async fn test_unknown_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = scheduler(&server, EventBus::default())
        .schedule_appointment(booking("09:00:00"), None, &Session::from_token("token"))
        .await;

    assert_matches!(result, Err(AppointmentError::ProviderNotFound(5)));
}

#[tokio::test]
async fn test_start_publishes_status_change() {
    let server = MockServer::start().await;
    mount_appointment(&server, 100, "upcoming").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.100"))
        .and(body_partial_json(json!({ "status": "in_progress" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::appointment_response(100, 5, 40, DATE, "09:00:00", "in_progress")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let events = EventBus::default();
    let mut subscription = events.subscribe(EventFilter::User(40));

    let appointment = scheduler(&server, events.clone())
        .mark_in_progress(100, &Session::from_token("token"))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::InProgress);

    let event = tokio::time::timeout(Duration::from_secs(1), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event.kind,
        ScheduleEventKind::AppointmentStatusChanged {
            appointment_id: 100,
            provider_id: 5,
            client_id: 40,
            from: "upcoming".to_string(),
            to: "in_progress".to_string(),
        }
    );
}

#[tokio::test]
async fn test_complete_sends_documentation() {
    let server = MockServer::start().await;
    mount_appointment(&server, 100, "in_progress").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "completed",
            "documentation": "Rest and fluids",
            "diagnosis_code": "J06.9"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::appointment_response(100, 5, 40, DATE, "09:00:00", "completed")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompleteAppointmentRequest {
        documentation: Some("Rest and fluids".to_string()),
        diagnosis_code: Some("J06.9".to_string()),
        diagnosis_name: None,
    };

    let appointment = scheduler(&server, EventBus::default())
        .mark_completed(100, request, &Session::from_token("token"))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn test_cancelled_appointment_cannot_be_completed() {
    let server = MockServer::start().await;
    mount_appointment(&server, 100, "cancelled").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = scheduler(&server, EventBus::default())
        .mark_completed(100, CompleteAppointmentRequest::default(), &Session::from_token("token"))
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Completed,
        })
    );
}

#[tokio::test]
async fn test_cancel_records_reason() {
    let server = MockServer::start().await;
    mount_appointment(&server, 100, "upcoming").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "cancelled",
            "cancellation_reason": "Feeling better"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::appointment_response(100, 5, 40, DATE, "09:00:00", "cancelled")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let request = CancelAppointmentRequest { reason: Some("Feeling better".to_string()) };
    let appointment = scheduler(&server, EventBus::default())
        .cancel(100, request, &Session::from_token("token"))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_available_times_ignore_cancelled_bookings() {
    let server = MockServer::start().await;

    let mut slots = MockBackendResponses::full_day_slots(1, 5, DATE);
    slots[0]["available"] = json!(false);
    mount_slots(&server, slots).await;
    mount_day_appointments(
        &server,
        json!([
            MockBackendResponses::appointment_response(100, 5, 40, DATE, "08:00:00", "upcoming"),
            MockBackendResponses::appointment_response(101, 5, 41, DATE, "09:00:00", "cancelled")
        ]),
        None,
    )
    .await;

    let scheduler = scheduler(&server, EventBus::default());
    let session = Session::from_token("token");

    let times = scheduler.available_times(5, DATE, &session).await.unwrap();
    assert_eq!(times.len(), 8);
    assert_eq!(times[0], "09:00:00");

    let check = scheduler.check_bookable(5, DATE, "8:00 AM", &session).await.unwrap();
    assert_eq!(check, Bookability::NotBookable(RejectionReason::SlotOccupied));
}
