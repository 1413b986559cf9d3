use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::availability_routes;
use notification_cell::{CellState, EventBus};
use shared_utils::test_utils::{JwtTestUtils, MockBackendResponses, TestConfig, TestUser};

fn app(config: &TestConfig) -> Router {
    availability_routes(CellState::new(config.to_arc(), EventBus::default()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_day_grid_renders_display_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockBackendResponses::full_day_slots(1, 5, "2024-06-03"),
        ))
        .mount(&server)
        .await;

    let config = TestConfig::with_backend(&server.uri());
    let token = JwtTestUtils::create_test_token(&TestUser::student(40), &config.jwt_secret, None);

    let response = app(&config)
        .oneshot(
            Request::builder()
                .uri("/5/2024-06-03")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let slots = json["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 10);
    assert_eq!(slots[0]["display_time"], "7:00 AM");
    assert_eq!(slots[5]["display_time"], "1:00 PM");
    assert_eq!(json["provider_id"], 5);
}

#[tokio::test]
async fn test_invalid_date_is_bad_request() {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::clinic(5), &config.jwt_secret, None);

    let response = app(&config)
        .oneshot(
            Request::builder()
                .uri("/5/06-03-2024")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_students_cannot_toggle_slots() {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::student(40), &config.jwt_secret, None);

    let response = app(&config)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/5/2024-06-03/toggle")
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "time": "9:00 AM" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_provider_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("id", "eq.77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_backend(&server.uri());
    let token = JwtTestUtils::create_test_token(&TestUser::student(40), &config.jwt_secret, None);

    let response = app(&config)
        .oneshot(
            Request::builder()
                .uri("/providers/77")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_students_cannot_ensure_another_providers_day() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::with_backend(&server.uri());
    let token = JwtTestUtils::create_test_token(&TestUser::student(40), &config.jwt_secret, None);

    let response = app(&config)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/5/2024-06-03/ensure")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
