//! Integration tests for the HTTP API, driven against the in-memory backend.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use aurora_mentis::server::{build_router, AppState};
use aurora_mentis::sim::SimBackend;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "token-admin";

/// Helper to create a simulated backend, its state, and the router.
fn setup_test_app() -> (SimBackend, AppState, Router) {
    let sim = SimBackend::new();
    sim.identity.add_user("staff-1", "admin@ade.example.com");
    sim.identity.issue_token(ADMIN_TOKEN, "staff-1");
    sim.store.set_role("staff-1", "admin");

    let state = AppState::simulated(&sim).unwrap();
    let app = build_router(state.clone(), &["http://localhost:3000".to_string()]);
    (sim, state, app)
}

/// Helper to make a JSON request to the app.
async fn json_request(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body_bytes = body
        .map(|v| serde_json::to_vec(&v).unwrap())
        .unwrap_or_default();

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body_bytes)).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

fn student(email: &str, debt: f64, due: &str) -> Value {
    json!({
        "first_name": "Lucía",
        "last_name": "Mendoza",
        "email": email,
        "status": "active",
        "monthly_fee": 150.0,
        "debt": debt,
        "next_payment_date": due,
        "guardian": { "name": "Carmen", "email": "carmen@example.com", "phone_number": "" }
    })
}

// === Email endpoints ===

#[tokio::test]
async fn payment_notification_is_accepted_and_sent() {
    let (sim, state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "POST",
        "/emails/send-payment-notification",
        None,
        Some(json!({
            "student_name": "Lucía Mendoza",
            "student_email": "lucia@example.com",
            "guardian_email": "carmen@example.com",
            "payment_amount": 100.0,
            "payment_date": "2024-05-02",
            "amount_due": 50.0,
            "new_due_date": "2024-05-30"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["message"].as_str().unwrap().contains("programada"));

    state.tasks.drain().await;
    let sent = sim.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].to,
        vec!["lucia@example.com".to_string(), "carmen@example.com".to_string()]
    );
    assert!(sent[0].html.contains("S/ 50.00"));
    assert!(sent[0].html.contains("2024-05-30"));
}

#[tokio::test]
async fn invalid_student_email_is_rejected_before_dispatch() {
    let (sim, state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "POST",
        "/emails/send-payment-notification",
        None,
        Some(json!({
            "student_name": "Lucía Mendoza",
            "student_email": "not-an-email",
            "payment_amount": 100.0,
            "payment_date": "2024-05-02"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD");
    assert_eq!(body["error"]["details"]["field"], "student_email");

    state.tasks.drain().await;
    assert_eq!(sim.transport.attempts(), 0);
}

#[tokio::test]
async fn remaining_balance_requires_deadline() {
    let (sim, _state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "POST",
        "/emails/send-payment-notification",
        None,
        Some(json!({
            "student_name": "Lucía Mendoza",
            "student_email": "lucia@example.com",
            "payment_amount": 100.0,
            "payment_date": "2024-05-02",
            "amount_due": 20.0
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "payment_deadline");
    assert_eq!(sim.transport.attempts(), 0);
}

#[tokio::test]
async fn malformed_json_is_invalid_request() {
    let (_sim, _state, app) = setup_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/emails/send-scholarship-notification")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"student_name\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn scholarship_percentage_out_of_range() {
    let (_sim, _state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "POST",
        "/emails/send-scholarship-notification",
        None,
        Some(json!({
            "student_name": "Lucía Mendoza",
            "student_email": "lucia@example.com",
            "percentage": 0,
            "new_monthly_fee": 75.0,
            "next_payment_date": "2024-06-05"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "percentage");
}

#[tokio::test]
async fn scholarship_notification_is_sent() {
    let (sim, state, app) = setup_test_app();

    let (status, _) = json_request(
        app,
        "POST",
        "/emails/send-scholarship-notification",
        None,
        Some(json!({
            "student_name": "Lucía Mendoza",
            "student_email": "lucia@example.com",
            "percentage": 50,
            "new_monthly_fee": 75.0,
            "next_payment_date": "2024-06-05"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    state.tasks.drain().await;
    let sent = sim.transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("50%"));
    assert!(sent[0].html.contains("S/ 75.00"));
}

#[tokio::test]
async fn platform_assignment_lists_links() {
    let (sim, state, app) = setup_test_app();

    let (status, _) = json_request(
        app,
        "POST",
        "/emails/send-platform-assignment",
        None,
        Some(json!({
            "student_name": "Lucía Mendoza",
            "student_email": "lucia@example.com",
            "platforms": [
                { "name": "Moodle", "url": "https://moodle.ade.example.com" },
                { "name": "Flyfar", "url": "https://flyfar.example.com/login" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    state.tasks.drain().await;
    let sent = sim.transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("href=\"https://moodle.ade.example.com\""));
    assert!(sent[0].html.contains("Flyfar"));
}

#[tokio::test]
async fn platform_assignment_requires_platforms() {
    let (sim, _state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "POST",
        "/emails/send-platform-assignment",
        None,
        Some(json!({
            "student_name": "Lucía Mendoza",
            "student_email": "lucia@example.com",
            "platforms": []
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "platforms");
    assert_eq!(sim.transport.attempts(), 0);
}

// === Sweeps ===

#[tokio::test]
async fn reminder_sweep_with_nothing_due() {
    let (sim, state, app) = setup_test_app();
    sim.store
        .insert_student("paid", student("paid@example.com", 0.0, "2020-01-01"));

    let (status, body) = json_request(app, "POST", "/cron/send-payment-reminders", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"], 0);
    assert_eq!(body["message"], "No hay estudiantes con pagos vencidos.");
    assert!(state.tasks.is_empty());
    assert_eq!(sim.transport.attempts(), 0);
}

#[tokio::test]
async fn reminder_sweep_reminds_only_overdue_accounts() {
    let (sim, state, app) = setup_test_app();
    sim.store
        .insert_student("late", student("late@example.com", 50.0, "2020-01-01"));
    sim.store
        .insert_student("early", student("early@example.com", 50.0, "2999-01-01"));

    let (status, body) = json_request(app, "POST", "/cron/send-payment-reminders", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"], 1);

    state.tasks.drain().await;
    let sent = sim.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to[0], "late@example.com");
    assert!(sent[0].subject.starts_with("Recordatorio de Pago"));
    // Reminders ask for the monthly fee.
    assert!(sent[0].html.contains("S/ 150.00"));
    // Reminders never change status.
    assert_eq!(sim.store.student_status("late").as_deref(), Some("active"));
}

#[tokio::test]
async fn deactivation_sweep_disables_and_notifies() {
    let (sim, state, app) = setup_test_app();
    sim.identity.add_user("uid-late", "late@example.com");
    sim.store
        .insert_student("late", student("late@example.com", 80.0, "2020-01-01"));

    let (status, body) =
        json_request(app, "POST", "/cron/deactivate-overdue-users", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"], 1);

    state.tasks.drain().await;
    assert!(sim.identity.user("uid-late").unwrap().disabled);
    assert_eq!(sim.store.student_status("late").as_deref(), Some("inactive"));

    let sent = sim.transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("S/ 80.00"));
    assert!(sent[0].html.contains("957-018-079"));
}

#[tokio::test]
async fn deactivation_without_identity_record_still_marks_inactive() {
    let (sim, state, app) = setup_test_app();
    sim.store
        .insert_student("ghost", student("ghost@example.com", 30.0, "2020-01-01"));

    let (status, body) =
        json_request(app, "POST", "/cron/deactivate-overdue-users", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"], 1);

    state.tasks.drain().await;
    assert_eq!(sim.store.student_status("ghost").as_deref(), Some("inactive"));
}

#[tokio::test]
async fn deactivation_notice_failure_keeps_deactivation() {
    let sim = SimBackend {
        transport: std::sync::Arc::new(aurora_mentis::sim::RecordingTransport::failing()),
        ..SimBackend::new()
    };
    sim.store
        .insert_student("late", student("late@example.com", 30.0, "2020-01-01"));
    let state = AppState::simulated(&sim).unwrap();
    let app = build_router(state.clone(), &[]);

    let (status, _) = json_request(app, "POST", "/cron/deactivate-overdue-users", None, None).await;
    assert_eq!(status, StatusCode::OK);

    state.tasks.drain().await;
    assert_eq!(sim.transport.attempts(), 1);
    assert_eq!(sim.store.student_status("late").as_deref(), Some("inactive"));
}

#[tokio::test]
async fn sweep_with_failing_store_schedules_nothing() {
    let (sim, state, app) = setup_test_app();
    sim.store
        .insert_student("late", student("late@example.com", 30.0, "2020-01-01"));
    sim.store.fail_queries(true);

    let (status, body) =
        json_request(app, "POST", "/cron/deactivate-overdue-users", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduled"], 0);
    assert!(state.tasks.is_empty());
}

// === User administration ===

#[tokio::test]
async fn status_change_requires_token() {
    let (_sim, _state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "PATCH",
        "/users/uid-1/status",
        None,
        Some(json!({ "is_disabled": true })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn status_change_rejects_unknown_token() {
    let (_sim, _state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "PATCH",
        "/users/uid-1/status",
        Some("forged"),
        Some(json!({ "is_disabled": true })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn status_change_requires_staff_role() {
    let (sim, _state, app) = setup_test_app();
    sim.identity.add_user("student-1", "student@example.com");
    sim.identity.issue_token("token-student", "student-1");
    sim.store.set_role("student-1", "student");

    let (status, body) = json_request(
        app.clone(),
        "PATCH",
        "/users/student-1/status",
        Some("token-student"),
        Some(json!({ "is_disabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert!(!sim.identity.user("student-1").unwrap().disabled);

    sim.identity.add_user("visitor", "visitor@example.com");
    sim.identity.issue_token("token-visitor", "visitor");
    let (status, _) = json_request(
        app,
        "DELETE",
        "/users/student-1",
        Some("token-visitor"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(sim.identity.user("student-1").is_some());
}

#[tokio::test]
async fn admin_disables_user_and_student_is_notified() {
    let (sim, state, app) = setup_test_app();
    sim.identity.add_user("stu-9", "lucia@example.com");
    sim.store
        .insert_student("stu-9", student("lucia@example.com", 0.0, "2999-01-01"));

    let (status, body) = json_request(
        app,
        "PATCH",
        "/users/stu-9/status",
        Some(ADMIN_TOKEN),
        Some(json!({ "is_disabled": true })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Usuario desactivado correctamente.");
    assert!(sim.identity.user("stu-9").unwrap().disabled);

    state.tasks.drain().await;
    let sent = sim.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Tu cuenta de ADE Academy ha sido desactivada");
}

#[tokio::test]
async fn cashier_reactivates_user_without_student_record() {
    let (sim, state, app) = setup_test_app();
    sim.identity.add_user("cashier-1", "caja@ade.example.com");
    sim.identity.issue_token("token-caja", "cashier-1");
    sim.store.set_role("cashier-1", "caja");
    sim.identity.add_user("tutor-1", "tutor@ade.example.com");

    let (status, body) = json_request(
        app,
        "PATCH",
        "/users/tutor-1/status",
        Some("token-caja"),
        Some(json!({ "is_disabled": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Usuario activado correctamente.");

    state.tasks.drain().await;
    assert_eq!(sim.transport.attempts(), 0);
}

#[tokio::test]
async fn status_change_for_unknown_user_is_not_found() {
    let (_sim, _state, app) = setup_test_app();

    let (status, body) = json_request(
        app,
        "PATCH",
        "/users/nobody/status",
        Some(ADMIN_TOKEN),
        Some(json!({ "is_disabled": true })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn delete_user_removes_identity() {
    let (sim, _state, app) = setup_test_app();
    sim.identity.add_user("stu-1", "gone@example.com");

    let (status, body) =
        json_request(app, "DELETE", "/users/stu-1", Some(ADMIN_TOKEN), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Usuario eliminado de Authentication correctamente."
    );
    assert!(sim.identity.user("stu-1").is_none());
}

#[tokio::test]
async fn delete_absent_user_is_success() {
    let (_sim, _state, app) = setup_test_app();

    let (status, body) =
        json_request(app, "DELETE", "/users/never-existed", Some(ADMIN_TOKEN), None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("no encontrado"));
}

// === Operational ===

#[tokio::test]
async fn health_reports_service_and_request_id() {
    let (_sim, _state, app) = setup_test_app();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["service"], "aurora-mentis");
    assert_eq!(body["pending_tasks"], 0);
}

#[tokio::test]
async fn index_welcomes() {
    let (_sim, _state, app) = setup_test_app();
    let (status, body) = json_request(app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("Aurora Mentis"));
}

#[tokio::test]
async fn cors_allows_configured_origin_with_credentials() {
    let (_sim, _state, app) = setup_test_app();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/emails/send-payment-notification")
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get("access-control-allow-credentials").unwrap(),
        "true"
    );
}

#[tokio::test]
async fn cors_ignores_unknown_origin() {
    let (_sim, _state, app) = setup_test_app();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/emails/send-payment-notification")
        .header("Origin", "https://evil.example.com")
        .header("Access-Control-Request-Method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
