use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use resale_api::{app, state::AuthConfig, AppState};
use resale_core::{EventBus, NewUser, Repositories};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state() -> AppState {
    AppState::new(
        Repositories::in_memory(),
        EventBus::new(16),
        AuthConfig {
            secret: "test-secret".into(),
            expiration: 3600,
        },
    )
    .unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({ "name": "Reseller", "email": email, "phone": "11999990000", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

fn code(n: u64) -> String {
    format!("{:016}", n)
}

#[tokio::test]
async fn test_health_and_metrics_are_public() {
    let app = app(test_state());

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let app = app(test_state());

    let (status, body) = send(&app, "GET", "/v1/customers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "GET", "/v1/customers", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_and_login() {
    let app = app(test_state());
    let token = register(&app, "ana@example.com").await;

    let (status, me) = send(&app, "GET", "/v1/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ana@example.com");
    assert!(me.get("password_hash").is_none());

    let (status, _) = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({ "name": "Again", "email": "ANA@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": "ana@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": " Ana@Example.com ", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_sale_flow_with_code_allocation() {
    let app = app(test_state());
    let token = register(&app, "seller@example.com").await;
    let token = Some(token.as_str());

    // 1. Customer and app
    let (status, customer) = send(
        &app,
        "POST",
        "/v1/customers",
        token,
        Some(json!({ "name": "Bruno", "email": "bruno@example.com", "phone": "11987654321" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(customer["phone_display"], "(11) 98765-4321");

    let (status, app_body) = send(
        &app,
        "POST",
        "/v1/apps",
        token,
        Some(json!({ "name": "Game Pass", "price_cents": 2990 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let app_id = app_body["id"].as_str().unwrap().to_string();

    // 2. Import codes: one batch duplicate, one invalid entry
    let text = format!("{}\n{}\n{}\nabc", code(1), code(2), code(1));
    let (status, report) = send(
        &app,
        "POST",
        &format!("/v1/apps/{}/codes", app_id),
        token,
        Some(json!({ "codes": [code(3)], "text": text })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["imported"], json!([code(3), code(1), code(2)]));
    assert_eq!(report["duplicates"], json!([code(1)]));
    assert_eq!(report["invalid"], json!(["abc"]));

    // 3. A sale for two codes is confirmed with the earliest ones
    let (status, sale) = send(
        &app,
        "POST",
        "/v1/sales",
        token,
        Some(json!({
            "customer_id": customer["id"],
            "items": [{ "product": { "kind": "app", "app_id": app_id }, "quantity": 2 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sale["status"], "pending");
    assert_eq!(sale["total_cents"], 5980);

    let sale_id = sale["id"].as_str().unwrap().to_string();
    let (status, confirmed) = send(&app, "POST", &format!("/v1/sales/{}/confirm", sale_id), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");
    let codes = confirmed["items"][0]["codes"].as_array().unwrap();
    assert_eq!(codes.len(), 2);
    assert_eq!(codes[0]["code"], code(3));
    assert_eq!(codes[1]["code"], code(1));

    let (_, unused) = send(&app, "GET", &format!("/v1/apps/{}/codes?used=false", app_id), token, None).await;
    assert_eq!(unused.as_array().unwrap().len(), 1);
    assert_eq!(unused[0]["display"], "0000-0000-0000-0002");

    // 4. Not enough stock: 409 with details, sale stays pending
    let (_, big) = send(
        &app,
        "POST",
        "/v1/sales",
        token,
        Some(json!({
            "customer_id": customer["id"],
            "items": [{ "product": { "kind": "app", "app_id": app_id }, "quantity": 5, "price_cents": 2500 }]
        })),
    )
    .await;
    let big_id = big["id"].as_str().unwrap().to_string();
    let (status, err) = send(&app, "POST", &format!("/v1/sales/{}/confirm", big_id), token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["details"]["requested"], 5);
    assert_eq!(err["details"]["available"], 1);

    let (_, still) = send(&app, "GET", &format!("/v1/sales/{}", big_id), token, None).await;
    assert_eq!(still["status"], "pending");

    // 5. Dashboard reflects both sales
    let (status, dashboard) = send(&app, "GET", "/v1/dashboard", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["pending_sales"], 1);
    assert_eq!(dashboard["confirmed_revenue_cents"], 5980);
    assert_eq!(dashboard["codes_available"], 1);

    let (_, pending) = send(&app, "GET", "/v1/sales?status=pending", token, None).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancelled_sale_cannot_be_confirmed() {
    let app = app(test_state());
    let token = register(&app, "c@example.com").await;
    let token = Some(token.as_str());

    let (_, customer) = send(
        &app,
        "POST",
        "/v1/customers",
        token,
        Some(json!({ "name": "Caio", "email": "caio@example.com", "phone": "21987654321" })),
    )
    .await;
    let (_, app_body) = send(&app, "POST", "/v1/apps", token, Some(json!({ "name": "A", "price_cents": 100 }))).await;
    let (_, sale) = send(
        &app,
        "POST",
        "/v1/sales",
        token,
        Some(json!({
            "customer_id": customer["id"],
            "items": [{ "product": { "kind": "app", "app_id": app_body["id"] }, "quantity": 1 }]
        })),
    )
    .await;
    let sale_id = sale["id"].as_str().unwrap().to_string();

    let (status, cancelled) = send(&app, "POST", &format!("/v1/sales/{}/cancel", sale_id), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, _) = send(&app, "POST", &format!("/v1/sales/{}/confirm", sale_id), token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_data_is_scoped_to_owner() {
    let app = app(test_state());
    let alice = register(&app, "alice@example.com").await;
    let bob = register(&app, "bob@example.com").await;

    let (_, customer) = send(
        &app,
        "POST",
        "/v1/customers",
        Some(&alice),
        Some(json!({ "name": "Dora", "email": "dora@example.com", "phone": "11911112222" })),
    )
    .await;
    let uri = format!("/v1/customers/{}", customer["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = send(&app, "GET", "/v1/customers", Some(&bob), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_routes() {
    let state = test_state();
    let admin = state
        .accounts
        .create_user(NewUser {
            name: "Root".into(),
            email: "root@example.com".into(),
            phone: String::new(),
            password: "rootpass".into(),
            is_admin: true,
        })
        .await
        .unwrap();
    let app = app(state);

    let user_token = register(&app, "plain@example.com").await;
    let (status, _) = send(&app, "GET", "/v1/admin/users", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, login) = send(
        &app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": "root@example.com", "password": "rootpass" })),
    )
    .await;
    let admin_token = login["token"].as_str().unwrap().to_string();

    let (status, users) = send(&app, "GET", "/v1/admin/users", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 2);

    let (status, _) = send(&app, "DELETE", &format!("/v1/admin/users/{}", admin.id), Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let plain_id = users.iter().find(|u| u["email"] == "plain@example.com").unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, _) = send(&app, "DELETE", &format!("/v1/admin/users/{}", plain_id), Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Tokens of deleted accounts stop working
    let (status, _) = send(&app, "GET", "/v1/me", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_overflowing_sale_total_is_a_bad_request() {
    let app = app(test_state());
    let token = register(&app, "big@example.com").await;
    let token = Some(token.as_str());

    let (_, customer) = send(
        &app,
        "POST",
        "/v1/customers",
        token,
        Some(json!({ "name": "Eva", "email": "eva@example.com", "phone": "11987650000" })),
    )
    .await;
    let (_, app_body) = send(&app, "POST", "/v1/apps", token, Some(json!({ "name": "A", "price_cents": 100 }))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/sales",
        token,
        Some(json!({
            "customer_id": customer["id"],
            "items": [{ "product": { "kind": "app", "app_id": app_body["id"] }, "quantity": 2, "price_cents": i64::MAX }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("total out of range"));
}
