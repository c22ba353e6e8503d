mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{API_KEY, TENANT, encode_form, request, signed_form, test_app};
use stars_ledger::create_router;
use stars_ledger::models::intent::{CreateIntentRequest, IntentStatus};
use stars_ledger::models::transaction::TransactionKind;
use stars_ledger::store::IntentStore;

const ACCOUNT: &str = "144022504";

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn authed_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"))
        .body(Body::empty())
        .unwrap()
}

fn callback_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/gateway/result")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = create_router(test_app().state);

    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_api_requires_bearer_key() {
    let app = create_router(test_app().state);
    let uri = format!("/api/v1/tenants/{TENANT}/accounts/{ACCOUNT}/balance");

    let (missing, _) = send(&app, Request::builder().uri(&uri).body(Body::empty()).unwrap()).await;
    let (wrong, body) = send(
        &app,
        Request::builder()
            .uri(&uri)
            .header(header::AUTHORIZATION, "Bearer not-the-key")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_process_reports_completion_and_rejection() {
    let app = create_router(test_app().state);

    let (status, body) = send(
        &app,
        authed_json(
            "POST",
            "/api/v1/payments/process",
            json!({
                "account_id": ACCOUNT,
                "tenant_id": TENANT,
                "amount": "100",
                "kind": "income",
                "operation_key": "topup-1",
                "service_type": "topup"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["event"], "payment.completed");
    assert_eq!(body["duplicate"], false);

    let (status, body) = send(
        &app,
        authed_json(
            "POST",
            "/api/v1/payments/process",
            json!({
                "account_id": ACCOUNT,
                "tenant_id": TENANT,
                "amount": "150",
                "kind": "expense",
                "operation_key": "img-1"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["event"], "payment.failed");
    assert_eq!(body["reason"]["code"], "insufficient_funds");

    let (status, body) = send(
        &app,
        authed_get(&format!("/api/v1/tenants/{TENANT}/accounts/{ACCOUNT}/balance")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["total"], json!(dec!(100)));
}

#[tokio::test]
async fn test_unknown_operation_is_not_found() {
    let app = create_router(test_app().state);

    let (status, body) = send(
        &app,
        authed_get(&format!("/api/v1/tenants/{TENANT}/operations/nope")),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_history_lists_newest_first() {
    let test = test_app();
    let workflow = test.state.workflow.clone();
    let app = create_router(test.state);
    for (key, amount) in [("topup-1", dec!(10)), ("topup-2", dec!(20))] {
        workflow
            .process(request(ACCOUNT, amount, TransactionKind::Income, key))
            .await
            .unwrap();
    }

    let (status, body) = send(
        &app,
        authed_get(&format!(
            "/api/v1/tenants/{TENANT}/accounts/{ACCOUNT}/transactions?limit=1"
        )),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let rows: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["operation_key"], "topup-2");
}

#[tokio::test]
async fn test_gateway_callback_is_acknowledged() {
    let test = test_app();
    let intent = test
        .state
        .invoices
        .create(CreateIntentRequest {
            account_id: ACCOUNT.to_string(),
            tenant_id: TENANT.to_string(),
            amount: dec!(500),
            subscription: None,
            description: None,
        })
        .await
        .unwrap();
    let app = create_router(test.state.clone());
    let form = signed_form(intent.invoice_id, "500.000000", &[("Shp_tenant", TENANT)]);

    for _ in 0..2 {
        let (status, body) = send(&app, callback_request(encode_form(&form))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("OK{}", intent.invoice_id).into_bytes());
    }

    let balance = test.state.workflow.balances().fresh(ACCOUNT, TENANT).await.unwrap();
    assert_eq!(balance.total, dec!(217));
    assert_eq!(test.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_callback_failing_internally_is_acknowledged_and_left_pending() {
    let test = test_app();
    let intent = test
        .state
        .invoices
        .create(CreateIntentRequest {
            account_id: ACCOUNT.to_string(),
            tenant_id: TENANT.to_string(),
            amount: dec!(500),
            subscription: None,
            description: None,
        })
        .await
        .unwrap();
    let app = create_router(test.state.clone());
    let form = signed_form(intent.invoice_id, "500.000000", &[("Shp_tenant", TENANT)]);

    test.ledger.fail_next(100);
    let (status, body) = send(&app, callback_request(encode_form(&form))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("OK{}", intent.invoice_id).into_bytes());
    let stored = test.intents.find_by_invoice(intent.invoice_id).await.unwrap().unwrap();
    assert_eq!(stored.status, IntentStatus::Pending);
    assert!(test.ledger.is_empty().await);
}

#[tokio::test]
async fn test_unknown_invoice_is_still_acknowledged() {
    let app = create_router(test_app().state);
    let form = signed_form(77, "500", &[]);

    let (status, body) = send(&app, callback_request(encode_form(&form))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK77".to_vec());
}

#[tokio::test]
async fn test_forged_or_malformed_callback_is_rejected() {
    let app = create_router(test_app().state);

    let mut forged = signed_form(1, "500", &[]);
    forged.insert("OutSum".to_string(), "5000".to_string());
    let (status, _) = send(&app, callback_request(encode_form(&forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, callback_request("OutSum=500".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
