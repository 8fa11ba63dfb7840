//! HTTP surface tests driven through the full router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{Harness, BUYER};
use order_payments::adapters::http::app_router;
use order_payments::domain::order::PaymentStatus;
use order_payments::domain::payment::RsaSignatureVerifier;

const VERIFY_KEY: &str = include_str!("fixtures/webhook_verify_key.pem");
const SIGNED_BODY: &[u8] = include_bytes!("fixtures/signed_body.json");
const SIGNATURE: &str = include_str!("fixtures/signed_body.sig");

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_request(order_id: &str, key: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/payments/intents")
        .header("content-type", "application/json")
        .header("x-user-id", BUYER)
        .header("idempotency-key", key)
        .body(Body::from(json!({ "order_id": order_id }).to_string()))
        .unwrap()
}

fn signed_request(body: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/payment/signed")
        .header("content-type", "application/json")
        .header("x-signature", SIGNATURE.trim())
        .body(Body::from(body))
        .unwrap()
}

fn router(harness: &Harness, verifier: Option<RsaSignatureVerifier>) -> Router {
    app_router(harness.app_state(verifier))
}

#[tokio::test]
async fn create_intent_returns_created_with_idempotency_headers() {
    let harness = Harness::new();
    let order = harness.seed_order().await;
    let app = router(&harness, None);

    let response = app
        .clone()
        .oneshot(create_request(&order.id.to_string(), "K1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["idempotency-key"], "K1");
    assert_eq!(response.headers()["idempotent-replayed"], "false");
    let first = body_json(response).await;
    assert_eq!(first["status"], "pending");

    let replay = app
        .oneshot(create_request(&order.id.to_string(), "K1"))
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::CREATED);
    assert_eq!(replay.headers()["idempotent-replayed"], "true");
    assert_eq!(body_json(replay).await, first);
    assert_eq!(harness.gateway.call_count(), 1);
}

#[tokio::test]
async fn create_intent_without_buyer_is_unauthorized() {
    let harness = Harness::new();
    let order = harness.seed_order().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/intents")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "order_id": order.id.to_string() }).to_string()))
        .unwrap();
    let response = router(&harness, None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.gateway.call_count(), 0);
}

#[tokio::test]
async fn created_intent_can_be_read_back() {
    let harness = Harness::new();
    let order = harness.seed_order().await;
    let app = router(&harness, None);

    let created = body_json(
        app.clone()
            .oneshot(create_request(&order.id.to_string(), "K1"))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/payments/intents/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, created);
}

#[tokio::test]
async fn unknown_intent_is_not_found() {
    let harness = Harness::new();
    let response = router(&harness, None)
        .oneshot(
            Request::builder()
                .uri(format!("/api/payments/intents/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsigned_query_webhook_confirms_the_order() {
    let harness = Harness::new();
    let order = harness.seed_order().await;
    let app = router(&harness, None);
    app.clone()
        .oneshot(create_request(&order.id.to_string(), "K1"))
        .await
        .unwrap();
    let tx_ref = harness.payments.intents().await[0].provider_ref.to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/webhooks/payment?trx_ref={tx_ref}&status=success"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["received"], true);
    assert_eq!(ack["outcome"], "reconciled");
    assert_eq!(
        harness.orders.get(&order.id).await.unwrap().payment_status,
        PaymentStatus::Confirmed
    );
}

#[tokio::test]
async fn unmatched_webhook_is_acknowledged() {
    let harness = Harness::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payment")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"trx_ref":"missing","status":"success"}"#))
        .unwrap();

    let response = router(&harness, None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["outcome"], "ignored");
    assert_eq!(ack["reason"], "unknown_reference");
}

#[tokio::test]
async fn signed_webhook_with_valid_signature_is_accepted() {
    let harness = Harness::new();
    let verifier = RsaSignatureVerifier::from_pem(VERIFY_KEY).unwrap();

    let response = router(&harness, Some(verifier))
        .oneshot(signed_request(SIGNED_BODY))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["received"], true);
}

#[tokio::test]
async fn signed_webhook_with_tampered_body_is_rejected() {
    let harness = Harness::new();
    let verifier = RsaSignatureVerifier::from_pem(VERIFY_KEY).unwrap();

    let response = router(&harness, Some(verifier))
        .oneshot(signed_request(
            br#"{"trx_ref":"tx-signed-1","status":"failed"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_webhook_without_configured_key_is_unavailable() {
    let harness = Harness::new();

    let response = router(&harness, None)
        .oneshot(signed_request(SIGNED_BODY))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_reports_ok() {
    let harness = Harness::new();
    let response = router(&harness, None)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
