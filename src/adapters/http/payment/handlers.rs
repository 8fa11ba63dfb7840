//! HTTP handlers for payment endpoints.
//!
//! These handlers connect Axum routes to the payment command/query handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde_json::{Map, Value};

use crate::application::handlers::{
    CreatePaymentIntentCommand, CreatePaymentIntentConfig, CreatePaymentIntentHandler,
    ExpiryReaper, GetPaymentIntentHandler, GetPaymentIntentQuery, HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler, IdempotencyGuard,
};
use crate::domain::foundation::{Currency, ErrorCode, OrderId, PaymentIntentId, UserId};
use crate::domain::idempotency::IdempotencyKey;
use crate::domain::payment::{PaymentError, RsaSignatureVerifier, SignatureError};
use crate::ports::{OrderRepository, PaymentGateway, PaymentRepository};

use super::dto::{CreatePaymentIntentRequest, ErrorResponse, HealthResponse, WebhookAck};

/// Header carrying the client's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Set on responses served from a cached idempotency record.
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "idempotent-replayed";

/// Header carrying the base64 RSA signature of a signed callback.
pub const SIGNATURE_HEADER: &str = "x-signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every dependency is Arc-wrapped.
#[derive(Clone)]
pub struct PaymentAppState {
    pub idempotency_guard: Arc<IdempotencyGuard>,
    pub order_repository: Arc<dyn OrderRepository>,
    pub payment_repository: Arc<dyn PaymentRepository>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub intent_config: CreatePaymentIntentConfig,
    /// `None` disables the signed webhook route.
    pub webhook_verifier: Option<Arc<RsaSignatureVerifier>>,
    pub reaper: Arc<ExpiryReaper>,
}

impl PaymentAppState {
    /// Create handlers on demand from the shared state.
    pub fn create_payment_intent_handler(&self) -> CreatePaymentIntentHandler {
        CreatePaymentIntentHandler::new(
            self.idempotency_guard.clone(),
            self.order_repository.clone(),
            self.payment_repository.clone(),
            self.payment_gateway.clone(),
            self.intent_config.clone(),
        )
    }

    pub fn get_payment_intent_handler(&self) -> GetPaymentIntentHandler {
        GetPaymentIntentHandler::new(self.payment_repository.clone())
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.payment_repository.clone(),
            self.order_repository.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Buyer Context (would come from auth middleware in production)
// ════════════════════════════════════════════════════════════════════════════════

/// Buyer identity taken from the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedBuyer {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedBuyer extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthenticatedBuyer
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedBuyer { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment Intents
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments/intents - Create (or replay) a payment intent
pub async fn create_payment_intent(
    State(state): State<PaymentAppState>,
    buyer: AuthenticatedBuyer,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|v| {
            v.to_str()
                .map_err(|_| PaymentError::validation("idempotency_key", "must be visible ASCII"))
                .and_then(|s| IdempotencyKey::parse(s).map_err(PaymentError::from))
        })
        .transpose()?;

    let order_id: OrderId = request
        .order_id
        .parse()
        .map_err(|_| PaymentError::validation("order_id", "must be a UUID"))?;
    let currency = request
        .currency
        .as_deref()
        .map(Currency::new)
        .transpose()
        .map_err(PaymentError::from)?;

    let cmd = CreatePaymentIntentCommand {
        order_id,
        buyer_id: buyer.user_id,
        currency,
        metadata: request.metadata,
        idempotency_key,
    };

    let result = state.create_payment_intent_handler().handle(cmd).await?;

    let headers = [
        (IDEMPOTENCY_KEY_HEADER, result.idempotency_key.as_str().to_string()),
        (IDEMPOTENT_REPLAYED_HEADER, result.replayed.to_string()),
    ];
    Ok((StatusCode::CREATED, headers, Json(result.intent)))
}

/// GET /api/payments/intents/:id - Read a payment intent
pub async fn get_payment_intent(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let id: PaymentIntentId = id
        .parse()
        .map_err(|_| PaymentError::validation("id", "must be a UUID"))?;

    let summary = state
        .get_payment_intent_handler()
        .handle(GetPaymentIntentQuery { id })
        .await?
        .ok_or_else(|| PaymentError::not_found("Payment intent", id))?;

    Ok(Json(summary))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/webhooks/payment - Gateway callback carried in the query string
pub async fn handle_payment_webhook_query(
    State(state): State<PaymentAppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let payload = merge_payload(None, params);
    reconcile(&state, payload).await
}

/// POST /api/webhooks/payment - Gateway callback with a JSON body
///
/// Unsigned. Query parameters fill in fields the body lacks.
pub async fn handle_payment_webhook(
    State(state): State<PaymentAppState>,
    Query(params): Query<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, PaymentApiError> {
    let payload = merge_payload(parse_body(&body), params);
    reconcile(&state, payload).await
}

/// POST /api/webhooks/payment/signed - RSA-SHA256 signed gateway callback
pub async fn handle_signed_payment_webhook(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, PaymentApiError> {
    let verifier = state
        .webhook_verifier
        .as_ref()
        .ok_or(PaymentApiError::VerificationUnavailable)?;

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    verifier
        .check(&body, signature)
        .map_err(PaymentApiError::InvalidSignature)?;

    let payload = parse_body(&body).unwrap_or(Value::Null);
    reconcile(&state, payload).await
}

async fn reconcile(
    state: &PaymentAppState,
    payload: Value,
) -> Result<Json<WebhookAck>, PaymentApiError> {
    let result = state
        .webhook_handler()
        .handle(HandlePaymentWebhookCommand { payload })
        .await?;
    Ok(Json(WebhookAck::from(&result)))
}

fn parse_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not valid JSON");
            None
        }
    }
}

/// Body object first, then query parameters for keys the body lacks.
fn merge_payload(body: Option<Value>, params: HashMap<String, String>) -> Value {
    let mut map = match body {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in params {
        map.entry(key).or_insert(Value::String(value));
    }
    Value::Object(map)
}

// ════════════════════════════════════════════════════════════════════════════════
// Maintenance
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments/maintenance/reap - Run the expiry reaper once
pub async fn run_reaper(State(state): State<PaymentAppState>) -> impl IntoResponse {
    Json(state.reaper.run_once().await)
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts payment errors to HTTP responses.
#[derive(Debug)]
pub enum PaymentApiError {
    Payment(PaymentError),
    InvalidSignature(SignatureError),
    VerificationUnavailable,
}

impl From<PaymentError> for PaymentApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl From<crate::domain::foundation::DomainError> for PaymentApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self::Payment(PaymentError::from(err))
    }
}

/// HTTP status for an error code.
pub fn status_for_code(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed
        | ErrorCode::EmptyField
        | ErrorCode::OutOfRange
        | ErrorCode::InvalidFormat
        | ErrorCode::InvalidStateTransition => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict | ErrorCode::RequestInProgress => StatusCode::CONFLICT,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::ProviderError => StatusCode::BAD_GATEWAY,
        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            PaymentApiError::Payment(err) => {
                match err {
                    PaymentError::Database(detail) => {
                        tracing::error!(error = %detail, "Payment request failed on storage")
                    }
                    PaymentError::Provider(detail) => {
                        tracing::error!(error = %detail, "Payment gateway rejected request")
                    }
                    _ => {}
                }
                (
                    status_for_code(err.code()),
                    ErrorResponse::new(err.code().to_string(), err.message()),
                )
            }
            PaymentApiError::InvalidSignature(err) => {
                tracing::warn!(error = %err, "Rejected signed webhook");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("INVALID_WEBHOOK_SIGNATURE", "Invalid webhook signature"),
                )
            }
            PaymentApiError::VerificationUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new(
                    "WEBHOOK_VERIFICATION_UNAVAILABLE",
                    "Signed webhooks are not configured",
                ),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_params_fill_missing_body_fields() {
        let mut params = HashMap::new();
        params.insert("trx_ref".to_string(), "tx-q".to_string());
        params.insert("status".to_string(), "failed".to_string());

        let merged = merge_payload(Some(json!({"status": "success"})), params);

        assert_eq!(merged["trx_ref"], json!("tx-q"));
        assert_eq!(merged["status"], json!("success"));
    }

    #[test]
    fn non_object_body_falls_back_to_query() {
        let merged = merge_payload(Some(json!([1, 2])), HashMap::new());
        assert_eq!(merged, json!({}));
    }

    #[test]
    fn invalid_json_body_parses_to_none() {
        assert!(parse_body(b"not json").is_none());
        assert!(parse_body(b"").is_none());
    }

    #[test]
    fn api_error_maps_validation_to_400() {
        let err = PaymentApiError::from(PaymentError::validation(
            "order_status",
            "not awaiting payment",
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_maps_conflict_and_in_progress_to_409() {
        let conflict = PaymentApiError::from(PaymentError::conflict());
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let in_progress = PaymentApiError::from(PaymentError::RequestInProgress);
        assert_eq!(in_progress.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn api_error_maps_ownership_to_403() {
        let err = PaymentApiError::from(PaymentError::unauthorized("not your order"));
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn api_error_maps_provider_to_502() {
        let err = PaymentApiError::from(PaymentError::provider("Invalid currency"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn api_error_maps_database_to_500() {
        let err = PaymentApiError::from(PaymentError::database("pool timed out"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cached_failure_uses_status_of_original_code() {
        let err = PaymentApiError::from(PaymentError::PreviouslyFailed {
            code: ErrorCode::ProviderError,
            message: "Invalid currency".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn signature_errors_map_to_401_and_missing_key_to_503() {
        let invalid = PaymentApiError::InvalidSignature(SignatureError::Mismatch);
        assert_eq!(invalid.into_response().status(), StatusCode::UNAUTHORIZED);

        let unavailable = PaymentApiError::VerificationUnavailable;
        assert_eq!(
            unavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
