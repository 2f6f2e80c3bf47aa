//! Premium checkout and the provider webhook

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
};

use super::extract::{ClientIp, RequestMetrics};
use crate::AppState;
use crate::api::dto::CheckoutResponse;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::metrics::PAYMENT_EVENTS_TOTAL;
use crate::service::{PaymentService, WebhookOutcome};

fn build_payment_service(state: &AppState) -> PaymentService {
    PaymentService::new(
        state.db.clone(),
        state.storage.clone(),
        state.payments.clone(),
        state.config.server.base_url(),
        state.config.payments.premium_price,
    )
}

/// POST /api/payments/checkout
pub async fn checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
) -> Result<Json<CheckoutResponse>, AppError> {
    let metrics = RequestMetrics::start("POST", "/api/payments/checkout");
    let checkout = build_payment_service(&state).checkout(&user, &ip).await?;
    Ok(metrics.ok(Json(CheckoutResponse {
        init_point: checkout.init_point,
        preference_id: checkout.preference_id,
    })))
}

/// POST /payments/webhook
///
/// Unauthenticated. Answers 200 for handled and ignored notifications and
/// 500 otherwise so the provider retries.
async fn webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(error) => {
            tracing::error!(%error, "Unparsable payment webhook body");
            PAYMENT_EVENTS_TOTAL
                .with_label_values(&["webhook", "invalid"])
                .inc();
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match build_payment_service(&state).webhook(&value).await {
        Ok(WebhookOutcome::Ignored) => {
            tracing::debug!("Payment webhook ignored");
            StatusCode::OK
        }
        Ok(WebhookOutcome::Recorded { user_id, status }) => {
            tracing::info!(%user_id, %status, "Payment webhook recorded");
            StatusCode::OK
        }
        Ok(WebhookOutcome::PremiumActivated { user_id }) => {
            tracing::info!(target: "audit", %user_id, "Premium activated");
            StatusCode::OK
        }
        Err(error) => {
            tracing::error!(%error, "Payment webhook failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn payments_webhook_router() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(webhook))
}
