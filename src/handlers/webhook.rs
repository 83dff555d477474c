use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha512;
use tracing::{error, info, warn};

use crate::db::queries;
use crate::error::AppError;
use crate::services::FulfillmentService;
use crate::AppState;

type HmacSha512 = Hmac<Sha512>;

/// Upper bound on how many orders one charge event may fulfill. A reference
/// is expected to match a single order; the bound caps the scan either way.
const REFERENCE_SCAN_LIMIT: i64 = 5;

/// Inbound Paystack webhook. The HMAC signature over the raw body is the
/// authentication; once it checks out the event itself is ground truth and
/// no second provider round-trip is made. The payload's claimed order id is
/// never used; correlation runs against references this service recorded.
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get("x-paystack-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature".to_string()))?;

    if !signature_valid(state.config.paystack_secret_key.as_bytes(), &body, signature) {
        warn!("webhook signature mismatch");
        return Err(AppError::Unauthorized("Invalid signature".to_string()));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid payload".to_string()))?;
    let event = payload["event"].as_str().unwrap_or_default().to_string();

    info!(event, "processing webhook event");

    match event.as_str() {
        "charge.success" => handle_charge_success(&state, &payload).await?,
        "transfer.success" => handle_transfer_success(&state, &payload).await?,
        "transfer.failed" => handle_transfer_failed(&state, &payload).await?,
        // Unrelated event types are acknowledged and ignored.
        _ => {}
    }

    Ok(Json(json!({ "success": true, "event": event })))
}

fn signature_valid(secret: &[u8], body: &[u8], provided: &str) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());
    computed.eq_ignore_ascii_case(provided)
}

async fn handle_charge_success(state: &AppState, payload: &Value) -> Result<(), AppError> {
    let Some(reference) = payload["data"]["reference"].as_str() else {
        warn!("charge.success event without a reference");
        return Ok(());
    };

    let orders =
        queries::find_orders_by_reference(&state.db, reference, REFERENCE_SCAN_LIMIT).await?;

    if orders.is_empty() {
        // Nothing of ours matches: acknowledge so the provider stops
        // redelivering, mutate nothing.
        info!(reference, "no matching order for charge event");
        return Ok(());
    }

    let fulfillment = FulfillmentService::new(state.db.clone());
    let mut failures = 0;

    for order in &orders {
        match fulfillment.finalize_order(order.id).await {
            Ok(outcome) => {
                info!(
                    order_id = %order.id,
                    granted = outcome.granted,
                    already_fulfilled = outcome.already_fulfilled,
                    "order fulfilled via webhook"
                );
            }
            Err(e) => {
                error!(order_id = %order.id, "webhook fulfillment failed: {}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        // Non-2xx makes the provider redeliver; fulfillment is idempotent so
        // the retry is safe.
        return Err(AppError::Internal("Fulfillment failed".to_string()));
    }

    Ok(())
}

async fn handle_transfer_success(state: &AppState, payload: &Value) -> Result<(), AppError> {
    let Some(reference) = payload["data"]["reference"].as_str() else {
        return Ok(());
    };

    let updated =
        queries::mark_payout_success(&state.db, reference, payload["data"].clone()).await?;
    if updated == 0 {
        warn!(reference, "transfer.success for unknown payout");
    }
    Ok(())
}

async fn handle_transfer_failed(state: &AppState, payload: &Value) -> Result<(), AppError> {
    let Some(reference) = payload["data"]["reference"].as_str() else {
        return Ok(());
    };

    let reason = payload["data"]["reason"]
        .as_str()
        .unwrap_or("Unknown failure reason");
    let updated =
        queries::mark_payout_failed(&state.db, reference, reason, payload["data"].clone()).await?;
    if updated == 0 {
        warn!(reference, "transfer.failed for unknown payout");
    }
    Ok(())
}
