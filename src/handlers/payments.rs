use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::error::AppError;
use crate::services::{reconcile_order, FulfillmentService, ReconcileOutcome};
use crate::verify::{PaystackVerifier, SolanaVerifier, Verification};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaystackVerifyRequest {
    pub order_id: Uuid,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct SolanaVerifyRequest {
    pub order_id: Uuid,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyApiResponse {
    pub success: bool,
    pub verified: bool,
    pub pending: bool,
    pub already_completed: bool,
    pub granted: u64,
    pub message: String,
}

/// Client-side callback after the payer's browser saw a Paystack charge go
/// through. The browser's claim is never trusted; the reference is checked
/// server-to-server before anything is granted.
pub async fn verify_paystack(
    State(state): State<AppState>,
    Json(payload): Json<PaystackVerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.reference.trim().is_empty() {
        return Err(AppError::BadRequest("Missing payment reference".to_string()));
    }

    let mut order = fetch_order(&state, payload.order_id).await?;

    let already_completed = order.is_completed();
    if !already_completed {
        queries::record_payment_reference(&state.db, order.id, &payload.reference).await?;
        order.payment_reference = Some(payload.reference.clone());
    }

    let verifier = PaystackVerifier::new(state.paystack.clone());
    let fulfillment = FulfillmentService::new(state.db.clone());
    let outcome = reconcile_order(&verifier, &fulfillment, &order).await?;

    Ok(respond(outcome, already_completed))
}

/// Client-side callback with an on-chain payment signature. Polls the RPC
/// node with the full propagation-lag budget before answering.
pub async fn verify_solana(
    State(state): State<AppState>,
    Json(payload): Json<SolanaVerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.signature.trim().is_empty() {
        return Err(AppError::BadRequest("Missing transaction signature".to_string()));
    }

    let mut order = fetch_order(&state, payload.order_id).await?;

    let already_completed = order.is_completed();
    if !already_completed {
        queries::record_onchain_payment(&state.db, order.id, &payload.signature).await?;
        order.transaction_signatures = Some(vec![payload.signature.clone()]);
        order.payment_reference = Some(payload.signature.clone());
        order.payment_method = "solana_usdc".to_string();
    }

    let verifier = SolanaVerifier::new(state.solana.clone());
    let fulfillment = FulfillmentService::new(state.db.clone());
    let outcome = reconcile_order(&verifier, &fulfillment, &order).await?;

    Ok(respond(outcome, already_completed))
}

async fn fetch_order(state: &AppState, id: Uuid) -> Result<crate::db::models::Order, AppError> {
    queries::get_order(&state.db, id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => AppError::NotFound(format!("Order {} not found", id)),
        other => AppError::Database(other),
    })
}

fn respond(
    outcome: ReconcileOutcome,
    already_completed: bool,
) -> (StatusCode, Json<VerifyApiResponse>) {
    match outcome.verification {
        Verification::Verified => {
            let granted = outcome.fulfillment.map(|f| f.granted).unwrap_or(0);
            let message = if already_completed {
                "Order already completed (recovery attempted)".to_string()
            } else {
                "Payment successfully verified".to_string()
            };
            (
                StatusCode::OK,
                Json(VerifyApiResponse {
                    success: true,
                    verified: true,
                    pending: false,
                    already_completed,
                    granted,
                    message,
                }),
            )
        }
        Verification::Rejected { reason } => (
            StatusCode::BAD_REQUEST,
            Json(VerifyApiResponse {
                success: false,
                verified: false,
                pending: false,
                already_completed,
                granted: 0,
                message: format!("Payment verification failed: {}", reason),
            }),
        ),
        // Not a failure: the order stays processing and the sweep retries.
        Verification::Indeterminate => (
            StatusCode::ACCEPTED,
            Json(VerifyApiResponse {
                success: false,
                verified: false,
                pending: true,
                already_completed,
                granted: 0,
                message: "Transaction not yet visible on the ledger; the order stays pending and will be retried".to_string(),
            }),
        ),
    }
}
