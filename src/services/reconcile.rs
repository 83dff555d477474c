use crate::db::models::Order;
use crate::error::AppError;
use crate::services::fulfillment::{FulfillmentOutcome, FulfillmentService};
use crate::verify::{Verification, Verifier};

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub verification: Verification,
    pub fulfillment: Option<FulfillmentOutcome>,
}

/// The verify-then-fulfill sequence every trigger surface runs. Fulfillment
/// only happens on a verified payment; rejected and indeterminate outcomes
/// leave the order exactly as it was.
///
/// Already-completed orders skip re-verification and go straight to
/// fulfillment, which recovers any entitlements a previous invocation
/// failed to grant and is otherwise a no-op.
pub async fn reconcile_order(
    verifier: &dyn Verifier,
    fulfillment: &FulfillmentService,
    order: &Order,
) -> Result<ReconcileOutcome, AppError> {
    if order.is_completed() {
        let outcome = fulfillment.finalize_order(order.id).await?;
        return Ok(ReconcileOutcome {
            verification: Verification::Verified,
            fulfillment: Some(outcome),
        });
    }

    let verification = verifier.verify(order).await;

    let outcome = if verification.is_verified() {
        Some(fulfillment.finalize_order(order.id).await?)
    } else {
        None
    };

    Ok(ReconcileOutcome {
        verification,
        fulfillment: outcome,
    })
}
