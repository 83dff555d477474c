use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::models::{Notification, PurchasedBeat};
use crate::db::queries;
use crate::error::AppError;

/// Result of one fulfillment invocation. "Already fulfilled" is a success
/// outcome: the caller's work is done either way.
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentOutcome {
    pub already_fulfilled: bool,
    pub granted: u64,
}

/// The single choke point that turns a verified payment into durable
/// entitlements. Safe to call repeatedly and concurrently for the same
/// order: the order row lock serializes callers and the unique
/// (order_id, beat_id) constraint absorbs anything that slips through.
///
/// No other component writes 'completed' status or entitlement rows.
pub struct FulfillmentService {
    pool: PgPool,
}

impl FulfillmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grants every missing entitlement for the order, bumps purchase
    /// counters, marks the order completed and queues notifications, all in
    /// one transaction. Either every effect of this invocation commits or
    /// none do.
    pub async fn finalize_order(&self, order_id: Uuid) -> Result<FulfillmentOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(order) = queries::get_order_for_update(&mut tx, order_id).await? else {
            error!(%order_id, "fulfillment requested for unknown order");
            return Err(AppError::NotFound(format!("Order {} not found", order_id)));
        };

        let items = queries::get_order_items(&mut tx, order_id).await?;
        if items.is_empty() {
            error!(%order_id, "fulfillment requested for order with no line items");
            tx.rollback().await?;
            return Err(AppError::Validation(format!(
                "Order {} has no line items",
                order_id
            )));
        }

        // Fast path: completed and every line item already granted.
        if order.is_completed() {
            let existing = queries::count_entitlements(&mut tx, order_id).await?;
            if existing >= items.len() as i64 {
                tx.rollback().await?;
                return Ok(FulfillmentOutcome {
                    already_fulfilled: true,
                    granted: 0,
                });
            }
            info!(%order_id, existing, expected = items.len(), "completed order missing entitlements, recovering");
        }

        let mut granted: u64 = 0;
        let mut producers: Vec<(Uuid, String)> = Vec::new();

        for item in &items {
            let entitlement = PurchasedBeat::new(
                order.buyer_id,
                item.beat_id,
                order.id,
                order.currency_used.clone(),
            );

            if queries::insert_entitlement(&mut tx, &entitlement).await? {
                granted += 1;

                match queries::increment_purchase_count(&mut tx, item.beat_id).await? {
                    Some((producer_id, title)) => {
                        if producers.iter().all(|(p, _)| *p != producer_id) {
                            producers.push((producer_id, title));
                        }
                    }
                    None => {
                        warn!(%order_id, beat_id = %item.beat_id, "purchased beat missing from catalog");
                    }
                }
            }
        }

        queries::mark_order_completed(&mut tx, order_id).await?;

        if granted > 0 {
            let confirmation = Notification::purchase_confirmation(order.buyer_id, order.id);
            queries::insert_notification(&mut tx, &confirmation).await?;

            for (producer_id, title) in &producers {
                if *producer_id == order.buyer_id {
                    continue;
                }
                let alert = Notification::sale_alert(*producer_id, order.buyer_id, order.id, title);
                queries::insert_notification(&mut tx, &alert).await?;
            }
        }

        tx.commit().await?;

        info!(%order_id, granted, "order fulfilled");

        Ok(FulfillmentOutcome {
            already_fulfilled: granted == 0,
            granted,
        })
    }
}
