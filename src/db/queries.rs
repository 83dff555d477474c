use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{Notification, Order, OrderItem, PurchasedBeat};

// --- Order queries ---

pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Stores the card-rail reference on the order before fulfillment runs, so
/// the provider webhook can correlate its events against our own records.
pub async fn record_payment_reference(pool: &PgPool, order_id: Uuid, reference: &str) -> Result<()> {
    sqlx::query("UPDATE orders SET payment_reference = $1 WHERE id = $2")
        .bind(reference)
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores the on-chain signature and pins the payment method. The signature
/// doubles as the payment reference for later correlation.
pub async fn record_onchain_payment(pool: &PgPool, order_id: Uuid, signature: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE orders
        SET transaction_signatures = ARRAY[$1],
            payment_reference = $1,
            payment_method = 'solana_usdc'
        WHERE id = $2
        "#,
    )
    .bind(signature)
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Recent not-yet-completed orders whose recorded payment reference matches.
/// The webhook never trusts a payload-supplied order id; this lookup is the
/// only correlation it performs.
pub async fn find_orders_by_reference(
    pool: &PgPool,
    reference: &str,
    limit: i64,
) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE payment_reference = $1
        AND status <> 'completed'
        ORDER BY order_date DESC
        LIMIT $2
        "#,
    )
    .bind(reference)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Orders stuck mid-payment: 'processing', paid on-chain, signature recorded,
/// older than the cutoff. Oldest first so starvation is impossible across
/// sweep runs.
pub async fn get_stuck_onchain_orders(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE status = 'processing'
        AND payment_method = 'solana_usdc'
        AND transaction_signatures IS NOT NULL
        AND cardinality(transaction_signatures) > 0
        AND order_date < $1
        ORDER BY order_date ASC
        LIMIT $2
        "#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await
}

// --- Fulfillment queries (transaction-scoped) ---
//
// Everything below runs inside the fulfillment transaction. The order row
// lock taken by get_order_for_update serializes concurrent callers.

pub async fn get_order_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn get_order_items(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Vec<OrderItem>> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .fetch_all(&mut **executor)
        .await
}

pub async fn count_entitlements(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<i64> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM user_purchased_beats WHERE order_id = $1")
            .bind(order_id)
            .fetch_one(&mut **executor)
            .await?;
    Ok(row.0)
}

/// Returns true when a row was actually inserted. ON CONFLICT DO NOTHING
/// makes a lost race (or a previous partial grant) a no-op instead of an
/// error.
pub async fn insert_entitlement(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entitlement: &PurchasedBeat,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO user_purchased_beats (
            id, user_id, beat_id, license_type, order_id, currency_code, purchase_date
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (order_id, beat_id) DO NOTHING
        "#,
    )
    .bind(entitlement.id)
    .bind(entitlement.user_id)
    .bind(entitlement.beat_id)
    .bind(&entitlement.license_type)
    .bind(entitlement.order_id)
    .bind(&entitlement.currency_code)
    .bind(entitlement.purchase_date)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Bumps the beat's purchase counter and hands back who produced it, for the
/// sale notification.
pub async fn increment_purchase_count(
    executor: &mut SqlxTransaction<'_, Postgres>,
    beat_id: Uuid,
) -> Result<Option<(Uuid, String)>> {
    sqlx::query_as::<_, (Uuid, String)>(
        r#"
        UPDATE beats
        SET purchase_count = purchase_count + 1
        WHERE id = $1
        RETURNING producer_id, title
        "#,
    )
    .bind(beat_id)
    .fetch_optional(&mut **executor)
    .await
}

/// Guarded status transition: only non-completed orders move. Returns true
/// when this invocation performed the transition.
pub async fn mark_order_completed(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query("UPDATE orders SET status = 'completed' WHERE id = $1 AND status <> 'completed'")
        .bind(order_id)
        .execute(&mut **executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_notification(
    executor: &mut SqlxTransaction<'_, Postgres>,
    notification: &Notification,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (
            id, recipient_id, sender_id, title, body, notification_type,
            related_entity_id, related_entity_type, is_read, created_date
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(notification.id)
    .bind(notification.recipient_id)
    .bind(notification.sender_id)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(&notification.notification_type)
    .bind(notification.related_entity_id)
    .bind(&notification.related_entity_type)
    .bind(notification.is_read)
    .bind(notification.created_date)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

// --- Payout queries ---

pub async fn mark_payout_success(
    pool: &PgPool,
    transaction_reference: &str,
    details: serde_json::Value,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payouts
        SET status = 'success', payout_date = NOW(), transaction_details = $1
        WHERE transaction_reference = $2
        "#,
    )
    .bind(details)
    .bind(transaction_reference)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_payout_failed(
    pool: &PgPool,
    transaction_reference: &str,
    reason: &str,
    details: serde_json::Value,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payouts
        SET status = 'failed', failure_reason = $1, transaction_details = $2
        WHERE transaction_reference = $3
        "#,
    )
    .bind(reason)
    .bind(details)
    .bind(transaction_reference)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
