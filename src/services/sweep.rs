use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::db::queries;
use crate::error::AppError;
use crate::services::fulfillment::FulfillmentService;
use crate::services::reconcile::reconcile_order;
use crate::verify::{SolanaRpcClient, SolanaVerifier, Verification};

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub fulfilled: usize,
    pub rejected_on_chain: usize,
    pub still_pending: usize,
    pub errors: usize,
}

/// Runs the stuck-order sweeper loop. The backstop trigger: even when the
/// client callback and the provider webhook are both lost, orders sitting
/// in 'processing' with a recorded signature get re-verified here.
pub async fn run_sweeper(
    pool: PgPool,
    rpc: SolanaRpcClient,
    interval_secs: u64,
    stuck_after_secs: i64,
    batch_size: i64,
) {
    info!("Stuck order sweeper started");

    loop {
        match sweep_once(&pool, &rpc, stuck_after_secs, batch_size).await {
            Ok(report) if report.scanned > 0 => {
                info!(
                    scanned = report.scanned,
                    fulfilled = report.fulfilled,
                    rejected = report.rejected_on_chain,
                    pending = report.still_pending,
                    errors = report.errors,
                    "sweep run finished"
                );
            }
            Ok(_) => debug!("no stuck orders found"),
            Err(e) => error!("Sweep run error: {}", e),
        }

        sleep(Duration::from_secs(interval_secs)).await;
    }
}

/// One bounded sweep pass. Per-order failures are logged and the pass moves
/// on; anything left over is picked up by the next run.
pub async fn sweep_once(
    pool: &PgPool,
    rpc: &SolanaRpcClient,
    stuck_after_secs: i64,
    batch_size: i64,
) -> Result<SweepReport, AppError> {
    let cutoff = Utc::now() - chrono::Duration::seconds(stuck_after_secs);
    let orders = queries::get_stuck_onchain_orders(pool, cutoff, batch_size).await?;

    let mut report = SweepReport {
        scanned: orders.len(),
        ..Default::default()
    };

    if orders.is_empty() {
        return Ok(report);
    }

    info!("Found {} potential stuck orders", orders.len());

    let fulfillment = FulfillmentService::new(pool.clone());
    // The client callback already spent the long polling budget on these
    // signatures; one status check per order is enough here.
    let verifier = SolanaVerifier::with_polling(rpc.clone(), 1, Duration::ZERO);

    for order in &orders {
        match reconcile_order(&verifier, &fulfillment, order).await {
            Ok(outcome) => match outcome.verification {
                Verification::Verified => {
                    let granted = outcome.fulfillment.map(|f| f.granted).unwrap_or(0);
                    info!(order_id = %order.id, granted, "stuck order fulfilled");
                    report.fulfilled += 1;
                }
                Verification::Rejected { reason } => {
                    // Left in 'processing' for manual inspection rather than
                    // auto-failed; operators decide what happens to it.
                    warn!(order_id = %order.id, reason, "stuck order failed on-chain");
                    report.rejected_on_chain += 1;
                }
                Verification::Indeterminate => {
                    debug!(order_id = %order.id, "stuck order still pending");
                    report.still_pending += 1;
                }
            },
            Err(e) => {
                error!(order_id = %order.id, "sweep could not process order: {}", e);
                report.errors += 1;
            }
        }
    }

    Ok(report)
}
