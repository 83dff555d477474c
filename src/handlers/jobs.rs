use axum::{extract::State, response::IntoResponse, Json};

use crate::error::AppError;
use crate::services::sweep::sweep_once;
use crate::AppState;

/// Run-now trigger for the stuck-order sweep, for operators and external
/// schedulers. Reads nothing from the request; the sweep works exclusively
/// off internal order state.
pub async fn run_sweep(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = sweep_once(
        &state.db,
        &state.solana,
        state.config.sweep_stuck_after_secs,
        state.config.sweep_batch_size,
    )
    .await?;

    Ok(Json(report))
}
