pub mod fulfillment;
pub mod reconcile;
pub mod sweep;

pub use fulfillment::{FulfillmentOutcome, FulfillmentService};
pub use reconcile::{reconcile_order, ReconcileOutcome};
pub use sweep::{run_sweeper, sweep_once, SweepReport};
