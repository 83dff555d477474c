//! Ledger verification: answers "did payment P for order O actually clear?"
//! against the authoritative rail, never trusting client-supplied claims.

use async_trait::async_trait;

use crate::db::models::Order;

pub mod paystack;
pub mod solana;

pub use paystack::{PaystackClient, PaystackVerifier};
pub use solana::{SolanaRpcClient, SolanaVerifier};

/// Outcome of a verification attempt.
///
/// `Indeterminate` means the polling/timeout budget ran out without a
/// definitive answer. Callers must leave the order in its current state for
/// a later retry; it is never a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Rejected { reason: String },
    Indeterminate,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Verification::Rejected {
            reason: reason.into(),
        }
    }
}

/// One payment rail's verification strategy. Both rails satisfy the same
/// contract so trigger surfaces can stay rail-agnostic.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, order: &Order) -> Verification;
}
