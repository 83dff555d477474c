use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::db::models::Order;
use crate::verify::{Verification, Verifier};

/// Poll cadence for client-triggered verification: 20 attempts at 3s covers
/// roughly a minute of propagation lag before giving up as indeterminate.
const POLL_ATTEMPTS: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Error, Debug)]
pub enum SolanaRpcError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Invalid response from RPC node: {0}")]
    InvalidResponse(String),
}

/// Signature status as reported by getSignatureStatuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<serde_json::Value>,
    pub confirmation_status: Option<String>,
}

impl SignatureStatus {
    /// 'confirmed' commitment is sufficient; 'finalized' is a superset.
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<RpcResult>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcResult {
    value: Vec<Option<SignatureStatus>>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC client for a Solana node. Only the calls the
/// reconciliation flow needs.
#[derive(Clone)]
pub struct SolanaRpcClient {
    client: Client,
    rpc_url: String,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        SolanaRpcClient { client, rpc_url }
    }

    /// Looks a signature up on the node. `Ok(None)` means the node does not
    /// see it yet, which is distinct from an on-chain failure: that comes
    /// back as a status with `err` set.
    pub async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatus>, SolanaRpcError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getSignatureStatuses",
            "params": [[signature], {"searchTransactionHistory": true}],
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?;

        let envelope = response.json::<RpcEnvelope>().await?;

        if let Some(error) = envelope.error {
            return Err(SolanaRpcError::Rpc(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }

        let mut value = envelope
            .result
            .ok_or_else(|| SolanaRpcError::InvalidResponse("missing result".to_string()))?
            .value;

        if value.is_empty() {
            return Err(SolanaRpcError::InvalidResponse(
                "empty status array".to_string(),
            ));
        }

        Ok(value.remove(0))
    }
}

/// On-chain verifier with a bounded polling budget. The budget is explicit
/// per instance so the sweep can run single-shot checks while the client
/// callback path waits out propagation lag.
pub struct SolanaVerifier {
    client: SolanaRpcClient,
    attempts: u32,
    poll_interval: Duration,
}

impl SolanaVerifier {
    pub fn new(client: SolanaRpcClient) -> Self {
        Self {
            client,
            attempts: POLL_ATTEMPTS,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_polling(client: SolanaRpcClient, attempts: u32, poll_interval: Duration) -> Self {
        Self {
            client,
            attempts,
            poll_interval,
        }
    }
}

#[async_trait]
impl Verifier for SolanaVerifier {
    async fn verify(&self, order: &Order) -> Verification {
        let Some(signature) = order.first_signature() else {
            warn!(order_id = %order.id, "no transaction signature recorded, cannot verify");
            return Verification::Indeterminate;
        };

        for attempt in 1..=self.attempts {
            match self.client.get_signature_status(signature).await {
                Ok(Some(status)) => {
                    if status.err.is_some() {
                        return Verification::rejected("transaction failed on-chain");
                    }
                    if status.is_confirmed() {
                        debug!(
                            order_id = %order.id,
                            commitment = status.confirmation_status.as_deref().unwrap_or("unknown"),
                            "signature confirmed"
                        );
                        return Verification::Verified;
                    }
                    // Visible but below 'confirmed' commitment: keep polling.
                }
                Ok(None) => {
                    debug!(order_id = %order.id, attempt, "signature not yet visible");
                }
                Err(e) => {
                    // Per-attempt RPC failures are swallowed; only an
                    // exhausted budget yields an answer.
                    debug!(order_id = %order.id, attempt, error = %e, "RPC attempt failed");
                }
            }

            if attempt < self.attempts {
                sleep(self.poll_interval).await;
            }
        }

        Verification::Indeterminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_and_finalized_count_as_confirmed() {
        for commitment in ["confirmed", "finalized"] {
            let status = SignatureStatus {
                slot: 1,
                confirmations: Some(10),
                err: None,
                confirmation_status: Some(commitment.to_string()),
            };
            assert!(status.is_confirmed(), "{} should pass", commitment);
        }
    }

    #[test]
    fn processed_commitment_is_not_enough() {
        let status = SignatureStatus {
            slot: 1,
            confirmations: Some(0),
            err: None,
            confirmation_status: Some("processed".to_string()),
        };
        assert!(!status.is_confirmed());
    }

    #[test]
    fn envelope_parses_missing_signature_as_none() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":100},"value":[null]}}"#;
        let envelope: RpcEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.result.unwrap().value[0].is_none());
    }

    #[test]
    fn envelope_parses_on_chain_error() {
        let raw = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "context": {"slot": 100},
                "value": [{
                    "slot": 98,
                    "confirmations": null,
                    "err": {"InstructionError": [0, "Custom"]},
                    "confirmationStatus": "finalized"
                }]
            }
        }"#;
        let envelope: RpcEnvelope = serde_json::from_str(raw).unwrap();
        let status = envelope.result.unwrap().value[0].clone().unwrap();
        assert!(status.err.is_some());
        assert!(status.is_confirmed());
    }
}
