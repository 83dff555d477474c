use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::db::models::Order;
use crate::verify::{Verification, Verifier};

#[derive(Error, Debug)]
pub enum PaystackError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Paystack API error ({status}): {body}")]
    ApiError { status: u16, body: String },
    #[error("Invalid response from Paystack: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// Response from the /transaction/verify endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: bool,
    pub message: Option<String>,
    pub data: Option<VerifyData>,
}

/// Amounts are in the currency's minor unit (kobo for NGN).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyData {
    pub status: String,
    pub reference: String,
    pub amount: i64,
    pub currency: String,
}

/// HTTP client for the Paystack server-to-server verification API.
#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    base_url: String,
    secret_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl PaystackClient {
    pub fn new(base_url: String, secret_key: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        PaystackClient {
            client,
            base_url,
            secret_key,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Asks Paystack whether the referenced charge cleared. Only the
    /// server-side answer counts; the caller compares amount and currency
    /// against the order on top of this.
    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifyResponse, PaystackError> {
        let url = format!(
            "{}/transaction/verify/{}",
            self.base_url.trim_end_matches('/'),
            reference
        );
        let client = self.client.clone();
        let secret = self.secret_key.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.get(&url).bearer_auth(&secret).send().await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(PaystackError::ApiError {
                        status: status.as_u16(),
                        body,
                    });
                }

                let parsed = response.json::<VerifyResponse>().await?;
                Ok(parsed)
            })
            .await;

        match result {
            Ok(parsed) => Ok(parsed),
            Err(FailsafeError::Rejected) => Err(PaystackError::CircuitBreakerOpen(
                "Paystack API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Card-rail verifier. Rejects on any definitive mismatch; transport
/// failures and provider errors stay indeterminate so the order remains
/// retryable.
pub struct PaystackVerifier {
    client: PaystackClient,
}

impl PaystackVerifier {
    pub fn new(client: PaystackClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Verifier for PaystackVerifier {
    async fn verify(&self, order: &Order) -> Verification {
        let Some(reference) = order.payment_reference.as_deref() else {
            warn!(order_id = %order.id, "no payment reference recorded, cannot verify");
            return Verification::Indeterminate;
        };

        let response = match self.client.verify_transaction(reference).await {
            Ok(response) => response,
            Err(e) => {
                // Not a definitive "payment failed": leave the order
                // retryable rather than reject it.
                warn!(order_id = %order.id, reference, error = %e, "Paystack verification unavailable");
                return Verification::Indeterminate;
            }
        };

        let data = match response.data {
            Some(data) if response.status => data,
            _ => {
                return Verification::rejected(
                    response
                        .message
                        .unwrap_or_else(|| "provider did not report a transaction".to_string()),
                );
            }
        };

        if data.status != "success" {
            return Verification::rejected(format!("provider reports status '{}'", data.status));
        }

        // Paystack reports minor units; the order stores major units.
        let expected_minor = &order.total_price * BigDecimal::from(100);
        if BigDecimal::from(data.amount) != expected_minor {
            return Verification::rejected(format!(
                "amount mismatch: provider says {} minor units, order expects {}",
                data.amount, expected_minor
            ));
        }

        if !data.currency.eq_ignore_ascii_case(&order.currency_used) {
            return Verification::rejected(format!(
                "currency mismatch: provider says {}, order expects {}",
                data.currency, order.currency_used
            ));
        }

        Verification::Verified
    }
}
