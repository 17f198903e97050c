//! Settlement Rail Integration
//!
//! The settlement rail is the external system of record for fund movement.
//! Calls are keyed by the escrow reference. The provider may deduplicate on
//! that key, but the coordinator never relies on it and keeps its own guard.
//!
//! Rail calls are not wrapped in a cancelling timeout here: a cancelled call
//! whose effect landed would diverge from the ledger. Transport timeouts are
//! reported as `Ambiguous` and flagged for reconciliation instead.

use crate::config::SettlementRailConfig;
use crate::error::{RailError, RailResult};
use async_trait::async_trait;
use meal_core::{EscrowId, SettlementOperation, SettlementReference};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Settlement rail contract
#[async_trait]
pub trait SettlementRail: Send + Sync {
    /// Take custody of `amount` from the payer for the payee
    async fn lock(
        &self,
        reference: &EscrowId,
        payer_ref: &str,
        payee_ref: &str,
        amount: Decimal,
    ) -> RailResult<SettlementReference>;

    /// Pay the held funds out to the payee
    async fn release(&self, reference: &EscrowId) -> RailResult<SettlementReference>;

    /// Return the held funds to the payer
    async fn refund(&self, reference: &EscrowId) -> RailResult<SettlementReference>;
}

// ============================================================
// HTTP rail
// ============================================================

#[derive(Debug, Serialize)]
struct LockRequest<'a> {
    reference: &'a str,
    payer_ref: &'a str,
    payee_ref: &'a str,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct MovementResponse {
    tx_ref: String,
    #[serde(default)]
    block_ref: Option<String>,
}

/// JSON-over-HTTP settlement rail client
pub struct HttpSettlementRail {
    client: Client,
    config: SettlementRailConfig,
}

impl HttpSettlementRail {
    /// Create a new rail client
    pub fn new(config: SettlementRailConfig) -> RailResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RailError::rejected(format!("client build failed: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        reference: &EscrowId,
        body: &B,
    ) -> RailResult<SettlementReference> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        debug!(url = %url, reference = %reference, "Settlement rail call");

        let mut request = self
            .client
            .post(&url)
            .header("Idempotency-Key", reference.as_str())
            .json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("HTTP {} - {}", status, body);
            // A gateway or server fault may have applied the movement
            return Err(if status.is_server_error() {
                RailError::ambiguous(message)
            } else {
                RailError::rejected(message)
            });
        }

        let movement: MovementResponse = response
            .json()
            .await
            .map_err(|e| RailError::ambiguous(format!("unreadable response: {}", e)))?;

        Ok(SettlementReference {
            tx_ref: movement.tx_ref,
            block_ref: movement.block_ref,
        })
    }
}

fn classify_transport(err: reqwest::Error) -> RailError {
    if err.is_connect() || err.is_builder() {
        // Never reached the rail
        RailError::rejected(err.to_string())
    } else {
        RailError::ambiguous(err.to_string())
    }
}

#[async_trait]
impl SettlementRail for HttpSettlementRail {
    async fn lock(
        &self,
        reference: &EscrowId,
        payer_ref: &str,
        payee_ref: &str,
        amount: Decimal,
    ) -> RailResult<SettlementReference> {
        let body = LockRequest {
            reference: reference.as_str(),
            payer_ref,
            payee_ref,
            amount,
        };
        self.post("/escrows", reference, &body).await
    }

    async fn release(&self, reference: &EscrowId) -> RailResult<SettlementReference> {
        let path = format!("/escrows/{}/release", reference);
        self.post(&path, reference, &serde_json::json!({})).await
    }

    async fn refund(&self, reference: &EscrowId) -> RailResult<SettlementReference> {
        let path = format!("/escrows/{}/refund", reference);
        self.post(&path, reference, &serde_json::json!({})).await
    }
}

// ============================================================
// Mock rail
// ============================================================

#[derive(Default)]
struct MockRailState {
    calls: HashMap<(SettlementOperation, EscrowId), u32>,
    failures: HashMap<SettlementOperation, VecDeque<RailError>>,
    next_tx: u64,
    next_block: u64,
}

/// Mock settlement rail for testing
///
/// Counts calls per operation and reference, and can be scripted to fail.
#[derive(Default)]
pub struct MockSettlementRail {
    state: Mutex<MockRailState>,
    latency: Option<Duration>,
}

impl MockSettlementRail {
    /// Create a new mock rail
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to widen race windows in tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next call of `operation` fail with `error`
    pub async fn fail_next(&self, operation: SettlementOperation, error: RailError) {
        self.state
            .lock()
            .await
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of calls of `operation` for `reference`
    pub async fn calls(&self, operation: SettlementOperation, reference: &EscrowId) -> u32 {
        self.state
            .lock()
            .await
            .calls
            .get(&(operation, reference.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of calls of `operation` across all references
    pub async fn total_calls(&self, operation: SettlementOperation) -> u32 {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|((op, _), _)| *op == operation)
            .map(|(_, count)| *count)
            .sum()
    }

    async fn movement(
        &self,
        operation: SettlementOperation,
        reference: &EscrowId,
        with_block: bool,
    ) -> RailResult<SettlementReference> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        *state
            .calls
            .entry((operation, reference.clone()))
            .or_insert(0) += 1;

        if let Some(error) = state
            .failures
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        state.next_tx += 1;
        let tx_ref = format!("0x{:064x}", state.next_tx);
        let block_ref = if with_block {
            state.next_block += 1;
            Some(state.next_block.to_string())
        } else {
            None
        };

        debug!(
            operation = %operation,
            reference = %reference,
            tx_ref = %tx_ref,
            "Mock rail movement"
        );

        Ok(SettlementReference { tx_ref, block_ref })
    }
}

#[async_trait]
impl SettlementRail for MockSettlementRail {
    async fn lock(
        &self,
        reference: &EscrowId,
        _payer_ref: &str,
        _payee_ref: &str,
        _amount: Decimal,
    ) -> RailResult<SettlementReference> {
        self.movement(SettlementOperation::Lock, reference, false).await
    }

    async fn release(&self, reference: &EscrowId) -> RailResult<SettlementReference> {
        self.movement(SettlementOperation::Release, reference, true).await
    }

    async fn refund(&self, reference: &EscrowId) -> RailResult<SettlementReference> {
        self.movement(SettlementOperation::Refund, reference, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meal_core::RailFailureKind;

    #[tokio::test]
    async fn test_mock_rail_counts_calls() {
        let rail = MockSettlementRail::new();
        let reference = EscrowId::new("esc:1");

        let lock = rail
            .lock(&reference, "payer", "payee", Decimal::new(100, 0))
            .await
            .unwrap();
        assert_eq!(lock.tx_ref.len(), 66);
        assert!(lock.block_ref.is_none());

        let release = rail.release(&reference).await.unwrap();
        assert!(release.block_ref.is_some());

        assert_eq!(rail.calls(SettlementOperation::Lock, &reference).await, 1);
        assert_eq!(rail.calls(SettlementOperation::Release, &reference).await, 1);
        assert_eq!(rail.total_calls(SettlementOperation::Refund).await, 0);
    }

    #[tokio::test]
    async fn test_mock_rail_scripted_failure_is_consumed() {
        let rail = MockSettlementRail::new();
        let reference = EscrowId::new("esc:1");
        rail.fail_next(SettlementOperation::Release, RailError::ambiguous("timeout"))
            .await;

        let err = rail.release(&reference).await.unwrap_err();
        assert_eq!(err.kind, RailFailureKind::Ambiguous);
        assert!(rail.release(&reference).await.is_ok());
        assert_eq!(rail.calls(SettlementOperation::Release, &reference).await, 2);
    }

    #[test]
    fn test_http_rail_builds() {
        let rail = HttpSettlementRail::new(SettlementRailConfig::default());
        assert!(rail.is_ok());
    }
}
