pub mod rest;
pub mod signature;

use async_trait::async_trait;
use thiserror::Error;

pub use rest::RestGateway;

/// The gateway's refund status vocabulary, mapped explicitly. Anything the
/// gateway reports outside the documented set lands in `Unknown` and must
/// leave local state untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRefundStatus {
    Processed,
    Pending,
    Failed,
    Unknown(String),
}

impl RemoteRefundStatus {
    pub fn from_remote(label: &str) -> Self {
        match label {
            "processed" => RemoteRefundStatus::Processed,
            "pending" => RemoteRefundStatus::Pending,
            "failed" => RemoteRefundStatus::Failed,
            other => RemoteRefundStatus::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct RefundStatusReport {
    pub status: RemoteRefundStatus,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The payment is still inside the fund-settlement window; the refund
    /// can be retried once settlement completes.
    #[error("payment not yet settled: {0}")]
    SettlementHold(String),

    #[error("gateway rejected the request ({code}): {description}")]
    Rejected { code: String, description: String },

    /// Network-level failure; no definitive answer was received.
    #[error("gateway request failed")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned a malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Transient errors carry no verdict from the gateway; callers must not
    /// transition any local state on them.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::Malformed(_))
    }
}

impl From<GatewayError> for crate::error::AppError {
    fn from(err: GatewayError) -> Self {
        use crate::error::AppError;
        match err {
            GatewayError::SettlementHold(description) => AppError::GatewayRejected(description),
            GatewayError::Rejected { description, .. } => AppError::GatewayRejected(description),
            transient => AppError::GatewayUnavailable(transient.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register an order with the gateway; returns the gateway's order id.
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String, GatewayError>;

    /// Request a refund against a captured payment. `amount_minor = None`
    /// refunds the full captured amount.
    async fn create_refund(
        &self,
        gateway_payment_id: &str,
        amount_minor: Option<i64>,
    ) -> Result<String, GatewayError>;

    async fn fetch_refund_status(
        &self,
        gateway_refund_id: &str,
    ) -> Result<RefundStatusReport, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_vocabulary_maps_explicitly() {
        assert_eq!(
            RemoteRefundStatus::from_remote("processed"),
            RemoteRefundStatus::Processed
        );
        assert_eq!(
            RemoteRefundStatus::from_remote("pending"),
            RemoteRefundStatus::Pending
        );
        assert_eq!(
            RemoteRefundStatus::from_remote("failed"),
            RemoteRefundStatus::Failed
        );
        assert_eq!(
            RemoteRefundStatus::from_remote("initiated"),
            RemoteRefundStatus::Unknown("initiated".to_string())
        );
    }
}
