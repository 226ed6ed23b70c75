//! Payment gateway integration via REST API (no SDK dependency).

use std::time::Duration;

use serde_json::json;

use super::{GatewayError, PaymentGateway, RefundStatusReport, RemoteRefundStatus};
use crate::config::GatewayConfig;

/// Structured error reasons the gateway documents for refunds that arrive
/// before the payment has settled. Description pattern-matching is only the
/// fallback when the reason field is absent.
const SETTLEMENT_HOLD_REASONS: [&str; 2] = ["payment_not_settled", "settlement_in_progress"];

pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RestGateway {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    async fn parse_or_reject(
        &self,
        resp: reqwest::Response,
    ) -> Result<serde_json::Value, GatewayError> {
        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;
        if status.is_success() {
            return Ok(body);
        }
        Err(classify_rejection(&body))
    }
}

fn classify_rejection(body: &serde_json::Value) -> GatewayError {
    let error = &body["error"];
    let code = error["code"].as_str().unwrap_or("UNKNOWN").to_string();
    let description = error["description"]
        .as_str()
        .unwrap_or("no description provided")
        .to_string();
    let reason = error["reason"].as_str();

    let is_hold = match reason {
        Some(r) => SETTLEMENT_HOLD_REASONS.contains(&r),
        None => description.to_lowercase().contains("settle"),
    };

    if is_hold {
        GatewayError::SettlementHold(description)
    } else {
        GatewayError::Rejected { code, description }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RestGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<String, GatewayError> {
        let resp = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await?;

        let body = self.parse_or_reject(resp).await?;
        body["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| GatewayError::Malformed(format!("order create response: {body}")))
    }

    async fn create_refund(
        &self,
        gateway_payment_id: &str,
        amount_minor: Option<i64>,
    ) -> Result<String, GatewayError> {
        let mut payload = json!({});
        if let Some(amount) = amount_minor {
            payload["amount"] = json!(amount);
        }

        let resp = self
            .http
            .post(format!(
                "{}/payments/{gateway_payment_id}/refund",
                self.base_url
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&payload)
            .send()
            .await?;

        let body = self.parse_or_reject(resp).await?;
        body["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| GatewayError::Malformed(format!("refund create response: {body}")))
    }

    async fn fetch_refund_status(
        &self,
        gateway_refund_id: &str,
    ) -> Result<RefundStatusReport, GatewayError> {
        let resp = self
            .http
            .get(format!("{}/refunds/{gateway_refund_id}", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        let body = self.parse_or_reject(resp).await?;
        let label = body["status"]
            .as_str()
            .ok_or_else(|| GatewayError::Malformed(format!("refund status response: {body}")))?;

        Ok(RefundStatusReport {
            status: RemoteRefundStatus::from_remote(label),
            failure_reason: body["failure_reason"].as_str().map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_reason_takes_precedence() {
        let err = classify_rejection(&json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "refund is not possible right now",
                "reason": "payment_not_settled",
            }
        }));
        assert!(matches!(err, GatewayError::SettlementHold(_)));
    }

    #[test]
    fn description_pattern_is_only_a_fallback() {
        // Reason present and not a hold: description wording is ignored.
        let err = classify_rejection(&json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "amount exceeds the settled amount",
                "reason": "amount_exceeds_captured",
            }
        }));
        assert!(matches!(err, GatewayError::Rejected { .. }));

        // No reason field: fall back to matching the description.
        let err = classify_rejection(&json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Payment has not settled yet",
            }
        }));
        assert!(matches!(err, GatewayError::SettlementHold(_)));
    }

    #[test]
    fn other_rejections_carry_code_and_description() {
        let err = classify_rejection(&json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "payment already fully refunded",
                "reason": "payment_fully_refunded",
            }
        }));
        match err {
            GatewayError::Rejected { code, description } => {
                assert_eq!(code, "BAD_REQUEST_ERROR");
                assert_eq!(description, "payment already fully refunded");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }
}
