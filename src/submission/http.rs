//! HTTP submitter for the order-management endpoints
//!
//! Posts JSON with basic auth. Response fields differ per endpoint, so the
//! extraction is picked with [`ResponseShape`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{SubmitReceipt, Submitter};
use crate::config::EndpointConfig;
use crate::error::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `TransactionOrderNumber` + `LineDetails[0].TransactionOrderItem`
    Delivery,
    /// `SO_Number__c`; line id left empty
    Prepayment,
}

impl ResponseShape {
    pub fn receipt(&self, raw: Value) -> SubmitReceipt {
        let (correlation_id, line_correlation_id) = match self {
            ResponseShape::Delivery => (
                text_field(&raw, "TransactionOrderNumber"),
                raw.get("LineDetails")
                    .and_then(|lines| lines.get(0))
                    .and_then(|line| text_field(line, "TransactionOrderItem")),
            ),
            ResponseShape::Prepayment => (text_field(&raw, "SO_Number__c"), None),
        };
        SubmitReceipt {
            correlation_id,
            line_correlation_id,
            raw,
        }
    }
}

/// Non-empty string or number field rendered as text
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct HttpSubmitter {
    name: &'static str,
    client: reqwest::Client,
    endpoint: EndpointConfig,
    shape: ResponseShape,
    headers: Vec<(&'static str, String)>,
}

impl HttpSubmitter {
    pub fn new(
        name: &'static str,
        endpoint: EndpointConfig,
        shape: ResponseShape,
    ) -> Result<Self, SubmitError> {
        if endpoint.url.is_empty() || endpoint.username.is_empty() || endpoint.password.is_empty() {
            return Err(SubmitError::Transport(format!(
                "Missing endpoint configuration for {}",
                name
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(|e| SubmitError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        info!("Initializing {} submitter at {}", name, endpoint.url);

        Ok(Self {
            name,
            client,
            endpoint,
            shape,
            headers: Vec::new(),
        })
    }

    /// Extra static header sent with every request
    pub fn with_header(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((key, value.into()));
        self
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn submit(&self, payload: &Value) -> Result<SubmitReceipt, SubmitError> {
        let mut request = self
            .client
            .post(&self.endpoint.url)
            .basic_auth(&self.endpoint.username, Some(&self.endpoint.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload);
        for (key, value) in &self.headers {
            request = request.header(*key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| SubmitError::Decode(e.to_string()))?;
        debug!(target: "payload", submitter = self.name, response = %raw, "Response received");

        Ok(self.shape.receipt(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delivery_receipt_extraction() {
        let receipt = ResponseShape::Delivery.receipt(json!({
            "TransactionOrderNumber": "4500001234",
            "LineDetails": [{"TransactionOrderItem": "10"}, {"TransactionOrderItem": "20"}]
        }));
        assert_eq!(receipt.correlation_id.as_deref(), Some("4500001234"));
        assert_eq!(receipt.line_correlation_id.as_deref(), Some("10"));
    }

    #[test]
    fn test_delivery_receipt_without_numbers() {
        let receipt = ResponseShape::Delivery.receipt(json!({
            "TransactionOrderNumber": "",
            "LineDetails": []
        }));
        assert_eq!(receipt.correlation_id, None);
        assert_eq!(receipt.line_correlation_id, None);
    }

    #[test]
    fn test_prepayment_receipt_extraction() {
        let receipt = ResponseShape::Prepayment.receipt(json!({
            "SO_Number__c": 1200003456u64,
            "Status_Description__c": "Created with billing number 1SA5000078"
        }));
        assert_eq!(receipt.correlation_id.as_deref(), Some("1200003456"));
        assert_eq!(receipt.line_correlation_id, None);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let endpoint = EndpointConfig {
            url: "http://localhost:1/x".to_string(),
            username: String::new(),
            password: "p".to_string(),
            timeout_secs: 1,
        };
        assert!(HttpSubmitter::new("delivery", endpoint, ResponseShape::Delivery).is_err());
    }
}
