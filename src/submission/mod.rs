//! Submission collaborators
//!
//! The case engine only needs "send one payload, get a correlation id back
//! or an error". [`Submitter`] is that seam; [`http::HttpSubmitter`] is the
//! production implementation.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SubmitError;

pub use http::{HttpSubmitter, ResponseShape};

/// What the remote side handed back for one accepted submission
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmitReceipt {
    /// Remote document number, absent when the response omitted it
    pub correlation_id: Option<String>,
    /// Line-level number of the first line, when present
    pub line_correlation_id: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait Submitter: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Submit one payload. Errors are per-call; callers decide whether they
    /// abort anything.
    async fn submit(&self, payload: &Value) -> Result<SubmitReceipt, SubmitError>;
}
