//! Error types
//!
//! One enum per concern; [`HarnessError`] gathers them for callers that
//! span several stages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Identifier pool IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Identifier pool is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MintError {
    #[error("Identifier length must be positive")]
    ZeroLength,

    #[error("Failed to persist minted identifier: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template file not found for company code: {0}")]
    NotFound(String),

    #[error("Failed to read template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Template for {company} is not valid JSON: {source}")]
    Parse {
        company: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Template for {company} is missing {field}")]
    MissingField { company: String, field: &'static str },
}

#[derive(Debug, Error, Clone)]
pub enum SubmitError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Relationship weight pool is empty")]
    EmptyRelationshipPool,

    #[error("Scenario weight pool is empty")]
    EmptyScenarioPool,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identifier store error: {0}")]
    Store(#[from] StoreError),

    #[error("Mint error: {0}")]
    Mint(#[from] MintError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
