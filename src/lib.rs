//! Prepayment Harness - synthetic test cases for prepayment/delivery flows
//!
//! Builds a population of labelled test cases, creates the prepayments they
//! need, then drives delivery orders against them and reports every outcome.
//!
//! # Modules
//!
//! - [`case`] - Case labels, fan-out planning, amount allocation, processing
//! - [`identifier`] - Persistent pool and collision-free identifier minting
//! - [`template`] - Per-company request templates
//! - [`submission`] - Submitter seam and the HTTP implementation
//! - [`prepayment`] - Prepayment creation and tracking
//! - [`assignment`] - Pairing case labels with tracked prepayments
//! - [`delivery`] - Delivery stage driver
//! - [`export`] - CSV reports and run summary
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing setup

pub mod assignment;
pub mod case;
pub mod config;
pub mod delivery;
pub mod error;
pub mod export;
pub mod identifier;
pub mod logging;
pub mod prepayment;
pub mod submission;
pub mod template;

// Convenient re-exports at crate root
pub use assignment::{DeliveryInput, assign_cases};
pub use case::{
    AmountAllocator, CaseDescriptor, CaseInterpreter, CaseLabel, CaseProcessor,
    CaseRecordSynthesizer, CaseResult, CycleOutcome, KnownCase, KnownRecord,
};
pub use config::AppConfig;
pub use delivery::{DeliveryReport, DeliveryStage};
pub use error::{HarnessError, MintError, StoreError, SubmitError};
pub use identifier::{IdentifierMint, IdentifierStore, JsonFileStore, MemoryStore};
pub use prepayment::{PrepaymentStage, TrackingBook};
pub use submission::{HttpSubmitter, ResponseShape, SubmitReceipt, Submitter};
pub use template::{DeliveryTemplate, DirTemplateProvider, TemplateProvider};
