//! Case processing
//!
//! One case runs as a strict sequential pipeline:
//!
//! ```text
//! Resolve Identifiers -> Resolve Amounts -> Submit Cycle[0..n] -> Aggregate
//! ```
//!
//! Cycles never overlap: later cycles may depend on what the remote side
//! recorded for earlier ones. A failed cycle is recorded and the case moves
//! on, so a result always has exactly one outcome per planned cycle.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::allocator::AmountAllocator;
use super::interpreter::{CaseInterpreter, FanoutPlan, IdentifierPattern};
use super::label::{CaseDescriptor, CaseLabel, Relationship};
use crate::error::MintError;
use crate::identifier::{IdentifierMint, IdentifierStore};
use crate::submission::Submitter;
use crate::template::DeliveryTemplate;

/// One known (original) prepayment behind a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownRecord {
    #[serde(rename = "PrepaymentRequestnumber", default)]
    pub prepayment_id: String,
    #[serde(rename = "Amount")]
    pub amount: Decimal,
    #[serde(rename = "BillingNumber", default)]
    pub billing_number: String,
    #[serde(rename = "SoNumber", default)]
    pub so_number: String,
}

/// A case label together with the known prepayments it exercises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownCase {
    pub case: CaseLabel,
    #[serde(default)]
    pub record: Vec<KnownRecord>,
}

impl KnownCase {
    pub fn new(case: CaseLabel, record: Vec<KnownRecord>) -> Self {
        Self { case, record }
    }

    pub fn total(&self) -> Decimal {
        self.record.iter().map(|r| r.amount).sum()
    }

    /// Distinct prepayment ids in first-seen order
    pub fn unique_prepayment_ids(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for record in &self.record {
            if !seen.contains(&record.prepayment_id.as_str()) {
                seen.push(record.prepayment_id.as_str());
            }
        }
        seen
    }
}

/// Outcome of one submission cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CycleOutcome {
    Correlated {
        order_number: String,
        line_item: Option<String>,
    },
    /// Accepted, but the response carried no correlation id
    NoCorrelationId,
    Failed { reason: String },
}

impl CycleOutcome {
    pub const NO_CORRELATION_MARKER: &'static str = "NO_TRANSACTION_NUMBER";
    pub const FAILURE_MARKER: &'static str = "ERROR";

    pub fn is_correlated(&self) -> bool {
        matches!(self, CycleOutcome::Correlated { .. })
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Correlated { order_number, .. } => f.write_str(order_number),
            CycleOutcome::NoCorrelationId => f.write_str(Self::NO_CORRELATION_MARKER),
            CycleOutcome::Failed { .. } => f.write_str(Self::FAILURE_MARKER),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub test_id: String,
    pub prepayment_id: String,
    pub amount: Decimal,
    pub outcome: CycleOutcome,
    #[serde(skip)]
    pub payload: Value,
}

/// Immutable outcome of a processed case
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub company: String,
    pub known: KnownCase,
    pub descriptor: CaseDescriptor,
    pub cycle_count: usize,
    pub amounts: Vec<Decimal>,
    pub identifiers: Vec<String>,
    pub cycles: Vec<CycleResult>,
}

impl CaseResult {
    pub fn success_count(&self) -> usize {
        self.cycles.iter().filter(|c| c.outcome.is_correlated()).count()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &CycleOutcome> {
        self.cycles.iter().map(|c| &c.outcome)
    }

    /// Multiplicity reported next to the scenario: cycles for OneToMany,
    /// distinct prepayments for ManyToOne.
    pub fn multiplicity(&self) -> Option<usize> {
        match self.descriptor.relationship() {
            Some(Relationship::OneToMany) => Some(self.cycles.len()),
            Some(Relationship::ManyToOne) => Some(self.known.unique_prepayment_ids().len()),
            _ => None,
        }
    }
}

pub struct CaseProcessor<'a> {
    interpreter: CaseInterpreter,
    allocator: AmountAllocator,
    submitter: &'a dyn Submitter,
    identifier_length: usize,
    cycle_delay: Duration,
}

impl<'a> CaseProcessor<'a> {
    pub fn new(
        interpreter: CaseInterpreter,
        allocator: AmountAllocator,
        submitter: &'a dyn Submitter,
        identifier_length: usize,
    ) -> Self {
        Self {
            interpreter,
            allocator,
            submitter,
            identifier_length,
            cycle_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive cycles to respect downstream rate limits
    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    /// Run every cycle of `known` in order.
    ///
    /// Only a pool persistence failure is an error: past that point
    /// identifier uniqueness is no longer guaranteed.
    pub async fn process<S, R>(
        &self,
        company: &str,
        known: &KnownCase,
        template: &DeliveryTemplate,
        mint: &mut IdentifierMint<S>,
        rng: &mut R,
    ) -> Result<CaseResult, MintError>
    where
        S: IdentifierStore,
        R: Rng + ?Sized,
    {
        let (descriptor, plan) = self.interpreter.interpret(&known.case, known.record.len());
        info!(
            case = %known.case,
            scenario = descriptor.scenario_name(),
            case_type = %descriptor.case_type(),
            cycles = plan.cycles,
            "Processing case"
        );

        let identifiers = self.resolve_identifiers(&plan, known, mint, rng)?;
        let amounts = self
            .allocator
            .allocate(rng, &descriptor, known.total(), plan.cycles);
        info!(case = %known.case, amounts = %join(&amounts), "Allocated amounts");

        let mut cycles = Vec::with_capacity(plan.cycles);
        for index in 0..plan.cycles {
            if index > 0 && !self.cycle_delay.is_zero() {
                tokio::time::sleep(self.cycle_delay).await;
            }

            let prepayment_id = identifiers[index].clone();
            let amount = amounts.get(index).copied().unwrap_or(Decimal::ONE);
            let test_id = test_id(&descriptor, &prepayment_id, index);
            let payload = template.render(&prepayment_id, &test_id, amount);
            debug!(target: "payload", %test_id, %payload, "Rendered cycle");

            let outcome = self.submit_cycle(&test_id, &payload).await;
            cycles.push(CycleResult {
                test_id,
                prepayment_id,
                amount,
                outcome,
                payload,
            });
        }

        let result = CaseResult {
            company: company.to_string(),
            known: known.clone(),
            descriptor,
            cycle_count: plan.cycles,
            amounts,
            identifiers,
            cycles,
        };
        info!(
            case = %known.case,
            outcomes = %result.outcomes().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            "Case complete"
        );
        Ok(result)
    }

    fn resolve_identifiers<S, R>(
        &self,
        plan: &FanoutPlan,
        known: &KnownCase,
        mint: &mut IdentifierMint<S>,
        rng: &mut R,
    ) -> Result<Vec<String>, MintError>
    where
        S: IdentifierStore,
        R: Rng + ?Sized,
    {
        match plan.pattern {
            IdentifierPattern::SameIdentifierForAll => {
                let original = known
                    .unique_prepayment_ids()
                    .first()
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                Ok(vec![original; plan.cycles])
            }
            IdentifierPattern::EmptyIdentifierForAll => Ok(vec![String::new(); plan.cycles]),
            IdentifierPattern::UniqueIdentifierPerCycle => (0..plan.cycles)
                .map(|_| mint.mint(rng, self.identifier_length))
                .collect(),
        }
    }

    async fn submit_cycle(&self, test_id: &str, payload: &Value) -> CycleOutcome {
        match self.submitter.submit(payload).await {
            Ok(receipt) => match receipt.correlation_id {
                Some(order_number) => {
                    info!(test_id, %order_number, "Cycle submitted");
                    CycleOutcome::Correlated {
                        order_number,
                        line_item: receipt.line_correlation_id,
                    }
                }
                None => {
                    warn!(test_id, "Cycle accepted without correlation id");
                    CycleOutcome::NoCorrelationId
                }
            },
            Err(e) => {
                error!(test_id, submitter = self.submitter.name(), "Cycle failed: {}", e);
                CycleOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Test id stamped on a cycle's payload
fn test_id(descriptor: &CaseDescriptor, prepayment_id: &str, index: usize) -> String {
    let n = index + 1;
    match descriptor.relationship() {
        Some(Relationship::ManyToOne) if prepayment_id.is_empty() => "Delvr_ManyToOne".to_string(),
        Some(Relationship::ManyToOne) => format!("Delvr_{}", prepayment_id),
        Some(Relationship::OneToMany) if prepayment_id.is_empty() => format!("Delvr_OneToMany_{}", n),
        Some(Relationship::OneToMany) => format!("Delvr_{}_{}", prepayment_id, n),
        _ if prepayment_id.is_empty() => format!("Delvr_OneToOne_{}", n),
        _ => format!("Delvr_{}", prepayment_id),
    }
}

pub(crate) fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
