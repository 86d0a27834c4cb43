//! Case assignment
//!
//! Pairs generated case labels with tracked prepayments to form the
//! delivery input. The same JSON shape may also be hand-written and passed
//! to the delivery stage directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::case::{CaseDescriptor, CaseLabel, KnownCase, KnownRecord, Relationship};
use crate::error::HarnessError;
use crate::prepayment::TrackingBook;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyCases {
    #[serde(rename = "Records", default)]
    pub records: Vec<KnownCase>,
}

/// company code -> cases to deliver against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryInput {
    pub companies: BTreeMap<String, CompanyCases>,
}

impl DeliveryInput {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn case_count(&self) -> usize {
        self.companies.values().map(|c| c.records.len()).sum()
    }
}

/// Walk companies and labels in order. Each label takes one tracked
/// prepayment, ManyToOne labels take up to `many_to_one_size`. Stops when
/// either side runs out.
pub fn assign_cases(
    tracking: &TrackingBook,
    labels: &[CaseLabel],
    many_to_one_size: usize,
) -> DeliveryInput {
    let mut input = DeliveryInput::default();
    let mut labels = labels.iter();

    'companies: for (company, tracked) in &tracking.companies {
        let mut remaining = tracked.records.as_slice();
        while !remaining.is_empty() {
            let Some(label) = labels.next() else {
                break 'companies;
            };
            let wanted = match CaseDescriptor::decode(label).relationship() {
                Some(Relationship::ManyToOne) => many_to_one_size.max(1),
                _ => 1,
            };
            let take = wanted.min(remaining.len());
            if take < wanted {
                warn!(company, case = %label, wanted, take, "Not enough prepayments left for case");
            }

            let (used, rest) = remaining.split_at(take);
            remaining = rest;
            let records = used
                .iter()
                .map(|p| KnownRecord {
                    prepayment_id: p.prepayment_id.clone(),
                    amount: p.amount,
                    billing_number: p.billing_number.clone(),
                    so_number: tracked.so_number.clone(),
                })
                .collect();

            input
                .companies
                .entry(company.clone())
                .or_default()
                .records
                .push(KnownCase::new(label.clone(), records));
        }
    }

    let unassigned = labels.count();
    if unassigned > 0 {
        warn!(unassigned, "Ran out of tracked prepayments before labels");
    }
    info!(cases = input.case_count(), "Cases assigned");
    input
}
