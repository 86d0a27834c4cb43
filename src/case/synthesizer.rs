//! Random case population from weight pools
//!
//! Weights are entry counts: a relationship with weight 3 appears three times
//! in its pool and sampling is uniform over the pool.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::label::{CaseLabel, Direction, Relationship, SubScenario};
use crate::config::CaseWeightsConfig;
use crate::error::{HarnessError, SynthesisError};

#[derive(Debug, Clone, Default)]
pub struct CaseRecordSynthesizer {
    relationships: Vec<Relationship>,
    scenarios: Vec<(SubScenario, Direction)>,
}

impl CaseRecordSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(weights: &CaseWeightsConfig) -> Self {
        let mut synth = Self::new();
        synth.add_relationship(Relationship::OneToOne, weights.relationship.one_to_one);
        synth.add_relationship(Relationship::OneToMany, weights.relationship.one_to_many);
        synth.add_relationship(Relationship::ManyToOne, weights.relationship.many_to_one);

        for (direction, table) in [
            (Direction::UnderDelivery, &weights.under_delivery),
            (Direction::OverDelivery, &weights.over_delivery),
        ] {
            synth.add_scenario(SubScenario::Happy, direction, table.happy);
            synth.add_scenario(SubScenario::NoPrepayment, direction, table.no_prepayment);
            synth.add_scenario(SubScenario::DiffPrepayment, direction, table.diff_prepayment);
        }
        synth
    }

    pub fn add_relationship(&mut self, relationship: Relationship, weight: usize) {
        self.relationships
            .extend(std::iter::repeat_n(relationship, weight));
    }

    pub fn add_scenario(&mut self, sub_scenario: SubScenario, direction: Direction, weight: usize) {
        self.scenarios
            .extend(std::iter::repeat_n((sub_scenario, direction), weight));
    }

    /// Exactly `total_cases` labels; duplicates are expected.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        total_cases: usize,
    ) -> Result<Vec<CaseLabel>, SynthesisError> {
        if total_cases == 0 {
            return Ok(Vec::new());
        }
        if self.relationships.is_empty() {
            return Err(SynthesisError::EmptyRelationshipPool);
        }
        if self.scenarios.is_empty() {
            return Err(SynthesisError::EmptyScenarioPool);
        }

        let labels = (0..total_cases)
            .filter_map(|_| {
                let relationship = self.relationships.choose(rng)?;
                let (sub_scenario, direction) = self.scenarios.choose(rng)?;
                Some(CaseLabel::compose(*relationship, *sub_scenario, *direction))
            })
            .collect();
        Ok(labels)
    }
}

/// On-disk shape of the case records file: `{"record":[{"case": "..."}]}`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaseRecords {
    pub record: Vec<CaseRecordEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecordEntry {
    pub case: CaseLabel,
}

impl CaseRecords {
    pub fn from_labels(labels: Vec<CaseLabel>) -> Self {
        Self {
            record: labels
                .into_iter()
                .map(|case| CaseRecordEntry { case })
                .collect(),
        }
    }

    pub fn labels(&self) -> Vec<CaseLabel> {
        self.record.iter().map(|r| r.case.clone()).collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
