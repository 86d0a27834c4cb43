//! Case interpretation: label -> descriptor + fan-out plan

use super::label::{CaseDescriptor, CaseLabel, SubScenario};

/// Which prepayment identifier each cycle carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPattern {
    /// The single known original identifier, repeated
    SameIdentifierForAll,
    /// No prepayment reference at all
    EmptyIdentifierForAll,
    /// A freshly minted identifier per cycle
    UniqueIdentifierPerCycle,
}

impl From<SubScenario> for IdentifierPattern {
    fn from(sub_scenario: SubScenario) -> Self {
        match sub_scenario {
            SubScenario::Happy => IdentifierPattern::SameIdentifierForAll,
            SubScenario::NoPrepayment => IdentifierPattern::EmptyIdentifierForAll,
            SubScenario::DiffPrepayment => IdentifierPattern::UniqueIdentifierPerCycle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutPlan {
    pub cycles: usize,
    pub pattern: IdentifierPattern,
}

#[derive(Debug, Clone)]
pub struct CaseInterpreter {
    max_one_to_many: usize,
}

impl CaseInterpreter {
    pub const MIN_ONE_TO_MANY: usize = 2;

    pub fn new(max_one_to_many: usize) -> Self {
        Self { max_one_to_many }
    }

    /// `amount_count` is the number of known amounts behind the case.
    pub fn interpret(&self, label: &CaseLabel, amount_count: usize) -> (CaseDescriptor, FanoutPlan) {
        let descriptor = CaseDescriptor::decode(label);
        let plan = self.plan(&descriptor, amount_count);
        (descriptor, plan)
    }

    pub fn plan(&self, descriptor: &CaseDescriptor, amount_count: usize) -> FanoutPlan {
        match descriptor {
            CaseDescriptor::OneToMany(scenario) => FanoutPlan {
                cycles: self
                    .max_one_to_many
                    .min(amount_count)
                    .max(Self::MIN_ONE_TO_MANY),
                pattern: scenario.sub_scenario.into(),
            },
            // ManyToOne aggregates many known amounts into one delivery
            CaseDescriptor::OneToOne(scenario) | CaseDescriptor::ManyToOne(scenario) => {
                FanoutPlan {
                    cycles: 1,
                    pattern: scenario.sub_scenario.into(),
                }
            }
            CaseDescriptor::Unrecognized => FanoutPlan {
                cycles: 1,
                pattern: IdentifierPattern::SameIdentifierForAll,
            },
        }
    }
}
