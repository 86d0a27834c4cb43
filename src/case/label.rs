//! Case labels and their structured decode
//!
//! A label is `Relationship-SubScenario-Direction` or `Relationship-Direction`
//! (sub-scenario defaults to `Happy`). Decoding never fails: anything that
//! does not name a relationship and a direction becomes
//! [`CaseDescriptor::Unrecognized`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, immutable case label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseLabel(String);

impl CaseLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn compose(relationship: Relationship, sub_scenario: SubScenario, direction: Direction) -> Self {
        Self(format!("{}-{}-{}", relationship, sub_scenario, direction))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Cardinality between prepayments and deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    OneToOne,
    OneToMany,
    ManyToOne,
}

impl Relationship {
    pub const ALL: [Relationship; 3] = [
        Relationship::OneToOne,
        Relationship::OneToMany,
        Relationship::ManyToOne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::OneToOne => "OneToOne",
            Relationship::OneToMany => "OneToMany",
            Relationship::ManyToOne => "ManyToOne",
        }
    }
}

/// Controls how prepayment identifiers are reused across cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubScenario {
    Happy,
    NoPrepayment,
    DiffPrepayment,
}

impl SubScenario {
    pub const ALL: [SubScenario; 3] = [
        SubScenario::Happy,
        SubScenario::NoPrepayment,
        SubScenario::DiffPrepayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubScenario::Happy => "Happy",
            SubScenario::NoPrepayment => "NoPrepayment",
            SubScenario::DiffPrepayment => "DiffPrepayment",
        }
    }
}

/// Whether delivered amounts fall below or above the known total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    UnderDelivery,
    OverDelivery,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::UnderDelivery => "UnderDelivery",
            Direction::OverDelivery => "OverDelivery",
        }
    }
}

macro_rules! keyword_impls {
    ($ty:ty, [$($variant:expr),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($variant.as_str()) {
                        return Ok($variant);
                    }
                )+
                Err(())
            }
        }
    };
}

keyword_impls!(Relationship, [Relationship::OneToOne, Relationship::OneToMany, Relationship::ManyToOne]);
keyword_impls!(SubScenario, [SubScenario::Happy, SubScenario::NoPrepayment, SubScenario::DiffPrepayment]);
keyword_impls!(Direction, [Direction::UnderDelivery, Direction::OverDelivery]);

/// Sub-scenario and direction of a recognized case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scenario {
    pub sub_scenario: SubScenario,
    pub direction: Direction,
}

impl Scenario {
    pub fn new(sub_scenario: SubScenario, direction: Direction) -> Self {
        Self {
            sub_scenario,
            direction,
        }
    }
}

/// Structured decode of a [`CaseLabel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseDescriptor {
    OneToOne(Scenario),
    OneToMany(Scenario),
    ManyToOne(Scenario),
    /// Fallback: single cycle, original identifier, amount preserved
    Unrecognized,
}

impl CaseDescriptor {
    pub fn new(relationship: Relationship, scenario: Scenario) -> Self {
        match relationship {
            Relationship::OneToOne => CaseDescriptor::OneToOne(scenario),
            Relationship::OneToMany => CaseDescriptor::OneToMany(scenario),
            Relationship::ManyToOne => CaseDescriptor::ManyToOne(scenario),
        }
    }

    /// Lenient decode. The first segment names the relationship; later
    /// segments are matched against sub-scenario and direction keywords in
    /// any order, first match wins, unknown segments are skipped.
    pub fn decode(label: &CaseLabel) -> Self {
        let mut segments = label.as_str().split('-');

        let Some(relationship) = segments.next().and_then(|s| s.parse::<Relationship>().ok())
        else {
            return CaseDescriptor::Unrecognized;
        };

        let mut sub_scenario = None;
        let mut direction = None;
        for segment in segments {
            if sub_scenario.is_none() {
                if let Ok(parsed) = segment.parse::<SubScenario>() {
                    sub_scenario = Some(parsed);
                    continue;
                }
            }
            if direction.is_none() {
                if let Ok(parsed) = segment.parse::<Direction>() {
                    direction = Some(parsed);
                }
            }
        }

        match direction {
            Some(direction) => Self::new(
                relationship,
                Scenario::new(sub_scenario.unwrap_or(SubScenario::Happy), direction),
            ),
            None => CaseDescriptor::Unrecognized,
        }
    }

    pub fn relationship(&self) -> Option<Relationship> {
        match self {
            CaseDescriptor::OneToOne(_) => Some(Relationship::OneToOne),
            CaseDescriptor::OneToMany(_) => Some(Relationship::OneToMany),
            CaseDescriptor::ManyToOne(_) => Some(Relationship::ManyToOne),
            CaseDescriptor::Unrecognized => None,
        }
    }

    pub fn scenario(&self) -> Option<Scenario> {
        match self {
            CaseDescriptor::OneToOne(s)
            | CaseDescriptor::OneToMany(s)
            | CaseDescriptor::ManyToOne(s) => Some(*s),
            CaseDescriptor::Unrecognized => None,
        }
    }

    /// Name used in reports for the scenario column
    pub fn scenario_name(&self) -> &'static str {
        self.relationship()
            .map(|r| r.as_str())
            .unwrap_or(Relationship::OneToOne.as_str())
    }

    /// `Direction-SubScenario`, the "assigned case" column of reports
    pub fn case_type(&self) -> String {
        match self.scenario() {
            Some(s) => format!("{}-{}", s.direction, s.sub_scenario),
            None => "Unrecognized".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(label: &str) -> CaseDescriptor {
        CaseDescriptor::decode(&CaseLabel::new(label))
    }

    #[test]
    fn test_decode_full_label() {
        assert_eq!(
            decode("OneToMany-Happy-OverDelivery"),
            CaseDescriptor::OneToMany(Scenario::new(SubScenario::Happy, Direction::OverDelivery))
        );
        assert_eq!(
            decode("ManyToOne-DiffPrepayment-UnderDelivery"),
            CaseDescriptor::ManyToOne(Scenario::new(
                SubScenario::DiffPrepayment,
                Direction::UnderDelivery
            ))
        );
    }

    #[test]
    fn test_decode_default_sub_scenario() {
        assert_eq!(
            decode("OneToOne-UnderDelivery"),
            CaseDescriptor::OneToOne(Scenario::new(SubScenario::Happy, Direction::UnderDelivery))
        );
    }

    #[test]
    fn test_decode_is_order_agnostic_and_skips_noise() {
        assert_eq!(
            decode("OneToOne-OverDelivery-extra-NoPrepayment"),
            CaseDescriptor::OneToOne(Scenario::new(
                SubScenario::NoPrepayment,
                Direction::OverDelivery
            ))
        );
    }

    #[test]
    fn test_decode_case_insensitive() {
        assert_eq!(
            decode("onetomany-happy-underdelivery"),
            CaseDescriptor::OneToMany(Scenario::new(SubScenario::Happy, Direction::UnderDelivery))
        );
    }

    #[test]
    fn test_decode_fallbacks() {
        assert_eq!(decode(""), CaseDescriptor::Unrecognized);
        assert_eq!(decode("SomeToSome-Happy-OverDelivery"), CaseDescriptor::Unrecognized);
        assert_eq!(decode("OneToOne-Happy"), CaseDescriptor::Unrecognized);
        assert_eq!(decode("---"), CaseDescriptor::Unrecognized);
    }

    #[test]
    fn test_compose_round_trips_through_decode() {
        let label = CaseLabel::compose(
            Relationship::ManyToOne,
            SubScenario::NoPrepayment,
            Direction::OverDelivery,
        );
        assert_eq!(label.as_str(), "ManyToOne-NoPrepayment-OverDelivery");
        assert_eq!(decode(label.as_str()).relationship(), Some(Relationship::ManyToOne));
    }

    #[test]
    fn test_case_type_column() {
        assert_eq!(decode("OneToOne-Happy-UnderDelivery").case_type(), "UnderDelivery-Happy");
        assert_eq!(decode("nonsense").case_type(), "Unrecognized");
        assert_eq!(decode("nonsense").scenario_name(), "OneToOne");
    }
}
