//! Case synthesis engine
//!
//! # Components
//!
//! - [`label`] - Case labels and the tagged descriptor decode
//! - [`interpreter`] - Fan-out count and identifier reuse per case
//! - [`allocator`] - Per-cycle amounts for under/over delivery
//! - [`processor`] - Runs one case through its submission cycles
//! - [`synthesizer`] - Weighted random case populations

pub mod allocator;
pub mod interpreter;
pub mod label;
pub mod processor;
pub mod synthesizer;

pub use allocator::AmountAllocator;
pub use interpreter::{CaseInterpreter, FanoutPlan, IdentifierPattern};
pub use label::{CaseDescriptor, CaseLabel, Direction, Relationship, Scenario, SubScenario};
pub use processor::{CaseProcessor, CaseResult, CycleOutcome, KnownCase, KnownRecord};
pub use synthesizer::{CaseRecordSynthesizer, CaseRecords};
