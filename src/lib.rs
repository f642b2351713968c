//! jmx-lint: a convention linter for JMeter test plans
//!
//! This library parses JMX documents, reconstructs the logical nesting that the
//! `hashTree` sibling encoding hides, and runs a set of independent analyzers
//! that report naming, correlation, hardcoded-value and dead-variable issues.

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod jmeter;
pub mod output;
pub mod parser;
pub mod rules;
pub mod variables;

pub use config::{CliOptions, Config, ConfigError};
pub use context::{ModuleResolution, TreeContext, UnresolvedReason};
pub use diagnostics::{Issue, Severity};
pub use engine::{run_validation, Analysis, DocumentReport, ValidationEngine, ValidationStatistics};
pub use parser::{JmxDocument, JmxElement, NodeId, ParseError};
pub use rules::Analyzer;
pub use variables::{DefinedIndex, DefinitionEntry, ReferencedIndex};
