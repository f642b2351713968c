//! Rule analyzers
//!
//! One analyzer per rule family. Each reads the shared, lazily built
//! [`Analysis`] of a document and returns its own issue list.

pub mod duplicates;
pub mod extractors;
pub mod hardcoded;
pub mod helpers;
pub mod hostname;
pub mod naming;
pub mod request_naming;
pub mod unused;
pub mod variable_naming;

pub use duplicates::DuplicatesAnalyzer;
pub use extractors::ExtractorStandardsAnalyzer;
pub use hardcoded::HardcodedValuesAnalyzer;
pub use helpers::Helpers;
pub use hostname::HostnameAnalyzer;
pub use naming::NamingAnalyzer;
pub use request_naming::RequestNamingAnalyzer;
pub use unused::{UndefinedVariablesAnalyzer, UnusedVariablesAnalyzer};
pub use variable_naming::VariableNamingAnalyzer;

use crate::diagnostics::Issue;
use crate::engine::Analysis;

pub const NAMING_CONVENTION: &str = "Naming Convention (TXN_NN_Desc)";
pub const REQUEST_NAMING: &str = "HTTP Request Naming (KPI_method_urlPath)";
pub const HOSTNAME_HYGIENE: &str = "Server Name/Domain Hygiene";
pub const EXTRACTOR_STANDARDS: &str = "Extractor Variable Naming Standards";
pub const VARIABLE_NAMING: &str = "Variable Naming Conventions";
pub const HARDCODED_VALUES: &str = "Hardcoded Value Detection";
pub const DUPLICATE_EXTRACTORS: &str = "Duplicate Extractors/Variable Conflicts";
pub const UNEXTRACTED_VARIABLES: &str = "Unextracted Variables Detection";
pub const UNUSED_VARIABLES: &str = "Unused Extractors/Variables Detection";

/// Every rule name this crate knows, in invocation order
pub const ALL_RULES: &[&str] = &[
    NAMING_CONVENTION,
    REQUEST_NAMING,
    HOSTNAME_HYGIENE,
    EXTRACTOR_STANDARDS,
    VARIABLE_NAMING,
    HARDCODED_VALUES,
    DUPLICATE_EXTRACTORS,
    UNEXTRACTED_VARIABLES,
    UNUSED_VARIABLES,
];

/// Pseudo rule name for input errors (missing, unreadable or malformed files)
pub const DOCUMENT_PARSING: &str = "Document Parsing";

/// Trait for analyzers
pub trait Analyzer: Send + Sync {
    /// Exact rule name that enables this analyzer
    fn rule_name(&self) -> &'static str;

    /// Run the checks. Only called when the rule is enabled.
    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue>;

    /// Run the analyzer if its rule is enabled. A disabled rule returns
    /// immediately without touching the document.
    fn analyze(&self, analysis: &Analysis<'_>, enabled: &[String]) -> Vec<Issue> {
        if !enabled.iter().any(|r| r == self.rule_name()) {
            return Vec::new();
        }
        self.check(analysis)
    }
}

/// Settings shared by analyzers
#[derive(Debug, Clone)]
pub struct RuleSettings {
    /// Host whose responses carry test data rather than correlation values
    pub data_domain: String,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            data_domain: crate::config::DEFAULT_DATA_DOMAIN.to_string(),
        }
    }
}

/// All analyzers in invocation order
pub fn all_analyzers(settings: &RuleSettings) -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(NamingAnalyzer),
        Box::new(RequestNamingAnalyzer),
        Box::new(HostnameAnalyzer),
        Box::new(ExtractorStandardsAnalyzer),
        Box::new(VariableNamingAnalyzer::new(&settings.data_domain)),
        Box::new(HardcodedValuesAnalyzer),
        Box::new(DuplicatesAnalyzer),
        Box::new(UndefinedVariablesAnalyzer),
        Box::new(UnusedVariablesAnalyzer),
    ]
}

/// Whether a rule name is one this crate implements
pub fn is_known_rule(name: &str) -> bool {
    ALL_RULES.contains(&name)
}
