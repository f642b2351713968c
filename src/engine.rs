//! Validation engine - orchestrates analyzers over parsed documents

use crate::config::Config;
use crate::context::TreeContext;
use crate::diagnostics::{Issue, Severity};
use crate::jmeter::UNASSIGNED_CONTAINER;
use crate::parser::{JmxDocument, ParseError};
use crate::rules::{self, Analyzer, RuleSettings, DOCUMENT_PARSING};
use crate::variables::{DefinedIndex, ReferencedIndex};
use log::{debug, warn};
use once_cell::unsync::OnceCell;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Per-document derived data, built on first use and shared by every analyzer
/// of one run. Nothing is computed until an analyzer asks for it.
pub struct Analysis<'d> {
    doc: &'d JmxDocument,
    tree: OnceCell<TreeContext<'d>>,
    defined: OnceCell<DefinedIndex>,
    referenced: OnceCell<ReferencedIndex>,
}

impl<'d> Analysis<'d> {
    pub fn new(doc: &'d JmxDocument) -> Self {
        Self {
            doc,
            tree: OnceCell::new(),
            defined: OnceCell::new(),
            referenced: OnceCell::new(),
        }
    }

    pub fn document(&self) -> &'d JmxDocument {
        self.doc
    }

    pub fn tree(&self) -> &TreeContext<'d> {
        self.tree.get_or_init(|| TreeContext::build(self.doc))
    }

    pub fn defined(&self) -> &DefinedIndex {
        self.defined.get_or_init(|| DefinedIndex::build(self.tree()))
    }

    pub fn referenced(&self) -> &ReferencedIndex {
        self.referenced.get_or_init(|| ReferencedIndex::build(self.doc))
    }
}

/// Statistics about validation results
#[derive(Debug, Default, Clone)]
pub struct ValidationStatistics {
    /// Count per rule name
    pub per_rule: HashMap<String, usize>,
    /// Count per severity
    pub per_severity: HashMap<Severity, usize>,
    /// Total documents validated
    pub files_validated: usize,
    /// Documents with at least one ERROR
    pub files_with_errors: usize,
}

impl ValidationStatistics {
    pub fn record(&mut self, issue: &Issue) {
        *self.per_rule.entry(issue.rule.clone()).or_insert(0) += 1;
        *self.per_severity.entry(issue.severity).or_insert(0) += 1;
    }

    /// Record every issue of a document report
    pub fn record_report(&mut self, report: &DocumentReport) {
        self.files_validated += 1;
        if report.has_errors() {
            self.files_with_errors += 1;
        }
        for issue in &report.issues {
            self.record(issue);
        }
    }

    pub fn merge(&mut self, other: &ValidationStatistics) {
        for (rule, count) in &other.per_rule {
            *self.per_rule.entry(rule.clone()).or_insert(0) += count;
        }
        for (severity, count) in &other.per_severity {
            *self.per_severity.entry(*severity).or_insert(0) += count;
        }
        self.files_validated += other.files_validated;
        self.files_with_errors += other.files_with_errors;
    }

    pub fn error_count(&self) -> usize {
        *self.per_severity.get(&Severity::Error).unwrap_or(&0)
    }

    pub fn warning_count(&self) -> usize {
        *self.per_severity.get(&Severity::Warning).unwrap_or(&0)
    }

    pub fn info_count(&self) -> usize {
        *self.per_severity.get(&Severity::Info).unwrap_or(&0)
    }
}

/// Collects analyzer output for one document in invocation order.
/// No deduplication, no sorting.
#[derive(Debug, Default)]
pub struct IssueAggregator {
    issues: Vec<Issue>,
}

impl IssueAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, issues: Vec<Issue>) {
        self.issues.extend(issues);
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

/// Everything the reporter needs for one document
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub issues: Vec<Issue>,
    /// Rules enabled for this run, for labeling rules that were not run
    pub enabled_rules: Vec<String>,
}

impl DocumentReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

/// The main validation engine
pub struct ValidationEngine {
    analyzers: Vec<Box<dyn Analyzer>>,
    config: Config,
}

impl ValidationEngine {
    pub fn new(config: Config) -> Self {
        let settings = RuleSettings {
            data_domain: config.data_domain.clone(),
        };
        Self {
            analyzers: rules::all_analyzers(&settings),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every enabled analyzer against an already-parsed document
    pub fn validate_document(&self, doc: &JmxDocument, enabled: &[String]) -> Vec<Issue> {
        let analysis = Analysis::new(doc);
        let mut aggregator = IssueAggregator::new();
        for analyzer in &self.analyzers {
            let issues = analyzer.analyze(&analysis, enabled);
            if !issues.is_empty() {
                debug!("{}: {} issue(s)", analyzer.rule_name(), issues.len());
            }
            aggregator.extend(issues);
        }
        aggregator.into_issues()
    }

    /// Parse and validate one file. A parse failure becomes a single issue and
    /// no analyzer runs.
    pub fn validate_file(&self, path: &Path, enabled: &[String]) -> Vec<Issue> {
        debug!("Validating {}", path.display());
        match JmxDocument::parse_file(path) {
            Ok(doc) => self.validate_document(&doc, enabled),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                vec![parse_failure_issue(path, &e)]
            }
        }
    }

    /// Validate several files. Reports come back in input order.
    pub fn run(&self, paths: &[PathBuf], enabled: &[String]) -> Vec<DocumentReport> {
        let validate = |path: &PathBuf| DocumentReport {
            path: path.clone(),
            issues: self.validate_file(path, enabled),
            enabled_rules: enabled.to_vec(),
        };

        match self.config.jobs {
            0 => paths.par_iter().map(validate).collect(),
            1 => paths.iter().map(validate).collect(),
            n => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => pool.install(|| paths.par_iter().map(validate).collect()),
                Err(e) => {
                    warn!("Falling back to the global thread pool: {}", e);
                    paths.par_iter().map(validate).collect()
                }
            },
        }
    }
}

/// Synthetic issue standing in for a document that could not be loaded
pub fn parse_failure_issue(path: &Path, error: &ParseError) -> Issue {
    let issue_type = match error {
        ParseError::NotFound(_) => "File Not Found",
        ParseError::ReadFile(_) => "Unreadable File",
        ParseError::ParseXml(_) => "Malformed XML",
    };
    Issue::new(
        Severity::Error,
        DOCUMENT_PARSING,
        issue_type,
        path.display().to_string(),
        error.to_string(),
        UNASSIGNED_CONTAINER,
    )
}

/// Validate documents with the default configuration, keyed by path
pub fn run_validation(paths: &[PathBuf], enabled: &[String]) -> BTreeMap<PathBuf, Vec<Issue>> {
    ValidationEngine::new(Config::default())
        .run(paths, enabled)
        .into_iter()
        .map(|report| (report.path, report.issues))
        .collect()
}
