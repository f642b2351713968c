//! Extractor variable naming standards

use super::helpers::{Helpers, NameCheck};
use super::{Analyzer, EXTRACTOR_STANDARDS};
use crate::context::TreeContext;
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;
use crate::jmeter::{self, ExtractorKind, PREFERRED_SCOPE, SCOPE};
use crate::parser::NodeId;
use crate::variables::split_values;

const CORRELATION_PREFIX: &str = "c_";

pub struct ExtractorStandardsAnalyzer;

impl Analyzer for ExtractorStandardsAnalyzer {
    fn rule_name(&self) -> &'static str {
        EXTRACTOR_STANDARDS
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_top_wrapper(EXTRACTOR_STANDARDS) {
            return vec![issue];
        }

        tree.document()
            .iter()
            .filter_map(|(id, e)| jmeter::extractor_kind(&e.name).map(|kind| (id, kind)))
            .flat_map(|(id, kind)| ExtractorCheck::new(tree, id, kind).run())
            .collect()
    }
}

/// All checks for one extractor element
struct ExtractorCheck<'a, 'd> {
    tree: &'a TreeContext<'d>,
    id: NodeId,
    kind: &'static ExtractorKind,
    name: &'d str,
    issues: Vec<Issue>,
}

impl<'a, 'd> ExtractorCheck<'a, 'd> {
    fn new(tree: &'a TreeContext<'d>, id: NodeId, kind: &'static ExtractorKind) -> Self {
        Self {
            tree,
            id,
            kind,
            name: tree.display_name(id),
            issues: Vec::new(),
        }
    }

    fn prop(&self, name: &str) -> &'d str {
        self.tree.document().prop(self.id, name).unwrap_or("")
    }

    fn list(&self, name: &str) -> Vec<String> {
        split_values(self.prop(name), self.kind.separator)
    }

    fn report(&mut self, severity: Severity, issue_type: &str, description: String, key: Option<&str>) {
        let mut issue = Issue::new(
            severity,
            EXTRACTOR_STANDARDS,
            issue_type,
            self.tree.location(self.id),
            description,
            self.tree.container_of(self.id),
        )
        .with_element(self.name);
        if let Some(key) = key {
            issue = issue.with_key(key);
        }
        self.issues.push(issue);
    }

    fn run(mut self) -> Vec<Issue> {
        let names = self.list(self.kind.reference_names);
        let defaults = self.list(self.kind.default_value);
        let match_numbers = self.list(self.kind.match_number);

        if names.iter().all(|n| n.is_empty()) {
            self.report(
                Severity::Error,
                "Missing Reference Name",
                format!("{} '{}' has no reference name", self.kind.kind, self.name),
                None,
            );
        }

        for (i, refname) in names.iter().enumerate().filter(|(_, n)| !n.is_empty()) {
            self.check_reference_name(refname);
            self.check_default(refname, pick(&defaults, i));
            self.check_match_number(refname, pick(&match_numbers, i));
            if !self.name.contains(refname.as_str()) {
                self.report(
                    Severity::Warning,
                    "Extractor Name Mismatch",
                    format!("Extractor name '{}' should contain its variable '{refname}'", self.name),
                    Some(refname),
                );
            }
        }

        self.check_scope();
        if !self.name.starts_with(self.kind.name_prefix) {
            self.report(
                Severity::Warning,
                "Extractor Name Prefix",
                format!("Extractor name '{}' should start with '{}'", self.name, self.kind.name_prefix),
                None,
            );
        }
        self.check_expression(&names);

        self.issues
    }

    fn check_reference_name(&mut self, refname: &str) {
        match Helpers::check_variable_name(refname, CORRELATION_PREFIX) {
            NameCheck::Ok => {}
            NameCheck::MissingPrefix => self.report(
                Severity::Error,
                "Invalid Reference Name Prefix",
                format!("Reference name '{refname}' must start with '{CORRELATION_PREFIX}'"),
                Some(refname),
            ),
            NameCheck::NotCamelCase => self.report(
                Severity::Warning,
                "Reference Name Not camelCase",
                format!("Reference name '{refname}' should be {CORRELATION_PREFIX}lowerCamelCase"),
                Some(refname),
            ),
        }
    }

    /// A failed extraction without a default can leave a stale value from an
    /// earlier iteration, so this is an error rather than a style warning.
    fn check_default(&mut self, refname: &str, default: &str) {
        if default.is_empty() {
            self.report(
                Severity::Error,
                "Missing Default Value",
                format!("'{refname}' has no default value; failed extractions go unnoticed"),
                Some(refname),
            );
        }
    }

    fn check_match_number(&mut self, refname: &str, match_number: &str) {
        match match_number.parse::<i64>() {
            Err(_) => self.report(
                Severity::Error,
                "Invalid Match Number",
                format!("'{refname}' match number '{match_number}' is not an integer"),
                Some(refname),
            ),
            Ok(n) if n > 1 => self.report(
                Severity::Warning,
                "Specific Match Number",
                format!("'{refname}' takes match {n}, which breaks when the response order changes"),
                Some(refname),
            ),
            Ok(_) => {}
        }
    }

    fn check_scope(&mut self) {
        let scope = self.prop(SCOPE).trim();
        if !scope.is_empty() && scope != PREFERRED_SCOPE {
            self.report(
                Severity::Warning,
                "Non-Default Scope",
                format!("Extractor scope is '{scope}'; expected main sample only ('{PREFERRED_SCOPE}')"),
                Some(SCOPE),
            );
        }
    }

    fn check_expression(&mut self, names: &[String]) {
        let expressions: Vec<String> = self
            .kind
            .expression
            .iter()
            .map(|p| self.prop(p).trim().to_string())
            .collect();

        match self.kind.kind {
            "JSONPostProcessor" => {
                let paths = self.list(self.kind.expression[0]);
                for (i, refname) in names.iter().enumerate().filter(|(_, n)| !n.is_empty()) {
                    let path = pick(&paths, i);
                    if path.is_empty() {
                        self.report(
                            Severity::Error,
                            "Missing JSON Path",
                            format!("'{refname}' has no JSON path expression"),
                            Some(refname),
                        );
                    } else if !path.starts_with("$.") {
                        // Unrooted paths are not evaluated against the document root
                        self.report(
                            Severity::Error,
                            "JSON Path Not Rooted",
                            format!("JSON path '{path}' for '{refname}' must start with '$.'"),
                            Some(refname),
                        );
                    }
                }
            }
            "RegexExtractor" => {
                if expressions[0].is_empty() {
                    self.report(
                        Severity::Error,
                        "Missing Regular Expression",
                        "Regular expression is empty".to_string(),
                        None,
                    );
                }
                match expressions[1].as_str() {
                    "" => self.report(
                        Severity::Error,
                        "Missing Template",
                        "Template is empty; nothing is extracted".to_string(),
                        None,
                    ),
                    "$0$" => self.report(
                        Severity::Warning,
                        "Whole Match Template",
                        "Template '$0$' stores the entire match rather than a group".to_string(),
                        None,
                    ),
                    _ => {}
                }
            }
            "XPathExtractor" | "XPath2Extractor" => {
                if expressions[0].is_empty() {
                    self.report(
                        Severity::Error,
                        "Missing XPath Query",
                        "XPath query is empty".to_string(),
                        None,
                    );
                }
            }
            "CssSelectorExtractor" => {
                if expressions[0].is_empty() {
                    self.report(
                        Severity::Error,
                        "Missing CSS Selector",
                        "CSS selector is empty".to_string(),
                        None,
                    );
                }
            }
            "BoundaryExtractor" => {
                if expressions.iter().any(String::is_empty) {
                    self.report(
                        Severity::Error,
                        "Missing Boundary",
                        "Both left and right boundaries must be set".to_string(),
                        None,
                    );
                }
            }
            _ => {}
        }
    }
}

/// Positional value of a multi-valued property, falling back to the first one
fn pick(values: &[String], index: usize) -> &str {
    values
        .get(index)
        .or_else(|| values.first())
        .map(String::as_str)
        .unwrap_or("")
}
