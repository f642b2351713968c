//! Variable naming conventions by origin
//!
//! | Origin | Prefix |
//! |---|---|
//! | User-defined variables | `u_` |
//! | CSV data set parameters | `p_` |
//! | Extractors | `c_`, or `p_` when the sampler talks to the data domain |
//!
//! The remainder after the prefix must be lowerCamelCase.

use super::helpers::{Helpers, NameCheck};
use super::{Analyzer, VARIABLE_NAMING};
use crate::context::TreeContext;
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;
use crate::jmeter::{self, HTTP_DOMAIN, HTTP_SAMPLER};
use crate::parser::NodeId;
use crate::variables::{self, placeholders, KIND_CSV, KIND_USER_DEFINED};
use std::collections::{BTreeMap, HashSet};

const USER_PREFIX: &str = "u_";
const PARAMETER_PREFIX: &str = "p_";
const CORRELATION_PREFIX: &str = "c_";

pub struct VariableNamingAnalyzer {
    data_domain: String,
}

impl VariableNamingAnalyzer {
    pub fn new(data_domain: &str) -> Self {
        Self {
            data_domain: data_domain.trim().to_lowercase(),
        }
    }

    /// Whether a sampler's domain, literal or via user-defined variables,
    /// is the data domain. Static only: functions and scripts are not evaluated.
    fn is_data_domain(&self, domain: &str, user_values: &BTreeMap<String, String>) -> bool {
        let mut value = domain.trim().to_string();
        let mut seen = HashSet::new();
        while variables::is_bare_placeholder(&value) {
            let Some(name) = placeholders(&value).next().map(str::to_string) else {
                break;
            };
            if !seen.insert(name.clone()) {
                return false;
            }
            match user_values.get(&name) {
                Some(next) => value = next.trim().to_string(),
                None => return false,
            }
        }
        value.to_lowercase() == self.data_domain
    }
}

impl Analyzer for VariableNamingAnalyzer {
    fn rule_name(&self) -> &'static str {
        VARIABLE_NAMING
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_top_wrapper(VARIABLE_NAMING) {
            return vec![issue];
        }
        let doc = tree.document();

        // First definition wins, mirroring JMeter's evaluation order
        let mut user_values: BTreeMap<String, String> = BTreeMap::new();
        let mut candidates: Vec<(NodeId, String, &'static str, &'static str)> = Vec::new();

        for (id, element) in doc.iter() {
            if let Some(args) = variables::user_variables_node(doc, id) {
                for (name, value, _) in variables::argument_entries(doc, args) {
                    user_values.entry(name.clone()).or_insert(value);
                    candidates.push((id, name, KIND_USER_DEFINED, USER_PREFIX));
                }
            } else if element.name == jmeter::CSV_DATA_SET {
                for name in variables::definitions_at(doc, id).into_iter().map(|d| d.name) {
                    candidates.push((id, name, KIND_CSV, PARAMETER_PREFIX));
                }
            } else if let Some(kind) = jmeter::extractor_kind(&element.name) {
                for name in variables::extractor_names(doc, id, kind) {
                    candidates.push((id, name, kind.kind, CORRELATION_PREFIX));
                }
            }
        }

        candidates
            .into_iter()
            .filter_map(|(id, name, kind, prefix)| {
                let prefix = if prefix == CORRELATION_PREFIX && self.sampler_hits_data_domain(tree, id, &user_values) {
                    PARAMETER_PREFIX
                } else {
                    prefix
                };
                check_name(tree, id, &name, kind, prefix)
            })
            .collect()
    }
}

impl VariableNamingAnalyzer {
    fn sampler_hits_data_domain(
        &self,
        tree: &TreeContext,
        extractor: NodeId,
        user_values: &BTreeMap<String, String>,
    ) -> bool {
        tree.enclosing(extractor, HTTP_SAMPLER)
            .and_then(|sampler| tree.document().prop(sampler, HTTP_DOMAIN))
            .is_some_and(|domain| self.is_data_domain(domain, user_values))
    }
}

fn check_name(tree: &TreeContext, id: NodeId, name: &str, kind: &str, prefix: &str) -> Option<Issue> {
    let (severity, issue_type, description) = match Helpers::check_variable_name(name, prefix) {
        NameCheck::Ok => return None,
        NameCheck::MissingPrefix => (
            Severity::Error,
            "Invalid Variable Prefix",
            format!("{kind} variable '{name}' must start with '{prefix}'"),
        ),
        NameCheck::NotCamelCase => (
            Severity::Warning,
            "Variable Not camelCase",
            format!("{kind} variable '{name}' should be {prefix}lowerCamelCase"),
        ),
    };
    Some(
        Issue::new(
            severity,
            VARIABLE_NAMING,
            issue_type,
            tree.location(id),
            description,
            tree.container_of(id),
        )
        .with_element(tree.display_name(id))
        .with_key(name),
    )
}
