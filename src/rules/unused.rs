//! Defined-but-unused and referenced-but-undefined variables
//!
//! Both rules compare the two variable indexes with suffix folding, and both
//! attribute containers through the effective ancestor walk.

use super::{Analyzer, UNEXTRACTED_VARIABLES, UNUSED_VARIABLES};
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;

pub struct UnusedVariablesAnalyzer;

impl Analyzer for UnusedVariablesAnalyzer {
    fn rule_name(&self) -> &'static str {
        UNUSED_VARIABLES
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_top_wrapper(UNUSED_VARIABLES) {
            return vec![issue];
        }
        let referenced = analysis.referenced();

        analysis
            .defined()
            .iter()
            .filter(|(name, _)| !referenced.is_used(name))
            .filter_map(|(name, entries)| {
                // Names registered only on behalf of a "-1" match number are optional
                let entry = entries.iter().find(|e| !e.implicit)?;
                Some(
                    Issue::new(
                        Severity::Info,
                        UNUSED_VARIABLES,
                        "Unused Variable",
                        tree.location(entry.node),
                        format!("{} variable '{name}' is never referenced", entry.kind),
                        entry.container.as_str(),
                    )
                    .with_element(entry.element.as_str())
                    .with_key(name),
                )
            })
            .collect()
    }
}

pub struct UndefinedVariablesAnalyzer;

impl Analyzer for UndefinedVariablesAnalyzer {
    fn rule_name(&self) -> &'static str {
        UNEXTRACTED_VARIABLES
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_top_wrapper(UNEXTRACTED_VARIABLES) {
            return vec![issue];
        }
        let defined = analysis.defined();
        let referenced = analysis.referenced();

        referenced
            .names()
            .filter(|name| !defined.is_defined(name))
            .filter_map(|name| {
                let sites = referenced.sites(name);
                let first = tree.named_owner(*sites.first()?);
                Some(
                    Issue::new(
                        Severity::Error,
                        UNEXTRACTED_VARIABLES,
                        "Undefined Variable",
                        tree.location(first),
                        format!(
                            "Variable '{name}' is referenced {} time(s) but never defined or extracted",
                            sites.len()
                        ),
                        tree.container_of(first),
                    )
                    .with_element(tree.display_name(first))
                    .with_key(name),
                )
            })
            .collect()
    }
}
