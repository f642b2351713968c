//! Server name / domain hygiene for HTTP samplers

use super::helpers::Helpers;
use super::{Analyzer, HOSTNAME_HYGIENE};
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;
use crate::jmeter::{HTTP_DOMAIN, HTTP_SAMPLER};
use crate::variables::is_bare_placeholder;

/// Classify one host value; the first matching check wins
pub fn classify_host(host: &str) -> Option<(Severity, &'static str, &'static str)> {
    if Helpers::is_malformed_host(host) {
        Some((
            Severity::Error,
            "Malformed Server Name",
            "contains path, query or fragment characters",
        ))
    } else if Helpers::is_ipv4(host) {
        Some((Severity::Warning, "Hardcoded IP Address", "is a hardcoded IP address"))
    } else if Helpers::matches_environment_pattern(host) {
        Some((
            Severity::Error,
            "Environment-Specific Host",
            "points at a specific environment",
        ))
    } else if !is_bare_placeholder(host) {
        Some((
            Severity::Warning,
            "Hardcoded Server Name",
            "is a literal host; use a variable such as ${HOSTNAME}",
        ))
    } else {
        None
    }
}

pub struct HostnameAnalyzer;

impl Analyzer for HostnameAnalyzer {
    fn rule_name(&self) -> &'static str {
        HOSTNAME_HYGIENE
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_top_wrapper(HOSTNAME_HYGIENE) {
            return vec![issue];
        }
        let doc = tree.document();
        let mut issues = Vec::new();

        for (id, _) in doc.iter().filter(|(_, e)| e.name == HTTP_SAMPLER) {
            // Empty means inherited from HTTP Request Defaults
            let Some(host) = doc.prop(id, HTTP_DOMAIN).map(str::trim).filter(|h| !h.is_empty()) else {
                continue;
            };
            let Some((severity, issue_type, reason)) = classify_host(host) else {
                continue;
            };
            issues.push(
                Issue::new(
                    severity,
                    HOSTNAME_HYGIENE,
                    issue_type,
                    tree.location(id),
                    format!("Server name '{host}' {reason}"),
                    tree.container_of(id),
                )
                .with_element(tree.display_name(id))
                .with_key(HTTP_DOMAIN)
                .with_value(host),
            );
        }

        issues
    }
}
