//! HTTP sampler naming: `KPI_<METHOD>_<cleaned path>`

use super::{Analyzer, REQUEST_NAMING};
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;
use crate::jmeter::{HTTP_METHOD, HTTP_PATH, HTTP_SAMPLER};
use once_cell::sync::Lazy;
use regex::Regex;

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{[^}]*\}").unwrap());
static FUNCTION_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"__\w+\([^)]*\)__").unwrap());

const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
const UNKNOWN_PATH: &str = "UNKNOWN_PATH";

/// Path portion of a sampler name
pub fn clean_path(path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = match path.find(&['?', '#'][..]) {
        Some(end) => &path[..end],
        None => path,
    };
    let path = path.strip_suffix('/').unwrap_or(path);
    let path = VARIABLE.replace_all(path, "_VAR_");
    FUNCTION_CALL.replace_all(&path, "_FUNC_").into_owned()
}

/// Name a sampler with this method and path should carry
pub fn expected_name(method: Option<&str>, path: Option<&str>) -> String {
    let method = method
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| UNKNOWN_METHOD.to_string());
    let path = path
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(clean_path)
        .unwrap_or_else(|| UNKNOWN_PATH.to_string());
    format!("KPI_{method}_{path}")
}

pub struct RequestNamingAnalyzer;

impl Analyzer for RequestNamingAnalyzer {
    fn rule_name(&self) -> &'static str {
        REQUEST_NAMING
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_plan_wrapper(REQUEST_NAMING) {
            return vec![issue];
        }
        let doc = tree.document();

        doc.iter()
            .filter(|(_, e)| e.name == HTTP_SAMPLER)
            .filter(|&(id, _)| tree.thread_group_of(id).is_some())
            .filter_map(|(id, element)| {
                let expected = expected_name(doc.prop(id, HTTP_METHOD), doc.prop(id, HTTP_PATH));
                let actual = element.display_name().map(str::trim).filter(|n| !n.is_empty());

                let (issue_type, description) = match actual {
                    Some(name) if name == expected => return None,
                    Some(name) => (
                        "Request Name Mismatch",
                        format!("HTTP request '{name}' should be named '{expected}'"),
                    ),
                    None => (
                        "Missing Request Name",
                        format!("HTTP request has no name; expected '{expected}'"),
                    ),
                };

                Some(
                    Issue::new(
                        Severity::Error,
                        REQUEST_NAMING,
                        issue_type,
                        tree.location(id),
                        description,
                        tree.container_of(id),
                    )
                    .with_element_opt(actual)
                    .with_value(expected),
                )
            })
            .collect()
    }
}
