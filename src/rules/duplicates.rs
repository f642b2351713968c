//! Duplicate extractors and conflicting variable definitions
//!
//! Container context here is the last controller seen in document order,
//! which is cheap and good enough for grouping duplicates.

use super::{Analyzer, DUPLICATE_EXTRACTORS};
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;
use crate::jmeter::{self, UNASSIGNED_CONTAINER};
use crate::parser::NodeId;
use crate::variables::definitions_at;
use std::collections::{BTreeMap, HashMap};

/// Extractor identity: kind, expression and controller context
type Signature = (&'static str, String, String);

struct Source {
    node: NodeId,
    controller: String,
}

pub struct DuplicatesAnalyzer;

impl Analyzer for DuplicatesAnalyzer {
    fn rule_name(&self) -> &'static str {
        DUPLICATE_EXTRACTORS
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_top_wrapper(DUPLICATE_EXTRACTORS) {
            return vec![issue];
        }
        let doc = tree.document();

        let mut controller = UNASSIGNED_CONTAINER.to_string();
        let mut definitions: BTreeMap<String, Vec<Source>> = BTreeMap::new();
        let mut signatures: HashMap<Signature, Vec<NodeId>> = HashMap::new();

        for (id, element) in doc.iter() {
            let tag = element.name.as_str();

            for def in definitions_at(doc, id).into_iter().filter(|d| !d.implicit) {
                definitions.entry(def.name).or_default().push(Source {
                    node: id,
                    controller: controller.clone(),
                });
            }

            if let Some(kind) = jmeter::extractor_kind(tag) {
                let parts: Vec<&str> = kind
                    .expression
                    .iter()
                    .map(|p| doc.prop(id, p).unwrap_or("").trim())
                    .collect();
                if parts.iter().any(|p| !p.is_empty()) {
                    signatures
                        .entry((kind.kind, parts.join("\u{1f}"), controller.clone()))
                        .or_default()
                        .push(id);
                }
            }

            // A ForEach output belongs to the context around the controller
            if jmeter::is_container(tag) || jmeter::is_logic_controller(tag) {
                controller = tree.display_name(id).to_string();
            }
        }

        let mut issues: Vec<Issue> = definitions
            .iter()
            .filter(|(_, sources)| sources.len() > 1)
            .map(|(name, sources)| {
                let listing: Vec<String> = sources
                    .iter()
                    .map(|s| format!("'{}' in {} ({})", tree.display_name(s.node), s.controller, tree.location(s.node)))
                    .collect();
                let first = &sources[0];
                Issue::new(
                    Severity::Error,
                    DUPLICATE_EXTRACTORS,
                    "Conflicting Variable Definition",
                    tree.location(first.node),
                    format!(
                        "Variable '{name}' is defined {} times: {}",
                        sources.len(),
                        listing.join("; ")
                    ),
                    first.controller.as_str(),
                )
                .with_element(tree.display_name(first.node))
                .with_key(name.as_str())
            })
            .collect();

        let mut shared: Vec<(Signature, Vec<NodeId>)> = signatures
            .into_iter()
            .filter(|(_, nodes)| nodes.len() > 1)
            .collect();
        shared.sort_by_key(|(_, nodes)| nodes[0]);

        for ((kind, _, controller), nodes) in shared {
            let names: Vec<&str> = nodes.iter().map(|&n| tree.display_name(n)).collect();
            issues.push(
                Issue::new(
                    Severity::Warning,
                    DUPLICATE_EXTRACTORS,
                    "Duplicate Extractor",
                    tree.location(nodes[0]),
                    format!(
                        "{} {kind} extractors in '{controller}' use the same expression: {}",
                        nodes.len(),
                        names.join(", ")
                    ),
                    controller.as_str(),
                )
                .with_element(names[0]),
            );
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JmxDocument;

    fn regex(name: &str, refname: &str, pattern: &str, match_number: &str) -> String {
        format!(
            r#"<RegexExtractor testname="{name}">
  <stringProp name="RegexExtractor.refname">{refname}</stringProp>
  <stringProp name="RegexExtractor.regex">{pattern}</stringProp>
  <stringProp name="RegexExtractor.template">$1$</stringProp>
  <stringProp name="RegexExtractor.match_number">{match_number}</stringProp>
</RegexExtractor><hashTree/>"#
        )
    }

    fn txn(name: &str, body: &str) -> String {
        format!(r#"<TransactionController testname="{name}"/><hashTree>{body}</hashTree>"#)
    }

    fn run(body: &str) -> Vec<Issue> {
        let xml = format!(
            r#"<jmeterTestPlan><hashTree><TestPlan testname="Shop"/><hashTree>
<ThreadGroup testname="Users"/><hashTree>{body}</hashTree>
</hashTree></hashTree></jmeterTestPlan>"#
        );
        let doc = JmxDocument::parse_str(&xml).unwrap();
        DuplicatesAnalyzer.check(&Analysis::new(&doc))
    }

    #[test]
    fn test_conflicting_definitions() {
        let body = [
            txn("TXN_01_Login", &regex("REGEXP_c_token", "c_token", "a=(\\w+)", "1")),
            txn("TXN_02_Home", &regex("REGEXP_c_token", "c_token", "b=(\\w+)", "1")),
        ]
        .concat();
        let issues = run(&body);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].key.as_deref(), Some("c_token"));
        assert!(issues[0].description.contains("TXN_01_Login"));
        assert!(issues[0].description.contains("TXN_02_Home"));
    }

    #[test]
    fn test_duplicate_extractor_signature() {
        let body = txn(
            "TXN_01_Login",
            &[
                regex("REGEXP_c_a", "c_a", "id=(\\d+)", "1"),
                regex("REGEXP_c_b", "c_b", "id=(\\d+)", "1"),
            ]
            .concat(),
        );
        let issues = run(&body);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].container, "TXN_01_Login");
        assert!(issues[0].description.contains("REGEXP_c_a, REGEXP_c_b"));
    }

    #[test]
    fn test_same_expression_in_different_controllers_is_fine() {
        let body = [
            txn("TXN_01_Login", &regex("REGEXP_c_a", "c_a", "id=(\\d+)", "1")),
            txn("TXN_02_Home", &regex("REGEXP_c_b", "c_b", "id=(\\d+)", "1")),
        ]
        .concat();
        assert!(run(&body).is_empty());
    }

    #[test]
    fn test_foreach_output_conflicts_with_extractor() {
        let body = [
            regex("REGEXP_c_id", "c_id", "id=(\\d+)", "1"),
            r#"<ForeachController testname="Each Id">
  <stringProp name="ForeachController.inputVal">c_ids</stringProp>
  <stringProp name="ForeachController.returnVal">c_id</stringProp>
</ForeachController><hashTree/>"#
                .to_string(),
        ]
        .concat();
        let issues = run(&body);
        assert_eq!(issues.len(), 1, "{issues:?}");
        assert_eq!(issues[0].issue_type, "Conflicting Variable Definition");
        assert_eq!(issues[0].key.as_deref(), Some("c_id"));
        assert!(issues[0].description.contains("'Each Id' in Users"));
    }

    #[test]
    fn test_implicit_names_do_not_conflict() {
        let body = [
            regex("REGEXP_c_ids", "c_ids", "id=(\\d+)", "-1"),
            r#"<Arguments testname="Vars"><collectionProp name="Arguments.arguments">
<elementProp name="c_ids_1" elementType="Argument">
  <stringProp name="Argument.name">c_ids_1</stringProp>
  <stringProp name="Argument.value">x</stringProp>
</elementProp></collectionProp></Arguments><hashTree/>"#
                .to_string(),
        ]
        .concat();
        assert!(run(&body).is_empty());
    }
}
