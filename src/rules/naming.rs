//! Transaction naming and step sequencing

use super::helpers::Helpers;
use super::{Analyzer, NAMING_CONVENTION};
use crate::context::{ModuleResolution, TreeContext};
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;
use crate::jmeter::{self, MODULE_CONTROLLER, TRANSACTION_CONTROLLER};
use crate::parser::NodeId;
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Checks `TXN_NN_Desc` names, step order per thread group, and logic
/// controllers that borrow the transaction naming pattern
pub struct NamingAnalyzer;

impl Analyzer for NamingAnalyzer {
    fn rule_name(&self) -> &'static str {
        NAMING_CONVENTION
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_plan_wrapper(NAMING_CONVENTION) {
            return vec![issue];
        }

        let doc = tree.document();
        let mut issues = Vec::new();
        let mut resolutions: HashMap<NodeId, ModuleResolution> = HashMap::new();

        for (id, element) in doc.iter() {
            match element.name.as_str() {
                TRANSACTION_CONTROLLER => issues.extend(check_transaction_name(tree, id)),
                MODULE_CONTROLLER => {
                    let resolution = tree.resolve_module(id);
                    match &resolution {
                        ModuleResolution::Unresolved(reason) => issues.push(
                            Issue::new(
                                reason.severity(),
                                NAMING_CONVENTION,
                                reason.issue_type(),
                                tree.location(id),
                                reason.describe(),
                                tree.container_of(id),
                            )
                            .with_element(tree.display_name(id)),
                        ),
                        ModuleResolution::Resolved { node, .. } => {
                            debug!("Module '{}' -> '{}'", tree.display_name(id), tree.display_name(*node));
                            issues.extend(check_module_target(tree, id, *node));
                        }
                    }
                    resolutions.insert(id, resolution);
                }
                tag if jmeter::is_logic_controller(tag) => issues.extend(check_logic_controller(tree, id)),
                _ => {}
            }
        }

        for group in tree.thread_groups() {
            let mut visited = HashSet::from([group]);
            let mut transactions = Vec::new();
            collect_transactions(tree, &resolutions, group, &mut visited, &mut transactions);
            issues.extend(check_sequence(tree, group, &transactions));
        }

        issues
    }
}

fn check_transaction_name(tree: &TreeContext, id: NodeId) -> Option<Issue> {
    let name = tree.display_name(id).trim();
    if Helpers::transaction_step(name).is_some() {
        return None;
    }

    let (issue_type, description) = if !name.starts_with("TXN_") {
        (
            "Missing TXN_ Prefix",
            format!("Transaction '{name}' must be named TXN_NN_Description"),
        )
    } else {
        (
            "Malformed TXN Name",
            format!("Transaction '{name}' needs a two-digit step and a description (TXN_NN_Description)"),
        )
    };

    Some(
        Issue::new(
            Severity::Error,
            NAMING_CONVENTION,
            issue_type,
            tree.location(id),
            description,
            tree.container_of(id),
        )
        .with_element(name),
    )
}

fn check_logic_controller(tree: &TreeContext, id: NodeId) -> Option<Issue> {
    let name = tree.display_name(id);
    if !Helpers::has_transaction_prefix(name) {
        return None;
    }
    Some(
        Issue::new(
            Severity::Warning,
            NAMING_CONVENTION,
            "Logic Controller Uses TXN Name",
            tree.location(id),
            format!(
                "{} '{name}' is not a transaction; TXN_NN_ names are reserved for transaction controllers",
                tree.document().element(id).name
            ),
            tree.container_of(id),
        )
        .with_element(name),
    )
}

/// A module controller pulling in a logic controller that carries a TXN name
fn check_module_target(tree: &TreeContext, module: NodeId, target: NodeId) -> Option<Issue> {
    if !jmeter::is_logic_controller(&tree.document().element(target).name) {
        return None;
    }
    let mut issue = check_logic_controller(tree, target)?;
    issue.location = tree.location(module);
    issue.container = tree.container_of(module);
    issue.append_note(&format!(
        "Reached through module controller '{}'",
        tree.display_name(module)
    ));
    Some(issue)
}

/// Transactions under `node`, following module controllers into their targets.
/// Nested transactions count toward the same sequence.
fn collect_transactions(
    tree: &TreeContext,
    resolutions: &HashMap<NodeId, ModuleResolution>,
    node: NodeId,
    visited: &mut HashSet<NodeId>,
    out: &mut Vec<NodeId>,
) {
    let doc = tree.document();
    for child in tree.effective_children(node) {
        let next = match doc.element(child).name.as_str() {
            MODULE_CONTROLLER => match resolutions.get(&child).and_then(ModuleResolution::target) {
                Some(target) => target,
                None => continue,
            },
            _ => child,
        };
        if !visited.insert(next) {
            continue;
        }
        if doc.element(next).name == TRANSACTION_CONTROLLER {
            out.push(next);
        }
        collect_transactions(tree, resolutions, next, visited, out);
    }
}

fn check_sequence(tree: &TreeContext, group: NodeId, transactions: &[NodeId]) -> Vec<Issue> {
    let mut steps: Vec<(u32, NodeId)> = transactions
        .iter()
        .filter_map(|&t| Helpers::transaction_step(tree.display_name(t)).map(|s| (s, t)))
        .collect();
    steps.sort_by_key(|&(step, _)| step);

    let container = tree.display_name(group);
    let mut issues = Vec::new();
    let mut first_seen: BTreeMap<u32, NodeId> = BTreeMap::new();

    for &(step, node) in &steps {
        match first_seen.get(&step) {
            Some(&earlier) => issues.push(
                Issue::new(
                    Severity::Error,
                    NAMING_CONVENTION,
                    "Duplicate Step Number",
                    tree.location(node),
                    format!(
                        "Step {step:02} of '{}' is already used by '{}'",
                        tree.display_name(node),
                        tree.display_name(earlier)
                    ),
                    container,
                )
                .with_element(tree.display_name(node)),
            ),
            None => {
                first_seen.insert(step, node);
            }
        }
    }

    let seen: Vec<(u32, NodeId)> = first_seen.into_iter().collect();
    for pair in seen.windows(2) {
        let ((low, before), (high, after)) = (pair[0], pair[1]);
        for missing in low + 1..high {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    NAMING_CONVENTION,
                    "Step Sequence Gap",
                    tree.location(group),
                    format!(
                        "Step {missing:02} is missing between '{}' and '{}'",
                        tree.display_name(before),
                        tree.display_name(after)
                    ),
                    container,
                )
                .with_element(container),
            );
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JmxDocument;

    fn plan(body: &str) -> String {
        format!(
            r#"<jmeterTestPlan><hashTree><TestPlan testname="Shop"/><hashTree>
<ThreadGroup testname="Users"/><hashTree>{body}</hashTree>
</hashTree></hashTree></jmeterTestPlan>"#
        )
    }

    fn txn(name: &str) -> String {
        format!(r#"<TransactionController testname="{name}"/><hashTree/>"#)
    }

    fn run(xml: &str) -> Vec<Issue> {
        let doc = JmxDocument::parse_str(xml).unwrap();
        let analysis = Analysis::new(&doc);
        NamingAnalyzer.check(&analysis)
    }

    #[test]
    fn test_valid_transaction_name() {
        let issues = run(&plan(&txn("TXN_07_CheckoutFlow")));
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_malformed_names_have_distinct_types() {
        let single_digit = run(&plan(&txn("TXN_7_Foo")));
        let no_prefix = run(&plan(&txn("Checkout_Flow")));

        assert_eq!(single_digit.len(), 1);
        assert_eq!(no_prefix.len(), 1);
        assert_eq!(single_digit[0].issue_type, "Malformed TXN Name");
        assert_eq!(no_prefix[0].issue_type, "Missing TXN_ Prefix");
        assert_eq!(no_prefix[0].severity, Severity::Error);
    }

    #[test]
    fn test_duplicate_and_gap() {
        let body = [txn("TXN_01_Login"), txn("TXN_01_Again"), txn("TXN_03_Pay")].concat();
        let issues = run(&plan(&body));

        let duplicates: Vec<&Issue> = issues.iter().filter(|i| i.issue_type == "Duplicate Step Number").collect();
        let gaps: Vec<&Issue> = issues.iter().filter(|i| i.issue_type == "Step Sequence Gap").collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].element.as_deref(), Some("TXN_01_Again"));
        assert!(duplicates[0].description.contains("TXN_01_Login"));
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].description.contains("Step 02"));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_no_gap_before_first_step() {
        let body = [txn("TXN_04_Search"), txn("TXN_05_View")].concat();
        assert!(run(&plan(&body)).is_empty());
    }

    #[test]
    fn test_nested_transactions_join_the_sequence() {
        let body = format!(
            r#"<TransactionController testname="TXN_01_Parent"/><hashTree>{}</hashTree>{}"#,
            txn("TXN_02_Child"),
            txn("TXN_03_Next")
        );
        let issues = run(&plan(&body));
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_sequence_follows_module_controllers() {
        let xml = r#"<jmeterTestPlan><hashTree><TestPlan testname="Shop"/><hashTree>
<ThreadGroup testname="Users"/><hashTree>
  <TransactionController testname="TXN_01_Login"/><hashTree/>
  <ModuleController testname="Search">
    <collectionProp name="ModuleController.node_path">
      <stringProp name="1">Test Plan</stringProp>
      <stringProp name="2">Shop</stringProp>
      <stringProp name="3">Lib</stringProp>
      <stringProp name="4">TXN_04_Search</stringProp>
    </collectionProp>
  </ModuleController><hashTree/>
</hashTree>
<TestFragmentController testname="Lib"/><hashTree>
  <TransactionController testname="TXN_04_Search"/><hashTree/>
</hashTree>
</hashTree></hashTree></jmeterTestPlan>"#;
        let issues = run(xml);
        let gaps: Vec<&Issue> = issues.iter().filter(|i| i.container == "Users").collect();
        assert_eq!(gaps.len(), 2, "{issues:?}");
        assert!(gaps.iter().all(|i| i.issue_type == "Step Sequence Gap"));
    }

    #[test]
    fn test_module_cycle_terminates() {
        let xml = r#"<jmeterTestPlan><hashTree><TestPlan testname="Shop"/><hashTree>
<ThreadGroup testname="Users"/><hashTree>
  <GenericController testname="Loop Body"/><hashTree>
    <ModuleController testname="Again">
      <collectionProp name="ModuleController.node_path">
        <stringProp name="1">Users</stringProp>
        <stringProp name="2">Loop Body</stringProp>
      </collectionProp>
    </ModuleController><hashTree/>
    <TransactionController testname="TXN_01_Step"/><hashTree/>
  </hashTree>
</hashTree>
</hashTree></hashTree></jmeterTestPlan>"#;
        assert!(run(xml).is_empty());
    }

    #[test]
    fn test_unresolved_module_is_reported() {
        let xml = plan(
            r#"<ModuleController testname="Broken">
  <collectionProp name="ModuleController.node_path">
    <stringProp name="1">Test Plan</stringProp>
    <stringProp name="2">Shop</stringProp>
    <stringProp name="3">Nowhere</stringProp>
  </collectionProp>
</ModuleController><hashTree/>
<ModuleController testname="Empty"/><hashTree/>"#,
        );
        let issues = run(&xml);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue_type, "Module Target Not Found");
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].description.contains("Nowhere"));
        assert_eq!(issues[1].issue_type, "Module Path Not Defined");
        assert_eq!(issues[1].severity, Severity::Warning);
    }

    #[test]
    fn test_logic_controller_with_txn_name() {
        let xml = plan(r#"<LoopController testname="TXN_02_Loop"/><hashTree/>"#);
        let issues = run(&xml);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, "Logic Controller Uses TXN Name");
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_module_target_logic_controller_is_flagged_at_module() {
        let xml = r#"<jmeterTestPlan><hashTree><TestPlan testname="Shop"/><hashTree>
<ThreadGroup testname="Users"/><hashTree>
  <ModuleController testname="Reuse">
    <collectionProp name="ModuleController.node_path">
      <stringProp name="1">Lib</stringProp>
      <stringProp name="2">TXN_09_Wrapped</stringProp>
    </collectionProp>
  </ModuleController><hashTree/>
</hashTree>
<TestFragmentController testname="Lib"/><hashTree>
  <IfController testname="TXN_09_Wrapped"/><hashTree/>
</hashTree>
</hashTree></hashTree></jmeterTestPlan>"#;
        let issues = run(xml);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.issue_type == "Logic Controller Uses TXN Name"));
        assert!(issues.iter().any(|i| i.description.contains("module controller 'Reuse'")));
    }

    #[test]
    fn test_missing_plan_wrapper_is_structural() {
        let issues = run("<jmeterTestPlan/>");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, "Malformed Test Plan");
    }
}
