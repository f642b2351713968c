//! Defined- and referenced-variable indexes
//!
//! Both indexes are plain snapshots built by one full traversal each. Suffix
//! folding (`name_3`, `name_matchNr` -> `name`) is applied only when the two are
//! compared, never while populating them.

use crate::context::TreeContext;
use crate::jmeter::{self, ExtractorKind};
use crate::parser::{JmxDocument, NodeId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// `${name}` placeholder with a plain identifier inside
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}").unwrap());

/// Indexed or match-count variant of an extractor variable
static SUFFIX_FAMILY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)_(?:\d+|matchNr)$").unwrap());

static SCRIPT_PUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"vars\.put(?:Object)?\(\s*["']([^"']+)["']"#).unwrap());
static SCRIPT_GET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"vars\.get(?:Object)?\(\s*["']([^"']+)["']"#).unwrap());

/// Variables JMeter provides on its own
const BUILTIN_VARIABLES: &[&str] = &[
    "JMeterThread.last_sample_ok",
    "JMeterThread.pack",
    "START.MS",
    "START.YMD",
    "START.HMS",
    "TESTSTART.MS",
];

pub const KIND_USER_DEFINED: &str = "User-Defined Variable";
pub const KIND_CSV: &str = "CSV Data Set Config";
pub const KIND_COUNTER: &str = "Counter";
pub const KIND_RANDOM: &str = "Random Variable";
pub const KIND_FOREACH: &str = "ForEach Controller";
pub const KIND_SCRIPT: &str = "Script";

/// `base` for `base_<digits>` or `base_matchNr`, otherwise `None`
pub fn fold_suffix(name: &str) -> Option<&str> {
    SUFFIX_FAMILY
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Inner identifiers of every `${...}` placeholder in `text`
pub fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

/// True when `value` is exactly one `${identifier}` placeholder
pub fn is_bare_placeholder(value: &str) -> bool {
    let value = value.trim();
    PLACEHOLDER
        .find(value)
        .is_some_and(|m| m.start() == 0 && m.end() == value.len())
}

/// One variable declared by an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub kind: &'static str,
    /// Registered on behalf of a "-1" match number (`_1`, `_matchNr`)
    pub implicit: bool,
}

impl Definition {
    fn explicit(name: &str, kind: &'static str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            implicit: false,
        }
    }
}

/// A user-defined argument entry: (name, value, element id)
pub fn argument_entries(doc: &JmxDocument, arguments: NodeId) -> Vec<(String, String, NodeId)> {
    let Some(list) = doc.collection_prop(arguments, jmeter::ARGUMENT_LIST) else {
        return Vec::new();
    };
    doc.children_named(list, "elementProp")
        .filter_map(|entry| {
            let name = doc.prop(entry, jmeter::ARGUMENT_NAME)?.trim();
            if name.is_empty() {
                return None;
            }
            let value = doc.prop(entry, jmeter::ARGUMENT_VALUE).unwrap_or("");
            Some((name.to_string(), value.to_string(), entry))
        })
        .collect()
}

/// Argument-list node holding user-defined variables for `id`, if it has one
pub fn user_variables_node(doc: &JmxDocument, id: NodeId) -> Option<NodeId> {
    match doc.element(id).name.as_str() {
        jmeter::ARGUMENTS => Some(id),
        jmeter::TEST_PLAN => doc.element_prop(id, jmeter::PLAN_VARIABLES),
        _ => None,
    }
}

/// Reference names of an extractor, split per kind
pub fn extractor_names(doc: &JmxDocument, id: NodeId, kind: &ExtractorKind) -> Vec<String> {
    split_values(doc.prop(id, kind.reference_names).unwrap_or(""), kind.separator)
        .into_iter()
        .filter(|n| !n.is_empty())
        .collect()
}

/// Split a possibly multi-valued property, trimming each value
pub fn split_values(raw: &str, separator: Option<char>) -> Vec<String> {
    match separator {
        Some(sep) => raw.split(sep).map(|s| s.trim().to_string()).collect(),
        None => vec![raw.trim().to_string()],
    }
}

/// Variables declared by a single element, dispatched on its tag
pub fn definitions_at(doc: &JmxDocument, id: NodeId) -> Vec<Definition> {
    let element = doc.element(id);
    let tag = element.name.as_str();

    if let Some(kind) = jmeter::extractor_kind(tag) {
        let names = extractor_names(doc, id, kind);
        let match_numbers = split_values(doc.prop(id, kind.match_number).unwrap_or(""), kind.separator);
        let mut out = Vec::new();
        for (i, name) in names.iter().enumerate() {
            out.push(Definition::explicit(name, kind.kind));
            let match_number = match_numbers
                .get(i)
                .or_else(|| match_numbers.first())
                .map(String::as_str)
                .unwrap_or("");
            if match_number == "-1" {
                for suffix in ["_1", "_matchNr"] {
                    out.push(Definition {
                        name: format!("{name}{suffix}"),
                        kind: kind.kind,
                        implicit: true,
                    });
                }
            }
        }
        return out;
    }

    if let Some(args) = user_variables_node(doc, id) {
        return argument_entries(doc, args)
            .into_iter()
            .map(|(name, _, _)| Definition::explicit(&name, KIND_USER_DEFINED))
            .collect();
    }

    let single = |prop: &str, kind: &'static str| -> Vec<Definition> {
        doc.prop(id, prop)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| vec![Definition::explicit(n, kind)])
            .unwrap_or_default()
    };

    match tag {
        jmeter::CSV_DATA_SET => split_values(doc.prop(id, jmeter::CSV_VARIABLE_NAMES).unwrap_or(""), Some(','))
            .iter()
            .filter(|n| !n.is_empty())
            .map(|n| Definition::explicit(n, KIND_CSV))
            .collect(),
        jmeter::COUNTER => single(jmeter::COUNTER_NAME, KIND_COUNTER),
        jmeter::RANDOM_VARIABLE => single(jmeter::RANDOM_VARIABLE_NAME, KIND_RANDOM),
        jmeter::FOREACH_CONTROLLER => single(jmeter::FOREACH_OUTPUT, KIND_FOREACH),
        _ if jmeter::SCRIPT_ELEMENTS.contains(&tag) => script_text(doc, id)
            .into_iter()
            .flat_map(|text| SCRIPT_PUT.captures_iter(text))
            .filter_map(|c| c.get(1))
            .map(|m| Definition::explicit(m.as_str(), KIND_SCRIPT))
            .collect(),
        _ => Vec::new(),
    }
}

fn script_text<'a>(doc: &'a JmxDocument, id: NodeId) -> Vec<&'a str> {
    jmeter::SCRIPT_PROPS
        .iter()
        .filter_map(|p| doc.prop(id, p))
        .collect()
}

/// A variable definition with its reporting context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionEntry {
    pub name: String,
    pub kind: &'static str,
    /// Display name of the defining element
    pub element: String,
    /// Enclosing logical container, from the true ancestor walk
    pub container: String,
    pub node: NodeId,
    pub implicit: bool,
}

/// Variable name -> every element that defines it
#[derive(Debug, Default)]
pub struct DefinedIndex {
    entries: BTreeMap<String, Vec<DefinitionEntry>>,
}

impl DefinedIndex {
    pub fn build(tree: &TreeContext) -> Self {
        let doc = tree.document();
        let mut entries: BTreeMap<String, Vec<DefinitionEntry>> = BTreeMap::new();

        for (id, _) in doc.iter() {
            for def in definitions_at(doc, id) {
                entries.entry(def.name.clone()).or_default().push(DefinitionEntry {
                    name: def.name,
                    kind: def.kind,
                    element: tree.display_name(id).to_string(),
                    container: tree.container_of(id),
                    node: id,
                    implicit: def.implicit,
                });
            }
        }

        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&[DefinitionEntry]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether a referenced name is covered, folding `_N` / `_matchNr` suffixes
    pub fn is_defined(&self, referenced: &str) -> bool {
        self.contains(referenced) || fold_suffix(referenced).is_some_and(|base| self.contains(base))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DefinitionEntry])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Variable name -> every element whose text or attributes reference it
#[derive(Debug, Default)]
pub struct ReferencedIndex {
    refs: BTreeMap<String, Vec<NodeId>>,
}

impl ReferencedIndex {
    pub fn build(doc: &JmxDocument) -> Self {
        let mut refs: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let mut record = |name: &str, id: NodeId| {
            if name.starts_with("__") || BUILTIN_VARIABLES.contains(&name) {
                return;
            }
            refs.entry(name.to_string()).or_default().push(id);
        };

        for (id, element) in doc.iter() {
            let mut attributes: Vec<(&String, &String)> = element.attributes.iter().collect();
            attributes.sort();
            for (_, value) in attributes {
                for name in placeholders(value) {
                    record(name, id);
                }
            }
            // Raw bodies are plain `Argument.value` text and are covered here too
            if let Some(text) = element.text.as_deref() {
                for name in placeholders(text) {
                    record(name, id);
                }
            }

            match element.name.as_str() {
                jmeter::FOREACH_CONTROLLER => {
                    if let Some(input) = doc.prop(id, jmeter::FOREACH_INPUT).map(str::trim) {
                        if !input.is_empty() && !input.contains("${") {
                            record(input, id);
                        }
                    }
                }
                tag if jmeter::SCRIPT_ELEMENTS.contains(&tag) => {
                    for text in script_text(doc, id) {
                        for caps in SCRIPT_GET.captures_iter(text) {
                            if let Some(m) = caps.get(1) {
                                record(m.as_str(), id);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        Self { refs }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.refs.contains_key(name)
    }

    /// Number of references to exactly `name`
    pub fn count(&self, name: &str) -> usize {
        self.refs.get(name).map_or(0, Vec::len)
    }

    /// Elements referencing exactly `name`, in document order
    pub fn sites(&self, name: &str) -> &[NodeId] {
        self.refs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a defined name is used, either exactly or via a suffixed variant
    pub fn is_used(&self, defined: &str) -> bool {
        self.contains(defined) || self.refs.keys().any(|r| fold_suffix(r) == Some(defined))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.refs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<jmeterTestPlan><hashTree><TestPlan testname="Plan"/><hashTree>
<ThreadGroup testname="Users"/><hashTree>{body}</hashTree>
</hashTree></hashTree></jmeterTestPlan>"#
        )
    }

    #[test]
    fn test_fold_suffix() {
        assert_eq!(fold_suffix("c_orderId_matchNr"), Some("c_orderId"));
        assert_eq!(fold_suffix("c_orderId_12"), Some("c_orderId"));
        assert_eq!(fold_suffix("c_orderId"), None);
        assert_eq!(fold_suffix("c_order_idx"), None);
    }

    #[test]
    fn test_placeholders_and_bare() {
        let found: Vec<&str> = placeholders("/users/${id}/x/${ c_name }?${__time()}").collect();
        assert_eq!(found, vec!["id", "c_name"]);
        assert!(is_bare_placeholder("${HOSTNAME}"));
        assert!(!is_bare_placeholder("api.${HOSTNAME}"));
        assert!(!is_bare_placeholder("${__P(host)}"));
    }

    #[test]
    fn test_defined_index_kinds() {
        let xml = wrap(
            r#"
<Arguments testname="User Defined Variables">
  <collectionProp name="Arguments.arguments">
    <elementProp name="u_host" elementType="Argument">
      <stringProp name="Argument.name">u_host</stringProp>
      <stringProp name="Argument.value">shop.example.com</stringProp>
    </elementProp>
  </collectionProp>
</Arguments>
<hashTree/>
<CSVDataSet testname="Users CSV"><stringProp name="variableNames">p_user, p_pass</stringProp></CSVDataSet>
<hashTree/>
<CounterConfig testname="Counter"><stringProp name="CounterConfig.name">u_counter</stringProp></CounterConfig>
<hashTree/>
<JSONPostProcessor testname="JSON_c_a_c_b">
  <stringProp name="JSONPostProcessor.referenceNames">c_a;c_b</stringProp>
  <stringProp name="JSONPostProcessor.match_numbers">1;-1</stringProp>
</JSONPostProcessor>
<hashTree/>"#,
        );
        let doc = JmxDocument::parse_str(&xml).unwrap();
        let tree = TreeContext::build(&doc);
        let index = DefinedIndex::build(&tree);

        assert_eq!(index.get("u_host").unwrap()[0].kind, KIND_USER_DEFINED);
        assert_eq!(index.get("p_pass").unwrap()[0].kind, KIND_CSV);
        assert_eq!(index.get("u_counter").unwrap()[0].kind, KIND_COUNTER);
        assert_eq!(index.get("c_a").unwrap()[0].container, "Users");
        assert!(!index.contains("c_a_matchNr"));
        assert!(index.get("c_b_matchNr").unwrap()[0].implicit);
        assert!(index.contains("c_b_1"));
    }

    #[test]
    fn test_http_arguments_are_not_definitions() {
        let xml = wrap(
            r#"
<HTTPSamplerProxy testname="KPI_POST_login">
  <elementProp name="HTTPsampler.Arguments" elementType="Arguments">
    <collectionProp name="Arguments.arguments">
      <elementProp name="user" elementType="HTTPArgument">
        <stringProp name="Argument.name">user</stringProp>
        <stringProp name="Argument.value">${p_user}</stringProp>
      </elementProp>
    </collectionProp>
  </elementProp>
</HTTPSamplerProxy>
<hashTree/>"#,
        );
        let doc = JmxDocument::parse_str(&xml).unwrap();
        let tree = TreeContext::build(&doc);
        assert!(DefinedIndex::build(&tree).is_empty());
        assert_eq!(ReferencedIndex::build(&doc).count("p_user"), 1);
    }

    #[test]
    fn test_referenced_index_counts_and_folding() {
        let xml = wrap(
            r#"
<HTTPSamplerProxy testname="KPI_GET_orders/_VAR_">
  <stringProp name="HTTPSampler.path">/orders/${c_orderId}</stringProp>
  <stringProp name="HTTPSampler.domain">${u_host}</stringProp>
</HTTPSamplerProxy>
<hashTree/>
<IfController testname="has orders">
  <stringProp name="IfController.condition">${c_orderId_matchNr} &gt; 0 &amp;&amp; "${JMeterThread.last_sample_ok}"</stringProp>
</IfController>
<hashTree/>"#,
        );
        let doc = JmxDocument::parse_str(&xml).unwrap();
        let refs = ReferencedIndex::build(&doc);

        assert_eq!(refs.count("c_orderId"), 1);
        assert!(refs.contains("c_orderId_matchNr"));
        assert!(refs.is_used("c_orderId"));
        assert!(!refs.contains("JMeterThread.last_sample_ok"));
        assert!(!refs.is_used("c_other"));
    }

    #[test]
    fn test_random_variable_definition() {
        let xml = wrap(
            r#"
<TransactionController testname="TXN_01_Browse"/>
<hashTree>
  <RandomVariableConfig testname="Pick Item">
    <stringProp name="variableName">itemIndex</stringProp>
    <stringProp name="minimumValue">1</stringProp>
    <stringProp name="maximumValue">20</stringProp>
  </RandomVariableConfig>
  <hashTree/>
  <HTTPSamplerProxy testname="KPI_GET_items/_VAR_">
    <stringProp name="HTTPSampler.path">/items/${itemIndex}</stringProp>
  </HTTPSamplerProxy>
  <hashTree/>
</hashTree>"#,
        );
        let doc = JmxDocument::parse_str(&xml).unwrap();
        let tree = TreeContext::build(&doc);
        let defined = DefinedIndex::build(&tree);
        let refs = ReferencedIndex::build(&doc);

        let entries = defined.get("itemIndex").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, KIND_RANDOM);
        assert_eq!(entries[0].element, "Pick Item");
        assert_eq!(entries[0].container, "TXN_01_Browse");
        assert!(!entries[0].implicit);
        assert!(defined.is_defined("itemIndex"));
        assert!(refs.is_used("itemIndex"));
    }

    #[test]
    fn test_script_and_foreach_variables() {
        let xml = wrap(
            r#"
<JSR223PostProcessor testname="Save">
  <stringProp name="script">vars.put("c_saved", vars.get("c_source"));</stringProp>
</JSR223PostProcessor>
<hashTree/>
<ForeachController testname="each id">
  <stringProp name="ForeachController.inputVal">c_ids</stringProp>
  <stringProp name="ForeachController.returnVal">c_id</stringProp>
</ForeachController>
<hashTree/>"#,
        );
        let doc = JmxDocument::parse_str(&xml).unwrap();
        let tree = TreeContext::build(&doc);
        let defined = DefinedIndex::build(&tree);
        let refs = ReferencedIndex::build(&doc);

        assert_eq!(defined.get("c_saved").unwrap()[0].kind, KIND_SCRIPT);
        assert_eq!(defined.get("c_id").unwrap()[0].kind, KIND_FOREACH);
        assert!(refs.contains("c_source"));
        assert!(refs.contains("c_ids"));
    }

    #[test]
    fn test_is_defined_folds_reference() {
        let xml = wrap(
            r#"
<RegexExtractor testname="REGEXP_c_item">
  <stringProp name="RegexExtractor.refname">c_item</stringProp>
  <stringProp name="RegexExtractor.match_number">1</stringProp>
</RegexExtractor>
<hashTree/>"#,
        );
        let doc = JmxDocument::parse_str(&xml).unwrap();
        let tree = TreeContext::build(&doc);
        let defined = DefinedIndex::build(&tree);
        assert!(defined.is_defined("c_item"));
        assert!(defined.is_defined("c_item_3"));
        assert!(defined.is_defined("c_item_matchNr"));
        assert!(!defined.is_defined("c_items"));
    }
}
