//! Hardcoded value detection
//!
//! Scans authentication managers, header managers, HTTP samplers (domain,
//! port, path, query, parameters, raw body), loop controllers and timers for
//! literal values that should be variables. A post-pass annotates warnings
//! whose key is parameterized somewhere else in the plan.

use super::helpers::{Helpers, SENSITIVE_JSON_KEY};
use super::{Analyzer, HARDCODED_VALUES};
use crate::context::TreeContext;
use crate::diagnostics::{Issue, Severity};
use crate::engine::Analysis;
use crate::jmeter::{self, contains_placeholder};
use crate::parser::{JmxDocument, NodeId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// `"key": "value"` or `"key": 123` inside a JSON body
static JSON_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([A-Za-z0-9_\-]+)"\s*:\s*(?:"([^"]*)"|(-?\d+(?:\.\d+)?))"#).unwrap()
});

pub struct HardcodedValuesAnalyzer;

impl Analyzer for HardcodedValuesAnalyzer {
    fn rule_name(&self) -> &'static str {
        HARDCODED_VALUES
    }

    fn check(&self, analysis: &Analysis<'_>) -> Vec<Issue> {
        let tree = analysis.tree();
        if let Err(issue) = tree.require_top_wrapper(HARDCODED_VALUES) {
            return vec![issue];
        }

        let mut scan = Scan::new(tree);
        for (id, element) in tree.document().iter() {
            match element.name.as_str() {
                jmeter::AUTH_MANAGER => scan.auth_manager(id),
                jmeter::HEADER_MANAGER => scan.header_manager(id),
                jmeter::HTTP_SAMPLER => scan.sampler(id),
                jmeter::LOOP_CONTROLLER => scan.loop_controller(id),
                tag => {
                    if let Some((_, props)) = jmeter::TIMERS.iter().find(|(t, _)| *t == tag) {
                        scan.timer(id, props);
                    }
                }
            }
        }
        scan.finish()
    }
}

fn is_literal(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !contains_placeholder(value)
}

/// `(name, value)` of every `elementProp` entry in a collection
fn collection_entries(
    doc: &JmxDocument,
    owner: NodeId,
    collection: &str,
    name_prop: &str,
    value_prop: &str,
) -> Vec<(String, String)> {
    let Some(list) = doc.collection_prop(owner, collection) else {
        return Vec::new();
    };
    doc.children_named(list, "elementProp")
        .map(|entry| {
            (
                doc.prop(entry, name_prop).unwrap_or("").trim().to_string(),
                doc.prop(entry, value_prop).unwrap_or("").trim().to_string(),
            )
        })
        .collect()
}

/// Key/value pairs of a raw body, JSON or form encoded
fn body_pairs(body: &str) -> Vec<(String, String)> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        JSON_PAIR
            .captures_iter(trimmed)
            .filter_map(|caps| {
                let value = caps.get(2).or_else(|| caps.get(3))?;
                Some((caps[1].to_string(), value.as_str().to_string()))
            })
            .collect()
    } else {
        query_pairs(trimmed)
    }
}

fn query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

struct Scan<'a, 'd> {
    tree: &'a TreeContext<'d>,
    issues: Vec<Issue>,
    /// Lowercased keys whose value is a variable somewhere in the plan
    parameterized: HashSet<String>,
}

impl<'a, 'd> Scan<'a, 'd> {
    fn new(tree: &'a TreeContext<'d>) -> Self {
        Self {
            tree,
            issues: Vec::new(),
            parameterized: HashSet::new(),
        }
    }

    fn doc(&self) -> &'d JmxDocument {
        self.tree.document()
    }

    fn push(&mut self, id: NodeId, severity: Severity, issue_type: &str, description: String, key: Option<&str>, value: &str) {
        let mut issue = Issue::new(
            severity,
            HARDCODED_VALUES,
            issue_type,
            self.tree.location(id),
            description,
            self.tree.container_of(id),
        )
        .with_element(self.tree.display_name(id))
        .with_value(value);
        if let Some(key) = key {
            issue = issue.with_key(key);
        }
        self.issues.push(issue);
    }

    /// Remember parameterized keys; report literal candidates
    fn key_value(&mut self, id: NodeId, key: &str, value: &str, origin: &str) {
        if contains_placeholder(value) {
            if !key.is_empty() {
                self.parameterized.insert(key.to_lowercase());
            }
            return;
        }
        if !is_literal(value) {
            return;
        }
        // Nameless entries still carry values but have no key to report
        let named = Some(key).filter(|k| !k.is_empty());
        if named.is_some_and(Helpers::is_sensitive_parameter) {
            self.push(
                id,
                Severity::Error,
                "Hardcoded Credential",
                format!("{origin} '{key}' carries a literal sensitive value"),
                named,
                value,
            );
        } else if let Some(candidate) = Helpers::classify_literal(value) {
            let label = match named {
                Some(key) => format!("{origin} '{key}'"),
                None => format!("Unnamed {}", origin.to_lowercase()),
            };
            self.push(
                id,
                Severity::Warning,
                candidate.issue_type(),
                format!("{label} {}: '{value}'", candidate.describe()),
                named,
                value,
            );
        }
    }

    fn auth_manager(&mut self, id: NodeId) {
        let entries = collection_entries(
            self.doc(),
            id,
            jmeter::AUTH_LIST,
            jmeter::AUTH_USERNAME,
            jmeter::AUTH_PASSWORD,
        );
        for (username, password) in entries {
            for (key, value) in [("username", username), ("password", password)] {
                if is_literal(&value) {
                    self.push(
                        id,
                        Severity::Error,
                        "Hardcoded Credential",
                        format!("Authorization {key} is a literal value"),
                        Some(key),
                        &value,
                    );
                }
            }
        }
    }

    fn header_manager(&mut self, id: NodeId) {
        let headers = collection_entries(
            self.doc(),
            id,
            jmeter::HEADER_LIST,
            jmeter::HEADER_NAME,
            jmeter::HEADER_VALUE,
        );
        for (name, value) in headers {
            if contains_placeholder(&value) {
                self.parameterized.insert(name.to_lowercase());
                continue;
            }
            if !is_literal(&value) {
                continue;
            }
            if Helpers::is_sensitive_header(&name) {
                self.push(
                    id,
                    Severity::Error,
                    "Hardcoded Sensitive Header",
                    format!("Header '{name}' carries a literal credential"),
                    Some(&name),
                    &value,
                );
            } else if !Helpers::is_excluded_header(&name) {
                if let Some(candidate) = Helpers::classify_literal(&value) {
                    self.push(
                        id,
                        Severity::Warning,
                        candidate.issue_type(),
                        format!("Header '{name}' {}: '{value}'", candidate.describe()),
                        Some(&name),
                        &value,
                    );
                }
            }
        }
    }

    fn sampler(&mut self, id: NodeId) {
        let doc = self.doc();

        if let Some(domain) = doc.prop(id, jmeter::HTTP_DOMAIN).filter(|d| is_literal(d)) {
            let domain = domain.trim();
            let finding = if Helpers::is_malformed_host(domain) {
                Some((Severity::Error, "Malformed Server Name", "contains path, query or fragment characters"))
            } else if Helpers::is_ipv4(domain) {
                Some((Severity::Warning, "Hardcoded IP Address", "is a hardcoded IP address"))
            } else if Helpers::matches_environment_pattern(domain) {
                Some((Severity::Error, "Environment-Specific Host", "points at a specific environment"))
            } else {
                None
            };
            if let Some((severity, issue_type, reason)) = finding {
                self.push(
                    id,
                    severity,
                    issue_type,
                    format!("Server name '{domain}' {reason}"),
                    Some(jmeter::HTTP_DOMAIN),
                    domain,
                );
            }
        }

        if let Some(port) = doc.prop(id, jmeter::HTTP_PORT).filter(|p| is_literal(p)) {
            self.push(
                id,
                Severity::Warning,
                "Hardcoded Port",
                format!("Port {} is hardcoded", port.trim()),
                Some("port"),
                port.trim(),
            );
        }

        if let Some(path) = doc.prop(id, jmeter::HTTP_PATH) {
            self.url_path(id, path);
        }

        let Some(args) = doc.element_prop(id, jmeter::HTTP_ARGUMENTS) else {
            return;
        };
        let entries = collection_entries(doc, args, jmeter::ARGUMENT_LIST, jmeter::ARGUMENT_NAME, jmeter::ARGUMENT_VALUE);
        if doc.prop(id, jmeter::HTTP_RAW_BODY_FLAG) == Some("true") {
            for (_, body) in entries {
                self.raw_body(id, &body);
            }
        } else {
            for (name, value) in entries {
                self.key_value(id, &name, &value, "Parameter");
            }
        }
    }

    fn url_path(&mut self, id: NodeId, path: &str) {
        let path = path.split('#').next().unwrap_or(path);
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let mut previous = "";
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if is_literal(segment) {
                if let Some(candidate) = Helpers::classify_literal(segment) {
                    let key = Some(previous).filter(|p| !p.is_empty() && !contains_placeholder(p));
                    self.push(
                        id,
                        Severity::Warning,
                        candidate.issue_type(),
                        format!("URL path segment {}: '{segment}'", candidate.describe()),
                        key,
                        segment,
                    );
                }
            }
            previous = segment;
        }
        for (key, value) in query_pairs(query) {
            self.key_value(id, &key, &value, "Query parameter");
        }
    }

    fn raw_body(&mut self, id: NodeId, body: &str) {
        let mut reported: HashSet<String> = HashSet::new();
        for caps in SENSITIVE_JSON_KEY.captures_iter(body) {
            let (key, value) = (&caps[1], &caps[2]);
            if contains_placeholder(value) {
                continue;
            }
            reported.insert(key.to_lowercase());
            self.push(
                id,
                Severity::Error,
                "Hardcoded Credential",
                format!("Request body field '{key}' carries a literal sensitive value"),
                Some(key),
                value,
            );
        }
        for (key, value) in body_pairs(body) {
            if reported.contains(&key.to_lowercase()) {
                continue;
            }
            self.key_value(id, &key, &value, "Body field");
        }
    }

    fn loop_controller(&mut self, id: NodeId) {
        let Some(loops) = self.doc().prop(id, jmeter::LOOP_COUNT).map(str::trim) else {
            return;
        };
        if is_literal(loops) && loops != "-1" {
            self.push(
                id,
                Severity::Warning,
                "Hardcoded Loop Count",
                format!("Loop count {loops} is hardcoded"),
                Some(jmeter::LOOP_COUNT),
                loops,
            );
        }
    }

    fn timer(&mut self, id: NodeId, props: &[&str]) {
        for &prop in props {
            let Some(delay) = self.doc().prop(id, prop).map(str::trim) else {
                continue;
            };
            if is_literal(delay) {
                self.push(
                    id,
                    Severity::Warning,
                    "Hardcoded Timer Delay",
                    format!("Timer value {delay} ms is hardcoded"),
                    Some(prop),
                    delay,
                );
            }
        }
    }

    /// Annotate warnings whose key is parameterized elsewhere
    fn finish(mut self) -> Vec<Issue> {
        for issue in &mut self.issues {
            if issue.severity != Severity::Warning {
                continue;
            }
            let Some(key) = issue.key.as_deref() else {
                continue;
            };
            if self.parameterized.contains(&key.to_lowercase()) {
                let note = format!("Found correlation elsewhere: '{key}' is set from a variable in another element");
                issue.append_note(&note);
            }
        }
        self.issues
    }
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

    fn headers(pairs: &[(&str, &str)]) -> String {
        let entries: String = pairs
            .iter()
            .map(|(n, v)| {
                format!(
                    r#"<elementProp name="{n}" elementType="Header">
  <stringProp name="Header.name">{n}</stringProp>
  <stringProp name="Header.value">{v}</stringProp>
</elementProp>"#
                )
            })
            .collect();
        format!(
            r#"<HeaderManager testname="Headers"><collectionProp name="HeaderManager.headers">{entries}</collectionProp></HeaderManager><hashTree/>"#
        )
    }

    fn sampler(domain: &str, port: &str, path: &str, args: &str, raw: bool) -> String {
        format!(
            r#"<HTTPSamplerProxy testname="KPI_POST_orders">
  <boolProp name="HTTPSampler.postBodyRaw">{raw}</boolProp>
  <elementProp name="HTTPsampler.Arguments" elementType="Arguments">
    <collectionProp name="Arguments.arguments">{args}</collectionProp>
  </elementProp>
  <stringProp name="HTTPSampler.domain">{domain}</stringProp>
  <stringProp name="HTTPSampler.port">{port}</stringProp>
  <stringProp name="HTTPSampler.path">{path}</stringProp>
</HTTPSamplerProxy><hashTree/>"#
        )
    }

    fn argument(name: &str, value: &str) -> String {
        format!(
            r#"<elementProp name="{name}" elementType="HTTPArgument">
  <stringProp name="Argument.name">{name}</stringProp>
  <stringProp name="Argument.value">{value}</stringProp>
</elementProp>"#
        )
    }

    fn run(xml: &str) -> Vec<Issue> {
        let doc = JmxDocument::parse_str(xml).unwrap();
        HardcodedValuesAnalyzer.check(&Analysis::new(&doc))
    }

    fn types(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|i| i.issue_type.as_str()).collect()
    }

    #[test]
    fn test_auth_manager_credentials() {
        let body = r#"<AuthManager testname="Auth"><collectionProp name="AuthManager.auth_list">
<elementProp name="" elementType="Authorization">
  <stringProp name="Authorization.username">${p_user}</stringProp>
  <stringProp name="Authorization.password">hunter2</stringProp>
</elementProp></collectionProp></AuthManager><hashTree/>"#;
        let issues = run(&plan(body));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].key.as_deref(), Some("password"));
    }

    #[test]
    fn test_headers() {
        let body = headers(&[
            ("Authorization", "Bearer abc"),
            ("Accept", "application/json"),
            ("User-Agent", "Mozilla/5.0 (X11; Linux x86_64) 2024"),
            ("X-Request-Id", "a8f3kd93ls0d"),
            ("X-Trace", "${c_trace}"),
        ]);
        let issues = run(&plan(&body));
        assert_eq!(types(&issues), vec!["Hardcoded Sensitive Header", "Hardcoded String"]);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[1].severity, Severity::Warning);
    }

    #[test]
    fn test_sampler_domain_port_and_path() {
        let body = sampler("10.1.1.1", "8080", "/orders/12345?date=2024-03-01&amp;lang=en", "", false);
        let issues = run(&plan(&body));
        assert_eq!(
            types(&issues),
            vec!["Hardcoded IP Address", "Hardcoded Port", "Hardcoded Number", "Hardcoded Date"]
        );
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
        assert_eq!(issues[2].key.as_deref(), Some("orders"));
        assert_eq!(issues[3].key.as_deref(), Some("date"));
    }

    #[test]
    fn test_environment_and_malformed_domains_are_errors() {
        let issues = run(&plan(&sampler("qa.shop.com", "", "/", "", false)));
        assert_eq!(types(&issues), vec!["Environment-Specific Host"]);
        let issues = run(&plan(&sampler("shop.com/api", "", "/", "", false)));
        assert_eq!(types(&issues), vec!["Malformed Server Name"]);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_structured_parameters() {
        let args = [argument("password", "secret1"), argument("orderId", "98765"), argument("user", "${p_user}")].concat();
        let issues = run(&plan(&sampler("${u_host}", "", "/login", &args, false)));
        assert_eq!(types(&issues), vec!["Hardcoded Credential", "Hardcoded Number"]);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_unnamed_parameter_has_no_key() {
        let issues = run(&plan(&sampler("${u_host}", "", "/login", &argument("", "98765"), false)));
        assert_eq!(types(&issues), vec!["Hardcoded Number"]);
        assert_eq!(issues[0].key, None);
        assert!(issues[0].description.starts_with("Unnamed parameter"));
    }

    #[test]
    fn test_path_fragment_is_ignored() {
        let issues = run(&plan(&sampler("${u_host}", "", "/orders/list#98765", "", false)));
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_raw_json_body() {
        let body = r#"{&quot;password&quot;: &quot;hunter2&quot;, &quot;orderId&quot;: 98765, &quot;token&quot;: &quot;${c_token}&quot;}"#;
        let args = argument("", body);
        let issues = run(&plan(&sampler("${u_host}", "", "/orders", &args, true)));
        assert_eq!(types(&issues), vec!["Hardcoded Credential", "Hardcoded Number"]);
        assert_eq!(issues[0].key.as_deref(), Some("password"));
        assert_eq!(issues[1].key.as_deref(), Some("orderId"));
    }

    #[test]
    fn test_loops_and_timers() {
        let body = r#"<LoopController testname="Repeat"><stringProp name="LoopController.loops">5</stringProp></LoopController><hashTree/>
<LoopController testname="Forever"><intProp name="LoopController.loops">-1</intProp></LoopController><hashTree/>
<LoopController testname="Configured"><stringProp name="LoopController.loops">${u_loops}</stringProp></LoopController><hashTree/>
<ConstantTimer testname="Think"><stringProp name="ConstantTimer.delay">3000</stringProp></ConstantTimer><hashTree/>
<UniformRandomTimer testname="Jitter"><stringProp name="ConstantTimer.delay">${u_think}</stringProp><stringProp name="RandomTimer.range">500</stringProp></UniformRandomTimer><hashTree/>"#;
        let issues = run(&plan(body));
        assert_eq!(
            types(&issues),
            vec!["Hardcoded Loop Count", "Hardcoded Timer Delay", "Hardcoded Timer Delay"]
        );
    }

    #[test]
    fn test_correlation_note_is_appended() {
        let body = [
            headers(&[("X-Request-Id", "a8f3kd93ls0d")]),
            sampler("${u_host}", "", "/x", &argument("X-Request-Id", "${c_requestId}"), false),
        ]
        .concat();
        let issues = run(&plan(&body));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].description.contains("Found correlation elsewhere"));
    }

    #[test]
    fn test_no_note_without_parameterized_counterpart() {
        let issues = run(&plan(&headers(&[("X-Request-Id", "a8f3kd93ls0d")])));
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].description.contains("correlation"));
    }
}
