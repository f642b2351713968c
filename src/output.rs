//! Output formatters for validation reports

use crate::config::Config;
use crate::diagnostics::{Issue, Severity};
use crate::engine::DocumentReport;
use colored::*;
use serde::Serialize;
use std::io::{self, Write};

/// Report rendering selected on the command line
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn severity_str(severity: Severity, colored: bool) -> ColoredString {
    let s = severity.as_str();
    if !colored {
        return s.normal();
    }
    match severity {
        Severity::Error => s.red().bold(),
        Severity::Warning => s.yellow().bold(),
        Severity::Info => s.blue(),
    }
}

fn visible<'a>(report: &'a DocumentReport, config: &'a Config) -> impl Iterator<Item = &'a Issue> {
    report
        .issues
        .iter()
        .filter(move |i| config.should_report(i.severity))
}

fn format_issue(issue: &Issue, colored: bool) -> String {
    let mut out = format!(
        "  {} [{}] {}: {}\n",
        severity_str(issue.severity, colored),
        issue.rule,
        issue.issue_type,
        issue.description
    );
    let arrow = if colored { "-->".blue().bold() } else { "-->".normal() };
    out.push_str(&format!("    {} {}\n", arrow, issue.location));
    out.push_str(&format!("    container: {}\n", issue.container));

    let details: Vec<String> = [
        ("element", issue.element.as_deref()),
        ("key", issue.key.as_deref()),
        ("value", issue.value.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, v)| v.map(|v| format!("{label}: {v}")))
    .collect();
    if !details.is_empty() {
        out.push_str(&format!("    {}\n", details.join(", ")));
    }
    out
}

/// Render reports as human-readable text, one block per document
pub fn format_text(reports: &[DocumentReport], config: &Config, colored: bool) -> String {
    let mut output = String::new();

    for report in reports {
        let issues: Vec<&Issue> = visible(report, config).collect();
        if issues.is_empty() {
            continue;
        }

        let path = report.path.display().to_string();
        if colored {
            output.push_str(&format!("{}\n", path.underline()));
        } else {
            output.push_str(&format!("{}\n", path));
        }

        for issue in issues {
            output.push_str(&format_issue(issue, colored));
        }
        output.push('\n');
    }

    output
}

/// Print reports in text format to stdout
pub fn print_text(reports: &[DocumentReport], config: &Config) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write!(
        handle,
        "{}",
        format_text(reports, config, colored::control::SHOULD_COLORIZE.should_colorize())
    );
}

/// JSON output format
#[derive(Serialize)]
struct JsonOutput<'a> {
    documents: Vec<JsonDocument<'a>>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    path: String,
    rules: &'a [String],
    issues: Vec<&'a Issue>,
}

#[derive(Serialize)]
struct JsonSummary {
    files: usize,
    total: usize,
    errors: usize,
    warnings: usize,
    info: usize,
}

/// Render reports as pretty-printed JSON
pub fn format_json(reports: &[DocumentReport], config: &Config) -> serde_json::Result<String> {
    let documents: Vec<JsonDocument> = reports
        .iter()
        .map(|r| JsonDocument {
            path: r.path.display().to_string(),
            rules: &r.enabled_rules,
            issues: visible(r, config).collect(),
        })
        .collect();

    let count = |sev: Severity| -> usize {
        documents
            .iter()
            .flat_map(|d| d.issues.iter())
            .filter(|i| i.severity == sev)
            .count()
    };
    let summary = JsonSummary {
        files: documents.len(),
        total: documents.iter().map(|d| d.issues.len()).sum(),
        errors: count(Severity::Error),
        warnings: count(Severity::Warning),
        info: count(Severity::Info),
    };

    serde_json::to_string_pretty(&JsonOutput { documents, summary })
}

/// Print reports in JSON format to stdout
pub fn print_json(reports: &[DocumentReport], config: &Config) -> io::Result<()> {
    let json = format_json(reports, config)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> DocumentReport {
        DocumentReport {
            path: PathBuf::from("plans/login.jmx"),
            issues: vec![
                Issue::new(
                    Severity::Error,
                    "Naming Convention (TXN_NN_Desc)",
                    "Missing TXN_ Prefix",
                    "Users > Login (line 12)",
                    "Transaction Controller 'Login' does not start with TXN_",
                    "Users",
                )
                .with_element("Login"),
                Issue::new(
                    Severity::Info,
                    "Unused Variables",
                    "Unused Variable",
                    "Users > TXN_01_Login > REGEXP_c_token (line 20)",
                    "Extractor variable 'c_token' is never referenced",
                    "TXN_01_Login",
                )
                .with_key("c_token"),
            ],
            enabled_rules: Vec::new(),
        }
    }

    #[test]
    fn test_text_groups_by_document() {
        let text = format_text(&[report()], &Config::default(), false);
        assert!(text.starts_with("plans/login.jmx\n"));
        assert!(text.contains("ERROR [Naming Convention (TXN_NN_Desc)] Missing TXN_ Prefix"));
        assert!(text.contains("--> Users > Login (line 12)"));
        assert!(text.contains("element: Login"));
        assert!(text.contains("key: c_token"));
    }

    #[test]
    fn test_text_respects_min_severity() {
        let config = Config {
            min_severity: Severity::Warning,
            ..Default::default()
        };
        let text = format_text(&[report()], &config, false);
        assert!(text.contains("Missing TXN_ Prefix"));
        assert!(!text.contains("Unused Variable"));
    }

    #[test]
    fn test_clean_document_prints_nothing() {
        let clean = DocumentReport {
            path: PathBuf::from("clean.jmx"),
            issues: Vec::new(),
            enabled_rules: Vec::new(),
        };
        assert!(format_text(&[clean], &Config::default(), false).is_empty());
    }

    #[test]
    fn test_json_summary() {
        let json = format_json(&[report()], &Config::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["files"], 1);
        assert_eq!(value["summary"]["total"], 2);
        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["summary"]["info"], 1);
        assert_eq!(value["documents"][0]["path"], "plans/login.jmx");
        assert_eq!(value["documents"][0]["issues"][0]["severity"], "ERROR");
        assert_eq!(value["documents"][0]["issues"][1]["key"], "c_token");
    }
}
