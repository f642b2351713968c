//! Configuration handling for jmx-lint

use crate::rules::ALL_RULES;
use crate::Severity;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Host whose responses carry test data rather than values to correlate
pub const DEFAULT_DATA_DOMAIN: &str = "testdata.example.com";

const CONFIG_NAMES: &[&str] = &[
    ".jmxlintrc.json",
    ".jmxlintrc.yaml",
    ".jmxlintrc.yml",
    "jmxlint.json",
    "jmxlint.yaml",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Failed to parse YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] globset::Error),
}

/// Runtime validation configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Only run these rules (if Some)
    pub enabled_rules: Option<Vec<String>>,
    /// Skip these rules
    pub disabled_rules: Vec<String>,
    /// Minimum severity to report
    pub min_severity: Severity,
    pub verbose: bool,
    /// Documents to skip
    pub exclude_patterns: GlobSet,
    /// Host that switches extractor variables to the `p_` prefix
    pub data_domain: String,
    /// Number of parallel jobs (0 = auto, 1 = sequential)
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled_rules: None,
            disabled_rules: Vec::new(),
            min_severity: Severity::Info,
            verbose: false,
            exclude_patterns: GlobSet::empty(),
            data_domain: DEFAULT_DATA_DOMAIN.to_string(),
            jobs: 0,
        }
    }
}

/// CLI options to merge into config
#[derive(Debug, Default)]
pub struct CliOptions {
    /// Rules to enable (replaces config if set)
    pub enabled_rules: Option<Vec<String>>,
    /// Rules to disable (adds to config)
    pub disabled_rules: Vec<String>,
    pub min_severity: Option<Severity>,
    pub verbose: bool,
    pub data_domain: Option<String>,
    pub jobs: Option<usize>,
}

/// Configuration file format (.jmxlintrc.json or .jmxlintrc.yaml)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Rule names to run; empty runs every known rule
    #[serde(default)]
    pub rules: Vec<String>,

    /// Rule names to skip
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Minimum severity: "error", "warning", or "info"
    #[serde(default)]
    pub min_severity: Option<String>,

    /// File patterns to exclude
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub data_domain: Option<String>,

    /// Number of parallel jobs (0 = auto)
    #[serde(default)]
    pub jobs: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config_file: ConfigFile = if path.extension().is_some_and(|e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        Self::from_config_file(config_file)
    }

    /// Search `start_dir` and its parents for a config file
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut current = start_dir.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    let config = Self::from_file(&config_path)?;
                    return Ok(Some((config_path, config)));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    fn from_config_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut exclude_builder = GlobSetBuilder::new();
        for pattern in &file.exclude {
            exclude_builder.add(Glob::new(pattern)?);
        }
        let exclude_patterns = exclude_builder.build()?;

        let min_severity = file
            .min_severity
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Severity::Info);

        let data_domain = file
            .data_domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DOMAIN.to_string());

        Ok(Self {
            enabled_rules: if file.rules.is_empty() {
                None
            } else {
                Some(file.rules)
            },
            disabled_rules: file.ignore,
            min_severity,
            verbose: false,
            exclude_patterns,
            data_domain,
            jobs: file.jobs,
        })
    }

    /// Merge CLI options into this config (CLI takes precedence)
    pub fn merge_cli(&mut self, opts: CliOptions) {
        if opts.enabled_rules.is_some() {
            self.enabled_rules = opts.enabled_rules;
        }
        self.disabled_rules.extend(opts.disabled_rules);

        if let Some(sev) = opts.min_severity {
            self.min_severity = sev;
        }
        self.verbose = opts.verbose;

        if let Some(domain) = opts.data_domain {
            self.data_domain = domain;
        }
        if let Some(j) = opts.jobs {
            self.jobs = j;
        }
    }

    pub fn is_rule_enabled(&self, rule: &str) -> bool {
        if self.disabled_rules.iter().any(|r| r == rule) {
            return false;
        }
        match &self.enabled_rules {
            Some(enabled) => enabled.iter().any(|r| r == rule),
            None => true,
        }
    }

    /// Rule names handed to the engine. Names are passed through verbatim;
    /// unknown ones simply match no analyzer.
    pub fn enabled_rule_names(&self) -> Vec<String> {
        match &self.enabled_rules {
            Some(enabled) => enabled.clone(),
            None => ALL_RULES.iter().map(|r| r.to_string()).collect(),
        }
        .into_iter()
        .filter(|r| self.is_rule_enabled(r))
        .collect()
    }

    pub fn is_file_excluded(&self, file_path: &Path) -> bool {
        self.exclude_patterns.is_match(file_path)
    }

    pub fn should_report(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{HARDCODED_VALUES, NAMING_CONVENTION};

    #[test]
    fn test_parse_json_config() {
        let json = r#"{
            "rules": ["Naming Convention (TXN_NN_Desc)", "Hardcoded Value Detection"],
            "ignore": ["Hardcoded Value Detection"],
            "minSeverity": "warning",
            "exclude": ["**/generated/**", "*.bak.jmx"],
            "dataDomain": "data.example.org",
            "jobs": 2
        }"#;

        let config_file: ConfigFile = serde_json::from_str(json).unwrap();
        let config = Config::from_config_file(config_file).unwrap();

        assert_eq!(config.enabled_rule_names(), vec![NAMING_CONVENTION.to_string()]);
        assert_eq!(config.min_severity, Severity::Warning);
        assert_eq!(config.data_domain, "data.example.org");
        assert_eq!(config.jobs, 2);
        assert!(config.is_file_excluded(Path::new("plans/generated/load.jmx")));
        assert!(config.is_file_excluded(Path::new("old.bak.jmx")));
        assert!(!config.is_file_excluded(Path::new("load.jmx")));
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = "rules:\n  - Server Name/Domain Hygiene\nminSeverity: error\n";
        let config_file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        let config = Config::from_config_file(config_file).unwrap();
        assert_eq!(config.enabled_rule_names(), vec!["Server Name/Domain Hygiene".to_string()]);
        assert_eq!(config.min_severity, Severity::Error);
        assert_eq!(config.data_domain, DEFAULT_DATA_DOMAIN);
    }

    #[test]
    fn test_default_enables_every_rule() {
        let config = Config::default();
        assert_eq!(config.enabled_rule_names().len(), ALL_RULES.len());
        assert!(config.is_rule_enabled(HARDCODED_VALUES));
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        let config_file = ConfigFile {
            exclude: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            Config::from_config_file(config_file),
            Err(ConfigError::InvalidGlob(_))
        ));
    }

    #[test]
    fn test_should_report() {
        let mut config = Config::default();
        assert!(config.should_report(Severity::Info));

        config.min_severity = Severity::Warning;
        assert!(config.should_report(Severity::Error));
        assert!(config.should_report(Severity::Warning));
        assert!(!config.should_report(Severity::Info));
    }

    #[test]
    fn test_merge_cli() {
        let mut config = Config::default();
        config.disabled_rules = vec!["existing".to_string()];

        config.merge_cli(CliOptions {
            enabled_rules: Some(vec![NAMING_CONVENTION.to_string()]),
            disabled_rules: vec!["cli-disabled".to_string()],
            min_severity: Some(Severity::Error),
            verbose: true,
            data_domain: Some("data.local".to_string()),
            jobs: Some(1),
        });

        assert_eq!(config.enabled_rules, Some(vec![NAMING_CONVENTION.to_string()]));
        assert!(config.disabled_rules.contains(&"existing".to_string()));
        assert!(config.disabled_rules.contains(&"cli-disabled".to_string()));
        assert_eq!(config.min_severity, Severity::Error);
        assert!(config.verbose);
        assert_eq!(config.data_domain, "data.local");
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn test_merge_cli_partial_keeps_config() {
        let mut config = Config {
            jobs: 3,
            data_domain: "keep.example.com".to_string(),
            ..Default::default()
        };
        config.merge_cli(CliOptions::default());
        assert_eq!(config.jobs, 3);
        assert_eq!(config.data_domain, "keep.example.com");
        assert!(config.enabled_rules.is_none());
    }

    #[test]
    fn test_find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".jmxlintrc.json"), r#"{"jobs": 4}"#).unwrap();
        let nested = dir.path().join("plans").join("nightly");
        fs::create_dir_all(&nested).unwrap();

        let (path, config) = Config::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(path, dir.path().join(".jmxlintrc.json"));
        assert_eq!(config.jobs, 4);
    }
}
