//! jmx-lint CLI entry point

use clap::Parser;
use env_logger::Env;
use jmx_lint::config::CliOptions;
use jmx_lint::output::{self, OutputFormat};
use jmx_lint::rules::{self, ALL_RULES};
use jmx_lint::{Config, Severity, ValidationEngine, ValidationStatistics};
use log::{debug, info, warn};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "jmx-lint")]
#[command(author, version, about = "A convention linter for JMeter JMX test plans", long_about = None)]
struct Cli {
    /// Test plans to validate (.jmx). Glob patterns are expanded.
    #[arg(required_unless_present = "list_rules")]
    files: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Config file path (default: auto-detect .jmxlintrc.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable specific rule (can be used multiple times)
    #[arg(short, long = "rule", value_name = "RULE")]
    rules: Vec<String>,

    /// Disable specific rule (can be used multiple times)
    #[arg(short, long = "ignore", value_name = "RULE")]
    ignore: Vec<String>,

    /// Minimum severity level to report
    #[arg(short, long, value_enum)]
    severity: Option<SeverityFilter>,

    /// Only output errors (equivalent to --severity=error)
    #[arg(short, long)]
    quiet: bool,

    /// Number of parallel jobs (0 = auto, 1 = sequential)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    jobs: Option<usize>,

    /// Host whose extracted values are test data (p_ prefix)
    #[arg(long = "data-domain", value_name = "HOST", env = "JMX_LINT_DATA_DOMAIN")]
    data_domain: Option<String>,

    /// Print the known rule names and exit
    #[arg(long)]
    list_rules: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SeverityFilter {
    Error,
    Warning,
    Info,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if cli.list_rules {
        for rule in ALL_RULES {
            println!("{rule}");
        }
        return Ok(ExitCode::from(0));
    }

    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path).into_diagnostic()?
    } else {
        let start_dir = std::env::current_dir().into_diagnostic()?;
        match Config::find_and_load(&start_dir) {
            Ok(Some((path, cfg))) => {
                info!("Using config: {}", path.display());
                cfg
            }
            Ok(None) => Config::default(),
            Err(e) => {
                warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    };

    let cli_severity = if cli.quiet {
        Some(Severity::Error)
    } else {
        cli.severity.map(|s| match s {
            SeverityFilter::Error => Severity::Error,
            SeverityFilter::Warning => Severity::Warning,
            SeverityFilter::Info => Severity::Info,
        })
    };

    config.merge_cli(CliOptions {
        enabled_rules: if cli.rules.is_empty() { None } else { Some(cli.rules) },
        disabled_rules: cli.ignore,
        min_severity: cli_severity,
        verbose: cli.verbose,
        data_domain: cli.data_domain,
        jobs: cli.jobs,
    });

    let files = collect_files(&cli.files, &config)?;
    if files.is_empty() {
        eprintln!("No files to validate");
        return Ok(ExitCode::from(0));
    }

    let enabled = config.enabled_rule_names();
    debug!("Enabled rules: {}", enabled.join(", "));
    for unknown in enabled.iter().filter(|r| !rules::is_known_rule(r)) {
        warn!("Unknown rule '{}' will match no analyzer", unknown);
    }

    let engine = ValidationEngine::new(config);
    let mut reports = engine.run(&files, &enabled);
    let config = engine.config();

    // Summary and exit code only count what is reported
    for report in &mut reports {
        report.issues.retain(|i| config.should_report(i.severity));
    }

    let mut stats = ValidationStatistics::default();
    for report in &reports {
        stats.record_report(report);
    }

    match cli.format {
        OutputFormat::Text => output::print_text(&reports, config),
        OutputFormat::Json => output::print_json(&reports, config).into_diagnostic()?,
    }

    if !cli.quiet {
        let file_count = stats.files_validated;
        let file_word = if file_count == 1 { "file" } else { "files" };
        let error_count = stats.error_count();
        let warning_count = stats.warning_count();

        if error_count == 0 && warning_count == 0 && stats.info_count() == 0 {
            eprintln!("\nNo issues found in {} {}", file_count, file_word);
        } else {
            eprintln!(
                "\nFound {} error{}, {} warning{} and {} info in {} {}",
                error_count,
                if error_count == 1 { "" } else { "s" },
                warning_count,
                if warning_count == 1 { "" } else { "s" },
                stats.info_count(),
                file_count,
                file_word
            );
        }
    }

    if stats.error_count() > 0 {
        Ok(ExitCode::from(2))
    } else if stats.warning_count() > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::from(0))
    }
}

/// Expand glob patterns and drop excluded paths
fn collect_files(patterns: &[PathBuf], config: &Config) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let pattern_str = pattern.to_string_lossy();
        if pattern_str.contains(&['*', '?', '['][..]) {
            for entry in glob::glob(&pattern_str).into_diagnostic()? {
                let path = entry.into_diagnostic()?;
                if should_validate(&path, config) {
                    files.push(path);
                }
            }
        } else if should_validate(pattern, config) {
            files.push(pattern.clone());
        }
    }

    Ok(files)
}

fn should_validate(path: &Path, config: &Config) -> bool {
    if config.is_file_excluded(path) {
        debug!("Excluded: {}", path.display());
        return false;
    }
    true
}
