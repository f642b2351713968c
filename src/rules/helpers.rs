//! Shared heuristics used by several analyzers

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Hostname shapes that point at a specific, non-production environment.
/// One table, shared by hostname hygiene and hardcoded value detection.
pub static ENVIRONMENT_HOST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(dev|qa|uat)\.",
        r"(?i)\.(internal|local)$",
        r"(?i)staging",
        r"(?i)preprod",
        r"(?i)-test\d*(\.|$)",
        r"(?i)test\.org$",
        r"(?i)myapp-prod\d*",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap());

/// Literal tokens that are never worth flagging as hardcoded
static EXCLUDED_LITERALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "get", "post", "put", "delete", "patch", "head", "options", "true", "false", "yes", "no",
        "null", "none", "200", "201", "202", "204", "301", "302", "304", "400", "401", "403",
        "404", "409", "500", "502", "503", "application/json", "application/xml", "text/html",
        "text/plain", "text/xml", "application/x-www-form-urlencoded", "multipart/form-data",
        "*/*", "utf-8", "gzip, deflate", "gzip, deflate, br", "keep-alive", "no-cache", "en",
        "en-us", "en-gb", "fr-fr", "de-de", "es-es",
    ]
    .into_iter()
    .collect()
});

/// Header names whose values are protocol noise, not data
static EXCLUDED_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "accept",
        "accept-encoding",
        "accept-language",
        "cache-control",
        "connection",
        "content-type",
        "host",
        "origin",
        "pragma",
        "referer",
        "upgrade-insecure-requests",
        "user-agent",
        "sec-fetch-dest",
        "sec-fetch-mode",
        "sec-fetch-site",
        "sec-fetch-user",
        "sec-ch-ua",
        "sec-ch-ua-mobile",
        "sec-ch-ua-platform",
        "x-requested-with",
    ]
    .into_iter()
    .collect()
});

static SENSITIVE_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "authorization",
        "proxy-authorization",
        "cookie",
        "x-api-key",
        "api-key",
        "apikey",
        "x-auth-token",
        "x-access-token",
        "x-csrf-token",
        "x-xsrf-token",
        "x-session-id",
    ]
    .into_iter()
    .collect()
});

static SENSITIVE_PARAMETERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password",
        "passwd",
        "pwd",
        "pass",
        "secret",
        "client_secret",
        "token",
        "access_token",
        "refresh_token",
        "id_token",
        "api_key",
        "apikey",
        "auth",
        "session",
        "sessionid",
        "jsessionid",
        "otp",
        "pin",
    ]
    .into_iter()
    .collect()
});

/// Sensitive keys with a literal string value inside a raw JSON body
pub static SENSITIVE_JSON_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)"(password|passwd|pwd|secret|client_secret|token|access_token|refresh_token|api_?key)"\s*:\s*"([^"]+)""#,
    )
    .unwrap()
});

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b\d{4}-\d{2}-\d{2}\b",
        r"\b\d{4}/\d{2}/\d{2}\b",
        r"\b\d{2}/\d{2}/\d{4}\b",
        r"\b\d{2}-\d{2}-\d{4}\b",
        r"\b\d{2}\.\d{2}\.\d{4}\b",
        r"\b(19|20)\d{2}(0[1-9]|1[0-2])(0[1-9]|[12]\d|3[01])\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[^A-Za-z0-9_.])\d+(?:$|[^A-Za-z0-9_.])").unwrap());

static LONG_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._\-]{9,}$").unwrap());

static TXN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^TXN_(\d{2})_(.+)$").unwrap());
static TXN_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^TXN_\d{2}_").unwrap());

/// Why a literal looks like it should be parameterized or correlated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    Date,
    Number,
    LongString,
}

impl Candidate {
    pub fn issue_type(&self) -> &'static str {
        match self {
            Candidate::Date => "Hardcoded Date",
            Candidate::Number => "Hardcoded Number",
            Candidate::LongString => "Hardcoded String",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Candidate::Date => "contains a hardcoded date",
            Candidate::Number => "contains a hardcoded number that may need correlation",
            Candidate::LongString => "is a long literal that may be a dynamic value",
        }
    }
}

/// Result of checking a `prefix` + lowerCamelCase variable name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCheck {
    Ok,
    MissingPrefix,
    NotCamelCase,
}

/// Helper functions for rule evaluation
pub struct Helpers;

impl Helpers {
    /// Host field carries path, query or fragment data
    pub fn is_malformed_host(host: &str) -> bool {
        host.contains(&['/', '?', '#'][..])
    }

    /// Dotted-quad IPv4 address with every octet in 0..=255
    pub fn is_ipv4(host: &str) -> bool {
        IPV4.captures(host).is_some_and(|caps| {
            (1..=4).all(|i| caps[i].parse::<u16>().is_ok_and(|octet| octet <= 255))
        })
    }

    pub fn matches_environment_pattern(host: &str) -> bool {
        ENVIRONMENT_HOST_PATTERNS.iter().any(|re| re.is_match(host))
    }

    pub fn is_excluded_literal(value: &str) -> bool {
        EXCLUDED_LITERALS.contains(value.trim().to_lowercase().as_str())
    }

    pub fn is_excluded_header(name: &str) -> bool {
        EXCLUDED_HEADERS.contains(name.trim().to_lowercase().as_str())
    }

    pub fn is_sensitive_header(name: &str) -> bool {
        SENSITIVE_HEADERS.contains(name.trim().to_lowercase().as_str())
    }

    pub fn is_sensitive_parameter(name: &str) -> bool {
        SENSITIVE_PARAMETERS.contains(name.trim().to_lowercase().as_str())
    }

    /// Classify a literal that may need parameterization. Variables and
    /// excluded tokens never qualify.
    pub fn classify_literal(value: &str) -> Option<Candidate> {
        let value = value.trim();
        if value.is_empty() || value.contains("${") || Self::is_excluded_literal(value) {
            return None;
        }
        if DATE_PATTERNS.iter().any(|re| re.is_match(value)) {
            return Some(Candidate::Date);
        }
        if NUMBER_TOKEN.is_match(value) {
            return Some(Candidate::Number);
        }
        if value.len() > 8 && LONG_TOKEN.is_match(value) {
            return Some(Candidate::LongString);
        }
        None
    }

    /// First character lowercase, then only ASCII letters and digits
    pub fn is_lower_camel_case(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) if first.is_ascii_lowercase() => chars.all(|c| c.is_ascii_alphanumeric()),
            _ => false,
        }
    }

    pub fn check_variable_name(name: &str, prefix: &str) -> NameCheck {
        match name.strip_prefix(prefix) {
            None => NameCheck::MissingPrefix,
            Some(rest) if Self::is_lower_camel_case(rest) => NameCheck::Ok,
            Some(_) => NameCheck::NotCamelCase,
        }
    }

    /// Two-digit step number of a well-formed `TXN_NN_Desc` name
    pub fn transaction_step(name: &str) -> Option<u32> {
        TXN_NAME
            .captures(name.trim())
            .filter(|caps| !caps[2].trim().is_empty())
            .and_then(|caps| caps[1].parse().ok())
    }

    /// Whether a name uses the `TXN_NN_` transaction pattern
    pub fn has_transaction_prefix(name: &str) -> bool {
        TXN_PREFIX.is_match(name.trim())
    }
}
