//! Semantic versions and npm-style range expressions.
//!
//! Wraps the `semver` crate. Ranges accept the expression forms skill
//! manifests use in practice: `^1.2.0`, `~1.2`, `>=1.0.0 <2.0.0`,
//! `1.0.0 - 1.4.0`, `1.x`, `*` and `||`-separated alternatives.
//!
//! A version without an operator is an exact pin: `2.0.0` matches only
//! `2.0.0`, and a partial `1.2` matches `1.2.x`.

use std::fmt;

/// A parsed semantic version.
pub type Version = semver::Version;

/// A single conjunctive requirement.
pub type VersionReq = semver::VersionReq;

/// A version range: satisfied when any alternative matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    source: String,
    alternatives: Vec<VersionReq>,
}

impl Range {
    /// Parse a range expression.
    pub fn parse(expr: &str) -> Result<Self, semver::Error> {
        let alternatives = expr
            .split("||")
            .map(|alt| VersionReq::parse(&normalize_alternative(alt)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Range {
            source: expr.trim().to_string(),
            alternatives,
        })
    }

    /// Check whether `version` satisfies this range.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The original expression text.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Rewrite one npm-style alternative into `semver::VersionReq` syntax.
fn normalize_alternative(alt: &str) -> String {
    let trimmed = alt.trim();
    if trimmed.is_empty() || trimmed == "x" || trimmed == "X" {
        return "*".to_string();
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    // Hyphen range: `a - b` is inclusive on both ends.
    if tokens.len() == 3 && tokens[1] == "-" {
        return format!(">={}, <={}", tokens[0], tokens[2]);
    }

    // Operators may be separated from their version by a space (`>= 1.0.0`).
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        let token = token.trim_end_matches(',');
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op = Some(token);
            continue;
        }
        let token = token.strip_prefix('v').unwrap_or(token);
        match pending_op.take() {
            Some(op) => comparators.push(format!("{op}{token}")),
            None if is_bare_version(token) => comparators.push(format!("={token}")),
            None => comparators.push(token.to_string()),
        }
    }
    comparators.join(", ")
}

/// A version or partial version with no operator and no wildcard.
fn is_bare_version(token: &str) -> bool {
    let core = token.split(['-', '+']).next().unwrap_or(token);
    token.starts_with(|c: char| c.is_ascii_digit())
        && core.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Parse a version string like "1.2.3".
pub fn parse_version(s: &str) -> Result<Version, semver::Error> {
    Version::parse(s)
}

/// Parse a range expression like "^1.0.0" or ">=1.0.0 <2.0.0".
pub fn parse_range(s: &str) -> Result<Range, semver::Error> {
    Range::parse(s)
}

/// Check if a version string is syntactically valid.
pub fn is_valid(s: &str) -> bool {
    Version::parse(s).is_ok()
}

/// Order version strings for display and selection.
///
/// Valid versions come first in descending semver order, followed by any
/// unparseable strings in lexical order.
pub fn sort_versions<S: AsRef<str>>(versions: &[S]) -> Vec<String> {
    let mut valid: Vec<(Version, String)> = Vec::new();
    let mut invalid: Vec<String> = Vec::new();
    for v in versions {
        let v = v.as_ref();
        match Version::parse(v) {
            Ok(parsed) => valid.push((parsed, v.to_string())),
            Err(_) => invalid.push(v.to_string()),
        }
    }
    valid.sort_by(|a, b| b.0.cmp(&a.0));
    invalid.sort();
    valid
        .into_iter()
        .map(|(_, s)| s)
        .chain(invalid)
        .collect()
}

/// Pick the "latest" entry: the highest valid version, else the
/// lexically last invalid one.
pub fn latest_version<S: AsRef<str>>(versions: &[S]) -> Option<String> {
    let sorted = sort_versions(versions);
    match sorted.first() {
        Some(first) if is_valid(first) => Some(first.clone()),
        _ => sorted.last().cloned(),
    }
}

/// Find the best matching version from a list of available version strings.
///
/// Returns the highest syntactically valid version that satisfies every
/// range in `ranges`.
pub fn resolve_best<S: AsRef<str>>(available: &[S], ranges: &[Range]) -> Option<String> {
    available
        .iter()
        .filter_map(|v| Version::parse(v.as_ref()).ok().map(|p| (p, v.as_ref())))
        .filter(|(parsed, _)| ranges.iter().all(|r| r.matches(parsed)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, s)| s.to_string())
}
