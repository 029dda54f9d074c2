use std::fmt;
use std::path::PathBuf;

use crate::prelude::*;

/// Patterns tried in order when no explicit `--file` pattern is given. The
/// first pattern with at least one match wins.
pub const DEFAULT_PATTERNS: [&str; 16] = [
    "./*/*/TEST-*.xml",
    "./*/*/*/TEST-*.xml",
    "./*/*/*/*/TEST-*.xml",
    "./*/*/*/*/*/TEST-*.xml",
    "junit*.xml",
    "rspec*.xml",
    "report*.xml",
    "./reports/junit*.xml",
    "./reports/rspec*.xml",
    "./reports/report*.xml",
    "./test-results/junit*.xml",
    "./test-results/rspec*.xml",
    "./test-results/report*.xml",
    "/tmp/test-results/junit*.xml",
    "/tmp/test-results/rspec*.xml",
    "/tmp/test-results/report*.xml",
];

/// No report file matched any searched pattern. Distinct from pattern and IO
/// errors so multi-part runs can tolerate it.
#[derive(Debug)]
pub struct NoMatches {
    pattern: String,
}

impl fmt::Display for NoMatches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pattern.is_empty() {
            write!(f, "unable to find a report file under the default patterns, pass --file")
        } else {
            write!(f, "unable to find a report file to upload at: {}", self.pattern)
        }
    }
}

impl std::error::Error for NoMatches {}

/// Report files matching `pattern`, or the default pattern list in order when
/// `pattern` is empty. Matches within one pattern come back in the glob's
/// sorted order.
pub fn search_report_files(pattern: &str) -> Result<Vec<PathBuf>> {
    search_with_patterns(pattern, &DEFAULT_PATTERNS)
}

fn search_with_patterns(pattern: &str, defaults: &[&str]) -> Result<Vec<PathBuf>> {
    if !pattern.is_empty() {
        let files = glob_files(pattern)?;
        if files.is_empty() {
            return Err(NoMatches {
                pattern: pattern.to_string(),
            }
            .into());
        }
        return Ok(files);
    }
    for default_pattern in defaults {
        let files = glob_files(default_pattern)?;
        if !files.is_empty() {
            return Ok(files);
        }
    }
    Err(NoMatches {
        pattern: String::new(),
    }
    .into())
}

fn glob_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries =
        glob::glob(pattern).with_context(|| format!("invalid file pattern: {pattern}"))?;
    let mut files = Vec::new();
    for entry in entries {
        files.push(entry?);
    }
    Ok(files)
}
