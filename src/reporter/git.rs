use std::io;
use std::path::Path;
use std::process::Command;

use crate::prelude::*;

/// Commit hash of `HEAD`, used when neither the CI environment nor the
/// command line provided one.
pub fn commit_hash() -> Result<String> {
    commit_hash_in(Path::new("."))
}

fn commit_hash_in(repo: &Path) -> Result<String> {
    let stdout = run_git(repo, &["rev-parse", "HEAD"], "--sha")?;
    Ok(strip_one_newline(&stdout).to_string())
}

/// Ref description of `HEAD` (`git log -n 1 --pretty=%D HEAD`), the input to
/// [`branch_from_ref_description`].
pub fn head_ref_description() -> Result<String> {
    head_ref_description_in(Path::new("."))
}

fn head_ref_description_in(repo: &Path) -> Result<String> {
    run_git(repo, &["log", "-n", "1", "--pretty=%D", "HEAD"], "--branch")
}

/// Picks the local branch name out of a ref description.
///
/// With an attached `HEAD` the branch follows the arrow
/// (`HEAD -> master, origin/master`). Without one the listing is a plain
/// comma-separated ref list and the last entry is taken; git does not promise
/// that ordering, so this stays a heuristic. Idempotent on its own output.
pub fn branch_from_ref_description(info: &str) -> String {
    let trimmed = strip_one_newline(info);
    let branch = match trimmed.split_once("->") {
        Some((_, after_arrow)) => after_arrow.split(',').next().unwrap_or_default(),
        None => trimmed.split(',').next_back().unwrap_or_default(),
    };
    branch.trim().to_string()
}

fn run_git(repo: &Path, args: &[&str], fallback_flag: &str) -> Result<String> {
    let output = Command::new("git")
        .current_dir(repo)
        .args(args)
        .output()
        .map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                anyhow!("git is not available, pass {fallback_flag} explicitly")
            } else {
                Error::from(err).context(format!("failed to run git {}", args.join(" ")))
            }
        })?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn strip_one_newline(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}
