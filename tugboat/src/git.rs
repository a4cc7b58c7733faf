use log::debug;

use crate::Result;

/// Runs git with `args` and returns the first line of its output. Git is a metadata source only,
/// so it runs outside of the validated command path.
fn git(args: &[&str]) -> Result<String> {
    debug!("running `git {}`...", args.join(" "));
    let output = std::process::Command::new("git")
        .args(["-c", "log.showSignature=false"])
        .args(args)
        .output()?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_owned().into());
    }

    Ok(std::str::from_utf8(&output.stdout)?
        .lines()
        .next()
        .unwrap_or_default()
        .replace('\'', "")
        .trim()
        .to_owned())
}

/// Returns true when the current directory is inside a git work tree.
fn is_repo() -> bool {
    git(&["rev-parse", "--is-inside-work-tree"]).is_ok_and(|output| output == "true")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInfo {
    pub branch: String,
    pub tag: String,
    pub short_commit: String,
    pub full_commit: String,
}

/// Collects the git metadata available to tag templates. Every value is empty when the metadata
/// can not be determined.
pub fn info() -> GitInfo {
    if !is_repo() {
        debug!("not inside a git repository, git metadata will be empty");
        return GitInfo::default();
    }

    let value = |args: &[&str]| {
        git(args).unwrap_or_else(|error| {
            debug!("`git {}` failed: {error}", args.join(" "));
            String::new()
        })
    };

    let info = GitInfo {
        branch: value(&["rev-parse", "--abbrev-ref", "HEAD"]),
        tag: value(&["describe", "--tags", "--abbrev=0"]),
        short_commit: value(&["rev-parse", "--short", "HEAD"]),
        full_commit: value(&["rev-parse", "HEAD"]),
    };
    debug!("git metadata: {info:?}");
    info
}
