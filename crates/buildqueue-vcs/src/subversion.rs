//! Subversion client driving the `svn` command-line tool.

use async_trait::async_trait;
use buildqueue_core::vcs::{BranchInfo, CommitInfo, VersionControlClient};
use buildqueue_core::VcsError;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;
use url::Url;

const SVN: &str = "svn";

/// Location of the branches, relative to the repository root.
const BRANCHES_PATH: &str = "/branches";

/// Subversion backend.
///
/// Every call spawns one `svn` process with non-interactive authentication.
pub struct SubversionClient {
    /// Repository root URL without a trailing slash.
    repository: String,
    user: String,
    password: String,
}

impl SubversionClient {
    pub fn new(repository: &Url, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            repository: repository.as_str().trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.repository, path.trim_start_matches('/'))
    }

    /// Run `svn <args>` and return its standard output.
    async fn svn(&self, args: &[&str]) -> Result<String, VcsError> {
        let subcommand = format!("svn {}", args.first().copied().unwrap_or_default());
        debug!(command = %subcommand, "Running svn");

        let output = Command::new(SVN)
            .args(args)
            .args([
                "--non-interactive",
                "--no-auth-cache",
                "--username",
                self.user.as_str(),
                "--password",
                self.password.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VcsError::CommandFailed {
                command: subcommand,
                message: self.redact(stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn redact(&self, text: &str) -> String {
        if self.password.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.password, "[REDACTED]")
        }
    }
}

#[async_trait]
impl VersionControlClient for SubversionClient {
    fn kind(&self) -> &'static str {
        "svn"
    }

    async fn list_branches(&self) -> Result<Vec<BranchInfo>, VcsError> {
        let url = self.url_for(BRANCHES_PATH);
        let listing = self.svn(&["list", "--verbose", url.as_str()]).await?;
        parse_branch_listing(&listing)
    }

    async fn last_commit_info(&self, path: &str) -> Result<CommitInfo, VcsError> {
        let url = self.url_for(path);
        let log = self.svn(&["log", "--limit", "1", "--quiet", url.as_str()]).await?;
        log.lines()
            .find(|line| line.starts_with('r'))
            .ok_or_else(|| VcsError::Parse {
                command: "svn log".to_string(),
                message: format!("no revision found for {}", path),
            })
            .and_then(parse_log_line)
    }

    async fn export_file(&self, source: &str, destination: &Path) -> Result<(), VcsError> {
        let url = self.url_for(source);
        let destination = destination.to_string_lossy();
        self.svn(&["export", "--force", url.as_str(), destination.as_ref()]).await?;
        Ok(())
    }
}

/// Parse `svn list --verbose` output of the branches directory.
///
/// Each line reads `<revision> <author> [<size>] <month> <day> <time|year> <name>`;
/// directories carry a trailing `/` and the directory itself is listed as `./`.
/// The name is the rest of the line and may contain spaces.
fn parse_branch_listing(listing: &str) -> Result<Vec<BranchInfo>, VcsError> {
    let mut branches = Vec::new();

    for line in listing.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let malformed = || VcsError::Parse {
            command: "svn list".to_string(),
            message: format!("malformed listing line: {}", line.trim()),
        };

        let (revision, rest) = next_field(line).ok_or_else(malformed)?;
        let (author, rest) = next_field(rest).ok_or_else(malformed)?;
        let (field, mut rest) = next_field(rest).ok_or_else(malformed)?;
        // Files carry a size column before the date, directories do not.
        if field.parse::<u64>().is_ok() {
            rest = next_field(rest).ok_or_else(malformed)?.1;
        }
        for _ in 0..2 {
            rest = next_field(rest).ok_or_else(malformed)?.1;
        }

        let entry = rest.trim_start();
        let name = entry.trim_end_matches('/');
        if name.is_empty() || name == "." {
            continue;
        }
        // Plain files directly under branches/ are not branches.
        if !entry.ends_with('/') {
            continue;
        }

        let created_revision = revision.parse::<u64>().map_err(|_| malformed())?;
        branches.push(BranchInfo {
            name: name.to_string(),
            source_path: format!("{}/{}", BRANCHES_PATH, name),
            last_author: author.to_string(),
            created_revision,
        });
    }

    Ok(branches)
}

/// Split off the first whitespace-separated field of `s`.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// Parse one `svn log --quiet` entry: `r123 | alice | 2026-10-18 12:00:00 +0200 (Sun, 18 Oct 2026)`.
fn parse_log_line(line: &str) -> Result<CommitInfo, VcsError> {
    let malformed = |what: &str| VcsError::Parse {
        command: "svn log".to_string(),
        message: format!("{} in: {}", what, line.trim()),
    };

    let mut parts = line.split(" | ");
    let revision = parts
        .next()
        .and_then(|r| r.trim().trim_start_matches('r').parse::<u64>().ok())
        .ok_or_else(|| malformed("bad revision"))?;
    let author = parts
        .next()
        .map(|a| a.trim().to_string())
        .ok_or_else(|| malformed("missing author"))?;
    let date = parts.next().ok_or_else(|| malformed("missing date"))?;
    let date = date.split(" (").next().unwrap_or(date).trim();
    let timestamp = DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S %z")
        .map_err(|_| malformed("bad date"))?
        .with_timezone(&Utc);

    Ok(CommitInfo {
        author,
        revision,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_branch_listing() {
        let listing = "\
  1042 alice                 Oct 18 12:00 ./
  1040 bob                   Oct 17 09:12 feature-x/
   998 carol                 Mar 02  2025 release-1.0/
  1001 dave             1204 Oct 01 10:00 README.txt
";
        let branches = parse_branch_listing(listing).unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].name, "feature-x");
        assert_eq!(branches[0].source_path, "/branches/feature-x");
        assert_eq!(branches[0].last_author, "bob");
        assert_eq!(branches[0].created_revision, 1040);
        assert_eq!(branches[1].name, "release-1.0");
    }

    #[test]
    fn test_branch_names_may_contain_spaces() {
        let listing = "\
  1050 erin                  Oct 18 08:30 my branch/
  1051 erin              42 Oct 18 08:31 notes for me.txt
";
        let branches = parse_branch_listing(listing).unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "my branch");
        assert_eq!(branches[0].source_path, "/branches/my branch");
        assert_eq!(branches[0].last_author, "erin");
    }

    #[test]
    fn test_parse_truncated_line() {
        let result = parse_branch_listing("  1040 bob Oct 17\n");
        assert!(matches!(result, Err(VcsError::Parse { .. })));
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_branch_listing("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_listing() {
        let result = parse_branch_listing("abc bob Oct 17 09:12 feature-x/\n");
        assert!(matches!(result, Err(VcsError::Parse { .. })));
    }

    #[test]
    fn test_parse_log_line() {
        let info =
            parse_log_line("r1042 | alice | 2026-10-18 12:00:00 +0200 (Sun, 18 Oct 2026)").unwrap();
        assert_eq!(info.revision, 1042);
        assert_eq!(info.author, "alice");
        assert_eq!(
            info.timestamp,
            Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_log_line_rejects_garbage() {
        assert!(parse_log_line("r12 | alice").is_err());
        assert!(parse_log_line("rX | alice | 2026-10-18 12:00:00 +0200").is_err());
    }

    #[test]
    fn test_url_for_joins_paths() {
        let url = Url::parse("svn://svn.example.com/project/").unwrap();
        let client = SubversionClient::new(&url, "u", "p");
        assert_eq!(
            client.url_for("/branches/feature-x/cmake/build.cmake"),
            "svn://svn.example.com/project/branches/feature-x/cmake/build.cmake"
        );
    }

    #[test]
    fn test_redacts_password() {
        let url = Url::parse("svn://svn.example.com/project").unwrap();
        let client = SubversionClient::new(&url, "u", "s3cret");
        assert_eq!(client.redact("auth failed for s3cret"), "auth failed for [REDACTED]");
    }
}
