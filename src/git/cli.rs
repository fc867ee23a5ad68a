//! `git` command-line backed implementation of [`GitOps`]

use crate::error::{Error, Result};
use crate::git::{GitOps, PushLease};
use crate::types::RawCommit;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Runs git commands inside a working tree
#[derive(Debug, Clone)]
pub struct GitCli {
    path: PathBuf,
}

impl GitCli {
    /// Operate on the repository containing `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(?args, "running git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;
        Ok(output)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like `run`, but a plain non-zero exit yields `None`
    async fn run_optional(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.output(args).await?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }
}

/// `password` field of `git credential fill` output
fn parse_credential_password(raw: &str) -> Option<String> {
    raw.lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| *key == "password")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Parse `git log` output written with the field/record separators
fn parse_log(raw: &str) -> Result<Vec<RawCommit>> {
    raw.split(RECORD_SEP)
        .map(|r| r.trim_start_matches('\n'))
        .filter(|r| !r.trim().is_empty())
        .map(|record| {
            let mut fields = record.splitn(3, FIELD_SEP);
            let sha = fields.next().unwrap_or_default().trim();
            let parents = fields.next().unwrap_or_default();
            let message = fields
                .next()
                .ok_or_else(|| Error::Parse(format!("malformed git log record: {record:?}")))?;
            Ok(RawCommit {
                sha: sha.to_string(),
                message: message.trim_end().to_string(),
                parents: parents.split_whitespace().map(ToString::to_string).collect(),
            })
        })
        .collect()
}

#[async_trait]
impl GitOps for GitCli {
    async fn current_branch(&self) -> Result<String> {
        self.run_optional(&["symbolic-ref", "--quiet", "--short", "HEAD"])
            .await?
            .filter(|b| !b.is_empty())
            .ok_or(Error::DetachedHead)
    }

    async fn remote_url(&self, remote: &str) -> Result<String> {
        self.run_optional(&["remote", "get-url", remote])
            .await?
            .ok_or_else(|| Error::RemoteNotFound(remote.to_string()))
    }

    async fn fetch(&self, remote: &str) -> Result<()> {
        self.run(&["fetch", "--prune", remote]).await?;
        Ok(())
    }

    async fn ref_exists(&self, refname: &str) -> Result<bool> {
        let commit = format!("{refname}^{{commit}}");
        Ok(self
            .run_optional(&["rev-parse", "--verify", "--quiet", &commit])
            .await?
            .is_some())
    }

    async fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let out = self.run(&["merge-base", a, b]).await?;
        Ok(out.trim().to_string())
    }

    async fn commits_between(&self, base: &str, tip: &str) -> Result<Vec<RawCommit>> {
        let range = format!("{base}..{tip}");
        let format = format!("--format=%H{FIELD_SEP}%P{FIELD_SEP}%B{RECORD_SEP}");
        let out = self
            .run(&["log", "--reverse", "--topo-order", &format, &range])
            .await?;
        parse_log(&out)
    }

    async fn push(&self, remote: &str, sha: &str, branch: &str, lease: PushLease) -> Result<()> {
        let refspec = format!("{sha}:refs/heads/{branch}");
        let lease_arg = match &lease {
            PushLease::Force => "--force".to_string(),
            PushLease::Expect(expected) => {
                format!("--force-with-lease=refs/heads/{branch}:{expected}")
            }
        };
        debug!(remote, branch, sha, ?lease, "pushing");

        let output = self
            .output(&["push", "--porcelain", &lease_arg, remote, &refspec])
            .await?;
        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("stale info") || stderr.contains("stale info") {
            return Err(Error::StalePush {
                branch: branch.to_string(),
            });
        }
        Err(Error::Git(format!(
            "push of {branch} to {remote} failed: {}",
            stderr.trim()
        )))
    }

    async fn upstream_branch(&self, local_branch: &str) -> Result<Option<String>> {
        let key = format!("branch.{local_branch}.merge");
        Ok(self
            .config_value(&key)
            .await?
            .map(|r| r.strip_prefix("refs/heads/").unwrap_or(&r).to_string()))
    }

    async fn config_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .run_optional(&["config", "--get", key])
            .await?
            .filter(|v| !v.is_empty()))
    }

    async fn credential_password(&self, url: &str) -> Result<Option<String>> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Parse(format!("invalid credential URL {url}: {e}")))?;
        let Some(host) = parsed.host_str() else {
            return Ok(None);
        };
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let request = format!("protocol={}\nhost={host}\n\n", parsed.scheme());
        debug!(host, "asking git credential helpers");

        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(["credential", "fill"])
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ASKPASS", "true")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Git(format!("failed to run git credential: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_credential_password(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    async fn toplevel(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--show-toplevel"]).await?;
        Ok(PathBuf::from(out.trim()))
    }
}
