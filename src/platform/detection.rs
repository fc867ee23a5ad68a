//! Project detection from remote URLs

use crate::error::{Error, Result};
use crate::types::ProjectConfig;
use regex::Regex;
use std::sync::LazyLock;

/// `git@host:group/repo.git` (scp-like syntax)
static SCP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^@/]+@)?([^:/]+):(.+?)(?:\.git)?/?$").expect("valid scp remote pattern")
});

/// Parse host and project path from a git remote URL
///
/// Handles `git@host:path`, `ssh://[user@]host[:port]/path` and
/// `http(s)://host/path`. SSH remotes are mapped to an `https://` API base.
/// `host_override` (a base URL) replaces the detected host, for instances
/// whose API lives elsewhere than their git endpoint.
pub fn parse_remote_url(url: &str, host_override: Option<&str>) -> Result<ProjectConfig> {
    let url = url.trim();
    let (host, path) = if url.contains("://") {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Parse(format!("cannot parse remote URL {url}: {e}")))?;
        let hostname = parsed
            .host_str()
            .ok_or_else(|| Error::Parse(format!("remote URL has no host: {url}")))?;

        let host = match parsed.scheme() {
            "http" | "https" => match parsed.port() {
                Some(port) => format!("{}://{hostname}:{port}", parsed.scheme()),
                None => format!("{}://{hostname}", parsed.scheme()),
            },
            // ssh ports say nothing about the web port
            _ => format!("https://{hostname}"),
        };
        (host, parsed.path().to_string())
    } else {
        let caps = SCP_RE
            .captures(url)
            .ok_or_else(|| Error::Parse(format!("cannot parse remote URL: {url}")))?;
        (format!("https://{}", &caps[1]), caps[2].to_string())
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if !path.contains('/') {
        return Err(Error::Parse(format!("invalid project path: {path}")));
    }

    let host = host_override
        .map(|h| h.trim_end_matches('/').to_string())
        .unwrap_or(host);

    Ok(ProjectConfig {
        host,
        project_path: path.to_string(),
    })
}
