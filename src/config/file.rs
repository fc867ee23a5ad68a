//! Configuration files: `.mr-chain.toml` in the repository and
//! `mr-chain/config.toml` in the user config directory.

use super::OrphanPolicy;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Repository-level config filename
pub const REPO_CONFIG_FILE: &str = ".mr-chain.toml";

/// Directory under the user config dir
const USER_CONFIG_DIR: &str = "mr-chain";

/// Filename inside [`USER_CONFIG_DIR`]
const USER_CONFIG_FILE: &str = "config.toml";

/// Parsed config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Settings per git remote name
    #[serde(default)]
    pub remotes: HashMap<String, RemoteSettings>,
}

/// Settings for one remote; every field is optional so files can be layered
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSettings {
    /// Root target branch
    pub target_branch: Option<String>,
    /// Delete source branches after merge
    pub delete_source_branch: Option<bool>,
    /// What to do with orphaned merge requests
    pub orphans: Option<OrphanPolicy>,
    /// Trailer key holding the persistent identifier
    pub trailer_key: Option<String>,
    /// Cancel running pipelines of superseded commits
    pub cancel_stale_pipelines: Option<bool>,
    /// GitLab base URL override, e.g. `https://gitlab.example.com`
    pub host: Option<String>,
    /// How often to re-check an unknown merge status
    pub merge_poll_attempts: Option<u32>,
    /// Seconds between merge status checks
    pub merge_poll_interval_secs: Option<u64>,
}

impl RemoteSettings {
    /// Fill unset fields from `lower`
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            target_branch: self.target_branch.or(lower.target_branch),
            delete_source_branch: self.delete_source_branch.or(lower.delete_source_branch),
            orphans: self.orphans.or(lower.orphans),
            trailer_key: self.trailer_key.or(lower.trailer_key),
            cancel_stale_pipelines: self.cancel_stale_pipelines.or(lower.cancel_stale_pipelines),
            host: self.host.or(lower.host),
            merge_poll_attempts: self.merge_poll_attempts.or(lower.merge_poll_attempts),
            merge_poll_interval_secs: self
                .merge_poll_interval_secs
                .or(lower.merge_poll_interval_secs),
        }
    }
}

/// Path of the repository config file
pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(REPO_CONFIG_FILE)
}

/// Path of the user config file, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE))
}

/// Load a config file
///
/// Returns an empty config if the file doesn't exist.
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Settings for `remote`, repository file layered over the user file
pub fn load_remote_settings(repo_root: &Path, remote: &str) -> Result<RemoteSettings> {
    let repo = load_config_file(&repo_config_path(repo_root))?;
    let user = match user_config_path() {
        Some(path) => load_config_file(&path)?,
        None => ConfigFile::default(),
    };

    let pick = |mut file: ConfigFile| file.remotes.remove(remote).unwrap_or_default();
    Ok(pick(repo).or(pick(user)))
}
