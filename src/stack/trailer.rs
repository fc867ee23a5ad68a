//! Change-Id trailer parsing
//!
//! Pure string handling over commit messages and review descriptions.
//! No I/O happens here.

use crate::types::ChangeId;
use regex::Regex;
use thiserror::Error;

/// Default trailer key written by the commit-msg hook
pub const DEFAULT_TRAILER_KEY: &str = "Change-Id";

/// Why a message yielded no identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrailerError {
    /// No trailer line with the key
    #[error("no {0} trailer")]
    Missing(String),
    /// Trailer present but without a value
    #[error("{0} trailer has no value")]
    Empty(String),
    /// Several trailers with different values
    #[error("conflicting {key} trailers: {first} and {second}")]
    Conflicting {
        /// Trailer key
        key: String,
        /// First value seen
        first: String,
        /// Second, different value
        second: String,
    },
}

fn trailer_regex(key: &str) -> Regex {
    Regex::new(&format!(r"(?m)^[ \t]*{}:[ \t]*(\S*)[ \t]*\r?$", regex::escape(key)))
        .expect("escaped trailer key forms a valid pattern")
}

/// Extract the persistent identifier from a commit message
///
/// Repeated trailers with the same value are accepted (some hooks add the
/// line again on amend); differing values are rejected.
pub fn parse_change_id(message: &str, key: &str) -> Result<ChangeId, TrailerError> {
    let re = trailer_regex(key);
    let mut found: Option<&str> = None;

    for caps in re.captures_iter(message) {
        let value = caps.get(1).map_or("", |m| m.as_str());
        if value.is_empty() {
            return Err(TrailerError::Empty(key.to_string()));
        }
        match found {
            None => found = Some(value),
            Some(first) if first == value => {}
            Some(first) => {
                return Err(TrailerError::Conflicting {
                    key: key.to_string(),
                    first: first.to_string(),
                    second: value.to_string(),
                });
            }
        }
    }

    found
        .map(ChangeId::new)
        .ok_or_else(|| TrailerError::Missing(key.to_string()))
}

/// Split a commit message into review title and description body
///
/// The body has the identifier trailer removed and surrounding blank lines
/// trimmed.
pub fn split_message(message: &str, key: &str) -> (String, String) {
    let (title, rest) = message.split_once('\n').unwrap_or((message, ""));
    let re = trailer_regex(key);
    let body = re.replace_all(rest, "");
    (title.trim().to_string(), body.trim().to_string())
}

/// Build a review description carrying the identifier marker
pub fn description_with_marker(body: &str, change_id: &ChangeId, key: &str) -> String {
    if body.is_empty() {
        format!("{key}: {change_id}")
    } else {
        format!("{body}\n\n{key}: {change_id}")
    }
}

/// Read the identifier marker back from a review description
pub fn marker_change_id(description: &str, key: &str) -> Option<ChangeId> {
    parse_change_id(description, key).ok()
}
