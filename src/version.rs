// SPDX-FileCopyrightText: 2026 buildver contributors
//
// SPDX-License-Identifier: MIT

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror;

use crate::git::RepositoryState;

/// Number of commit hash characters carried in the build metadata suffix.
/// Downstream consumers put a limit on the overall version length, so only
/// a short prefix of the full hash is kept.
pub const SHORT_HASH_LEN: usize = 12;

/// Canonical version grammar, anchored at both ends. Partial matches are
/// rejected outright.
static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)(\+([0-9a-fA-F]+)(\.dirty)?)?$")
        .expect("version regex compile should succeed")
});

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum VersionError {
    #[error("invalid version string {0:?}")]
    InvalidFormat(String),
}

/// Structured form of a canonical version string. Constructed once per
/// invocation by [`decode`] and never mutated afterwards.
#[derive(Debug, PartialEq)]
pub struct VersionDescriptor {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub commit: Option<String>,
    pub dirty: bool,
}

/// Encodes repository state as the canonical version string
/// `MAJOR.MINOR.PATCH(+COMMIT12(.dirty)?)?`. The triple falls back to
/// `0.0.0` when no release tag was resolved. A resolved tag is kept even
/// when the commit lookup failed, only the metadata suffix is dropped.
pub fn encode(state: &RepositoryState) -> String {
    let triple = match &state.tag {
        Some(tag) => format!("{}.{}.{}", tag.major, tag.minor, tag.patch),
        None => "0.0.0".to_string(),
    };

    let commit = match &state.commit {
        Some(commit) => commit.as_str(),
        // a dirty working tree can only be communicated together with a
        // commit suffix
        None => return triple,
    };
    let short = if commit.len() > SHORT_HASH_LEN {
        &commit[..SHORT_HASH_LEN]
    } else {
        commit
    };

    match state.pristine {
        Some(false) => format!("{}+{}.dirty", triple, short),
        _ => format!("{}+{}", triple, short),
    }
}

/// Parses a canonical version string, which may come from [`encode`] or
/// from an unrelated producer. Accepts any hex run as the commit, rejects
/// everything outside the grammar.
pub fn decode(version: &str) -> Result<VersionDescriptor, VersionError> {
    let caps = VERSION_RE
        .captures(version)
        .ok_or_else(|| VersionError::InvalidFormat(version.to_string()))?;

    let component = |i: usize| {
        caps[i]
            .parse::<u64>()
            .map_err(|_| VersionError::InvalidFormat(version.to_string()))
    };

    Ok(VersionDescriptor {
        major: component(1)?,
        minor: component(2)?,
        patch: component(3)?,
        commit: caps.get(5).map(|m| m.as_str().to_string()),
        dirty: caps.get(6).is_some(),
    })
}
