use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};

/// Expand a shell-style glob into the existing paths it matches.
///
/// Wildcards match within a single path component and leading dots are
/// matched like any other character. Results come back sorted. Entries
/// that can't be read are skipped rather than reported.
pub fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = ::glob::glob(pattern).map_err(|e| Error::Glob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    Ok(entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("skipping unreadable entry while expanding {pattern:?}: {e}");
                None
            }
        })
        .collect())
}
