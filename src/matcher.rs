//! Inclusion pattern expansion
//!
//! Turns user-supplied glob patterns into concrete paths relative to the
//! snapshot root. Patterns without matches produce warnings; the caller
//! decides whether to continue.

use crate::error::{BackupError, Result};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Expanded inclusion paths plus warnings for patterns that matched nothing
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Sorted, deduplicated; no entry lies below another entry
    pub paths: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl MatchOutcome {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Lexically normalize a relative pattern: drop `.` and empty segments and
/// resolve `..`. Patterns that leave the root are rejected.
pub fn normalize_pattern(pattern: &str) -> Result<String> {
    if pattern.starts_with('/') {
        return Err(BackupError::InvalidPattern(pattern.to_string()));
    }
    let mut parts: Vec<&str> = Vec::new();
    for segment in pattern.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(BackupError::InvalidPattern(pattern.to_string()));
                }
            }
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

/// Expand `patterns` below `snapshot_root`.
pub fn expand(snapshot_root: &Path, patterns: &[String]) -> Result<MatchOutcome> {
    let root_str = snapshot_root.to_str().ok_or_else(|| {
        BackupError::InvalidPattern(snapshot_root.to_string_lossy().into_owned())
    })?;
    let escaped_root = Pattern::escape(root_str.trim_end_matches('/'));

    let mut found = BTreeSet::new();
    let mut warnings = Vec::new();

    for pattern in patterns {
        let normalized = normalize_pattern(pattern)?;
        let matches = if normalized.is_empty() {
            if snapshot_root.is_dir() {
                vec![PathBuf::new()]
            } else {
                Vec::new()
            }
        } else {
            glob_relative(snapshot_root, &format!("{}/{}", escaped_root, normalized))?
        };

        if matches.is_empty() {
            let message = format!("Path {} does not exist and will be ignored!", pattern);
            warn!("{}", message);
            warnings.push(message);
        }
        debug!(pattern = %pattern, matches = matches.len(), "Expanded inclusion pattern");
        found.extend(matches);
    }

    Ok(MatchOutcome {
        paths: collapse_nested(found),
        warnings,
    })
}

fn glob_relative(snapshot_root: &Path, full_pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob_with(full_pattern, MATCH_OPTIONS)
        .map_err(|e| BackupError::InvalidPattern(format!("{}: {}", full_pattern, e)))?;
    let mut out = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BackupError::Io(e.into_error()))?;
        match path.strip_prefix(snapshot_root) {
            Ok(rel) => out.push(rel.to_path_buf()),
            Err(_) => debug!(path = %path.display(), "Ignoring match outside snapshot root"),
        }
    }
    Ok(out)
}

/// Drop paths already covered by an ancestor in the set.
fn collapse_nested(paths: BTreeSet<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for path in paths {
        if !kept.iter().any(|ancestor| path.starts_with(ancestor)) {
            kept.push(path);
        }
    }
    kept
}
