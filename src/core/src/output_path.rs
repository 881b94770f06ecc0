//! Destination file name resolution for the command-line front end.
//!
//! The capture core only ever sees the final path returned from here.

use chrono::{DateTime, Local};
use log::warn;
use std::path::{Path, PathBuf};

const UNIQUE_NAME_FORMAT: &str = "data_%d%m%Y_%H%M%S";

/// Returns `requested` when it is set and nothing exists there yet.
/// Otherwise falls back to a timestamped name in `fallback_dir` so an
/// earlier capture is never overwritten.
pub fn resolve_output_path(
    requested: Option<&Path>,
    fallback_dir: &Path,
    now: DateTime<Local>,
) -> PathBuf {
    if let Some(path) = requested {
        if !path.as_os_str().is_empty() && !path.exists() {
            return path.to_path_buf();
        }
    }

    let mut candidate = fallback_dir.join(now.format(UNIQUE_NAME_FORMAT).to_string());
    let mut suffix = 1;
    while candidate.exists() {
        candidate = fallback_dir.join(format!("{}_{}", now.format(UNIQUE_NAME_FORMAT), suffix));
        suffix += 1;
    }
    warn!(
        "Output file not specified or already exists, writing to {} instead",
        candidate.display()
    );
    candidate
}
