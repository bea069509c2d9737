//! Executable discovery for renderer backends.

use std::path::{Path, PathBuf};

/// Browsers tried, in order, when kiosk configuration names none.
pub const BROWSER_CANDIDATES: &[&str] = &[
	"chromium-browser",
	"chromium",
	"google-chrome-stable",
	"google-chrome",
	"/usr/bin/chromium-browser",
	"/usr/bin/chromium",
	"/usr/bin/google-chrome-stable",
	"/snap/bin/chromium",
];

/// Resolves the first usable executable among `candidates`.
///
/// Entries containing a path separator are checked on disk; bare names are
/// looked up on `PATH`.
pub fn find_executable<S: AsRef<str>>(candidates: &[S]) -> Option<PathBuf> {
	for candidate in candidates {
		let candidate = candidate.as_ref().trim();
		if candidate.is_empty() {
			continue;
		}

		if candidate.contains('/') {
			let path = Path::new(candidate);
			if path.is_file() {
				return Some(path.to_path_buf());
			}
		} else if let Ok(path) = which::which(candidate) {
			return Some(path);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn absolute_candidates_are_checked_on_disk() {
		let temp = TempDir::new().unwrap();
		let present = temp.path().join("player");
		std::fs::write(&present, "#!/bin/sh\n").unwrap();
		let missing = temp.path().join("missing");

		let candidates = [missing.to_string_lossy().to_string(), present.to_string_lossy().to_string()];
		assert_eq!(find_executable(&candidates), Some(present));
	}

	#[test]
	fn unknown_names_resolve_to_none() {
		assert_eq!(find_executable(&["definitely-not-a-real-binary-4e1f", ""]), None);
	}

	#[cfg(unix)]
	#[test]
	fn bare_names_are_resolved_on_path() {
		let resolved = find_executable(&["sh"]).expect("sh should be on PATH");
		assert!(resolved.is_absolute());
	}
}
