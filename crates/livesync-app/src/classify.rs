//! Change classification
//!
//! Splits the files of a sync cycle into those that force an application
//! restart and those the running app can pick up with a reload.

use glob::{MatchOptions, Pattern};

use livesync_core::prelude::*;
use livesync_core::LocalToDeviceFile;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Result of [`ChangeClassifier::classify`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeClassification {
    pub restart_required: Vec<LocalToDeviceFile>,
    pub refreshable: Vec<LocalToDeviceFile>,
}

impl ChangeClassification {
    pub fn requires_restart(&self) -> bool {
        !self.restart_required.is_empty()
    }
}

/// Matches device paths against the exclusion globs and the script extension.
///
/// Globs ignore case; the script extension is an exact, case-sensitive suffix.
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    patterns: Vec<Pattern>,
    script_extension: String,
}

impl ChangeClassifier {
    /// Compile the exclusion globs. An invalid glob is a configuration error.
    pub fn new<S: AsRef<str>>(excluded_patterns: &[S], script_extension: &str) -> Result<Self> {
        let patterns = excluded_patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| {
                    Error::config_invalid(format!("invalid exclusion pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            script_extension: script_extension.to_string(),
        })
    }

    /// `true` when changing `device_path` requires an application restart.
    pub fn is_restart_required(&self, device_path: &str) -> bool {
        if !self.script_extension.is_empty() && device_path.ends_with(&self.script_extension) {
            return true;
        }

        self.patterns
            .iter()
            .any(|p| p.matches_with(device_path, MATCH_OPTIONS))
    }

    pub fn classify(&self, files: &[LocalToDeviceFile]) -> ChangeClassification {
        let (restart_required, refreshable): (Vec<_>, Vec<_>) = files
            .iter()
            .cloned()
            .partition(|f| self.is_restart_required(f.device_path()));

        trace!(
            "Classified {} file(s): {} restart-required, {} refreshable",
            files.len(),
            restart_required.len(),
            refreshable.len()
        );

        ChangeClassification {
            restart_required,
            refreshable,
        }
    }
}
