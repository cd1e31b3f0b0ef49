use std::path::{Path, PathBuf};

/// Filename convention for verification logs derived from a snapshot date.
pub const VLOG_SUFFIX: &str = "_satprep.vlog";

pub const MARKER_MONITORING: &str = "MONOK";
pub const MARKER_SNAPSHOT: &str = "SNAPOK";

/// Operator confirmations recorded out-of-band. An invalid log (missing or
/// unreadable) is not the same as a log without a marker: with an invalid log
/// no checklist item can be confirmed, and the explicit "unconfirmed"
/// negatives are suppressed downstream.
#[derive(Debug, Clone)]
pub struct VerificationLog {
    pub path: Option<PathBuf>,
    pub content: String,
    pub valid: bool,
}

impl VerificationLog {
    pub fn invalid() -> Self {
        Self {
            path: None,
            content: String::new(),
            valid: false,
        }
    }

    /// Loads the log from an explicit path, falling back to the derived
    /// `<YYYYMMDD>_satprep.vlog` convention (date of the older snapshot),
    /// then to the invalid state.
    pub fn locate(explicit: Option<&Path>, older_snapshot_date: &str) -> Self {
        if let Some(path) = explicit {
            if let Some(log) = Self::try_read(path) {
                return log;
            }
        }
        let derived = PathBuf::from(format!("{older_snapshot_date}{VLOG_SUFFIX}"));
        match Self::try_read(&derived) {
            Some(log) => log,
            None => Self::invalid(),
        }
    }

    fn try_read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Some(Self {
            path: Some(path.to_path_buf()),
            content,
            valid: true,
        })
    }

    pub fn confirms_monitoring(&self, name: &str) -> bool {
        self.contains_marker(MARKER_MONITORING, name)
    }

    pub fn confirms_snapshot(&self, name: &str) -> bool {
        self.contains_marker(MARKER_SNAPSHOT, name)
    }

    fn contains_marker(&self, marker: &str, name: &str) -> bool {
        self.valid && self.content.contains(&format!("{marker};{name}"))
    }
}
