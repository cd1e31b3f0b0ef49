use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::schema::Schema;

/// Which snapshot wins the "after" role when both files carry the same
/// modification timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// The second CLI argument is treated as the newer snapshot.
    SecondNewer,
    /// The first CLI argument is treated as the newer snapshot.
    FirstNewer,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::SecondNewer
    }
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "second-newer" => Ok(TieBreak::SecondNewer),
            "first-newer" => Ok(TieBreak::FirstNewer),
            other => Err(format!(
                "invalid tie_break value: {other} (expected second-newer|first-newer)"
            )),
        }
    }
}

/// One point-in-time inventory export: raw header, raw body lines and the
/// file's modification time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub header: String,
    pub lines: Vec<String>,
    pub modified: OffsetDateTime,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("failed to stat snapshot: {}", path.display()))?;

        let mut lines = text.lines().map(ToOwned::to_owned);
        let header = lines.next().unwrap_or_default();
        let lines: Vec<String> = lines.collect();

        Ok(Self {
            path: path.to_path_buf(),
            header,
            lines,
            modified: OffsetDateTime::from(modified),
        })
    }

    pub fn schema(&self) -> Schema {
        Schema::resolve(&self.header)
    }

    /// Modification date as `YYYYMMDD`, used for the vlog filename convention.
    pub fn date_compact(&self) -> String {
        let fmt = format_description!("[year][month][day]");
        self.modified
            .format(&fmt)
            .unwrap_or_else(|_| "00000000".to_string())
    }

    /// Modification date as `YYYY-MM-DD`, used in rendered reports.
    pub fn date_display(&self) -> String {
        let fmt = format_description!("[year]-[month]-[day]");
        self.modified
            .format(&fmt)
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Orders two snapshots into (before, after) by modification time. Strict
/// `<` comparison; equal timestamps fall back to the configured tie-break.
pub fn order(first: Snapshot, second: Snapshot, tie_break: TieBreak) -> (Snapshot, Snapshot) {
    if first.modified < second.modified {
        (first, second)
    } else if second.modified < first.modified {
        (second, first)
    } else {
        match tie_break {
            TieBreak::SecondNewer => (first, second),
            TieBreak::FirstNewer => (second, first),
        }
    }
}

/// Lines present in `after` but not in `before`, compared order-independently:
/// both sides are sorted first, so a record that merely moved rows is never a
/// spurious delta. Duplicate lines are matched up pairwise. Blank lines are
/// dropped.
pub fn diff(before: &Snapshot, after: &Snapshot) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for line in &before.lines {
        *seen.entry(line.as_str()).or_insert(0) += 1;
    }

    let mut after_sorted: Vec<&String> = after.lines.iter().collect();
    after_sorted.sort();

    let mut delta = Vec::new();
    for line in after_sorted {
        if line.trim().is_empty() {
            continue;
        }
        match seen.get_mut(line.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => delta.push(line.clone()),
        }
    }
    delta
}

/// Writes the delta artifact: shared header plus only the delta rows.
pub fn write_delta(path: &Path, header: &str, delta: &[String]) -> Result<()> {
    let mut out = String::with_capacity(header.len() + delta.iter().map(|l| l.len() + 1).sum::<usize>() + 1);
    out.push_str(header);
    out.push('\n');
    for line in delta {
        out.push_str(line);
        out.push('\n');
    }
    std::fs::write(path, out)
        .with_context(|| format!("failed to write delta report: {}", path.display()))
}
