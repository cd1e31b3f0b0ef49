use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::schema::{DELIMITER, LogicalColumn, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Downtime for monitored hosts with reboot-required patches, snapshots
    /// for virtual hosts with the snapshot flag set.
    Filtered,
    /// Every host in the snapshot enters both lists.
    NoIntelligence,
}

/// Deduplicated, sorted host lists for maintenance preparation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostSelection {
    pub downtime: Vec<String>,
    pub snapshot: Vec<String>,
}

pub fn select_from_file(path: &Path, mode: SelectionMode) -> Result<HostSelection> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
    Ok(select(&text, mode))
}

pub fn select(snapshot_text: &str, mode: SelectionMode) -> HostSelection {
    let header = snapshot_text.lines().next().unwrap_or_default();
    let schema = Schema::resolve(header);

    let mut downtime = BTreeSet::new();
    let mut snapshot = BTreeSet::new();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER as u8)
        .quote(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(snapshot_text.as_bytes());

    for result in reader.records() {
        let Ok(record) = result else { continue };
        let record: Vec<String> = record.iter().map(ToOwned::to_owned).collect();

        match mode {
            SelectionMode::NoIntelligence => {
                downtime.insert(monitoring_name(&record, &schema));
                snapshot.insert(vm_name(&record, &schema));
            }
            SelectionMode::Filtered => {
                if schema.value(&record, LogicalColumn::SystemMonitoring) == Some("1")
                    && schema.value(&record, LogicalColumn::ErrataReboot) == Some("1")
                {
                    downtime.insert(monitoring_name(&record, &schema));
                }
                if schema.value(&record, LogicalColumn::SystemVirt) == Some("1")
                    && schema.value(&record, LogicalColumn::SystemVirtSnapshot) == Some("1")
                {
                    snapshot.insert(vm_name(&record, &schema));
                }
            }
        }
    }

    // header leakage: the literal column name must never select a host
    downtime.remove("hostname");
    snapshot.remove("hostname");
    downtime.remove("");
    snapshot.remove("");

    HostSelection {
        downtime: downtime.into_iter().collect(),
        snapshot: snapshot.into_iter().collect(),
    }
}

fn monitoring_name(record: &[String], schema: &Schema) -> String {
    named(record, schema, LogicalColumn::SystemMonitoringName)
}

fn vm_name(record: &[String], schema: &Schema) -> String {
    named(record, schema, LogicalColumn::SystemVirtVmname)
}

fn named(record: &[String], schema: &Schema, override_col: LogicalColumn) -> String {
    match schema.value(record, override_col) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => schema
            .value(record, LogicalColumn::Hostname)
            .unwrap_or("")
            .to_string(),
    }
}
