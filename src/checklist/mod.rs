use serde::Serialize;

use crate::schema::{LogicalColumn, Schema};
use crate::vlog::VerificationLog;

/// Tri-state for checklist items that an operator can confirm through the
/// verification log. `Unknown` covers the invalid-log case: without a valid
/// log the explicit "unconfirmed" negative must not be implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed,
    Unconfirmed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Cluster,
    Standalone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringState {
    /// Monitoring deliberately disabled for this system.
    Disabled,
    Active(Confirmation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtState {
    /// Physical host: VM snapshot checklist does not apply.
    Physical,
    Virtual(Confirmation),
}

/// Operational checklist flags for one host, derived from its delta records.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistState {
    pub cluster: ClusterState,
    pub monitoring: MonitoringState,
    pub monitoring_notes: String,
    pub backup_disabled: bool,
    pub backup_notes: String,
    pub antivir_disabled: bool,
    pub antivir_notes: String,
    pub virt: VirtState,
    pub no_reboot_required: bool,
}

impl Default for ChecklistState {
    fn default() -> Self {
        Self {
            cluster: ClusterState::Standalone,
            monitoring: MonitoringState::Active(Confirmation::Unknown),
            monitoring_notes: String::new(),
            backup_disabled: false,
            backup_notes: String::new(),
            antivir_disabled: false,
            antivir_notes: String::new(),
            virt: VirtState::Physical,
            no_reboot_required: false,
        }
    }
}

/// Folds all delta records of one host into a checklist. Box flags follow the
/// last record; the no-reboot flag is sticky once any record sets it.
pub fn derive(
    host: &str,
    records: &[Vec<String>],
    schema: &Schema,
    vlog: &VerificationLog,
) -> ChecklistState {
    let mut state = ChecklistState::default();

    for record in records {
        state.cluster = if schema.value(record, LogicalColumn::SystemCluster) == Some("1") {
            ClusterState::Cluster
        } else {
            ClusterState::Standalone
        };

        state.monitoring = if schema.value(record, LogicalColumn::SystemMonitoring) == Some("0") {
            MonitoringState::Disabled
        } else {
            let name = lookup_name(host, record, schema, LogicalColumn::SystemMonitoringName);
            MonitoringState::Active(confirm(vlog.confirms_monitoring(&name), vlog.valid))
        };
        state.monitoring_notes = notes(record, schema, LogicalColumn::SystemMonitoringNotes);

        if schema.value(record, LogicalColumn::SystemBackup) == Some("0") {
            state.backup_disabled = true;
            state.backup_notes = notes(record, schema, LogicalColumn::SystemBackupNotes);
        } else {
            state.backup_disabled = false;
            state.backup_notes.clear();
        }

        if schema.value(record, LogicalColumn::SystemAntivir) == Some("0") {
            state.antivir_disabled = true;
            state.antivir_notes = notes(record, schema, LogicalColumn::SystemAntivirNotes);
        } else {
            state.antivir_disabled = false;
            state.antivir_notes.clear();
        }

        state.virt = if schema.value(record, LogicalColumn::SystemVirt) == Some("1") {
            let name = lookup_name(host, record, schema, LogicalColumn::SystemVirtVmname);
            VirtState::Virtual(confirm(vlog.confirms_snapshot(&name), vlog.valid))
        } else {
            VirtState::Physical
        };

        if let Some(reboot) = schema.value(record, LogicalColumn::ErrataReboot) {
            if reboot != "reboot_suggested" {
                state.no_reboot_required = true;
            }
        }
    }

    state
}

fn confirm(marker_present: bool, vlog_valid: bool) -> Confirmation {
    if marker_present {
        Confirmation::Confirmed
    } else if vlog_valid {
        Confirmation::Unconfirmed
    } else {
        Confirmation::Unknown
    }
}

/// Name the verification log is keyed on: the per-row override column when
/// non-empty (truncated at the first `@`), otherwise the host name.
fn lookup_name(
    host: &str,
    record: &[String],
    schema: &Schema,
    override_col: LogicalColumn,
) -> String {
    match schema.value(record, override_col) {
        Some(name) if !name.is_empty() => match name.find('@') {
            Some(at) => name[..at].to_string(),
            None => name.to_string(),
        },
        _ => host.to_string(),
    }
}

/// Notes columns only count when longer than one character, as in the
/// original reports.
fn notes(record: &[String], schema: &Schema, col: LogicalColumn) -> String {
    match schema.value(record, col) {
        Some(value) if value.len() > 1 => value.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "hostname;errata_name;errata_reboot;system_cluster;system_virt;system_virt_vmname;system_monitoring;system_monitoring_notes;system_monitoring_name;system_backup;system_backup_notes;system_antivir;system_antivir_notes";

    fn schema() -> Schema {
        Schema::resolve(HEADER)
    }

    fn record(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn valid_vlog(content: &str) -> VerificationLog {
        VerificationLog {
            path: None,
            content: content.to_string(),
            valid: true,
        }
    }

    fn full_record() -> Vec<String> {
        record(&[
            "web01",           // hostname
            "RHSA-2015:0001",  // errata_name
            "reboot_suggested",// errata_reboot
            "1",               // system_cluster
            "1",               // system_virt
            "web01-vm@esx1",   // system_virt_vmname
            "1",               // system_monitoring
            "check via icinga",// system_monitoring_notes
            "web01-mon",       // system_monitoring_name
            "0",               // system_backup
            "no backup agent", // system_backup_notes
            "0",               // system_antivir
            "not needed",      // system_antivir_notes
        ])
    }

    #[test]
    fn monitoring_confirmed_by_marker() {
        let state = derive(
            "web01",
            &[full_record()],
            &schema(),
            &valid_vlog("MONOK;web01-mon\n"),
        );
        assert_eq!(
            state.monitoring,
            MonitoringState::Active(Confirmation::Confirmed)
        );
    }

    #[test]
    fn monitoring_unconfirmed_without_marker_in_valid_log() {
        let state = derive("web01", &[full_record()], &schema(), &valid_vlog(""));
        assert_eq!(
            state.monitoring,
            MonitoringState::Active(Confirmation::Unconfirmed)
        );
    }

    #[test]
    fn invalid_vlog_suppresses_unconfirmed_negative() {
        let state = derive(
            "web01",
            &[full_record()],
            &schema(),
            &VerificationLog::invalid(),
        );
        assert_eq!(
            state.monitoring,
            MonitoringState::Active(Confirmation::Unknown)
        );
        assert_eq!(state.virt, VirtState::Virtual(Confirmation::Unknown));
    }

    #[test]
    fn monitoring_disabled_beats_confirmation() {
        let mut rec = full_record();
        rec[6] = "0".to_string();
        let state = derive("web01", &[rec], &schema(), &valid_vlog("MONOK;web01-mon\n"));
        assert_eq!(state.monitoring, MonitoringState::Disabled);
    }

    #[test]
    fn vm_snapshot_lookup_truncates_at_sign() {
        let state = derive(
            "web01",
            &[full_record()],
            &schema(),
            &valid_vlog("SNAPOK;web01-vm\n"),
        );
        assert_eq!(state.virt, VirtState::Virtual(Confirmation::Confirmed));
    }

    #[test]
    fn lookup_falls_back_to_host_name() {
        let mut rec = full_record();
        rec[5] = String::new(); // no vm name override
        let state = derive("web01", &[rec], &schema(), &valid_vlog("SNAPOK;web01\n"));
        assert_eq!(state.virt, VirtState::Virtual(Confirmation::Confirmed));
    }

    #[test]
    fn physical_host_is_exempt_from_snapshots() {
        let mut rec = full_record();
        rec[4] = "0".to_string();
        let state = derive("web01", &[rec], &schema(), &valid_vlog(""));
        assert_eq!(state.virt, VirtState::Physical);
    }

    #[test]
    fn backup_and_antivir_notes_require_disabled_flag() {
        let state = derive("web01", &[full_record()], &schema(), &valid_vlog(""));
        assert!(state.backup_disabled);
        assert_eq!(state.backup_notes, "no backup agent");
        assert!(state.antivir_disabled);
        assert_eq!(state.antivir_notes, "not needed");

        let mut rec = full_record();
        rec[9] = "1".to_string();
        rec[11] = "1".to_string();
        let state = derive("web01", &[rec], &schema(), &valid_vlog(""));
        assert!(!state.backup_disabled);
        assert!(state.backup_notes.is_empty());
        assert!(!state.antivir_disabled);
        assert!(state.antivir_notes.is_empty());
    }

    #[test]
    fn single_char_notes_are_ignored() {
        let mut rec = full_record();
        rec[7] = "x".to_string();
        let state = derive("web01", &[rec], &schema(), &valid_vlog(""));
        assert!(state.monitoring_notes.is_empty());
    }

    #[test]
    fn reboot_flag_is_sticky_across_records() {
        let mut no_reboot = full_record();
        no_reboot[2] = "reboot_not_needed".to_string();
        let suggested = full_record();
        let state = derive(
            "web01",
            &[no_reboot, suggested],
            &schema(),
            &valid_vlog(""),
        );
        assert!(state.no_reboot_required);
    }

    #[test]
    fn cluster_flag_from_last_record() {
        let clustered = full_record();
        let mut standalone = full_record();
        standalone[3] = "0".to_string();
        let state = derive(
            "web01",
            &[clustered, standalone],
            &schema(),
            &valid_vlog(""),
        );
        assert_eq!(state.cluster, ClusterState::Standalone);
    }

    #[test]
    fn absent_columns_leave_neutral_defaults() {
        let schema = Schema::resolve("hostname;errata_name");
        let rec = record(&["web01", "RHSA-2015:0001"]);
        let state = derive("web01", &[rec], &schema, &valid_vlog(""));
        assert_eq!(state.cluster, ClusterState::Standalone);
        assert_eq!(state.virt, VirtState::Physical);
        assert!(!state.backup_disabled);
        assert!(!state.antivir_disabled);
        assert!(!state.no_reboot_required);
    }
}
