use std::collections::BTreeMap;

pub const DELIMITER: char = ';';

/// Logical columns the reporting and maintenance tooling understands.
/// Snapshots may carry any subset; everything else in the header is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalColumn {
    Hostname,
    Ip,
    ErrataName,
    ErrataType,
    ErrataDesc,
    ErrataDate,
    ErrataReboot,
    SystemOwner,
    SystemCluster,
    SystemVirt,
    SystemVirtSnapshot,
    SystemVirtVmname,
    SystemMonitoring,
    SystemMonitoringNotes,
    SystemMonitoringName,
    SystemBackup,
    SystemBackupNotes,
    SystemAntivir,
    SystemAntivirNotes,
}

impl LogicalColumn {
    pub const ALL: [LogicalColumn; 19] = [
        LogicalColumn::Hostname,
        LogicalColumn::Ip,
        LogicalColumn::ErrataName,
        LogicalColumn::ErrataType,
        LogicalColumn::ErrataDesc,
        LogicalColumn::ErrataDate,
        LogicalColumn::ErrataReboot,
        LogicalColumn::SystemOwner,
        LogicalColumn::SystemCluster,
        LogicalColumn::SystemVirt,
        LogicalColumn::SystemVirtSnapshot,
        LogicalColumn::SystemVirtVmname,
        LogicalColumn::SystemMonitoring,
        LogicalColumn::SystemMonitoringNotes,
        LogicalColumn::SystemMonitoringName,
        LogicalColumn::SystemBackup,
        LogicalColumn::SystemBackupNotes,
        LogicalColumn::SystemAntivir,
        LogicalColumn::SystemAntivirNotes,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            LogicalColumn::Hostname => "hostname",
            LogicalColumn::Ip => "ip",
            LogicalColumn::ErrataName => "errata_name",
            LogicalColumn::ErrataType => "errata_type",
            LogicalColumn::ErrataDesc => "errata_desc",
            LogicalColumn::ErrataDate => "errata_date",
            LogicalColumn::ErrataReboot => "errata_reboot",
            LogicalColumn::SystemOwner => "system_owner",
            LogicalColumn::SystemCluster => "system_cluster",
            LogicalColumn::SystemVirt => "system_virt",
            LogicalColumn::SystemVirtSnapshot => "system_virt_snapshot",
            LogicalColumn::SystemVirtVmname => "system_virt_vmname",
            LogicalColumn::SystemMonitoring => "system_monitoring",
            LogicalColumn::SystemMonitoringNotes => "system_monitoring_notes",
            LogicalColumn::SystemMonitoringName => "system_monitoring_name",
            LogicalColumn::SystemBackup => "system_backup",
            LogicalColumn::SystemBackupNotes => "system_backup_notes",
            LogicalColumn::SystemAntivir => "system_antivir",
            LogicalColumn::SystemAntivirNotes => "system_antivir_notes",
        }
    }

    pub const fn is_errata(self) -> bool {
        matches!(
            self,
            LogicalColumn::ErrataName
                | LogicalColumn::ErrataType
                | LogicalColumn::ErrataDesc
                | LogicalColumn::ErrataDate
                | LogicalColumn::ErrataReboot
        )
    }

    /// Human-readable label for table headers.
    pub const fn label(self) -> &'static str {
        match self {
            LogicalColumn::ErrataName => "Name",
            LogicalColumn::ErrataType => "Type",
            LogicalColumn::ErrataDesc => "Description",
            LogicalColumn::ErrataDate => "Date",
            LogicalColumn::ErrataReboot => "Reboot required",
            other => other.name(),
        }
    }
}

/// Positional index of each logical column within one snapshot's header.
/// An absent column simply has no entry; dependent features degrade to their
/// neutral state instead of failing.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    index: BTreeMap<LogicalColumn, usize>,
}

impl Schema {
    pub fn resolve(header_line: &str) -> Self {
        let fields: Vec<&str> = header_line
            .trim_end_matches(['\r', '\n'])
            .split(DELIMITER)
            .collect();

        let mut index = BTreeMap::new();
        for col in LogicalColumn::ALL {
            if let Some(pos) = fields.iter().position(|f| *f == col.name()) {
                index.insert(col, pos);
            }
        }
        Self { index }
    }

    pub fn col(&self, col: LogicalColumn) -> Option<usize> {
        self.index.get(&col).copied()
    }

    pub fn has(&self, col: LogicalColumn) -> bool {
        self.index.contains_key(&col)
    }

    /// Field value from a record for a logical column, `None` when the column
    /// is absent from this schema or the record is too short.
    pub fn value<'a>(&self, record: &'a [String], col: LogicalColumn) -> Option<&'a str> {
        let idx = self.col(col)?;
        record.get(idx).map(String::as_str)
    }

    pub fn missing(&self) -> Vec<LogicalColumn> {
        LogicalColumn::ALL
            .into_iter()
            .filter(|c| !self.has(*c))
            .collect()
    }
}

/// Two snapshots are only comparable when their raw header lines match
/// byte for byte.
pub fn headers_compatible(header1: &str, header2: &str) -> bool {
    header1 == header2
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "hostname;ip;errata_name;errata_type;errata_desc;errata_date;errata_reboot;system_monitoring";

    #[test]
    fn resolve_maps_present_columns() {
        let schema = Schema::resolve(HEADER);
        assert_eq!(schema.col(LogicalColumn::Hostname), Some(0));
        assert_eq!(schema.col(LogicalColumn::ErrataReboot), Some(6));
        assert_eq!(schema.col(LogicalColumn::SystemMonitoring), Some(7));
    }

    #[test]
    fn resolve_leaves_absent_columns_unmapped() {
        let schema = Schema::resolve(HEADER);
        assert_eq!(schema.col(LogicalColumn::SystemBackup), None);
        assert!(schema.missing().contains(&LogicalColumn::SystemVirt));
    }

    #[test]
    fn resolve_strips_trailing_newline() {
        let schema = Schema::resolve("hostname;ip\r\n");
        assert_eq!(schema.col(LogicalColumn::Hostname), Some(0));
        assert_eq!(schema.col(LogicalColumn::Ip), Some(1));
    }

    #[test]
    fn value_handles_short_records() {
        let schema = Schema::resolve("hostname;ip");
        let record = vec!["web01".to_string()];
        assert_eq!(schema.value(&record, LogicalColumn::Hostname), Some("web01"));
        assert_eq!(schema.value(&record, LogicalColumn::Ip), None);
    }

    #[test]
    fn errata_columns_are_flagged() {
        assert!(LogicalColumn::ErrataDesc.is_errata());
        assert!(!LogicalColumn::SystemBackup.is_errata());
    }

    #[test]
    fn header_compatibility_is_byte_exact() {
        assert!(headers_compatible("a;b;c", "a;b;c"));
        assert!(!headers_compatible("a;b;c", "a;c;b"));
    }
}
