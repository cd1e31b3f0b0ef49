use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use crate::checklist::{self, ChecklistState, Confirmation, MonitoringState, VirtState};
use crate::schema::{DELIMITER, LogicalColumn, Schema};
use crate::vlog::VerificationLog;

const CHECKED: &str = "$\\CheckedBox$";
const CLEAR: &str = "$\\Box$";

/// Parses `;`-delimited, `|`-quoted records from a delta artifact, header row
/// included (callers exclude it via the literal `hostname` token, as the
/// original scan did).
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER as u8)
        .quote(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.context("failed to parse delta record")?;
        records.push(record.iter().map(ToOwned::to_owned).collect());
    }
    Ok(records)
}

/// Distinct hosts in first-seen order. The literal header token `hostname`
/// never counts as a host.
pub fn discover_hosts(records: &[Vec<String>], schema: &Schema) -> Vec<String> {
    let host_idx = schema.col(LogicalColumn::Hostname).unwrap_or(0);
    let mut hosts: Vec<String> = Vec::new();
    for record in records {
        let Some(host) = record.get(host_idx) else {
            continue;
        };
        if host == "hostname" || host.is_empty() {
            continue;
        }
        if !hosts.iter().any(|h| h == host) {
            hosts.push(host.clone());
        }
    }
    hosts
}

/// Inputs shared by every host report of one run.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Display date of the newer snapshot.
    pub date: String,
    pub orientation: String,
    pub footer: String,
    pub logo: String,
}

/// One host's assembled report: the full template substitution map plus the
/// semantic checklist it was derived from.
#[derive(Debug, Clone)]
pub struct HostReport {
    pub host: String,
    pub checklist: ChecklistState,
    pub payload: BTreeMap<String, String>,
}

/// Groups delta records by host and builds one payload per host. Row order
/// within a host's errata table follows the delta-scan order.
pub fn assemble(
    records: &[Vec<String>],
    schema: &Schema,
    vlog: &VerificationLog,
    ctx: &ReportContext,
) -> Vec<HostReport> {
    let host_idx = schema.col(LogicalColumn::Hostname).unwrap_or(0);
    discover_hosts(records, schema)
        .into_iter()
        .map(|host| {
            let host_records: Vec<Vec<String>> = records
                .iter()
                .filter(|r| r.get(host_idx).map(String::as_str) == Some(host.as_str()))
                .cloned()
                .collect();
            let checklist = checklist::derive(&host, &host_records, schema, vlog);
            let payload = build_payload(&host, &host_records, schema, &checklist, ctx);
            HostReport {
                host,
                checklist,
                payload,
            }
        })
        .collect()
}

fn build_payload(
    host: &str,
    records: &[Vec<String>],
    schema: &Schema,
    checklist: &ChecklistState,
    ctx: &ReportContext,
) -> BTreeMap<String, String> {
    let mut payload = BTreeMap::new();
    let set = |payload: &mut BTreeMap<String, String>, key: &str, value: &str| {
        payload.insert(key.to_string(), value.to_string());
    };

    set(&mut payload, "titleHostname", host);
    set(&mut payload, "date", &ctx.date);
    set(&mut payload, "orientation", &format!("{},", ctx.orientation));
    set(&mut payload, "footer", &ctx.footer);
    set(&mut payload, "logo", &ctx.logo);

    // ip and owner follow the last record of the host, like the box flags
    let last = records.last();
    let ip = last
        .and_then(|r| schema.value(r, LogicalColumn::Ip))
        .unwrap_or("");
    set(&mut payload, "ip", ip);
    let owner = last
        .and_then(|r| schema.value(r, LogicalColumn::SystemOwner))
        .unwrap_or("")
        .replace("%%nl", "\\newline");
    set(&mut payload, "owner", &owner);

    match checklist.cluster {
        checklist::ClusterState::Cluster => {
            set(&mut payload, "systemCluster", CHECKED);
            set(&mut payload, "systemStandalone", CLEAR);
            set(&mut payload, "hintsClusterTest", "");
        }
        checklist::ClusterState::Standalone => {
            set(&mut payload, "systemCluster", CLEAR);
            set(&mut payload, "systemStandalone", CHECKED);
            set(&mut payload, "hintsClusterTest", "not a cluster system");
        }
    }

    let (mon_yes, mon_no) = match checklist.monitoring {
        MonitoringState::Disabled => (CLEAR, CHECKED),
        MonitoringState::Active(Confirmation::Confirmed) => (CHECKED, CLEAR),
        MonitoringState::Active(Confirmation::Unconfirmed) => (CLEAR, CHECKED),
        MonitoringState::Active(Confirmation::Unknown) => (CLEAR, CLEAR),
    };
    set(&mut payload, "monSchedYes", mon_yes);
    set(&mut payload, "monSchedNo", mon_no);
    set(&mut payload, "monSchedNotes", &checklist.monitoring_notes);

    set(
        &mut payload,
        "BackupNo",
        if checklist.backup_disabled { CHECKED } else { CLEAR },
    );
    set(&mut payload, "BackupNoNotes", &checklist.backup_notes);
    set(
        &mut payload,
        "AntivirNo",
        if checklist.antivir_disabled { CHECKED } else { CLEAR },
    );
    set(&mut payload, "AntivirNoNotes", &checklist.antivir_notes);

    match checklist.virt {
        VirtState::Virtual(confirmation) => {
            set(&mut payload, "hwCheckNo", CHECKED);
            set(&mut payload, "hwCheckNotes", "not a physical host");
            set(&mut payload, "vmSnapNotes", "");
            let (snap_yes, snap_no) = match confirmation {
                Confirmation::Confirmed => (CHECKED, CLEAR),
                Confirmation::Unconfirmed => (CLEAR, CHECKED),
                Confirmation::Unknown => (CLEAR, CLEAR),
            };
            set(&mut payload, "vmSnapYes", snap_yes);
            set(&mut payload, "vmSnapNo", snap_no);
        }
        VirtState::Physical => {
            set(&mut payload, "hwCheckNo", CLEAR);
            set(&mut payload, "hwCheckNotes", "");
            set(&mut payload, "vmSnapYes", CLEAR);
            set(&mut payload, "vmSnapNo", CHECKED);
            set(&mut payload, "vmSnapNotes", "not a virtual machine");
        }
    }

    if checklist.no_reboot_required {
        set(&mut payload, "rebootNo", CHECKED);
        set(&mut payload, "rebootNotes", "no reboot required");
    } else {
        set(&mut payload, "rebootNo", CLEAR);
        set(&mut payload, "rebootNotes", "");
    }

    set(
        &mut payload,
        "errata",
        &errata_table(records, schema),
    );

    payload
}

fn errata_columns() -> Vec<LogicalColumn> {
    LogicalColumn::ALL
        .into_iter()
        .filter(|c| c.is_errata())
        .collect()
}

/// Builds the per-host patch table. Every errata-type registry column gets a
/// table column; values of unresolved columns render as `unknown`. Underscores
/// are escaped for the typesetting format.
fn errata_table(records: &[Vec<String>], schema: &Schema) -> String {
    let columns = errata_columns();

    let descriptor: String = {
        let mut d = String::new();
        for col in &columns {
            if matches!(col, LogicalColumn::ErrataName | LogicalColumn::ErrataDesc) {
                d.push_str(" | X");
            } else {
                d.push_str(" | l");
            }
        }
        d.push_str(" | ");
        d
    };

    let mut table = String::from("\\section*{}\n");
    table.push_str(&format!("\\begin{{tabularx}}{{\\textwidth}}{{{descriptor}}}\n"));
    table.push_str("\\hline\n");
    table.push_str(&format!(
        "\\multicolumn{{{}}}{{|c|}}{{\\cellcolor{{Gray}}\\textbf{{List of installed patches}}}} \\\\\n",
        columns.len()
    ));
    table.push_str("\\hline\n");

    let header_row: Vec<String> = columns
        .iter()
        .map(|c| format!("\\textbf{{{}}}", c.label()))
        .collect();
    table.push_str(&header_row.join(" & "));
    table.push_str(" \\\\\n");

    let mut rows = String::new();
    for record in records {
        // rows without a patch name carry no table content
        match schema.value(record, LogicalColumn::ErrataName) {
            Some(name) if !name.is_empty() => {}
            _ => continue,
        }
        let cells: Vec<String> = columns
            .iter()
            .map(|col| match schema.value(record, *col) {
                Some(value) if *col == LogicalColumn::ErrataReboot => {
                    if value == "1" { "yes".to_string() } else { "no".to_string() }
                }
                Some(value) => value.to_string(),
                None => "unknown".to_string(),
            })
            .collect();
        rows.push_str(&cells.join(" & "));
        rows.push_str(" \\\\\n");
    }
    table.push_str(&rows.replace('_', "\\_"));

    table.push_str("\\hline\n\\end{tabularx}");
    table
}

/// Substitutes `%%key` placeholders from the payload in a single pass over
/// the template. Longer keys are matched first so a key never clobbers another
/// key it prefixes, and substituted values are never rescanned: a literal
/// `%%date` inside an errata description stays as written.
pub fn substitute(template: &str, payload: &BTreeMap<String, String>) -> String {
    let mut keys: Vec<&String> = payload.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find("%%") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 2..];
        match keys.iter().find(|k| tail.starts_with(k.as_str())) {
            Some(key) => {
                out.push_str(&payload[key.as_str()]);
                rest = &tail[key.len()..];
            }
            None => {
                out.push_str("%%");
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Document compilation seam. The production implementation shells out to a
/// typesetting binary; tests substitute their own.
pub trait Renderer {
    fn render(&self, tex_path: &Path) -> Result<()>;
}

pub struct PdfLatexRenderer {
    pub binary: PathBuf,
    pub timeout: Duration,
}

impl Renderer for PdfLatexRenderer {
    fn render(&self, tex_path: &Path) -> Result<()> {
        let file_name = tex_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid tex path: {}", tex_path.display()))?;
        let cwd = tex_path.parent().filter(|p| !p.as_os_str().is_empty());

        let binary = self.binary.display().to_string();
        let output = crate::platform::run_command_in(
            &binary,
            &["-interaction=batchmode", file_name],
            cwd,
            self.timeout,
        )?;
        if output.exit_code != 0 {
            return Err(anyhow!(
                "{binary} exited with code {} for {file_name}",
                output.exit_code
            ));
        }
        Ok(())
    }
}

/// Writes one tex file per host and compiles it, isolating per-host failures:
/// every host is attempted, failures are collected for the caller.
pub fn render_hosts(
    reports: &[HostReport],
    template: &str,
    work_dir: &Path,
    renderer: &dyn Renderer,
    preserve_tex: bool,
    progress: Option<&indicatif::ProgressBar>,
) -> (Vec<String>, Vec<RenderFailure>) {
    let mut rendered = Vec::new();
    let mut failed = Vec::new();

    for report in reports {
        if let Some(pb) = progress {
            pb.set_message(format!("rendering {}", report.host));
        }
        let stem = report.host.replace(' ', "");
        let tex_path = work_dir.join(format!("{stem}.tex"));

        let result = std::fs::write(&tex_path, substitute(template, &report.payload))
            .with_context(|| format!("failed to write {}", tex_path.display()))
            .and_then(|()| renderer.render(&tex_path));

        if !preserve_tex {
            for ext in ["tex", "aux", "log", "out"] {
                let _ = std::fs::remove_file(work_dir.join(format!("{stem}.{ext}")));
            }
        }

        match result {
            Ok(()) => rendered.push(report.host.clone()),
            Err(err) => failed.push(RenderFailure {
                host: report.host.clone(),
                error: format!("{err:#}"),
            }),
        }
    }

    (rendered, failed)
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderFailure {
    pub host: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub snapshot1: PathBuf,
    pub snapshot2: PathBuf,
    pub output: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub logo: Option<PathBuf>,
    pub footer: String,
    pub orientation: String,
    pub pdflatex_binary: PathBuf,
    pub verification_log: Option<PathBuf>,
    pub no_host_reports: bool,
    pub preserve_tex: bool,
    pub tie_break: crate::snapshot::TieBreak,
    pub timeout: Duration,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRunSummary {
    pub delta_path: String,
    pub delta_rows: usize,
    pub hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlog_path: Option<String>,
    pub vlog_valid: bool,
    pub host_reports_skipped: bool,
    pub rendered: Vec<String>,
    pub failed: Vec<RenderFailure>,
    pub notes: Vec<String>,
}

/// Full report run: diff the snapshots, write the delta artifact and compile
/// one document per affected host. Render failures are collected in the
/// summary, never aborting the remaining hosts.
pub fn run_report(req: &ReportRequest) -> Result<ReportRunSummary> {
    let mut notes = Vec::new();

    let first = crate::snapshot::Snapshot::load(&req.snapshot1)?;
    let second = crate::snapshot::Snapshot::load(&req.snapshot2)?;

    if !crate::schema::headers_compatible(&first.header, &second.header) {
        return Err(crate::exit::report_failed(format!(
            "snapshots are incompatible: {} and {} have different columns",
            req.snapshot1.display(),
            req.snapshot2.display()
        )));
    }

    let schema = first.schema();
    for col in schema.missing() {
        notes.push(format!(
            "column {} not present, dependent checklist items stay neutral",
            col.name()
        ));
    }

    let template_path = resolve_template(req.template.as_deref())?;
    if !req.no_host_reports && !req.pdflatex_binary.is_file() {
        return Err(crate::exit::report_failed(format!(
            "pdflatex binary not found: {}",
            req.pdflatex_binary.display()
        )));
    }

    let (before, after) = crate::snapshot::order(first, second, req.tie_break);
    notes.push(format!(
        "assuming {} is the earlier snapshot",
        before.path.display()
    ));

    let delta = crate::snapshot::diff(&before, &after);
    let delta_path = delta_artifact_path(req.output.as_deref());
    crate::snapshot::write_delta(&delta_path, &after.header, &delta)
        .map_err(crate::exit::report_failed_err)?;

    let vlog = VerificationLog::locate(req.verification_log.as_deref(), &before.date_compact());
    if !vlog.valid {
        notes.push(
            "no valid verification log found, snapshot and monitoring checkboxes stay unmarked"
                .to_string(),
        );
    }

    let delta_text = std::fs::read_to_string(&delta_path)
        .with_context(|| format!("failed to re-read delta: {}", delta_path.display()))?;
    let records = parse_records(&delta_text)?;
    let hosts = discover_hosts(&records, &schema);

    if req.no_host_reports {
        return Ok(ReportRunSummary {
            delta_path: delta_path.display().to_string(),
            delta_rows: delta.len(),
            hosts,
            vlog_path: vlog.path.map(|p| p.display().to_string()),
            vlog_valid: vlog.valid,
            host_reports_skipped: true,
            rendered: Vec::new(),
            failed: Vec::new(),
            notes,
        });
    }

    let template = std::fs::read_to_string(&template_path).map_err(|err| {
        crate::exit::report_failed(format!(
            "failed to read template {}: {err}",
            template_path.display()
        ))
    })?;

    let logo = resolve_logo(req.logo.as_deref(), &mut notes);
    let ctx = ReportContext {
        date: after.date_display(),
        orientation: req.orientation.clone(),
        footer: req.footer.clone(),
        logo,
    };
    let reports = assemble(&records, &schema, &vlog, &ctx);

    let renderer = PdfLatexRenderer {
        binary: req.pdflatex_binary.clone(),
        timeout: req.timeout,
    };
    let work_dir = delta_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| PathBuf::from("."));

    let pb = if req.show_progress {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let (rendered, failed) = render_hosts(
        &reports,
        &template,
        &work_dir,
        &renderer,
        req.preserve_tex,
        pb.as_ref(),
    );

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    Ok(ReportRunSummary {
        delta_path: delta_path.display().to_string(),
        delta_rows: delta.len(),
        hosts,
        vlog_path: vlog.path.map(|p| p.display().to_string()),
        vlog_valid: vlog.valid,
        host_reports_skipped: false,
        rendered,
        failed,
        notes,
    })
}

fn delta_artifact_path(output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) => {
            if path.extension().is_some() {
                path.to_path_buf()
            } else {
                path.with_extension("csv")
            }
        }
        None => {
            let fmt = time::macros::format_description!("[year][month][day]");
            let today = time::OffsetDateTime::now_utc()
                .format(&fmt)
                .unwrap_or_else(|_| "00000000".to_string());
            PathBuf::from(format!("errata-diff-report-{today}.csv"))
        }
    }
}

fn resolve_template(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(crate::exit::report_failed(format!(
            "template file not found: {}",
            path.display()
        )));
    }
    let fallback = crate::platform::install_dir()
        .map(|dir| dir.join("default.tex"))
        .unwrap_or_else(|| PathBuf::from("default.tex"));
    if fallback.is_file() {
        Ok(fallback)
    } else {
        Err(crate::exit::report_failed(format!(
            "template file not found: {}",
            fallback.display()
        )))
    }
}

fn resolve_logo(explicit: Option<&Path>, notes: &mut Vec<String>) -> String {
    if let Some(path) = explicit {
        if path.is_file() {
            return path.display().to_string();
        }
        notes.push(format!(
            "logo image {} not readable, using the bundled default",
            path.display()
        ));
    }
    crate::platform::install_dir()
        .map(|dir| dir.join("default_logo.jpg"))
        .unwrap_or_else(|| PathBuf::from("default_logo.jpg"))
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "hostname;ip;errata_name;errata_type;errata_desc;errata_date;errata_reboot;system_owner";

    fn schema() -> Schema {
        Schema::resolve(HEADER)
    }

    fn ctx() -> ReportContext {
        ReportContext {
            date: "2015-06-01".to_string(),
            orientation: "landscape".to_string(),
            footer: "footer text".to_string(),
            logo: "/opt/logo.jpg".to_string(),
        }
    }

    fn records() -> Vec<Vec<String>> {
        parse_records(concat!(
            "hostname;ip;errata_name;errata_type;errata_desc;errata_date;errata_reboot;system_owner\n",
            "web01;10.0.0.1;RHSA-2015:0001;security;kernel update;2015-05-30;reboot_suggested;ops\n",
            "db01;10.0.0.2;RHBA-2015:0002;bugfix;libc fix;2015-05-30;none;dba\n",
            "web01;10.0.0.1;RHBA-2015:0003;bugfix;bash fix;2015-05-31;none;ops\n",
        ))
        .expect("parse records")
    }

    #[test]
    fn parse_records_honors_pipe_quotes() {
        let records = parse_records("hostname;errata_desc\nweb01;|multi; part|\n").expect("parse");
        assert_eq!(records[1], vec!["web01", "multi; part"]);
    }

    #[test]
    fn discover_hosts_first_seen_order_excludes_header() {
        let hosts = discover_hosts(&records(), &schema());
        assert_eq!(hosts, vec!["web01", "db01"]);
    }

    #[test]
    fn assemble_groups_rows_per_host() {
        let reports = assemble(&records(), &schema(), &VerificationLog::invalid(), &ctx());
        assert_eq!(reports.len(), 2);
        let web = &reports[0];
        assert_eq!(web.host, "web01");
        let table = &web.payload["errata"];
        assert!(table.contains("RHSA-2015:0001"));
        assert!(table.contains("RHBA-2015:0003"));
        assert!(!table.contains("RHBA-2015:0002"));
        // scan order preserved within the host
        let first = table.find("RHSA-2015:0001").unwrap();
        let second = table.find("RHBA-2015:0003").unwrap();
        assert!(first < second);
    }

    #[test]
    fn errata_table_humanizes_headers_and_escapes_underscores() {
        let records =
            parse_records("hostname;errata_name\nweb01;my_patch_name\n").expect("parse");
        let schema = Schema::resolve("hostname;errata_name");
        let table = errata_table(&records[1..], &schema);
        assert!(table.contains("\\textbf{Name}"));
        assert!(table.contains("\\textbf{Reboot required}"));
        assert!(table.contains("my\\_patch\\_name"));
    }

    #[test]
    fn errata_table_renders_unresolved_columns_as_unknown() {
        let records = parse_records("hostname;errata_name\nweb01;RHSA-2015:0001\n").expect("parse");
        let schema = Schema::resolve("hostname;errata_name");
        let table = errata_table(&records[1..], &schema);
        assert!(table.contains("unknown"));
    }

    #[test]
    fn errata_reboot_values_map_to_yes_no() {
        let records = parse_records(
            "hostname;errata_name;errata_reboot\nweb01;p1;1\nweb01;p2;0\n",
        )
        .expect("parse");
        let schema = Schema::resolve("hostname;errata_name;errata_reboot");
        let table = errata_table(&records[1..], &schema);
        assert!(table.contains("p1 & yes"));
        assert!(table.contains("p2 & no"));
    }

    #[test]
    fn payload_maps_checklist_to_boxes() {
        let reports = assemble(&records(), &schema(), &VerificationLog::invalid(), &ctx());
        let web = &reports[0];
        // no monitoring column in this header, vlog invalid: both boxes clear
        assert_eq!(web.payload["monSchedYes"], CLEAR);
        assert_eq!(web.payload["monSchedNo"], CLEAR);
        // no virt column: physical host
        assert_eq!(web.payload["vmSnapNo"], CHECKED);
        assert_eq!(web.payload["vmSnapNotes"], "not a virtual machine");
        assert_eq!(web.payload["systemStandalone"], CHECKED);
        assert_eq!(web.payload["ip"], "10.0.0.1");
        assert_eq!(web.payload["titleHostname"], "web01");
        assert_eq!(web.payload["date"], "2015-06-01");
        assert_eq!(web.payload["orientation"], "landscape,");
    }

    #[test]
    fn payload_reboot_flag_from_any_record() {
        let reports = assemble(&records(), &schema(), &VerificationLog::invalid(), &ctx());
        // web01 has a record with errata_reboot != reboot_suggested
        assert_eq!(reports[0].payload["rebootNo"], CHECKED);
        assert_eq!(reports[0].payload["rebootNotes"], "no reboot required");
    }

    #[test]
    fn substitute_replaces_all_placeholders() {
        let mut payload = BTreeMap::new();
        payload.insert("titleHostname".to_string(), "web01".to_string());
        payload.insert("date".to_string(), "2015-06-01".to_string());
        let out = substitute("Host %%titleHostname on %%date", &payload);
        assert_eq!(out, "Host web01 on 2015-06-01");
    }

    #[test]
    fn substitute_handles_prefix_keys() {
        let mut payload = BTreeMap::new();
        payload.insert("mon".to_string(), "SHORT".to_string());
        payload.insert("monSchedYes".to_string(), "LONG".to_string());
        let out = substitute("%%monSchedYes %%mon", &payload);
        assert_eq!(out, "LONG SHORT");
    }

    #[test]
    fn substitute_never_rescans_substituted_values() {
        let mut payload = BTreeMap::new();
        payload.insert(
            "errata".to_string(),
            "fixes %%date parsing in cron".to_string(),
        );
        payload.insert("date".to_string(), "2015-06-01".to_string());
        let out = substitute("%%errata generated on %%date", &payload);
        assert_eq!(out, "fixes %%date parsing in cron generated on 2015-06-01");
    }

    #[test]
    fn substitute_leaves_unknown_placeholders_alone() {
        let mut payload = BTreeMap::new();
        payload.insert("date".to_string(), "2015-06-01".to_string());
        let out = substitute("%%nosuchkey %%date 100%% done", &payload);
        assert_eq!(out, "%%nosuchkey 2015-06-01 100%% done");
    }

    struct FailFor(&'static str);

    impl Renderer for FailFor {
        fn render(&self, tex_path: &Path) -> Result<()> {
            let name = tex_path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if name == self.0 {
                Err(anyhow!("renderer exploded"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn render_hosts_isolates_per_host_failures() {
        let dir = std::env::temp_dir().join(format!("patchdelta-render-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create work dir");

        let reports = assemble(&records(), &schema(), &VerificationLog::invalid(), &ctx());
        let (rendered, failed) = render_hosts(
            &reports,
            "report for %%titleHostname",
            &dir,
            &FailFor("web01"),
            false,
            None,
        );
        assert_eq!(rendered, vec!["db01"]);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].host, "web01");
        // byproducts removed even for the failed host
        assert!(!dir.join("web01.tex").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn render_hosts_preserves_tex_when_asked() {
        let dir =
            std::env::temp_dir().join(format!("patchdelta-preserve-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create work dir");

        let reports = assemble(&records(), &schema(), &VerificationLog::invalid(), &ctx());
        let (rendered, failed) = render_hosts(
            &reports,
            "report for %%titleHostname",
            &dir,
            &FailFor("nobody"),
            true,
            None,
        );
        assert_eq!(rendered.len(), 2);
        assert!(failed.is_empty());
        let tex = std::fs::read_to_string(dir.join("web01.tex")).expect("tex kept");
        assert_eq!(tex, "report for web01");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
