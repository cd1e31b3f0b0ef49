use std::io::{self, Write};

use anyhow::Error;

use crate::maintenance::MaintenanceOutcome;
use crate::report::ReportRunSummary;
use crate::select::HostSelection;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }
}

pub fn print_report_summary(summary: &ReportRunSummary, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "delta: {} ({} new rows, {} hosts affected)",
        summary.delta_path,
        summary.delta_rows,
        summary.hosts.len()
    );
    match (&summary.vlog_path, summary.vlog_valid) {
        (Some(path), true) => {
            let _ = writeln!(out, "verification log: {path}");
        }
        _ => {
            let _ = writeln!(
                out,
                "verification log: none (checkboxes will not be pre-selected)"
            );
        }
    }
    if summary.host_reports_skipped {
        let _ = writeln!(out, "host reports skipped");
    } else {
        let _ = writeln!(out, "rendered: {} host report(s)", summary.rendered.len());
        for failure in &summary.failed {
            let _ = writeln!(out, "failed: {} ({})", failure.host, failure.error);
        }
    }
    if cfg.verbose {
        for note in &summary.notes {
            let _ = writeln!(out, "note: {note}");
        }
    }
}

pub fn print_host_selection(selection: &HostSelection, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "downtime hosts ({}): {}",
        selection.downtime.len(),
        selection.downtime.join(", ")
    );
    let _ = writeln!(
        out,
        "snapshot hosts ({}): {}",
        selection.snapshot.len(),
        selection.snapshot.join(", ")
    );
}

pub fn print_maintenance_outcome(outcome: &MaintenanceOutcome, planned: &[String], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    for line in planned {
        let _ = writeln!(out, "{line}");
    }
    if !outcome.downtime_ok.is_empty() || !outcome.downtime_failed.is_empty() {
        let _ = writeln!(
            out,
            "downtimes: {} ok, {} failed",
            outcome.downtime_ok.len(),
            outcome.downtime_failed.len()
        );
    }
    if !outcome.snapshot_ok.is_empty() || !outcome.snapshot_failed.is_empty() {
        let _ = writeln!(
            out,
            "snapshots: {} ok, {} failed",
            outcome.snapshot_ok.len(),
            outcome.snapshot_failed.len()
        );
    }
    for failure in outcome
        .downtime_failed
        .iter()
        .chain(outcome.snapshot_failed.iter())
    {
        let _ = writeln!(out, "failed: {} ({})", failure.host, failure.error);
    }
}
