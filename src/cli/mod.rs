use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::maintenance::{self, DryRunClient, MaintenanceOptions};
use crate::report::{ReportRequest, run_report};
use crate::select::{self, SelectionMode};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "patchdelta",
    version,
    about = "Creates patch diff reports from inventory snapshots and prepares maintenance windows"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Timeout in seconds for external renderer invocations
    #[arg(long, default_value_t = 120, global = true)]
    pub timeout: u64,
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Diff two snapshots and render one report per affected host
    Report(ReportArgs),
    /// Select hosts from a snapshot and schedule downtimes / VM snapshots
    Prepare(PrepareArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    pub snapshot1: PathBuf,
    pub snapshot2: PathBuf,
    /// Delta report filename (default: errata-diff-report-YYYYMMDD.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(short, long)]
    pub template: Option<PathBuf>,
    /// Company logo image
    #[arg(short = 'i', long)]
    pub image: Option<PathBuf>,
    #[arg(short, long)]
    pub footer: Option<String>,
    #[arg(short, long, value_parser = ["landscape", "portrait"])]
    pub page_orientation: Option<String>,
    #[arg(short = 'b', long)]
    pub pdflatex_binary: Option<PathBuf>,
    /// Only create the delta CSV, skip the per-host documents
    #[arg(short, long)]
    pub no_host_reports: bool,
    /// Keep the intermediate tex files after rendering
    #[arg(short = 'x', long)]
    pub preserve_tex: bool,
    /// Alternate verification log location (default: <YYYYMMDD>_satprep.vlog)
    #[arg(short = 'V', long)]
    pub verification_log: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PrepareArgs {
    pub snapshot: PathBuf,
    /// Schedule downtimes and snapshots for every host in the snapshot
    #[arg(short = 'f', long)]
    pub no_intelligence: bool,
    /// Unschedule downtimes and remove previously created snapshots
    #[arg(short = 'T', long)]
    pub tidy: bool,
    #[arg(short, long)]
    pub comment: Option<String>,
    /// Downtime duration in hours
    #[arg(short = 't', long)]
    pub hours: Option<u32>,
    #[arg(short = 'u', long)]
    pub monitoring_url: Option<String>,
    /// Disable HTTP basic auth against the monitoring endpoint
    #[arg(short = 'x', long)]
    pub no_auth: bool,
    #[arg(short = 'A', long)]
    pub user_agent: Option<String>,
    #[arg(short = 'a', long)]
    pub mon_authfile: Option<PathBuf>,
    #[arg(short = 'C', long)]
    pub virt_authfile: Option<PathBuf>,
    #[arg(short = 'k', long)]
    pub skip_monitoring: bool,
    #[arg(short = 'K', long)]
    pub skip_snapshot: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = crate::platform::effective_home_dir()?;
    let env_config_path = std::env::var_os("PATCHDELTA_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Report(args) => {
            use std::io::IsTerminal;
            let request = ReportRequest {
                snapshot1: args.snapshot1,
                snapshot2: args.snapshot2,
                output: args.output,
                template: args.template.or(cfg.report.template.clone()),
                logo: args.image.or(cfg.report.logo.clone()),
                footer: args.footer.unwrap_or_else(|| cfg.report.footer.clone()),
                orientation: args
                    .page_orientation
                    .unwrap_or_else(|| cfg.report.page_orientation.clone()),
                pdflatex_binary: args
                    .pdflatex_binary
                    .unwrap_or_else(|| cfg.report.pdflatex_binary.clone()),
                verification_log: args.verification_log,
                no_host_reports: args.no_host_reports,
                preserve_tex: args.preserve_tex,
                tie_break: cfg.diff.tie_break,
                timeout: Duration::from_secs(cli.timeout),
                show_progress: std::io::stderr().is_terminal() && !cli.quiet && !cli.json,
            };

            let summary = run_report(&request)?;
            if cli.json {
                write_json(&summary)?;
            } else {
                crate::ui::print_report_summary(&summary, &ui_cfg);
            }
            if !summary.failed.is_empty() {
                let hosts: Vec<&str> =
                    summary.failed.iter().map(|f| f.host.as_str()).collect();
                return Err(crate::exit::external_cmd(format!(
                    "report rendering failed for {} host(s): {}",
                    hosts.len(),
                    hosts.join(", ")
                )));
            }
        }
        Commands::Prepare(args) => {
            let mode = if args.no_intelligence {
                SelectionMode::NoIntelligence
            } else {
                SelectionMode::Filtered
            };
            let selection = select::select_from_file(&args.snapshot, mode)?;
            if ui_cfg.verbose {
                crate::ui::print_host_selection(&selection, &ui_cfg);
            }

            if selection.downtime.is_empty() && selection.snapshot.is_empty() {
                if !ui_cfg.quiet && !cli.json {
                    println!("no hosts affected, nothing to do");
                }
                return Ok(());
            }

            // credentials are only resolved for a live run, like the original
            if !cli.dry_run {
                if !args.skip_monitoring && !selection.downtime.is_empty() {
                    maintenance::credentials("MONITORING", args.mon_authfile.as_deref())
                        .map_err(crate::exit::invalid_args_err)?;
                }
                if !args.skip_snapshot && !selection.snapshot.is_empty() {
                    maintenance::credentials("LIBVIRT", args.virt_authfile.as_deref())
                        .map_err(crate::exit::invalid_args_err)?;
                }
            }

            let opts = MaintenanceOptions {
                tidy: args.tidy,
                skip_monitoring: args.skip_monitoring,
                skip_snapshot: args.skip_snapshot,
                hours: args.hours.unwrap_or(cfg.maintenance.hours),
                comment: args.comment.unwrap_or_else(|| cfg.maintenance.comment.clone()),
                user_agent: args
                    .user_agent
                    .unwrap_or_else(|| cfg.maintenance.user_agent.clone()),
                basic_auth: !(args.no_auth || cfg.maintenance.no_auth),
            };

            // collaborator transports live behind the client traits; this
            // binary ships the planning client only
            let mut monitoring = DryRunClient::default();
            let mut virt = DryRunClient::default();
            let outcome = maintenance::dispatch(&selection, &opts, &mut monitoring, &mut virt);

            let mut planned = monitoring.planned;
            planned.extend(virt.planned);

            if cli.json {
                write_json(&PrepareSummary {
                    selection: &selection,
                    planned: &planned,
                    outcome: &outcome,
                })?;
            } else {
                crate::ui::print_maintenance_outcome(&outcome, &planned, &ui_cfg);
            }

            if !outcome.downtime_failed.is_empty() || !outcome.snapshot_failed.is_empty() {
                return Err(crate::exit::external_cmd(format!(
                    "maintenance preparation failed for {} host(s)",
                    outcome.downtime_failed.len() + outcome.snapshot_failed.len()
                )));
            }
        }
        Commands::Completion(args) => {
            let shell: clap_complete::Shell = args
                .shell
                .parse()
                .map_err(|_| crate::exit::invalid_args(format!("unknown shell: {}", args.shell)))?;
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    let rendered = toml::to_string_pretty(&cfg)
                        .map_err(|err| anyhow::anyhow!("failed to render config: {err}"))?;
                    print!("{rendered}");
                }
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct PrepareSummary<'a> {
    selection: &'a crate::select::HostSelection,
    planned: &'a [String],
    outcome: &'a crate::maintenance::MaintenanceOutcome,
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let out = std::io::stdout();
    serde_json::to_writer_pretty(out.lock(), value)?;
    println!();
    Ok(())
}
