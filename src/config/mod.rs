use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::snapshot::TieBreak;

pub const DEFAULT_PDFLATEX: &str = "/usr/bin/pdflatex";
pub const DEFAULT_ORIENTATION: &str = "landscape";
pub const DEFAULT_FOOTER: &str =
    "This report was automatically generated by \\textbf{patchdelta}";
pub const DEFAULT_MONITORING_URL: &str = "http://localhost/icinga";

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub report: ReportConfig,
    pub diff: DiffConfig,
    pub maintenance: MaintenanceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<PathBuf>,
    pub pdflatex_binary: PathBuf,
    pub page_orientation: String,
    pub footer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiffConfig {
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceConfig {
    pub monitoring_url: String,
    pub comment: String,
    pub hours: u32,
    pub user_agent: String,
    pub no_auth: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            report: ReportConfig {
                template: None,
                logo: None,
                pdflatex_binary: PathBuf::from(DEFAULT_PDFLATEX),
                page_orientation: DEFAULT_ORIENTATION.to_string(),
                footer: DEFAULT_FOOTER.to_string(),
            },
            diff: DiffConfig {
                tie_break: TieBreak::default(),
            },
            maintenance: MaintenanceConfig {
                monitoring_url: DEFAULT_MONITORING_URL.to_string(),
                comment: crate::maintenance::DEFAULT_COMMENT.to_string(),
                hours: 2,
                user_agent: crate::maintenance::DEFAULT_USER_AGENT.to_string(),
                no_auth: false,
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    report: Option<RawReportConfig>,
    diff: Option<RawDiffConfig>,
    maintenance: Option<RawMaintenanceConfig>,
}

#[derive(Debug, Deserialize)]
struct RawReportConfig {
    template: Option<PathBuf>,
    logo: Option<PathBuf>,
    pdflatex_binary: Option<PathBuf>,
    page_orientation: Option<String>,
    footer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDiffConfig {
    tie_break: Option<TieBreak>,
}

#[derive(Debug, Deserialize)]
struct RawMaintenanceConfig {
    monitoring_url: Option<String>,
    comment: Option<String>,
    hours: Option<u32>,
    user_agent: Option<String>,
    no_auth: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/patchdelta/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(report) = raw.report {
        if let Some(template) = report.template {
            cfg.report.template = Some(template);
        }
        if let Some(logo) = report.logo {
            cfg.report.logo = Some(logo);
        }
        if let Some(pdflatex) = report.pdflatex_binary {
            cfg.report.pdflatex_binary = pdflatex;
        }
        if let Some(orientation) = report.page_orientation {
            cfg.report.page_orientation = orientation;
        }
        if let Some(footer) = report.footer {
            cfg.report.footer = footer;
        }
    }

    if let Some(diff) = raw.diff {
        if let Some(tie_break) = diff.tie_break {
            cfg.diff.tie_break = tie_break;
        }
    }

    if let Some(maintenance) = raw.maintenance {
        if let Some(url) = maintenance.monitoring_url {
            cfg.maintenance.monitoring_url = url;
        }
        if let Some(comment) = maintenance.comment {
            cfg.maintenance.comment = comment;
        }
        if let Some(hours) = maintenance.hours {
            cfg.maintenance.hours = hours;
        }
        if let Some(user_agent) = maintenance.user_agent {
            cfg.maintenance.user_agent = user_agent;
        }
        if let Some(no_auth) = maintenance.no_auth {
            cfg.maintenance.no_auth = no_auth;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("PATCHDELTA_REPORT_TEMPLATE") {
        if !v.trim().is_empty() {
            cfg.report.template = Some(PathBuf::from(v.trim()));
        }
    }
    if let Ok(v) = std::env::var("PATCHDELTA_REPORT_LOGO") {
        if !v.trim().is_empty() {
            cfg.report.logo = Some(PathBuf::from(v.trim()));
        }
    }
    if let Ok(v) = std::env::var("PATCHDELTA_REPORT_PDFLATEX") {
        if !v.trim().is_empty() {
            cfg.report.pdflatex_binary = PathBuf::from(v.trim());
        }
    }
    if let Ok(v) = std::env::var("PATCHDELTA_REPORT_ORIENTATION") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.page_orientation = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("PATCHDELTA_REPORT_FOOTER") {
        cfg.report.footer = v;
    }
    if let Ok(v) = std::env::var("PATCHDELTA_DIFF_TIE_BREAK") {
        cfg.diff.tie_break = v
            .parse::<TieBreak>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "PATCHDELTA_DIFF_TIE_BREAK")?;
    }
    if let Ok(v) = std::env::var("PATCHDELTA_MAINT_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.maintenance.monitoring_url = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("PATCHDELTA_MAINT_COMMENT") {
        if !v.trim().is_empty() {
            cfg.maintenance.comment = v;
        }
    }
    if let Ok(v) = std::env::var("PATCHDELTA_MAINT_HOURS") {
        cfg.maintenance.hours = v
            .trim()
            .parse::<u32>()
            .with_context(|| "PATCHDELTA_MAINT_HOURS")?;
    }
    if let Ok(v) = std::env::var("PATCHDELTA_MAINT_USER_AGENT") {
        if !v.trim().is_empty() {
            cfg.maintenance.user_agent = v;
        }
    }
    if let Ok(v) = std::env::var("PATCHDELTA_MAINT_NO_AUTH") {
        cfg.maintenance.no_auth = parse_bool(&v).with_context(|| "PATCHDELTA_MAINT_NO_AUTH")?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
