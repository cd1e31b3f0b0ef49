use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use crate::select::HostSelection;

pub const DEFAULT_COMMENT: &str = "System maintenance scheduled by patchdelta";
pub const DEFAULT_USER_AGENT: &str = "patchdelta toolkit";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Login data for a collaborator system: an auth file (username on the first
/// line, password on the second, owner-only permissions) or
/// `<PREFIX>_LOGIN` / `<PREFIX>_PASSWORD` environment variables.
pub fn credentials(env_prefix: &str, authfile: Option<&Path>) -> Result<Credentials> {
    if let Some(path) = authfile {
        return credentials_from_file(path);
    }

    let username = std::env::var(format!("{env_prefix}_LOGIN"))
        .map_err(|_| anyhow!("{env_prefix}_LOGIN is not set and no auth file was given"))?;
    let password = std::env::var(format!("{env_prefix}_PASSWORD"))
        .map_err(|_| anyhow!("{env_prefix}_PASSWORD is not set and no auth file was given"))?;
    Ok(Credentials { username, password })
}

fn credentials_from_file(path: &Path) -> Result<Credentials> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let meta = std::fs::metadata(path)
            .with_context(|| format!("failed to stat auth file: {}", path.display()))?;
        if meta.permissions().mode() & 0o077 != 0 {
            return Err(anyhow!(
                "auth file {} is readable by group/others, use mode 0600",
                path.display()
            ));
        }
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read auth file: {}", path.display()))?;
    let mut lines = text.lines();
    let username = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("auth file {} is missing the username line", path.display()))?;
    let password = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("auth file {} is missing the password line", path.display()))?;

    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct DowntimeRequest<'a> {
    pub host: &'a str,
    pub hours: u32,
    pub comment: &'a str,
    pub user_agent: &'a str,
    pub basic_auth: bool,
}

/// Downtime-scheduling collaborator (Nagios/Icinga style). Fallible per host;
/// the dispatch loop never retries.
pub trait MonitoringClient {
    fn schedule_downtime(&mut self, req: &DowntimeRequest) -> Result<()>;
    fn remove_downtime(&mut self, host: &str, user_agent: &str, basic_auth: bool) -> Result<()>;
}

/// VM snapshot collaborator (libvirt style).
pub trait VirtClient {
    fn create_snapshot(&mut self, host: &str, comment: &str) -> Result<()>;
    fn remove_snapshot(&mut self, host: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
    pub tidy: bool,
    pub skip_monitoring: bool,
    pub skip_snapshot: bool,
    pub hours: u32,
    pub comment: String,
    pub user_agent: String,
    pub basic_auth: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceOutcome {
    pub downtime_ok: Vec<String>,
    pub downtime_failed: Vec<DispatchFailure>,
    pub snapshot_ok: Vec<String>,
    pub snapshot_failed: Vec<DispatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub host: String,
    pub error: String,
}

/// Walks the selected host lists and drives both collaborators. A failing
/// host is recorded and the loop moves on.
pub fn dispatch(
    selection: &HostSelection,
    opts: &MaintenanceOptions,
    monitoring: &mut dyn MonitoringClient,
    virt: &mut dyn VirtClient,
) -> MaintenanceOutcome {
    let mut outcome = MaintenanceOutcome::default();

    if !opts.skip_monitoring {
        for host in &selection.downtime {
            let result = if opts.tidy {
                monitoring.remove_downtime(host, &opts.user_agent, opts.basic_auth)
            } else {
                monitoring.schedule_downtime(&DowntimeRequest {
                    host,
                    hours: opts.hours,
                    comment: &opts.comment,
                    user_agent: &opts.user_agent,
                    basic_auth: opts.basic_auth,
                })
            };
            match result {
                Ok(()) => outcome.downtime_ok.push(host.clone()),
                Err(err) => outcome.downtime_failed.push(DispatchFailure {
                    host: host.clone(),
                    error: format!("{err:#}"),
                }),
            }
        }
    }

    if !opts.skip_snapshot {
        for host in &selection.snapshot {
            let result = if opts.tidy {
                virt.remove_snapshot(host)
            } else {
                virt.create_snapshot(host, &opts.comment)
            };
            match result {
                Ok(()) => outcome.snapshot_ok.push(host.clone()),
                Err(err) => outcome.snapshot_failed.push(DispatchFailure {
                    host: host.clone(),
                    error: format!("{err:#}"),
                }),
            }
        }
    }

    outcome
}

/// Dry-run collaborator: records what would be done instead of doing it.
#[derive(Debug, Default)]
pub struct DryRunClient {
    pub planned: Vec<String>,
}

impl MonitoringClient for DryRunClient {
    fn schedule_downtime(&mut self, req: &DowntimeRequest) -> Result<()> {
        self.planned.push(format!(
            "would schedule downtime for '{}' ({} hours, comment '{}')",
            req.host, req.hours, req.comment
        ));
        Ok(())
    }

    fn remove_downtime(&mut self, host: &str, _user_agent: &str, _basic_auth: bool) -> Result<()> {
        self.planned
            .push(format!("would unschedule downtime for '{host}'"));
        Ok(())
    }
}

impl VirtClient for DryRunClient {
    fn create_snapshot(&mut self, host: &str, comment: &str) -> Result<()> {
        self.planned.push(format!(
            "would create a snapshot for '{host}' (comment '{comment}')"
        ));
        Ok(())
    }

    fn remove_snapshot(&mut self, host: &str) -> Result<()> {
        self.planned
            .push(format!("would remove a snapshot for '{host}'"));
        Ok(())
    }
}
