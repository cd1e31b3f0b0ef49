use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    run_command_in(cmd, args, None, timeout)
}

pub fn run_command_in(
    cmd: &str,
    args: &[&str],
    cwd: Option<&std::path::Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn process: {cmd}"))?;

    // drain both pipes concurrently so a child producing more output than
    // the pipe buffer holds never blocks against the timeout wait
    let stdout_reader = child.stdout.take().map(drain_pipe);
    let stderr_reader = child.stderr.take().map(drain_pipe);

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait on process: {cmd}"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out after {timeout:?}: {cmd}"));
        }
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        buf
    })
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME environment variable is not set"))
}

/// Directory the executable lives in, used for template/logo fallbacks.
pub fn install_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_captures_stdout() {
        let out = run_command("echo", &["hello"], Duration::from_secs(5)).expect("echo runs");
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn run_command_reports_missing_binary() {
        let err = run_command(
            "/nonexistent/definitely-not-a-binary",
            &[],
            Duration::from_secs(1),
        );
        assert!(err.is_err());
    }

    #[test]
    fn run_command_drains_output_beyond_pipe_capacity() {
        // 512 KiB of stdout, well past the usual 64 KiB pipe buffer
        let out = run_command(
            "head",
            &["-c", "524288", "/dev/zero"],
            Duration::from_secs(5),
        )
        .expect("head runs");
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.len(), 524288);
    }

    #[test]
    fn run_command_kills_on_timeout() {
        let err = run_command("sleep", &["5"], Duration::from_millis(100));
        assert!(err.is_err());
        let msg = format!("{}", err.unwrap_err());
        assert!(msg.contains("timed out"), "unexpected message: {msg}");
    }
}
