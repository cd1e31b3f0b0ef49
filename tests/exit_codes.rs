use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn patchdelta_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_patchdelta"));
    cmd.env("HOME", home);
    cmd.current_dir(home);
    cmd.env_remove("PATCHDELTA_CONFIG");
    cmd.env_remove("PATCHDELTA_DIFF_TIE_BREAK");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    patchdelta_cmd(home).args(args).output().expect("run patchdelta")
}

fn make_temp_home(tag: &str) -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!(
        "patchdelta-exit-{tag}-{}-{seq}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home("shell");
    let out = run(&home, &["completion", "nope"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_bash_succeeds() {
    let home = make_temp_home("bash");
    let out = run(&home, &["completion", "bash"]);
    assert!(out.status.success());
    assert!(!out.stdout.is_empty());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_snapshot_file_exits_10() {
    let home = make_temp_home("missing");
    let template = home.join("template.tex");
    std::fs::write(&template, "x").expect("write template");
    let out = run(
        &home,
        &[
            "report",
            "--no-host-reports",
            "-t",
            template.to_str().unwrap(),
            "nope1.csv",
            "nope2.csv",
        ],
    );
    assert_eq!(out.status.code(), Some(10));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_template_exits_10() {
    let home = make_temp_home("tmpl");
    let snap = home.join("snap.csv");
    std::fs::write(&snap, "hostname;errata_name\na;p1\n").expect("write snapshot");
    let out = run(
        &home,
        &[
            "report",
            "--no-host-reports",
            "-t",
            home.join("does-not-exist.tex").to_str().unwrap(),
            snap.to_str().unwrap(),
            snap.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(10));
    assert!(String::from_utf8_lossy(&out.stderr).contains("template"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_renderer_binary_exits_10() {
    let home = make_temp_home("renderer");
    let template = home.join("template.tex");
    std::fs::write(&template, "x").expect("write template");
    let snap = home.join("snap.csv");
    std::fs::write(&snap, "hostname;errata_name\na;p1\n").expect("write snapshot");
    let out = run(
        &home,
        &[
            "report",
            "-t",
            template.to_str().unwrap(),
            "-b",
            "/nonexistent/pdflatex",
            snap.to_str().unwrap(),
            snap.to_str().unwrap(),
        ],
    );
    assert_eq!(out.status.code(), Some(10));
    assert!(String::from_utf8_lossy(&out.stderr).contains("pdflatex"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn bad_tie_break_env_exits_2() {
    let home = make_temp_home("tiebreak");
    let out = patchdelta_cmd(&home)
        .env("PATCHDELTA_DIFF_TIE_BREAK", "newest")
        .args(["config", "--show"])
        .output()
        .expect("run patchdelta");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_show_prints_effective_config() {
    let home = make_temp_home("cfgshow");
    let out = run(&home, &["config", "--show"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("pdflatex_binary"));
    assert!(stdout.contains("tie_break"));
    let _ = std::fs::remove_dir_all(&home);
}
