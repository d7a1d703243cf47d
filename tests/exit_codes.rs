use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

const ENV_VARS: &[&str] = &[
    "UNCTL_CONFIG",
    "UNCTL_UI_COLOR",
    "UNCTL_UI_SORT_BY",
    "UNCTL_UI_FAILING_ONLY",
    "UNCTL_CHECKS_DIR",
    "UNCTL_KUBERNETES_REQUEST_TIMEOUT_SECS",
    "UNCTL_MYSQL_DEFAULTS_FILE",
    "UNCTL_MYSQL_URL",
    "UNCTL_SCAN_CHECK_TIMEOUT_SECS",
    "KUBERNETES_SERVICE_HOST",
    "KUBERNETES_SERVICE_PORT",
    "RUST_LOG",
];

fn unctl_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_unctl"));
    cmd.env("HOME", home);
    cmd.env("KUBECONFIG", home.join(".kube/missing-config"));
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    unctl_cmd(home).args(args).output().expect("run unctl")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("unctl-exit-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "nope"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_bash_succeeds() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "bash"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("unctl"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unknown_sort_order_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["k8s", "--sort-by", "size"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_override_exits_2() {
    let home = make_temp_home();
    let out = unctl_cmd(&home)
        .env("UNCTL_UI_SORT_BY", "size")
        .args(["k8s", "--list-checks"])
        .output()
        .expect("run unctl");
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("UNCTL_UI_SORT_BY"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_explicit_config_exits_2() {
    let home = make_temp_home();
    let missing = home.join("nope.toml");
    let out = run(&home, &["--config", missing.to_str().unwrap(), "config", "--show"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_checks_dir_exits_2() {
    let home = make_temp_home();
    let missing = home.join("checks");
    let out = run(&home, &["k8s", "--checks-dir", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unreachable_cluster_exits_1_without_findings() {
    let home = make_temp_home();
    let out = run(&home, &["k8s", "--json"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to collect Kubernetes data"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unreachable_mysql_exits_1() {
    let home = make_temp_home();
    let out = unctl_cmd(&home)
        .env("UNCTL_MYSQL_URL", "mysql://root@127.0.0.1:1/shop")
        .env("UNCTL_KUBERNETES_REQUEST_TIMEOUT_SECS", "2")
        .args(["mysql", "--json"])
        .output()
        .expect("run unctl");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let _ = std::fs::remove_dir_all(&home);
}
