use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

const NODE_READY: &str = include_str!("../src/checks/k8s/k8s_node_ready/k8s_node_ready.json");
const PVC_PENDING: &str = include_str!("../src/checks/k8s/k8s_pvc_pending/k8s_pvc_pending.json");

fn run(home: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_unctl"));
    cmd.env("HOME", home);
    cmd.env_remove("UNCTL_CONFIG");
    cmd.env_remove("UNCTL_CHECKS_DIR");
    cmd.env_remove("UNCTL_UI_SORT_BY");
    cmd.args(args).output().expect("run unctl")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("unctl-list-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, text).expect("write");
}

fn json(out: &Output) -> serde_json::Value {
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("parse json")
}

#[test]
fn builtin_checks_are_listed_per_provider() {
    let home = make_temp_home();

    let k8s = json(&run(&home, &["k8s", "--list-checks", "--json"]));
    let k8s = k8s.as_array().expect("array");
    assert_eq!(k8s.len(), 9);
    assert!(k8s.iter().all(|d| d["Provider"] == "k8s"));

    let mysql = json(&run(&home, &["mysql", "-l", "--json"]));
    let ids: Vec<&str> = mysql
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["CheckID"].as_str())
        .collect();
    assert_eq!(ids, ["mysql_max_used_connections"]);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn list_services_counts_checks() {
    let home = make_temp_home();
    let v = json(&run(&home, &["mysql", "--list-services", "--json"]));
    assert_eq!(v, serde_json::json!({ "connections": 1 }));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn text_listing_has_a_header_and_one_row_per_check() {
    let home = make_temp_home();
    let out = run(&home, &["k8s", "--list-checks", "--no-color"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.lines().next().unwrap_or_default().starts_with("PROVIDER"));
    assert!(text.contains("k8s_pod_crashloopbackoff"));
    assert!(!text.contains("mysql_max_used_connections"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn checks_dir_replaces_the_builtin_catalogue() {
    let home = make_temp_home();
    let dir = home.join("checks");
    write_file(&dir.join("k8s/k8s_node_ready/k8s_node_ready.json"), NODE_READY);
    write_file(&dir.join("k8s/k8s_pvc_pending/k8s_pvc_pending.json"), PVC_PENDING);
    write_file(&dir.join("k8s/broken/broken.json"), "{ not json");

    let v = json(&run(
        &home,
        &["k8s", "-l", "--json", "--checks-dir", dir.to_str().unwrap()],
    ));
    let mut ids: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["CheckID"].as_str())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, ["k8s_node_ready", "k8s_pvc_pending"]);
    let _ = std::fs::remove_dir_all(&home);
}
