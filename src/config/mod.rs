use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ui::SortBy;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub ui: UiConfig,
    pub checks: ChecksConfig,
    pub kubernetes: KubernetesConfig,
    pub mysql: MySqlConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub sort_by: SortBy,
    pub failing_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecksConfig {
    /// Descriptor root; unset means the built-in catalogue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KubernetesConfig {
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MySqlConfig {
    pub defaults_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanConfig {
    pub check_timeout_secs: u64,
}

impl EffectiveConfig {
    pub fn defaults(home_dir: &Path) -> Self {
        Self {
            config_path: None,
            ui: UiConfig {
                color: true,
                sort_by: SortBy::Object,
                failing_only: false,
            },
            checks: ChecksConfig { dir: None },
            kubernetes: KubernetesConfig {
                request_timeout_secs: 30,
            },
            mysql: MySqlConfig {
                defaults_file: home_dir.join(".my.cnf"),
                url: None,
            },
            scan: ScanConfig {
                check_timeout_secs: 30,
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.kubernetes.request_timeout_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.scan.check_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    checks: Option<RawChecksConfig>,
    kubernetes: Option<RawKubernetesConfig>,
    mysql: Option<RawMySqlConfig>,
    scan: Option<RawScanConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
    sort_by: Option<SortBy>,
    failing_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChecksConfig {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKubernetesConfig {
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMySqlConfig {
    defaults_file: Option<PathBuf>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScanConfig {
    check_timeout_secs: Option<u64>,
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME is not set"))
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/unctl/config.toml")
}

/// `--config`, then `$UNCTL_CONFIG`, then the per-user default.
pub fn resolve_config_path(explicit: Option<&Path>, home_dir: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os("UNCTL_CONFIG") {
        Some(v) if !v.is_empty() => PathBuf::from(v),
        _ => default_config_path(home_dir),
    }
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::defaults(home_dir);

    let path = resolve_config_path(config_path, home_dir);
    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        apply_raw_config(&mut cfg, raw, home_dir);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        anyhow::bail!("config file not found: {}", path.display());
    }

    apply_env_overrides(&mut cfg, home_dir)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig, home_dir: &Path) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(sort_by) = ui.sort_by {
            cfg.ui.sort_by = sort_by;
        }
        if let Some(failing_only) = ui.failing_only {
            cfg.ui.failing_only = failing_only;
        }
    }

    if let Some(checks) = raw.checks {
        if let Some(dir) = checks.dir {
            cfg.checks.dir = Some(expand_home(&dir, home_dir));
        }
    }

    if let Some(kubernetes) = raw.kubernetes {
        if let Some(secs) = kubernetes.request_timeout_secs {
            cfg.kubernetes.request_timeout_secs = secs;
        }
    }

    if let Some(mysql) = raw.mysql {
        if let Some(defaults_file) = mysql.defaults_file {
            cfg.mysql.defaults_file = expand_home(&defaults_file, home_dir);
        }
        if let Some(url) = mysql.url {
            cfg.mysql.url = Some(url);
        }
    }

    if let Some(scan) = raw.scan {
        if let Some(secs) = scan.check_timeout_secs {
            cfg.scan.check_timeout_secs = secs;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig, home_dir: &Path) -> Result<()> {
    if let Ok(v) = std::env::var("UNCTL_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "UNCTL_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("UNCTL_UI_SORT_BY") {
        cfg.ui.sort_by = v
            .parse::<SortBy>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "UNCTL_UI_SORT_BY")?;
    }
    if let Ok(v) = std::env::var("UNCTL_UI_FAILING_ONLY") {
        cfg.ui.failing_only = parse_bool(&v).with_context(|| "UNCTL_UI_FAILING_ONLY")?;
    }
    if let Ok(v) = std::env::var("UNCTL_CHECKS_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.checks.dir = Some(expand_home(Path::new(v), home_dir));
        }
    }
    if let Ok(v) = std::env::var("UNCTL_KUBERNETES_REQUEST_TIMEOUT_SECS") {
        cfg.kubernetes.request_timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "UNCTL_KUBERNETES_REQUEST_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("UNCTL_MYSQL_DEFAULTS_FILE") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.mysql.defaults_file = expand_home(Path::new(v), home_dir);
        }
    }
    if let Ok(v) = std::env::var("UNCTL_MYSQL_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.mysql.url = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("UNCTL_SCAN_CHECK_TIMEOUT_SECS") {
        cfg.scan.check_timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "UNCTL_SCAN_CHECK_TIMEOUT_SECS")?;
    }

    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    if cfg.kubernetes.request_timeout_secs == 0 {
        anyhow::bail!("kubernetes.request_timeout_secs must be greater than 0");
    }
    if cfg.scan.check_timeout_secs == 0 {
        anyhow::bail!("scan.check_timeout_secs must be greater than 0");
    }
    Ok(())
}

fn expand_home(path: &Path, home_dir: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir.join(rest),
        Err(_) => path.to_path_buf(),
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_sections_override_defaults() {
        let home = Path::new("/home/ops");
        let mut cfg = EffectiveConfig::defaults(home);
        let raw: RawConfig = toml::from_str(
            r#"
[ui]
sort_by = "check"

[checks]
dir = "~/unctl-checks"

[mysql]
defaults_file = "/etc/mysql/client.cnf"

[scan]
check_timeout_secs = 5
"#,
        )
        .unwrap();
        apply_raw_config(&mut cfg, raw, home);
        assert_eq!(cfg.ui.sort_by, SortBy::Check);
        assert!(cfg.ui.color);
        assert_eq!(cfg.checks.dir, Some(PathBuf::from("/home/ops/unctl-checks")));
        assert_eq!(cfg.mysql.defaults_file, PathBuf::from("/etc/mysql/client.cnf"));
        assert_eq!(cfg.check_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.kubernetes.request_timeout_secs, 30);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<RawConfig>("[ui]\ncolour = false\n").is_err());
    }

    #[test]
    fn zero_timeouts_are_invalid() {
        let mut cfg = EffectiveConfig::defaults(Path::new("/home/ops"));
        cfg.scan.check_timeout_secs = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool(" Yes ").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
