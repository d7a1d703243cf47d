use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use unicode_width::UnicodeWidthChar;

use crate::core::{CheckDescriptor, Finding, Provider, ReportSummary, ResultMap, Severity, Status};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Object,
    Check,
}

impl SortBy {
    pub const fn as_str(self) -> &'static str {
        match self {
            SortBy::Object => "object",
            SortBy::Check => "check",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "object" => Ok(SortBy::Object),
            "check" => Ok(SortBy::Check),
            other => Err(format!("invalid sort order: {other} (expected object|check)")),
        }
    }
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "Error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "Caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "Next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for more detail");
    let _ = writeln!(stderr, "  - see `unctl --help` for commands and options");
}

/// One progress line on stdout, suppressed by `--quiet`.
pub fn status_line(cfg: &UiConfig, message: impl fmt::Display) {
    if cfg.quiet {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{message}");
}

pub fn print_results(
    results: &ResultMap,
    provider: Provider,
    cfg: &UiConfig,
    sort_by: SortBy,
    failing_only: bool,
) {
    let mut out = io::stdout().lock();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", format_summary(&results.summary()));
    let _ = writeln!(out);
    match sort_by {
        SortBy::Object => write_by_object(&mut out, results, provider, cfg.color, failing_only),
        SortBy::Check => write_by_check(&mut out, results, provider, cfg.color, failing_only),
    }
}

pub fn format_summary(summary: &ReportSummary) -> String {
    format!(
        "Summary: checks={}  findings={}  failing={}  failing objects={}",
        summary.checks, summary.findings, summary.failing, summary.failing_objects
    )
}

fn write_by_object(
    out: &mut dyn Write,
    results: &ResultMap,
    provider: Provider,
    color: bool,
    failing_only: bool,
) {
    let findings = sorted_by_object(results, failing_only);
    if findings.is_empty() {
        let _ = writeln!(out, "No findings.");
        return;
    }
    write_findings_table(out, &findings, provider, color);
}

fn write_by_check(
    out: &mut dyn Write,
    results: &ResultMap,
    provider: Provider,
    color: bool,
    failing_only: bool,
) {
    for (title, findings) in grouped_by_check(results) {
        let failing: Vec<&Finding> = findings.iter().copied().filter(|f| !f.passed()).collect();
        if failing.is_empty() {
            if !failing_only {
                let _ = writeln!(out, "{} {title}", format_status(Status::Pass, color));
                let _ = writeln!(out);
            }
            continue;
        }
        let _ = writeln!(out, "{} {title}", format_status(Status::Fail, color));
        write_findings_table(out, &failing, provider, color);
        let _ = writeln!(out);
    }
}

/// Findings ordered by scope and object name; ties keep execution order.
pub fn sorted_by_object(results: &ResultMap, failing_only: bool) -> Vec<&Finding> {
    let mut findings: Vec<&Finding> = results
        .findings()
        .filter(|f| !failing_only || !f.passed())
        .collect();
    findings.sort_by(|a, b| {
        (a.resource.scope(), a.resource.object_name())
            .cmp(&(b.resource.scope(), b.resource.object_name()))
    });
    findings
}

/// Findings grouped by check title, groups in execution order.
pub fn grouped_by_check(results: &ResultMap) -> Vec<(&str, Vec<&Finding>)> {
    let mut groups: Vec<(&str, Vec<&Finding>)> = Vec::new();
    for finding in results.findings() {
        let title = finding.check.check_title.as_str();
        match groups.iter_mut().find(|(t, _)| *t == title) {
            Some((_, group)) => group.push(finding),
            None => groups.push((title, vec![finding])),
        }
    }
    groups
}

fn write_findings_table(out: &mut dyn Write, findings: &[&Finding], provider: Provider, color: bool) {
    let scope_label = match provider {
        Provider::K8s => "NAMESPACE",
        Provider::MySql => "DATABASE",
    };
    let headers = [scope_label, "OBJECT", "CHECK", "SEVERITY", "STATUS", "DETAIL"];
    let rows: Vec<[String; 6]> = findings
        .iter()
        .map(|f| {
            [
                f.resource.scope().to_string(),
                f.resource.object_name().to_string(),
                truncate_middle(&f.check.check_title, 48),
                format_severity(f.check.severity, color),
                format_status(f.status, color),
                f.status_extended.clone(),
            ]
        })
        .collect();
    write_table(out, &headers, &rows);
}

fn write_table<const N: usize>(out: &mut dyn Write, headers: &[&str; N], rows: &[[String; N]]) {
    let mut widths = [0usize; N];
    for (i, header) in headers.iter().enumerate() {
        widths[i] = rows
            .iter()
            .map(|row| visible_width_ansi(&row[i]))
            .max()
            .unwrap_or(0)
            .max(visible_width_ansi(header));
    }

    let line = |cells: Vec<String>| {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i == last {
                    c.clone()
                } else {
                    pad_end_display(c, widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let _ = writeln!(out, "{}", line(headers.iter().map(|h| h.to_string()).collect()));
    let _ = writeln!(out, "{}", line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        let _ = writeln!(out, "{}", line(row.to_vec()));
    }
}

/// Descriptors ordered by provider, severity (most severe first) and title.
pub fn sorted_checks(mut descriptors: Vec<CheckDescriptor>) -> Vec<CheckDescriptor> {
    descriptors.sort_by(|a, b| {
        (a.provider.as_str(), a.severity.rank(), &a.check_title).cmp(&(
            b.provider.as_str(),
            b.severity.rank(),
            &b.check_title,
        ))
    });
    descriptors
}

pub fn print_check_list(descriptors: &[CheckDescriptor], cfg: &UiConfig) {
    let headers = ["PROVIDER", "ID", "SEVERITY", "SERVICE", "ENABLED", "TITLE"];
    let rows: Vec<[String; 6]> = descriptors
        .iter()
        .map(|d| {
            [
                d.provider.to_string(),
                d.check_id.clone(),
                format_severity(d.severity, cfg.color),
                d.service_name.clone(),
                if d.enabled { "yes" } else { "no" }.to_string(),
                d.check_title.clone(),
            ]
        })
        .collect();
    let mut out = io::stdout().lock();
    write_table(&mut out, &headers, &rows);
}

pub fn print_counts(name: &str, counts: &BTreeMap<String, usize>) {
    let rows: Vec<[String; 2]> = counts
        .iter()
        .map(|(item, count)| [item.clone(), count.to_string()])
        .collect();
    let mut out = io::stdout().lock();
    write_table(&mut out, &[name, "CHECKS"], &rows);
}

fn format_status(status: Status, color: bool) -> String {
    let s = status.as_str();
    if !color {
        return s.to_string();
    }
    let code = match status {
        Status::Pass => "32",
        Status::Fail => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.as_str();
    if !color {
        return s.to_string();
    }
    let code = match severity {
        Severity::Critical => "91",
        Severity::Severe => "95",
        Severity::High => "93",
        Severity::Medium => "33",
        Severity::Low => "92",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s.chars().skip(len - right).collect();

    format!("{prefix}...{suffix}")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
