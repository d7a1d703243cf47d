use std::collections::BTreeSet;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{Finding, Provider, Resource};

/// Findings keyed by check identity, iterated in job execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMap {
    entries: Vec<(String, Vec<Finding>)>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the findings of one check. A repeated identity replaces the
    /// earlier entry in place.
    pub fn insert(&mut self, check_id: impl Into<String>, findings: Vec<Finding>) {
        let check_id = check_id.into();
        if let Some(slot) = self.entries.iter_mut().find(|(id, _)| *id == check_id) {
            slot.1 = findings;
            return;
        }
        self.entries.push((check_id, findings));
    }

    pub fn get(&self, check_id: &str) -> Option<&[Finding]> {
        self.entries
            .iter()
            .find(|(id, _)| id == check_id)
            .map(|(_, findings)| findings.as_slice())
    }

    pub fn contains(&self, check_id: &str) -> bool {
        self.get(check_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Finding])> {
        self.entries
            .iter()
            .map(|(id, findings)| (id.as_str(), findings.as_slice()))
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.entries.iter().flat_map(|(_, findings)| findings.iter())
    }

    pub fn failing_reports(&self) -> Vec<&Finding> {
        self.findings().filter(|f| !f.passed()).collect()
    }

    /// Distinct resources with at least one failing finding. Checks that
    /// could not run name no resource and are left out.
    pub fn failing_objects(&self) -> BTreeSet<String> {
        self.findings()
            .filter(|f| !f.passed())
            .filter(|f| !matches!(f.resource, Resource::Check { .. }))
            .map(Finding::unique_name)
            .collect()
    }

    /// Copy keeping only FAIL findings. Every check identity stays present.
    pub fn failing_only(&self) -> ResultMap {
        ResultMap {
            entries: self
                .entries
                .iter()
                .map(|(id, findings)| {
                    let failing = findings.iter().filter(|f| !f.passed()).cloned().collect();
                    (id.clone(), failing)
                })
                .collect(),
        }
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            checks: self.len(),
            findings: self.findings().count(),
            failing: self.failing_reports().len(),
            failing_objects: self.failing_objects().len(),
        }
    }
}

impl Serialize for ResultMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, findings) in &self.entries {
            map.serialize_entry(id, findings)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub checks: usize,
    pub findings: usize,
    pub failing: usize,
    pub failing_objects: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub schema_version: &'static str,
    pub tool_version: &'static str,
    pub provider: Provider,
    pub generated_at: String,
    pub summary: ReportSummary,
    pub results: &'a ResultMap,
}

pub const SCHEMA_VERSION: &str = "1.0";

impl<'a> Report<'a> {
    pub fn new(provider: Provider, results: &'a ResultMap) -> Self {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            schema_version: SCHEMA_VERSION,
            tool_version: env!("CARGO_PKG_VERSION"),
            provider,
            generated_at,
            summary: results.summary(),
            results,
        }
    }
}
