//! Check metadata registry.
//!
//! Reads descriptor sidecars without touching check implementations. A
//! sidecar that cannot be read or validated is skipped with a warning so one
//! broken file never hides the rest of the catalogue.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::checks;
use crate::core::{CheckDescriptor, DescriptorError, Provider};

/// Conjunction of optional filters. Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub provider: Option<Provider>,
    pub categories: Vec<String>,
    pub services: Vec<String>,
    pub ids: Vec<String>,
}

impl Filters {
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }

    pub fn matches(&self, d: &CheckDescriptor) -> bool {
        if self.provider.is_some_and(|p| p != d.provider) {
            return false;
        }
        if !self.categories.is_empty() && !d.in_any_category(&self.categories) {
            return false;
        }
        if !self.services.is_empty() && !self.services.contains(&d.service_name) {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.contains(&d.check_id) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
    /// Sidecars compiled into the binary.
    Builtin,
    /// `{root}/{provider}/{id}/{id}.json`
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Registry {
    source: DescriptorSource,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    pub fn new(source: DescriptorSource) -> Self {
        Self { source }
    }

    pub fn builtin() -> Self {
        Self::new(DescriptorSource::Builtin)
    }

    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(DescriptorSource::Directory(root.into()))
    }

    pub fn source(&self) -> &DescriptorSource {
        &self.source
    }

    /// Descriptors passing every filter, in listing order.
    pub fn discover(&self, filters: &Filters) -> Vec<CheckDescriptor> {
        let found: Vec<CheckDescriptor> = self
            .descriptors()
            .into_iter()
            .filter(|d| filters.matches(d))
            .collect();
        debug!(count = found.len(), "discovered descriptors");
        found
    }

    /// Number of checks per service name.
    pub fn services(&self, provider: Option<Provider>) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for d in self.discover(&Filters {
            provider,
            ..Filters::default()
        }) {
            *counts.entry(d.service_name).or_insert(0) += 1;
        }
        counts
    }

    /// Number of checks per category.
    pub fn categories(&self, provider: Option<Provider>) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for d in self.discover(&Filters {
            provider,
            ..Filters::default()
        }) {
            for category in d.categories {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        counts
    }

    fn descriptors(&self) -> Vec<CheckDescriptor> {
        let loaded = match &self.source {
            DescriptorSource::Builtin => checks::builtin()
                .iter()
                .map(|b| CheckDescriptor::from_json(b.path, b.sidecar))
                .collect(),
            DescriptorSource::Directory(root) => read_dir_sidecars(root),
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for result in loaded {
            match result {
                Ok(d) if !seen.insert(d.check_id.clone()) => {
                    warn!(check_id = %d.check_id, "duplicate check id, keeping the first");
                }
                Ok(d) => out.push(d),
                Err(err) => warn!(error = %format_chain(&err), "skipping check descriptor"),
            }
        }
        out
    }
}

fn read_dir_sidecars(root: &Path) -> Vec<Result<CheckDescriptor, DescriptorError>> {
    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %root.display(), error = %err, "failed to walk checks directory");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_sidecar(path) {
            continue;
        }
        out.push(read_sidecar(root, path));
    }
    out
}

/// `{id}/{id}.json`
fn is_sidecar(path: &Path) -> bool {
    let stem = path.file_stem().and_then(|s| s.to_str());
    let parent = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|s| s.to_str());
    path.extension().is_some_and(|ext| ext == "json") && stem.is_some() && stem == parent
}

fn read_sidecar(root: &Path, path: &Path) -> Result<CheckDescriptor, DescriptorError> {
    let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let origin = path.display().to_string();
    let descriptor = CheckDescriptor::from_json(&origin, &text)?;

    let rel = path
        .strip_prefix(root)
        .unwrap_or(path)
        .with_extension("")
        .to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/");
    if rel != descriptor.module_path() {
        return Err(DescriptorError::Invalid {
            origin,
            reason: format!(
                "located at {rel} but declares {}",
                descriptor.module_path()
            ),
        });
    }
    Ok(descriptor)
}

fn format_chain(err: &dyn std::error::Error) -> String {
    let mut s = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        s.push_str(": ");
        s.push_str(&cause.to_string());
        source = cause.source();
    }
    s
}
