use std::sync::Arc;

use tracing::{info, warn};

use crate::checks::{self, CheckModule};
use crate::core::CheckDescriptor;
use crate::registry::{Filters, Registry};

/// A descriptor paired with the implementation registered under its path.
#[derive(Debug, Clone)]
pub struct CheckUnit {
    pub descriptor: Arc<CheckDescriptor>,
    pub module: CheckModule,
}

pub struct ChecksLoader {
    registry: Registry,
    modules: Vec<CheckModule>,
}

impl ChecksLoader {
    /// Loader over the built-in registration table.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            modules: checks::modules(),
        }
    }

    pub fn with_modules(registry: Registry, modules: Vec<CheckModule>) -> Self {
        Self { registry, modules }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolves every matching descriptor to its implementation. The length
    /// of the result is the loaded count.
    pub fn load(&self, filters: &Filters) -> Vec<CheckUnit> {
        let mut units = Vec::new();
        for descriptor in self.registry.discover(filters) {
            let path = descriptor.module_path();
            let Some(module) = self.modules.iter().find(|m| m.path == path) else {
                warn!(check_id = %descriptor.check_id, %path, "no implementation registered, skipping");
                continue;
            };
            units.push(CheckUnit {
                descriptor: Arc::new(descriptor),
                module: *module,
            });
        }
        info!("Loaded {} check(s)", units.len());
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Provider;

    #[test]
    fn builtin_descriptors_all_resolve() {
        let loader = ChecksLoader::new(Registry::builtin());
        let units = loader.load(&Filters::default());
        assert_eq!(units.len(), checks::builtin().len());
        assert!(units.iter().all(|u| u.module.constructor.is_some()));
    }

    #[test]
    fn unresolvable_checks_are_skipped() {
        let modules: Vec<CheckModule> = checks::modules()
            .into_iter()
            .filter(|m| !m.path.ends_with("k8s_node_ready"))
            .collect();
        let loader = ChecksLoader::with_modules(Registry::builtin(), modules);
        let filters = Filters::for_provider(Provider::K8s);

        let all = loader.registry().discover(&filters).len();
        let units = loader.load(&filters);
        assert_eq!(units.len(), all - 1);
        assert!(units.iter().all(|u| u.descriptor.check_id != "k8s_node_ready"));
    }
}
