use std::fmt;
use std::sync::Arc;

use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::CheckDescriptor;
use crate::loader::CheckUnit;

/// An instantiated check, owned by the run that created it.
pub struct CheckJob {
    check: Box<dyn Check>,
}

impl fmt::Debug for CheckJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckJob")
            .field("check_id", &self.descriptor().check_id)
            .finish()
    }
}

impl CheckJob {
    pub fn new(check: Box<dyn Check>) -> Self {
        Self { check }
    }

    pub fn descriptor(&self) -> &Arc<CheckDescriptor> {
        self.check.descriptor()
    }

    pub fn id(&self) -> &str {
        &self.descriptor().check_id
    }

    pub fn enabled(&self) -> bool {
        self.descriptor().enabled
    }

    pub fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        self.check.execute(data)
    }
}

pub struct JobDefinition;

impl JobDefinition {
    /// Instantiates every unit that exposes a constructor, keeping input
    /// order. Units without one are dropped.
    pub fn generate_jobs(units: Vec<CheckUnit>) -> Vec<CheckJob> {
        units
            .into_iter()
            .filter_map(|unit| {
                let build = unit.module.constructor?;
                Some(CheckJob::new(build(unit.descriptor)))
            })
            .collect()
    }
}
