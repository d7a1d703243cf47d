use std::sync::Arc;

use super::{finding, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_pvc_pending/k8s_pvc_pending";
pub const SIDECAR: &str = include_str!("k8s_pvc_pending.json");

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(PvcPending { descriptor })
}

struct PvcPending {
    descriptor: Arc<CheckDescriptor>,
}

impl PvcPending {
    fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.kubernetes()?;
        let mut findings = Vec::with_capacity(data.pvcs().len());
        for pvc in data.pvcs() {
            let mut target = resource(&pvc.metadata);
            target.pvc = target.name.clone();
            let pending = pvc
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                == Some("Pending");
            let detail = format!(
                "PVC {} in namespace {} is in Pending state.",
                target.name, target.namespace
            );
            let mut f = finding(&self.descriptor, target);
            if pending {
                f.fail(detail);
            }
            findings.push(f);
        }
        Ok(findings)
    }
}

impl Check for PvcPending {
    fn descriptor(&self) -> &Arc<CheckDescriptor> {
        &self.descriptor
    }

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        Execution::Immediate(self.evaluate(data))
    }
}
