use std::sync::Arc;

use super::{finding, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_deployment_zero_scale/k8s_deployment_zero_scale";
pub const SIDECAR: &str = include_str!("k8s_deployment_zero_scale.json");

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(DeploymentZeroScale { descriptor })
}

struct DeploymentZeroScale {
    descriptor: Arc<CheckDescriptor>,
}

impl Check for DeploymentZeroScale {
    fn descriptor(&self) -> &Arc<CheckDescriptor> {
        &self.descriptor
    }

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        Execution::Immediate(data.kubernetes().map(|data| {
            data.deployments()
                .iter()
                .map(|deployment| {
                    // An unset replica count defaults to 1 on the API server.
                    let replicas = deployment.spec.as_ref().and_then(|s| s.replicas);
                    let target = resource(&deployment.metadata);
                    let name = target.name.clone();
                    let mut f: Finding = finding(&self.descriptor, target);
                    if replicas == Some(0) {
                        f.fail(format!("Deployment {name} is scaled to zero."));
                    } else {
                        f.status_extended = format!("Deployment {name} has a non-zero replica count.");
                    }
                    f
                })
                .collect()
        }))
    }
}
