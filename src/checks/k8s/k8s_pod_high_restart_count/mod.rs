use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

use super::{finding, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_pod_high_restart_count/k8s_pod_high_restart_count";
pub const SIDECAR: &str = include_str!("k8s_pod_high_restart_count.json");

const MAX_RESTARTS: i32 = 10;

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(PodHighRestartCount { descriptor })
}

struct PodHighRestartCount {
    descriptor: Arc<CheckDescriptor>,
}

fn restarting_containers(pod: &Pod) -> Vec<&str> {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .into_iter()
        .flatten()
        .filter(|cs| cs.restart_count > MAX_RESTARTS)
        .map(|cs| cs.name.as_str())
        .collect()
}

impl Check for PodHighRestartCount {
    fn descriptor(&self) -> &Arc<CheckDescriptor> {
        &self.descriptor
    }

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        let run = || -> anyhow::Result<Vec<Finding>> {
            let data = data.kubernetes()?;
            let mut findings = Vec::with_capacity(data.pods().len());
            for pod in data.pods() {
                let mut target = resource(&pod.metadata);
                target.pod = target.name.clone();
                let containers = restarting_containers(pod);
                if containers.is_empty() {
                    let mut f = finding(&self.descriptor, target);
                    f.status_extended =
                        "Pod's containers are within acceptable restart limits.".to_string();
                    findings.push(f);
                    continue;
                }
                target.container = containers.join(", ");
                let mut f = finding(&self.descriptor, target);
                f.fail(format!(
                    "Containers {} in the pod have restarted more than {MAX_RESTARTS} times.",
                    containers.join(", ")
                ));
                findings.push(f);
            }
            Ok(findings)
        };
        Execution::Immediate(run())
    }
}
