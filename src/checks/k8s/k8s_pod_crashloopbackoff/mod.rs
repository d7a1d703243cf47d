use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

use super::{finding, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_pod_crashloopbackoff/k8s_pod_crashloopbackoff";
pub const SIDECAR: &str = include_str!("k8s_pod_crashloopbackoff.json");

const REASON: &str = "CrashLoopBackOff";

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(PodCrashLoopBackOff { descriptor })
}

struct PodCrashLoopBackOff {
    descriptor: Arc<CheckDescriptor>,
}

fn crashing_container(pod: &Pod) -> Option<&str> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find(|cs| {
            cs.state
                .as_ref()
                .and_then(|state| state.waiting.as_ref())
                .and_then(|waiting| waiting.reason.as_deref())
                == Some(REASON)
        })
        .map(|cs| cs.name.as_str())
}

impl PodCrashLoopBackOff {
    fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.kubernetes()?;
        let mut findings = Vec::with_capacity(data.pods().len());
        for pod in data.pods() {
            let mut target = resource(&pod.metadata);
            target.pod = target.name.clone();
            let Some(container) = crashing_container(pod) else {
                findings.push(finding(&self.descriptor, target));
                continue;
            };
            let detail = format!(
                "Container {container} in pod {} is in {REASON} state.",
                target.name
            );
            target.container = container.to_string();
            let mut f = finding(&self.descriptor, target);
            f.fail(detail);
            findings.push(f);
        }
        Ok(findings)
    }
}

impl Check for PodCrashLoopBackOff {
    fn descriptor(&self) -> &Arc<CheckDescriptor> {
        &self.descriptor
    }

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        Execution::Immediate(self.evaluate(data))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::checks::k8s::fixtures;
    use crate::collector::KubernetesData;

    #[test]
    fn waiting_container_is_reported() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "worker-7f9", "namespace": "jobs" },
            "status": { "containerStatuses": [
                { "name": "sidecar", "ready": true, "restartCount": 0, "image": "x", "imageID": "",
                  "state": { "running": {} } },
                { "name": "main", "ready": false, "restartCount": 12, "image": "x", "imageID": "",
                  "state": { "waiting": { "reason": "CrashLoopBackOff" } } }
            ]}
        }))
        .unwrap();
        let check = build(fixtures::descriptor(SIDECAR));
        let findings = fixtures::run(
            check.as_ref(),
            KubernetesData {
                pods: vec![pod],
                ..Default::default()
            },
        );
        assert!(!findings[0].passed());
        assert!(findings[0].status_extended.contains("main"));
        assert_eq!(findings[0].unique_name(), "jobs/worker-7f9");
    }
}
