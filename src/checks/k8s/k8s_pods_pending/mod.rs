use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

use super::{finding, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_pods_pending/k8s_pods_pending";
pub const SIDECAR: &str = include_str!("k8s_pods_pending.json");

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(PodsPending { descriptor })
}

struct PodsPending {
    descriptor: Arc<CheckDescriptor>,
}

/// `Some(reason)` when the pod is Pending.
fn pending_reason(pod: &Pod) -> Option<String> {
    let status = pod.status.as_ref()?;
    if status.phase.as_deref() != Some("Pending") {
        return None;
    }
    let reason = status
        .conditions
        .iter()
        .flatten()
        .next()
        .and_then(|c| c.reason.clone())
        .unwrap_or_else(|| "unknown".to_string());
    Some(reason)
}

impl PodsPending {
    fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.kubernetes()?;
        let mut findings = Vec::with_capacity(data.pods().len());
        for pod in data.pods() {
            let mut target = resource(&pod.metadata);
            target.pod = target.name.clone();
            let mut f = finding(&self.descriptor, target);
            if let Some(reason) = pending_reason(pod) {
                f.fail(format!(
                    "Pod is in Pending state as the pod condition is '{reason}'"
                ));
            }
            findings.push(f);
        }
        Ok(findings)
    }
}

impl Check for PodsPending {
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

    #[test]
    fn reason_comes_from_first_condition() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "p" },
            "status": {
                "phase": "Pending",
                "conditions": [{ "type": "PodScheduled", "status": "False", "reason": "Unschedulable" }]
            }
        }))
        .unwrap();
        assert_eq!(pending_reason(&pod).as_deref(), Some("Unschedulable"));
    }

    #[test]
    fn running_pod_is_not_pending() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "p" },
            "status": { "phase": "Running" }
        }))
        .unwrap();
        assert_eq!(pending_reason(&pod), None);
    }
}
