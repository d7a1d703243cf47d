use std::sync::Arc;

use k8s_openapi::api::core::v1::Node;

use super::{finding, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_node_ready/k8s_node_ready";
pub const SIDECAR: &str = include_str!("k8s_node_ready.json");

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(NodeReady { descriptor })
}

struct NodeReady {
    descriptor: Arc<CheckDescriptor>,
}

/// Condition types that are not in their healthy state.
fn failing_conditions(node: &Node) -> Vec<&str> {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .into_iter()
        .flatten()
        .filter(|c| {
            if c.type_ == "Ready" {
                c.status != "True"
            } else {
                c.status != "False"
            }
        })
        .map(|c| c.type_.as_str())
        .collect()
}

impl NodeReady {
    fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.kubernetes()?;
        let mut findings = Vec::with_capacity(data.nodes().len());
        for node in data.nodes() {
            let mut target = resource(&node.metadata);
            target.node = target.name.clone();
            let mut f = finding(&self.descriptor, target);
            let failing = failing_conditions(node);
            if !failing.is_empty() {
                f.fail(format!("Node has failure conditions: {}", failing.join(", ")));
            }
            findings.push(f);
        }
        Ok(findings)
    }
}

impl Check for NodeReady {
    fn descriptor(&self) -> &Arc<CheckDescriptor> {
        &self.descriptor
    }

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        Execution::Immediate(self.evaluate(data))
    }
}
