use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;

use super::{ReferenceName, finding, name_index, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_deployment_configmap_existence/k8s_deployment_configmap_existence";
pub const SIDECAR: &str = include_str!("k8s_deployment_configmap_existence.json");

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(DeploymentConfigMapExistence { descriptor })
}

struct DeploymentConfigMapExistence {
    descriptor: Arc<CheckDescriptor>,
}

fn mounted_configmaps(deployment: &Deployment) -> impl Iterator<Item = &str> {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| pod.volumes.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|volume| volume.config_map.as_ref())
        .filter_map(|source| source.name.reference_name())
}

impl DeploymentConfigMapExistence {
    fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.kubernetes()?;
        let existing = name_index(data.configmaps().iter().map(|cm| &cm.metadata));

        let mut findings = Vec::with_capacity(data.deployments().len());
        for deployment in data.deployments() {
            let mut target = resource(&deployment.metadata);
            let missing = mounted_configmaps(deployment)
                .find(|name| !existing.contains(&(target.namespace.as_str(), *name)));
            let Some(missing) = missing else {
                findings.push(finding(&self.descriptor, target));
                continue;
            };
            let detail = format!(
                "ConfigMap {missing} mounted by Deployment {} does not exist in namespace {}.",
                target.name, target.namespace
            );
            target.configmap = missing.to_string();
            let mut f = finding(&self.descriptor, target);
            f.fail(detail);
            findings.push(f);
        }
        Ok(findings)
    }
}

impl Check for DeploymentConfigMapExistence {
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
    use crate::core::Status;

    fn deployment(configmap: &str) -> Deployment {
        serde_json::from_value(json!({
            "metadata": { "name": "web", "namespace": "ns", "uid": "d-1" },
            "spec": {
                "selector": {},
                "template": { "spec": {
                    "containers": [{ "name": "app" }],
                    "volumes": [{ "name": "cfg", "configMap": { "name": configmap } }]
                }}
            }
        }))
        .unwrap()
    }

    #[test]
    fn missing_configmap_fails_with_context() {
        let check = build(fixtures::descriptor(SIDECAR));
        let data = KubernetesData {
            deployments: vec![deployment("cm1")],
            ..Default::default()
        };
        let findings = fixtures::run(check.as_ref(), data);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].status, Status::Fail);
        assert_eq!(findings[0].unique_name(), "ns/web");
        assert!(findings[0].status_extended.contains("cm1"));
    }

    #[test]
    fn configmap_in_another_namespace_does_not_count() {
        let check = build(fixtures::descriptor(SIDECAR));
        let data = KubernetesData {
            deployments: vec![deployment("cm1")],
            configmaps: vec![
                serde_json::from_value(json!({
                    "metadata": { "name": "cm1", "namespace": "other" }
                }))
                .unwrap(),
            ],
            ..Default::default()
        };
        let findings = fixtures::run(check.as_ref(), data);
        assert_eq!(findings[0].status, Status::Fail);
    }
}
