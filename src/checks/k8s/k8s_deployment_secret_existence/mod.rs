use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;

use super::{ReferenceName, finding, name_index, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_deployment_secret_existence/k8s_deployment_secret_existence";
pub const SIDECAR: &str = include_str!("k8s_deployment_secret_existence.json");

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(DeploymentSecretExistence { descriptor })
}

struct DeploymentSecretExistence {
    descriptor: Arc<CheckDescriptor>,
}

/// Secrets named by `env[].valueFrom.secretKeyRef`, in container order.
fn referenced_secrets(deployment: &Deployment) -> Vec<&str> {
    let mut names: Vec<&str> = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| pod.containers.as_slice())
        .unwrap_or_default()
        .iter()
        .flat_map(|container| container.env.iter().flatten())
        .filter_map(|env| env.value_from.as_ref()?.secret_key_ref.as_ref())
        .filter_map(|selector| selector.name.reference_name())
        .collect();
    names.dedup();
    names
}

impl DeploymentSecretExistence {
    fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.kubernetes()?;
        let existing = name_index(data.secrets().iter().map(|s| &s.metadata));

        let mut findings = Vec::with_capacity(data.deployments().len());
        for deployment in data.deployments() {
            let mut target = resource(&deployment.metadata);
            let missing: Vec<&str> = referenced_secrets(deployment)
                .into_iter()
                .filter(|name| !existing.contains(&(target.namespace.as_str(), *name)))
                .collect();
            if missing.is_empty() {
                findings.push(finding(&self.descriptor, target));
                continue;
            }
            let detail = format!(
                "Secret {} referenced by Deployment {} does not exist in namespace {}.",
                missing.join(", "),
                target.name,
                target.namespace
            );
            target.secret = missing.join(",");
            let mut f = finding(&self.descriptor, target);
            f.fail(detail);
            findings.push(f);
        }
        Ok(findings)
    }
}

impl Check for DeploymentSecretExistence {
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

    fn deployment() -> Deployment {
        serde_json::from_value(json!({
            "metadata": { "name": "api", "namespace": "prod", "uid": "d-2" },
            "spec": {
                "selector": {},
                "template": { "spec": { "containers": [{
                    "name": "app",
                    "env": [
                        { "name": "PLAIN", "value": "1" },
                        { "name": "DB_PASSWORD", "valueFrom": {
                            "secretKeyRef": { "name": "db-creds", "key": "password" }
                        }}
                    ]
                }]}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn existing_secret_passes() {
        let check = build(fixtures::descriptor(SIDECAR));
        let data = KubernetesData {
            deployments: vec![deployment()],
            secrets: vec![
                serde_json::from_value(json!({
                    "metadata": { "name": "db-creds", "namespace": "prod" }
                }))
                .unwrap(),
            ],
            ..Default::default()
        };
        let findings = fixtures::run(check.as_ref(), data);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].passed());
    }

    #[test]
    fn missing_secret_fails() {
        let check = build(fixtures::descriptor(SIDECAR));
        let data = KubernetesData {
            deployments: vec![deployment()],
            ..Default::default()
        };
        let findings = fixtures::run(check.as_ref(), data);
        assert_eq!(findings[0].status, Status::Fail);
        assert!(findings[0].status_extended.contains("db-creds"));
    }
}
