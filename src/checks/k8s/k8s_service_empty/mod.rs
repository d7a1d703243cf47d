use std::collections::HashSet;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;

use super::{finding, resource};
use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

pub const PATH: &str = "k8s/k8s_service_empty/k8s_service_empty";
pub const SIDECAR: &str = include_str!("k8s_service_empty.json");

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(ServiceEmpty { descriptor })
}

struct ServiceEmpty {
    descriptor: Arc<CheckDescriptor>,
}

/// `k=v` pairs of the selector, comma separated, in key order.
fn selector(service: &Service) -> String {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.selector.as_ref())
        .into_iter()
        .flatten()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl ServiceEmpty {
    fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.kubernetes()?;
        let populated: HashSet<(&str, &str)> = data
            .endpoints()
            .iter()
            .filter(|ep| ep.subsets.as_ref().is_some_and(|s| !s.is_empty()))
            .filter_map(|ep| {
                Some((
                    ep.metadata.namespace.as_deref()?,
                    ep.metadata.name.as_deref()?,
                ))
            })
            .collect();

        let mut findings = Vec::with_capacity(data.services().len());
        for service in data.services() {
            let mut target = resource(&service.metadata);
            target.service = target.name.clone();
            if populated.contains(&(target.namespace.as_str(), target.name.as_str())) {
                findings.push(finding(&self.descriptor, target));
                continue;
            }
            target.selector = selector(service);
            let mut f = finding(&self.descriptor, target);
            f.fail("Service has NO endpoints");
            findings.push(f);
        }
        Ok(findings)
    }
}

impl Check for ServiceEmpty {
    fn descriptor(&self) -> &Arc<CheckDescriptor> {
        &self.descriptor
    }

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        Execution::Immediate(self.evaluate(data))
    }
}
