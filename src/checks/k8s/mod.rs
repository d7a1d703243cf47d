pub mod k8s_deployment_configmap_existence;
pub mod k8s_deployment_secret_existence;
pub mod k8s_deployment_zero_scale;
pub mod k8s_node_ready;
pub mod k8s_pod_crashloopbackoff;
pub mod k8s_pod_high_restart_count;
pub mod k8s_pods_pending;
pub mod k8s_pvc_pending;
pub mod k8s_service_empty;

use std::collections::HashSet;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::core::{CheckDescriptor, Finding, K8sResource, Resource};

/// Name carried by an object reference. Empty names count as absent.
pub(crate) trait ReferenceName {
    fn reference_name(&self) -> Option<&str>;
}

impl ReferenceName for String {
    fn reference_name(&self) -> Option<&str> {
        Some(self.as_str()).filter(|name| !name.is_empty())
    }
}

impl ReferenceName for Option<String> {
    fn reference_name(&self) -> Option<&str> {
        self.as_deref().filter(|name| !name.is_empty())
    }
}

pub(crate) fn resource(meta: &ObjectMeta) -> K8sResource {
    K8sResource {
        id: meta.uid.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        ..K8sResource::default()
    }
}

/// PASS finding for one object; the caller fills in sub-resource context.
pub(crate) fn finding(check: &Arc<CheckDescriptor>, resource: K8sResource) -> Finding {
    Finding::new(check, Resource::K8s(resource))
}

/// Set of `(namespace, name)` pairs for existence lookups.
pub(crate) fn name_index<'a>(
    metas: impl IntoIterator<Item = &'a ObjectMeta>,
) -> HashSet<(&'a str, &'a str)> {
    metas
        .into_iter()
        .filter_map(|meta| Some((meta.namespace.as_deref()?, meta.name.as_deref()?)))
        .collect()
}
