#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Barrier;
use unctl::collector::{BoxError, ClusterLister, CollectError, DataCollector, Snapshot};
use unctl::core::{CheckDescriptor, Provider};

/// In-memory cluster keyed by the plural resource name (`pods`,
/// `deployments`, ...).
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    objects: HashMap<String, Vec<Value>>,
    forbidden: Option<String>,
    hanging: Option<String>,
    rendezvous: Option<Arc<Barrier>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, plural: &str, object: Value) -> Self {
        self.objects.entry(plural.to_string()).or_default().push(object);
        self
    }

    /// Every list of `plural` fails as if RBAC denied it.
    pub fn forbid(mut self, plural: &str) -> Self {
        self.forbidden = Some(plural.to_string());
        self
    }

    /// Lists of `plural` never answer.
    pub fn hang(mut self, plural: &str) -> Self {
        self.hanging = Some(plural.to_string());
        self
    }

    /// Every list waits until `calls` lists are in flight at once.
    pub fn rendezvous(mut self, calls: usize) -> Self {
        self.rendezvous = Some(Arc::new(Barrier::new(calls)));
        self
    }
}

#[async_trait]
impl ClusterLister for FakeCluster {
    async fn list<K>(&self) -> Result<Vec<K>, BoxError>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        let plural = K::plural(&()).to_string();
        if let Some(barrier) = &self.rendezvous {
            barrier.wait().await;
        }
        if self.hanging.as_deref() == Some(plural.as_str()) {
            std::future::pending::<()>().await;
        }
        if self.forbidden.as_deref() == Some(plural.as_str()) {
            return Err(format!("{plural} is forbidden: User \"system:anonymous\" cannot list").into());
        }
        self.objects
            .get(&plural)
            .into_iter()
            .flatten()
            .map(|v| serde_json::from_value(v.clone()).map_err(BoxError::from))
            .collect()
    }
}

/// Hands out a prepared snapshot.
pub struct FixedCollector(pub Snapshot);

#[async_trait]
impl DataCollector for FixedCollector {
    fn provider(&self) -> Provider {
        self.0.provider()
    }

    async fn fetch_data(&self) -> Result<Snapshot, CollectError> {
        Ok(self.0.clone())
    }
}

pub fn descriptor(provider: &str, id: &str) -> Arc<CheckDescriptor> {
    let json = serde_json::json!({
        "Provider": provider,
        "CheckID": id,
        "CheckTitle": id,
        "CheckType": [],
        "ServiceName": "test",
        "SubServiceName": "",
        "ResourceIdTemplate": "",
        "Severity": "medium",
        "ResourceType": "",
        "Description": "",
        "Risk": "",
        "RelatedUrl": "",
        "Categories": [],
        "DependsOn": [],
        "RelatedTo": [],
        "Notes": "",
        "PositiveMatch": "",
        "NegativeMatch": ""
    });
    Arc::new(CheckDescriptor::from_json(id, &json.to_string()).expect("valid descriptor"))
}
