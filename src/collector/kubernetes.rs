use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Event, Node, PersistentVolumeClaim, Pod, ReplicationController, Secret,
    Service,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass, NetworkPolicy};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{BoxError, CollectError, DataCollector, Snapshot};
use crate::core::Provider;

/// Lists every object of one kind across all namespaces.
#[async_trait]
pub trait ClusterLister: Send + Sync {
    /// Loads credentials. Called once before any list call.
    async fn connect(&self) -> Result<(), CollectError> {
        Ok(())
    }

    async fn list<K>(&self) -> Result<Vec<K>, BoxError>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static;
}

/// [`ClusterLister`] backed by the kubeconfig / in-cluster configuration.
#[derive(Default)]
pub struct KubeLister {
    client: OnceCell<Client>,
}

impl KubeLister {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterLister for KubeLister {
    async fn connect(&self) -> Result<(), CollectError> {
        self.client
            .get_or_try_init(Client::try_default)
            .await
            .map_err(|e| CollectError::Config {
                source: Box::new(e),
            })?;
        Ok(())
    }

    async fn list<K>(&self) -> Result<Vec<K>, BoxError>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        let client = self
            .client
            .get()
            .cloned()
            .ok_or_else(|| BoxError::from("cluster client is not connected"))?;
        let api: Api<K> = Api::all(client);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }
}

/// Immutable cluster inventory. One accessor per collected resource type.
#[derive(Debug, Clone, Default)]
pub struct KubernetesData {
    pub(crate) configmaps: Vec<ConfigMap>,
    pub(crate) cronjobs: Vec<CronJob>,
    pub(crate) daemonsets: Vec<DaemonSet>,
    pub(crate) deployments: Vec<Deployment>,
    pub(crate) endpoints: Vec<Endpoints>,
    pub(crate) events: Vec<Event>,
    pub(crate) hpas: Vec<HorizontalPodAutoscaler>,
    pub(crate) ingress_classes: Vec<IngressClass>,
    pub(crate) ingresses: Vec<Ingress>,
    pub(crate) network_policies: Vec<NetworkPolicy>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) pods: Vec<Pod>,
    pub(crate) pvcs: Vec<PersistentVolumeClaim>,
    pub(crate) replica_sets: Vec<ReplicaSet>,
    pub(crate) replication_controllers: Vec<ReplicationController>,
    pub(crate) secrets: Vec<Secret>,
    pub(crate) services: Vec<Service>,
    pub(crate) statefulsets: Vec<StatefulSet>,
    pub(crate) storage_classes: Vec<StorageClass>,
}

impl KubernetesData {
    pub fn configmaps(&self) -> &[ConfigMap] {
        &self.configmaps
    }

    pub fn cronjobs(&self) -> &[CronJob] {
        &self.cronjobs
    }

    pub fn daemonsets(&self) -> &[DaemonSet] {
        &self.daemonsets
    }

    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }

    pub fn endpoints(&self) -> &[Endpoints] {
        &self.endpoints
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn hpas(&self) -> &[HorizontalPodAutoscaler] {
        &self.hpas
    }

    pub fn ingress_classes(&self) -> &[IngressClass] {
        &self.ingress_classes
    }

    pub fn ingresses(&self) -> &[Ingress] {
        &self.ingresses
    }

    pub fn network_policies(&self) -> &[NetworkPolicy] {
        &self.network_policies
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pods(&self) -> &[Pod] {
        &self.pods
    }

    pub fn pvcs(&self) -> &[PersistentVolumeClaim] {
        &self.pvcs
    }

    pub fn replica_sets(&self) -> &[ReplicaSet] {
        &self.replica_sets
    }

    pub fn replication_controllers(&self) -> &[ReplicationController] {
        &self.replication_controllers
    }

    pub fn secrets(&self) -> &[Secret] {
        &self.secrets
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn statefulsets(&self) -> &[StatefulSet] {
        &self.statefulsets
    }

    pub fn storage_classes(&self) -> &[StorageClass] {
        &self.storage_classes
    }
}

pub struct KubernetesDataCollector<L> {
    lister: L,
    request_timeout: Duration,
}

impl<L: ClusterLister> KubernetesDataCollector<L> {
    pub fn new(lister: L, request_timeout: Duration) -> Self {
        Self {
            lister,
            request_timeout,
        }
    }

    async fn fetch<K>(&self, kind: &'static str) -> Result<Vec<K>, CollectError>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        let started = Instant::now();
        match tokio::time::timeout(self.request_timeout, self.lister.list::<K>()).await {
            Ok(Ok(items)) => {
                debug!(
                    kind,
                    count = items.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "listed resources"
                );
                Ok(items)
            }
            Ok(Err(source)) => Err(CollectError::List { kind, source }),
            Err(_) => Err(CollectError::Timeout {
                kind,
                timeout: self.request_timeout,
            }),
        }
    }

    async fn collect(&self) -> Result<KubernetesData, CollectError> {
        self.lister.connect().await?;

        // try_join! drops the outstanding lists as soon as one fails.
        let (
            configmaps,
            cronjobs,
            daemonsets,
            deployments,
            endpoints,
            events,
            hpas,
            ingress_classes,
            ingresses,
            network_policies,
            nodes,
            pods,
            pvcs,
            replica_sets,
            replication_controllers,
            secrets,
            services,
            statefulsets,
            storage_classes,
        ) = tokio::try_join!(
            self.fetch::<ConfigMap>("configmaps"),
            self.fetch::<CronJob>("cronjobs"),
            self.fetch::<DaemonSet>("daemonsets"),
            self.fetch::<Deployment>("deployments"),
            self.fetch::<Endpoints>("endpoints"),
            self.fetch::<Event>("events"),
            self.fetch::<HorizontalPodAutoscaler>("hpas"),
            self.fetch::<IngressClass>("ingress classes"),
            self.fetch::<Ingress>("ingresses"),
            self.fetch::<NetworkPolicy>("network policies"),
            self.fetch::<Node>("nodes"),
            self.fetch::<Pod>("pods"),
            self.fetch::<PersistentVolumeClaim>("pvcs"),
            self.fetch::<ReplicaSet>("replica sets"),
            self.fetch::<ReplicationController>("replication controllers"),
            self.fetch::<Secret>("secrets"),
            self.fetch::<Service>("services"),
            self.fetch::<StatefulSet>("statefulsets"),
            self.fetch::<StorageClass>("storage classes"),
        )?;

        Ok(KubernetesData {
            configmaps,
            cronjobs,
            daemonsets,
            deployments,
            endpoints,
            events,
            hpas,
            ingress_classes,
            ingresses,
            network_policies,
            nodes,
            pods,
            pvcs,
            replica_sets,
            replication_controllers,
            secrets,
            services,
            statefulsets,
            storage_classes,
        })
    }
}

#[async_trait]
impl<L: ClusterLister> DataCollector for KubernetesDataCollector<L> {
    fn provider(&self) -> Provider {
        Provider::K8s
    }

    async fn fetch_data(&self) -> Result<Snapshot, CollectError> {
        match self.collect().await {
            Ok(data) => Ok(Snapshot::Kubernetes(data)),
            Err(err) => {
                warn!(error = %err, "failed to collect cluster inventory");
                Err(err)
            }
        }
    }
}
