//! Provider-specific inventory collection.
//!
//! A collector produces exactly one [`Snapshot`] per run. The cluster
//! collector lists every resource type concurrently and joins the results;
//! the MySQL collector hands out a lazy metrics handle instead.

pub mod kubernetes;
pub mod mysql;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::Provider;

pub use kubernetes::{ClusterLister, KubeLister, KubernetesData, KubernetesDataCollector};
pub use mysql::{MetricSource, MySqlData, MySqlDataCollector, MySqlSource, PooledMySql};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to load cluster configuration")]
    Config {
        #[source]
        source: BoxError,
    },
    #[error("failed to list {kind}")]
    List {
        kind: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("listing {kind} timed out after {}s", timeout.as_secs())]
    Timeout {
        kind: &'static str,
        timeout: Duration,
    },
    #[error("{context} timed out after {}s", timeout.as_secs())]
    SourceTimeout { context: String, timeout: Duration },
    #[error("mysql: {context}")]
    MySql {
        context: String,
        #[source]
        source: BoxError,
    },
}

/// Point-in-time inventory shared read-only by every check of a run.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Kubernetes(KubernetesData),
    MySql(MySqlData),
}

impl Snapshot {
    pub fn provider(&self) -> Provider {
        match self {
            Snapshot::Kubernetes(_) => Provider::K8s,
            Snapshot::MySql(_) => Provider::MySql,
        }
    }

    /// True when checks query the data source while they run instead of
    /// reading a collected inventory.
    pub fn queries_on_demand(&self) -> bool {
        matches!(self, Snapshot::MySql(_))
    }

    pub fn kubernetes(&self) -> anyhow::Result<&KubernetesData> {
        match self {
            Snapshot::Kubernetes(data) => Ok(data),
            other => anyhow::bail!("expected kubernetes inventory, got {}", other.provider()),
        }
    }

    pub fn mysql(&self) -> anyhow::Result<&MySqlData> {
        match self {
            Snapshot::MySql(data) => Ok(data),
            other => anyhow::bail!("expected mysql inventory, got {}", other.provider()),
        }
    }
}

#[async_trait]
pub trait DataCollector: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch_data(&self) -> Result<Snapshot, CollectError>;
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub request_timeout: Duration,
    pub mysql: MySqlSource,
}

/// Collector table keyed by provider.
pub fn make_collector(provider: Provider, opts: &CollectorOptions) -> Box<dyn DataCollector> {
    match provider {
        Provider::K8s => Box::new(KubernetesDataCollector::new(
            KubeLister::new(),
            opts.request_timeout,
        )),
        Provider::MySql => Box::new(MySqlDataCollector::new(
            opts.mysql.clone(),
            opts.request_timeout,
        )),
    }
}
