//! Check plugins.
//!
//! Every check lives under `{provider}/{id}/` with its implementation in
//! `mod.rs` and its descriptor in `{id}.json`. The built-in catalogue below
//! maps the `{provider}/{id}/{id}` path to the embedded descriptor and the
//! constructor of the implementation.

pub mod k8s;
pub mod mysql;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding};

/// Outcome of invoking a check's entry point.
pub enum Execution<'a> {
    /// The check ran to completion.
    Immediate(anyhow::Result<Vec<Finding>>),
    /// The check suspends on I/O; the engine awaits it.
    Deferred(BoxFuture<'a, anyhow::Result<Vec<Finding>>>),
}

impl fmt::Debug for Execution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Immediate(_) => f.write_str("Execution::Immediate"),
            Execution::Deferred(_) => f.write_str("Execution::Deferred"),
        }
    }
}

pub trait Check: Send + Sync {
    fn descriptor(&self) -> &Arc<CheckDescriptor>;

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a>;
}

pub type Constructor = fn(Arc<CheckDescriptor>) -> Box<dyn Check>;

/// Registration entry of one implementation.
#[derive(Clone, Copy)]
pub struct CheckModule {
    pub path: &'static str,
    /// `None` marks a module without an entry point.
    pub constructor: Option<Constructor>,
}

impl fmt::Debug for CheckModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckModule")
            .field("path", &self.path)
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

/// A check compiled into the binary.
pub struct Builtin {
    pub path: &'static str,
    pub sidecar: &'static str,
    pub build: Constructor,
}

macro_rules! builtin {
    ($($seg:ident)::+) => {
        Builtin {
            path: $($seg)::+::PATH,
            sidecar: $($seg)::+::SIDECAR,
            build: $($seg)::+::build,
        }
    };
}

static BUILTIN: &[Builtin] = &[
    builtin!(k8s::k8s_deployment_configmap_existence),
    builtin!(k8s::k8s_deployment_secret_existence),
    builtin!(k8s::k8s_deployment_zero_scale),
    builtin!(k8s::k8s_node_ready),
    builtin!(k8s::k8s_pod_crashloopbackoff),
    builtin!(k8s::k8s_pod_high_restart_count),
    builtin!(k8s::k8s_pods_pending),
    builtin!(k8s::k8s_pvc_pending),
    builtin!(k8s::k8s_service_empty),
    builtin!(mysql::mysql_max_used_connections),
];

pub fn builtin() -> &'static [Builtin] {
    BUILTIN
}

/// Registration table of the built-in implementations.
pub fn modules() -> Vec<CheckModule> {
    BUILTIN
        .iter()
        .map(|b| CheckModule {
            path: b.path,
            constructor: Some(b.build),
        })
        .collect()
}
