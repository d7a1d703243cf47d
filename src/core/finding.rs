use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::core::CheckDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a Kubernetes object plus the sub-resource a check pointed at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct K8sResource {
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pod: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pvc: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub container: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selector: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub configmap: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MySqlResource {
    pub id: String,
    pub name: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    K8s(K8sResource),
    #[serde(rename = "mysql")]
    MySql(MySqlResource),
    /// Stand-in used when the check itself could not be evaluated.
    Check { check_id: String },
}

impl Resource {
    /// `namespace/name` for cluster objects, `database/name` for MySQL.
    pub fn unique_name(&self) -> String {
        match self {
            Resource::K8s(r) => format!("{}/{}", r.namespace, r.name),
            Resource::MySql(r) => format!("{}/{}", r.database, r.name),
            Resource::Check { check_id } => format!("check/{check_id}"),
        }
    }

    pub fn object_name(&self) -> &str {
        match self {
            Resource::K8s(r) => &r.name,
            Resource::MySql(r) => &r.name,
            Resource::Check { check_id } => check_id,
        }
    }

    /// The scope column of the result table.
    pub fn scope(&self) -> &str {
        match self {
            Resource::K8s(r) => &r.namespace,
            Resource::MySql(r) => &r.database,
            Resource::Check { .. } => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    #[serde(serialize_with = "check_ref")]
    pub check: Arc<CheckDescriptor>,
    pub status: Status,
    pub status_extended: String,
    pub resource: Resource,
}

impl Finding {
    pub fn new(check: &Arc<CheckDescriptor>, resource: Resource) -> Self {
        Self {
            check: Arc::clone(check),
            status: Status::Pass,
            status_extended: String::new(),
            resource,
        }
    }

    /// Synthetic FAIL recorded when a check errors, panics or times out.
    pub fn check_error(check: &Arc<CheckDescriptor>, error: impl fmt::Display) -> Self {
        Self {
            check: Arc::clone(check),
            status: Status::Fail,
            status_extended: format!("check failed to execute: {error}"),
            resource: Resource::Check {
                check_id: check.check_id.clone(),
            },
        }
    }

    pub fn fail(&mut self, detail: impl Into<String>) {
        self.status = Status::Fail;
        self.status_extended = detail.into();
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }

    pub fn unique_name(&self) -> String {
        self.resource.unique_name()
    }
}

fn check_ref<S: Serializer>(check: &Arc<CheckDescriptor>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("CheckRef", 3)?;
    s.serialize_field("id", &check.check_id)?;
    s.serialize_field("title", &check.check_title)?;
    s.serialize_field("severity", &check.severity)?;
    s.end()
}
