use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "k8s")]
    K8s,
    #[serde(rename = "mysql")]
    MySql,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::K8s, Provider::MySql];

    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::K8s => "k8s",
            Provider::MySql => "mysql",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Provider::K8s => "Kubernetes",
            Provider::MySql => "MySQL",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "k8s" => Ok(Provider::K8s),
            "mysql" => Ok(Provider::MySql),
            other => Err(format!("unknown provider: {other} (expected k8s|mysql)")),
        }
    }
}
