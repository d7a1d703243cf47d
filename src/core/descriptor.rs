use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Provider, Severity};

/// Check metadata as stored in the JSON sidecar next to each check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CheckDescriptor {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub provider: Provider,
    #[serde(rename = "CheckID")]
    pub check_id: String,
    pub check_title: String,
    pub check_type: Vec<String>,
    pub service_name: String,
    pub sub_service_name: String,
    pub resource_id_template: String,
    pub severity: Severity,
    pub resource_type: String,
    pub description: String,
    pub risk: String,
    pub related_url: String,
    pub categories: Vec<String>,
    pub depends_on: Vec<String>,
    pub related_to: Vec<String>,
    pub notes: String,
    pub positive_match: String,
    pub negative_match: String,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid descriptor {origin}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid descriptor {origin}: {reason}")]
    Invalid { origin: String, reason: String },
}

impl CheckDescriptor {
    /// Parses and validates one sidecar. `origin` names the source in errors.
    pub fn from_json(origin: &str, json: &str) -> Result<Self, DescriptorError> {
        let descriptor: CheckDescriptor =
            serde_json::from_str(json).map_err(|source| DescriptorError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        descriptor.validate(origin)?;
        Ok(descriptor)
    }

    fn validate(&self, origin: &str) -> Result<(), DescriptorError> {
        let invalid = |reason: &str| DescriptorError::Invalid {
            origin: origin.to_string(),
            reason: reason.to_string(),
        };
        if self.check_id.trim().is_empty() {
            return Err(invalid("CheckID is empty"));
        }
        if self.check_id.contains('/') {
            return Err(invalid("CheckID must not contain '/'"));
        }
        if self.check_title.trim().is_empty() {
            return Err(invalid("CheckTitle is empty"));
        }
        Ok(())
    }

    /// Registration key of the implementation: `{provider}/{id}/{id}`.
    pub fn module_path(&self) -> String {
        format!("{}/{}/{}", self.provider, self.check_id, self.check_id)
    }

    pub fn in_any_category(&self, categories: &[String]) -> bool {
        self.categories.iter().any(|c| categories.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(id: &str) -> String {
        format!(
            r#"{{
  "Provider": "k8s",
  "CheckID": "{id}",
  "CheckTitle": "Sample {id}",
  "CheckType": ["Health"],
  "ServiceName": "deployment",
  "SubServiceName": "",
  "ResourceIdTemplate": "",
  "Severity": "High",
  "ResourceType": "Deployment",
  "Description": "",
  "Risk": "",
  "RelatedUrl": "",
  "Categories": ["availability"],
  "DependsOn": [],
  "RelatedTo": [],
  "Notes": "",
  "PositiveMatch": "",
  "NegativeMatch": ""
}}"#
        )
    }

    #[test]
    fn parses_sidecar_and_defaults_enabled() {
        let d = CheckDescriptor::from_json("sample", &sample_json("k8s_sample")).unwrap();
        assert!(d.enabled);
        assert_eq!(d.provider, Provider::K8s);
        assert_eq!(d.severity, Severity::High);
        assert_eq!(d.module_path(), "k8s/k8s_sample/k8s_sample");
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = sample_json("k8s_sample").replacen("{", "{\n  \"Bogus\": 1,", 1);
        let err = CheckDescriptor::from_json("sample", &json).unwrap_err();
        assert!(matches!(err, DescriptorError::Parse { .. }), "{err}");
    }

    #[test]
    fn rejects_missing_required_fields() {
        let json = sample_json("k8s_sample").replace("\"Risk\": \"\",", "");
        assert!(CheckDescriptor::from_json("sample", &json).is_err());
    }

    #[test]
    fn rejects_empty_identity() {
        let err = CheckDescriptor::from_json("sample", &sample_json("")).unwrap_err();
        assert!(matches!(err, DescriptorError::Invalid { .. }), "{err}");
    }
}
