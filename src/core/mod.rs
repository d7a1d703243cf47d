mod descriptor;
mod finding;
mod provider;
mod report;
mod severity;

pub use descriptor::{CheckDescriptor, DescriptorError};
pub use finding::{Finding, K8sResource, MySqlResource, Resource, Status};
pub use provider::Provider;
pub use report::{Report, ReportSummary, ResultMap};
pub use severity::Severity;
