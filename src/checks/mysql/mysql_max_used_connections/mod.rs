use std::sync::Arc;

use crate::checks::{Check, Execution};
use crate::collector::Snapshot;
use crate::core::{CheckDescriptor, Finding, MySqlResource, Resource};

pub const PATH: &str = "mysql/mysql_max_used_connections/mysql_max_used_connections";
pub const SIDECAR: &str = include_str!("mysql_max_used_connections.json");

/// Percent of `max_connections` at which the check fails.
const THRESHOLD_PERCENT: f64 = 80.0;

pub fn build(descriptor: Arc<CheckDescriptor>) -> Box<dyn Check> {
    Box::new(MaxUsedConnections { descriptor })
}

struct MaxUsedConnections {
    descriptor: Arc<CheckDescriptor>,
}

/// Usage in percent, `None` when no connections are allowed at all.
fn usage_percent(used: u64, max: u64) -> Option<f64> {
    (max > 0).then(|| 100.0 * used as f64 / max as f64)
}

impl MaxUsedConnections {
    async fn evaluate(&self, data: &Snapshot) -> anyhow::Result<Vec<Finding>> {
        let data = data.mysql()?;
        let max_connections = data.max_connections().await?;
        let connections_used = data.connections_used().await?;
        let database = data.dbname().await?;

        let mut finding = Finding::new(
            &self.descriptor,
            Resource::MySql(MySqlResource {
                id: "Max_used_connections".to_string(),
                name: "MySQL".to_string(),
                database,
            }),
        );
        match usage_percent(connections_used, max_connections) {
            Some(pct) if pct >= THRESHOLD_PERCENT => finding.fail(format!(
                "Used high value of database connections ({pct:.1}%): \
                 {connections_used} of {max_connections} available"
            )),
            Some(pct) => {
                finding.status_extended = format!(
                    "{connections_used} of {max_connections} connections used at peak ({pct:.1}%)"
                )
            }
            None => finding.fail("max_connections is 0"),
        }
        Ok(vec![finding])
    }
}

impl Check for MaxUsedConnections {
    fn descriptor(&self) -> &Arc<CheckDescriptor> {
        &self.descriptor
    }

    fn execute<'a>(&'a self, data: &'a Snapshot) -> Execution<'a> {
        Execution::Deferred(Box::pin(self.evaluate(data)))
    }
}
