use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{CollectError, DataCollector, Snapshot};
use crate::core::Provider;

/// Where connection settings come from. A URL wins over the option file.
#[derive(Debug, Clone, Serialize)]
pub struct MySqlSource {
    pub defaults_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Raw scalar lookups against one server.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn database_name(&self) -> Result<String, CollectError>;

    /// `SHOW GLOBAL VARIABLES` value.
    async fn variable(&self, name: &str) -> Result<String, CollectError>;

    /// `SHOW GLOBAL STATUS` value.
    async fn status(&self, name: &str) -> Result<String, CollectError>;
}

/// Handle given to MySQL checks. Every accessor queries on demand.
#[derive(Clone)]
pub struct MySqlData {
    source: Arc<dyn MetricSource>,
}

impl fmt::Debug for MySqlData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlData").finish_non_exhaustive()
    }
}

impl MySqlData {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }

    /// Current schema; serves as the namespace of MySQL findings.
    pub async fn dbname(&self) -> Result<String, CollectError> {
        self.source.database_name().await
    }

    pub async fn max_connections(&self) -> Result<u64, CollectError> {
        let raw = self.source.variable("max_connections").await?;
        parse_counter("max_connections", &raw)
    }

    pub async fn connections_used(&self) -> Result<u64, CollectError> {
        let raw = self.source.status("Max_used_connections").await?;
        parse_counter("Max_used_connections", &raw)
    }
}

fn parse_counter(name: &str, raw: &str) -> Result<u64, CollectError> {
    raw.trim().parse::<u64>().map_err(|e| CollectError::MySql {
        context: format!("{name} is not a number: {raw:?}"),
        source: Box::new(e),
    })
}

/// [`MetricSource`] over a single-connection pool opened on first use.
pub struct PooledMySql {
    source: MySqlSource,
    acquire_timeout: Duration,
    pool: OnceCell<MySqlPool>,
}

impl PooledMySql {
    pub fn new(source: MySqlSource, acquire_timeout: Duration) -> Self {
        Self {
            source,
            acquire_timeout,
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&MySqlPool, CollectError> {
        self.pool
            .get_or_try_init(|| async {
                let options = connect_options(&self.source)?;
                debug!("opening mysql pool");
                Ok(MySqlPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(self.acquire_timeout)
                    .connect_lazy_with(options))
            })
            .await
    }

    /// Bounds connection acquisition and query together.
    async fn bounded<T>(
        &self,
        sql: &str,
        query: impl Future<Output = Result<T, CollectError>>,
    ) -> Result<T, CollectError> {
        tokio::time::timeout(self.acquire_timeout, query)
            .await
            .unwrap_or_else(|_| {
                Err(CollectError::SourceTimeout {
                    context: format!("mysql query {sql}"),
                    timeout: self.acquire_timeout,
                })
            })
    }

    async fn show(&self, statement: &str, name: &str) -> Result<String, CollectError> {
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CollectError::MySql {
                context: format!("invalid metric name: {name}"),
                source: "rejected".into(),
            });
        }
        let sql = format!("{statement} LIKE '{name}'");
        let row = self
            .bounded(&sql, async {
                sqlx::query(sql.as_str())
                    .fetch_optional(self.pool().await?)
                    .await
                    .map_err(|e| query_error(&sql, e))
            })
            .await?;
        let Some(row) = row else {
            return Err(CollectError::MySql {
                context: format!("{name} not reported by server"),
                source: "empty result".into(),
            });
        };
        row.try_get_unchecked::<String, _>(1)
            .map_err(|e| query_error(&sql, e))
    }
}

#[async_trait]
impl MetricSource for PooledMySql {
    async fn database_name(&self) -> Result<String, CollectError> {
        let sql = "SELECT DATABASE()";
        let row = self
            .bounded(sql, async {
                sqlx::query(sql)
                    .fetch_one(self.pool().await?)
                    .await
                    .map_err(|e| query_error(sql, e))
            })
            .await?;
        let name = row
            .try_get_unchecked::<Option<String>, _>(0)
            .map_err(|e| query_error(sql, e))?;
        Ok(name.unwrap_or_default())
    }

    async fn variable(&self, name: &str) -> Result<String, CollectError> {
        self.show("SHOW GLOBAL VARIABLES", name).await
    }

    async fn status(&self, name: &str) -> Result<String, CollectError> {
        self.show("SHOW GLOBAL STATUS", name).await
    }
}

fn query_error(sql: &str, err: sqlx::Error) -> CollectError {
    CollectError::MySql {
        context: format!("query failed: {sql}"),
        source: Box::new(err),
    }
}

fn connect_options(source: &MySqlSource) -> Result<MySqlConnectOptions, CollectError> {
    if let Some(url) = source.url.as_deref() {
        return url.parse::<MySqlConnectOptions>().map_err(|e| CollectError::MySql {
            context: "invalid connection url".to_string(),
            source: Box::new(e),
        });
    }

    let text = std::fs::read_to_string(&source.defaults_file).map_err(|e| CollectError::MySql {
        context: format!("failed to read {}", source.defaults_file.display()),
        source: Box::new(e),
    })?;
    let client = parse_option_file(&text, "client");
    options_from_client_section(&client, &source.defaults_file)
}

fn options_from_client_section(
    client: &HashMap<String, String>,
    origin: &Path,
) -> Result<MySqlConnectOptions, CollectError> {
    let mut options = MySqlConnectOptions::new();
    if let Some(host) = client.get("host") {
        options = options.host(host);
    }
    if let Some(port) = client.get("port") {
        let port = port.parse::<u16>().map_err(|e| CollectError::MySql {
            context: format!("invalid port in {}: {port}", origin.display()),
            source: Box::new(e),
        })?;
        options = options.port(port);
    }
    if let Some(socket) = client.get("socket") {
        options = options.socket(socket);
    }
    if let Some(user) = client.get("user") {
        options = options.username(user);
    }
    if let Some(password) = client.get("password") {
        options = options.password(password);
    }
    if let Some(database) = client.get("database").or_else(|| client.get("db")) {
        options = options.database(database);
    }
    Ok(options)
}

/// Reads one `[section]` of a MySQL option file (`~/.my.cnf`).
pub fn parse_option_file(text: &str, section: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut in_section = false;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = name.trim().eq_ignore_ascii_case(section);
            continue;
        }
        if !in_section {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (line, ""),
        };
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        out.insert(key.replace('-', "_").to_ascii_lowercase(), value.to_string());
    }
    out
}

pub struct MySqlDataCollector {
    source: MySqlSource,
    acquire_timeout: Duration,
}

impl MySqlDataCollector {
    pub fn new(source: MySqlSource, acquire_timeout: Duration) -> Self {
        Self {
            source,
            acquire_timeout,
        }
    }
}

#[async_trait]
impl DataCollector for MySqlDataCollector {
    fn provider(&self) -> Provider {
        Provider::MySql
    }

    async fn fetch_data(&self) -> Result<Snapshot, CollectError> {
        let source = PooledMySql::new(self.source.clone(), self.acquire_timeout);
        Ok(Snapshot::MySql(MySqlData::new(Arc::new(source))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_file_reads_client_section_only() {
        let text = r#"
# local defaults
[mysqld]
port = 3307

[client]
user = auditor
password = "s3cret"
host=db.internal
port = 3306
default-character-set = utf8mb4
"#;
        let client = parse_option_file(text, "client");
        assert_eq!(client.get("user").map(String::as_str), Some("auditor"));
        assert_eq!(client.get("password").map(String::as_str), Some("s3cret"));
        assert_eq!(client.get("host").map(String::as_str), Some("db.internal"));
        assert_eq!(client.get("port").map(String::as_str), Some("3306"));
        assert_eq!(
            client.get("default_character_set").map(String::as_str),
            Some("utf8mb4")
        );
    }

    #[test]
    fn invalid_port_is_a_collection_error() {
        let mut client = HashMap::new();
        client.insert("port".to_string(), "not-a-port".to_string());
        let err = options_from_client_section(&client, Path::new("my.cnf")).unwrap_err();
        assert!(err.to_string().contains("invalid port"), "{err}");
    }

    struct Fixed;

    #[async_trait]
    impl MetricSource for Fixed {
        async fn database_name(&self) -> Result<String, CollectError> {
            Ok("shop".to_string())
        }

        async fn variable(&self, _name: &str) -> Result<String, CollectError> {
            Ok("151".to_string())
        }

        async fn status(&self, _name: &str) -> Result<String, CollectError> {
            Ok("oops".to_string())
        }
    }

    #[tokio::test]
    async fn accessors_parse_counters() {
        let data = MySqlData::new(Arc::new(Fixed));
        assert_eq!(data.dbname().await.unwrap(), "shop");
        assert_eq!(data.max_connections().await.unwrap(), 151);
        assert!(data.connections_used().await.is_err());
    }
}
