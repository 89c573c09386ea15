use crate::config::clickhouse::ClickhouseConfig;
use crate::executor::{
    arg, ColumnSchema, ExecuteError, QueryDebug, QueryExecutor, QueryResult, ARG_DB, ARG_IP,
    ARG_SQL,
};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};
use url::Url;

const CLICKHOUSE_USER_HEADER: &str = "X-ClickHouse-User";
const CLICKHOUSE_KEY_HEADER: &str = "X-ClickHouse-Key";

/// Executes queries through the ClickHouse HTTP interface.
///
/// Only the configured host and `allowed_hosts` are ever contacted, so the
/// credentials never leave the trusted set.
pub struct ClickhouseExecutor {
    config: ClickhouseConfig,
    client: Client,
    credentials: HeaderMap,
    allowed_hosts: Vec<String>,
    debug: bool,
}

impl ClickhouseExecutor {
    pub fn new(config: &ClickhouseConfig, debug: bool) -> Result<Self, ExecuteError> {
        let mut credentials = HeaderMap::new();
        if !config.user.is_empty() {
            credentials.insert(CLICKHOUSE_USER_HEADER, HeaderValue::from_str(&config.user)?);
            let mut key = HeaderValue::from_str(&config.password)?;
            key.set_sensitive(true);
            credentials.insert(CLICKHOUSE_KEY_HEADER, key);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.query_timeout))
            .connect_timeout(Duration::from_secs(2))
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
            credentials,
            allowed_hosts: config.get_allowed_hosts(),
            debug,
        })
    }

    /// Whether queries may be sent to `host`
    fn is_allowed_host(&self, host: &str) -> bool {
        let host = host.trim();
        host.eq_ignore_ascii_case(self.config.host.trim())
            || self
                .allowed_hosts
                .iter()
                .any(|allowed| host.eq_ignore_ascii_case(allowed))
    }

    /// Builds `http://{host}:{port}{path}` for the given host, bracketing IPv6 literals
    fn endpoint_url(&self, host: &str, path: &str) -> Result<Url, ExecuteError> {
        let host = host.trim();
        // Anything that would move the request away from host:port is rejected
        if host.is_empty()
            || host
                .chars()
                .any(|c| matches!(c, '/' | '@' | '?' | '#' | '\\') || c.is_whitespace())
        {
            return Err(ExecuteError::InvalidHost(host.to_string()));
        }

        let authority = if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", host)
        } else {
            host.to_string()
        };

        Url::parse(&format!("http://{}:{}{}", authority, self.config.port, path))
            .map_err(|_| ExecuteError::InvalidHost(host.to_string()))
    }
}

#[async_trait]
impl QueryExecutor for ClickhouseExecutor {
    async fn execute(&self, args: &HashMap<String, String>) -> Result<QueryResult, ExecuteError> {
        let sql = arg(args, ARG_SQL).trim();
        if sql.is_empty() {
            return Err(ExecuteError::EmptySql);
        }
        let host = non_empty(arg(args, ARG_IP)).unwrap_or(self.config.host.as_str());
        let database = non_empty(arg(args, ARG_DB)).unwrap_or(self.config.database.as_str());

        let mut url = self.endpoint_url(host, "/")?;
        if !self.is_allowed_host(host) {
            return Err(ExecuteError::HostNotAllowed(host.trim().to_string()));
        }
        url.query_pairs_mut()
            .append_pair("database", database)
            .append_pair("default_format", "JSONCompact")
            .append_pair("output_format_json_quote_64bit_integers", "0");
        debug!("Forwarding query to ClickHouse at: {}", url);

        let started = Instant::now();
        let response = self
            .client
            .post(url)
            .headers(self.credentials.clone())
            .body(sql.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExecuteError::Backend {
                status,
                message: message.trim().to_string(),
            });
        }

        let body = response.bytes().await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // Statements without a result set (DDL, INSERT) answer with an empty body
        let compact = if body.iter().all(u8::is_ascii_whitespace) {
            CompactResponse::default()
        } else {
            serde_json::from_slice::<CompactResponse>(&body)?
        };

        let statistics = compact.statistics.clone();
        let mut result = QueryResult::from(compact);
        if self.debug {
            result.debug = Some(QueryDebug {
                ip: host.trim().to_string(),
                database: database.to_string(),
                sql: sql.to_string(),
                elapsed_ms,
                statistics,
            });
        }
        Ok(result)
    }

    async fn health(&self) -> bool {
        let url = match self.endpoint_url(&self.config.host, "/ping") {
            Ok(url) => url,
            Err(e) => {
                warn!("ClickHouse health check skipped: {}", e);
                return false;
            }
        };

        match self
            .client
            .get(url)
            .headers(self.credentials.clone())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("ClickHouse ping returned status: {}", response.status());
                false
            }
            Err(e) => {
                warn!("ClickHouse ping failed: {}", e);
                false
            }
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Body of a ClickHouse `JSONCompact` response
#[derive(Debug, Deserialize, Default)]
struct CompactResponse {
    #[serde(default)]
    meta: Vec<ColumnSchema>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
    #[serde(default)]
    statistics: Option<Value>,
}

impl From<CompactResponse> for QueryResult {
    fn from(response: CompactResponse) -> Self {
        QueryResult {
            columns: response.meta.iter().map(|c| c.name.clone()).collect(),
            schemas: response.meta,
            values: response.data,
            debug: None,
        }
    }
}
