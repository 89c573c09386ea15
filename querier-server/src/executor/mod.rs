use async_trait::async_trait;
use http::header::InvalidHeaderValue;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use utoipa::ToSchema;

pub mod clickhouse;

pub use clickhouse::ClickhouseExecutor;

/// Argument key holding the target database host
pub const ARG_IP: &str = "ip";
/// Argument key holding the database name
pub const ARG_DB: &str = "db";
/// Argument key holding the SQL text
pub const ARG_SQL: &str = "sql";

/// Runs a query described by a string-keyed argument map.
///
/// Callers always pass the keys [`ARG_IP`], [`ARG_DB`] and [`ARG_SQL`]; any of them
/// may be empty. What an empty value means is up to the implementation.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute the query and return its result set
    async fn execute(&self, args: &HashMap<String, String>) -> Result<QueryResult, ExecuteError>;

    /// Whether the backend is reachable
    async fn health(&self) -> bool {
        true
    }
}

/// Column descriptor of a query result
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct ColumnSchema {
    /// Column name
    pub name: String,
    /// Backend type of the column
    pub r#type: String,
}

/// Result set returned by a successful query
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Default)]
pub struct QueryResult {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Column descriptors in result order
    pub schemas: Vec<ColumnSchema>,
    /// Rows, each holding one value per column
    pub values: Vec<Vec<Value>>,
    /// Execution details, only present in debug mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<QueryDebug>,
}

/// Execution details attached to results when debug mode is enabled
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct QueryDebug {
    /// Host the query was sent to
    pub ip: String,
    /// Database the query ran in
    pub database: String,
    /// SQL text as sent to the backend
    pub sql: String,
    /// Wall-clock time spent waiting for the backend
    pub elapsed_ms: u64,
    /// Statistics reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
}

/// Errors that can occur while executing a query
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("sql is empty")]
    EmptySql,
    #[error("invalid database host '{0}'")]
    InvalidHost(String),
    #[error("database host '{0}' is not allowed")]
    HostNotAllowed(String),
    #[error("Failed to build request to ClickHouse: {0}")]
    BuildError(#[from] InvalidHeaderValue),
    #[error("Failed to send query to ClickHouse: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("ClickHouse query failed with status {status}: {message}")]
    Backend { status: StatusCode, message: String },
    #[error("Failed to parse ClickHouse response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Returns the value stored under `key`, or an empty string when it is missing
pub(crate) fn arg<'a>(args: &'a HashMap<String, String>, key: &str) -> &'a str {
    args.get(key).map(String::as_str).unwrap_or("")
}
