use crate::config::QuerierConfig;
use crate::executor::{ClickhouseExecutor, ExecuteError, QueryExecutor};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QuerierConfig>,
    pub executor: Arc<dyn QueryExecutor>,
}

impl AppState {
    /// Creates the application state backed by the configured ClickHouse server
    pub fn new(config: &QuerierConfig) -> Result<Self, ExecuteError> {
        let executor = ClickhouseExecutor::new(&config.clickhouse, config.debug)?;
        Ok(Self::with_executor(config, Arc::new(executor)))
    }

    /// Creates the application state around an existing executor
    pub fn with_executor(config: &QuerierConfig, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            config: Arc::new(config.clone()),
            executor,
        }
    }

    /// Check if the query backend is healthy
    pub async fn health_check(&self) -> bool {
        self.executor.health().await
    }
}
