use confique::Config;

/// Configuration for the ClickHouse backend queries are executed against
#[derive(Debug, Config, Clone)]
pub struct ClickhouseConfig {
    /// Host used when a request carries no `ip`, and for readiness checks (default: 127.0.0.1)
    #[config(env = "QUERIER_CLICKHOUSE_HOST", default = "127.0.0.1")]
    pub host: String,

    /// ClickHouse HTTP interface port (default: 8123)
    #[config(env = "QUERIER_CLICKHOUSE_PORT", default = 8123)]
    pub port: u16,

    /// User sent as `X-ClickHouse-User`, skipped when empty (default: default)
    #[config(env = "QUERIER_CLICKHOUSE_USER", default = "default")]
    pub user: String,

    /// Password sent as `X-ClickHouse-Key` (default: empty)
    #[config(env = "QUERIER_CLICKHOUSE_PASSWORD", default = "")]
    pub password: String,

    /// Database used when a request carries no `db` (default: default)
    #[config(env = "QUERIER_CLICKHOUSE_DATABASE", default = "default")]
    pub database: String,

    /// The timeout for ClickHouse queries in seconds (default: 60)
    #[config(env = "QUERIER_CLICKHOUSE_QUERY_TIMEOUT", default = 60)]
    pub query_timeout: u64,

    /// Hosts besides `host` that a request may name in `ip`
    /// Comma-separated list (default: empty)
    #[config(env = "QUERIER_CLICKHOUSE_ALLOWED_HOSTS", default = "")]
    pub allowed_hosts: String,
}

impl ClickhouseConfig {
    /// Get allowed hosts as a vector
    pub fn get_allowed_hosts(&self) -> Vec<String> {
        self.allowed_hosts
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
