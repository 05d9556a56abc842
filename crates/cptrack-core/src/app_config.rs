use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub platform_request_timeout_secs: u64,
    pub platform_user_agent: String,
    pub codeforces_base_url: String,
    pub leetcode_base_url: String,
    pub codeforces_max_retries: u32,
    pub codeforces_retry_backoff_base_ms: u64,
    pub snapshot_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "platform_request_timeout_secs",
                &self.platform_request_timeout_secs,
            )
            .field("platform_user_agent", &self.platform_user_agent)
            .field("codeforces_base_url", &self.codeforces_base_url)
            .field("leetcode_base_url", &self.leetcode_base_url)
            .field("codeforces_max_retries", &self.codeforces_max_retries)
            .field(
                "codeforces_retry_backoff_base_ms",
                &self.codeforces_retry_backoff_base_ms,
            )
            .field("snapshot_cron", &self.snapshot_cron)
            .finish()
    }
}
