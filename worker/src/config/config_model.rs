use crates::payments::sslcommerz_client::SslCommerzConfig;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub redis: Redis,
    pub public_base_url: String,
    pub sslcommerz: SslCommerzConfig,
    pub jobs: JobSettings,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Redis {
    pub url: String,
}

#[derive(Debug, Clone, Copy)]
pub struct JobSettings {
    pub max_attempts: i32,
    pub poll_interval_secs: u64,
    pub lease_secs: u64,
}
