use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub frontend_dir_path: Option<String>,
    /// Successes a batch aims for when the request does not say.
    pub default_batch_target: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            frontend_dir_path: None,
            default_batch_target: 10,
        }
    }
}
