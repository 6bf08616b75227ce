use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Root every target directory resolves under
    pub doc_root: PathBuf,
    /// Web context the sync routes are mounted under
    pub agent_name: String,
    pub log_level: String,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            doc_root: PathBuf::from(
                std::env::var("SYNC_DOC_ROOT").unwrap_or_else(|_| "/var/www".into()),
            ),
            agent_name: std::env::var("SYNC_AGENT_NAME").unwrap_or_else(|_| "server".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            max_body_bytes: std::env::var("SYNC_MAX_BODY_MB")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1024)
                * 1024
                * 1024,
        }
    }

    /// Agent context without surrounding slashes.
    pub fn context(&self) -> &str {
        self.agent_name.trim_matches('/')
    }
}
