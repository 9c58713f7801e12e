use std::path::PathBuf;

/// Remote persistence endpoint settings.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    /// Upper bound on any single remote request, in seconds.
    pub timeout_secs: u64,
}

/// Engine configuration read from the environment.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Remote store settings; `None` keeps persistence on-device only.
    pub remote: Option<RemoteConfig>,
    /// Directory holding the on-device fallback store.
    pub data_dir: PathBuf,
    pub log_level: String,
}

impl ProgressConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let remote = std::env::var("PROGRESS_API_URL").ok().map(|base_url| {
            let auth_token = std::env::var("PROGRESS_API_TOKEN").ok();
            let timeout_secs = std::env::var("PROGRESS_REMOTE_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(10);
            RemoteConfig {
                base_url,
                auth_token,
                timeout_secs,
            }
        });

        let data_dir = std::env::var("PROGRESS_DATA_DIR")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("danci").join("progress")))
            .unwrap_or_else(|| PathBuf::from(".danci-progress"));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            remote,
            data_dir,
            log_level,
        }
    }
}
