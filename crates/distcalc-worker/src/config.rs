use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub broker_url: String,
    pub worker_id: Option<String>,
    /// Number of independent polling loops
    pub concurrency: usize,
    /// Pause between polls when no task is available
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub graceful_shutdown_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            broker_url: "http://127.0.0.1:8080".to_string(),
            worker_id: None,
            concurrency: 4,
            poll_interval_ms: 10,
            request_timeout_secs: 5,
            graceful_shutdown_timeout_secs: 60,
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// The configured id, or `<host>-<8 hex digits>` when none is set.
    pub fn resolve_worker_id(&self) -> String {
        self.worker_id.clone().unwrap_or_else(|| {
            let host = hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "worker".to_string());
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("{}-{}", host, &suffix[..8])
        })
    }
}
