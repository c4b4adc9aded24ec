use async_trait::async_trait;
use distcalc_core::{Task, TaskReport};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Where a worker gets tasks from and sends results to.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Claim the next task, `None` if nothing is ready.
    async fn fetch_task(&self) -> anyhow::Result<Option<Task>>;

    /// Deliver a report. Returns `false` when the broker no longer knows the
    /// task (the claim lapsed or its expression was abandoned).
    async fn send_report(&self, report: &TaskReport) -> anyhow::Result<bool>;
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    task: Task,
}

/// HTTP client for the broker's internal task endpoints
#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    task_url: String,
}

impl BrokerClient {
    pub fn new(broker_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(BrokerClient {
            http,
            task_url: format!("{}/internal/task", broker_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TaskSource for BrokerClient {
    async fn fetch_task(&self) -> anyhow::Result<Option<Task>> {
        let response = self.http.get(&self.task_url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: TaskEnvelope = response.error_for_status()?.json().await?;
        debug!("Claimed task {}", envelope.task.id);
        Ok(Some(envelope.task))
    }

    async fn send_report(&self, report: &TaskReport) -> anyhow::Result<bool> {
        let response = self.http.post(&self.task_url).json(report).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        response.error_for_status()?;
        Ok(true)
    }
}
