use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::redis::RedisHandle;
use crate::core::time::{format_primitive, primitive_now_utc};

const BLOCK_SECONDS: u64 = 2;

/// Raw unit of work as delivered by the broker:
/// `{ "id"?, "name", "data" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JobEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) data: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradingJob {
    pub(crate) submission_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DemoJob {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) requested_at: Option<String>,
}

/// Closed dispatch over the known job names. Anything else (including a
/// `grading` job without a usable payload) lands in `Unknown` and is
/// acknowledged as a no-op so future job types never poison the queue.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobKind {
    Grading(GradingJob),
    Demo(DemoJob),
    Unknown(String),
}

impl JobEnvelope {
    pub(crate) fn parse(payload: &str) -> anyhow::Result<Self> {
        serde_json::from_str(payload).context("Malformed job payload")
    }

    pub(crate) fn kind(&self) -> JobKind {
        match self.name.as_str() {
            "grading" => serde_json::from_value::<GradingJob>(self.data.clone())
                .map(JobKind::Grading)
                .unwrap_or_else(|_| JobKind::Unknown(self.name.clone())),
            "demo" => JobKind::Demo(
                serde_json::from_value::<DemoJob>(self.data.clone()).unwrap_or_default(),
            ),
            other => JobKind::Unknown(other.to_string()),
        }
    }

    pub(crate) fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("-")
    }
}

/// At-least-once delivery source. Redelivery and backoff stay the broker's
/// policy; the worker only pulls and reports failures upward.
#[async_trait]
pub(crate) trait JobQueue: Send + Sync {
    async fn pull(&self) -> anyhow::Result<Option<JobEnvelope>>;
    async fn report_failure(&self, job: &JobEnvelope, error: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub(crate) struct RedisJobQueue {
    redis: RedisHandle,
    queue_name: String,
}

impl RedisJobQueue {
    pub(crate) fn new(redis: RedisHandle, queue_name: String) -> Self {
        Self { redis, queue_name }
    }

    fn failed_key(&self) -> String {
        format!("{}:failed", self.queue_name)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn pull(&self) -> anyhow::Result<Option<JobEnvelope>> {
        let payload = self
            .redis
            .blpop(&self.queue_name, BLOCK_SECONDS)
            .await
            .context("Failed to pop from grading queue")?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match JobEnvelope::parse(&payload) {
            Ok(mut envelope) => {
                if envelope.id.is_none() {
                    envelope.id = Some(Uuid::new_v4().to_string());
                }
                Ok(Some(envelope))
            }
            Err(err) => {
                tracing::warn!(error = %err, payload, "Dropping malformed job payload");
                Ok(None)
            }
        }
    }

    async fn report_failure(&self, job: &JobEnvelope, error: &str) -> anyhow::Result<()> {
        let record = json!({
            "id": job.id,
            "name": job.name,
            "data": job.data,
            "error": error,
            "failed_at": format_primitive(primitive_now_utc()),
        });

        self.redis
            .rpush(&self.failed_key(), &record.to_string())
            .await
            .context("Failed to record job failure")
    }
}
