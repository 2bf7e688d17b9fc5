pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::repositories::submissions::PgSubmissionStore;
use crate::services::queue::RedisJobQueue;
use crate::services::scorer::BaselineScorer;
use crate::services::storage::S3BlobStore;

pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    redis.connect().await?;
    tracing::info!("Redis connected successfully");

    let storage = S3BlobStore::from_settings(&settings)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Blob storage is not configured"))?;

    let queue = RedisJobQueue::new(redis.clone(), settings.worker().queue_name.clone());

    let state = AppState::new(
        settings,
        Arc::new(PgSubmissionStore::new(db_pool)),
        Arc::new(storage),
        Arc::new(BaselineScorer::default()),
        Arc::new(queue),
    );

    let result = tasks::scheduler::run(state).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result
}
