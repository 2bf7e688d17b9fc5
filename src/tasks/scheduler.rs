use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use crate::core::state::AppState;
use crate::services::ocr::OcrClient;
use crate::tasks::processor;

/// Runs the worker pool until a shutdown signal arrives. Each worker owns one
/// job at a time; there is no cross-job coordination beyond the shared queue.
pub(crate) async fn run(state: AppState) -> Result<()> {
    let ocr = OcrClient::from_settings(state.settings())?;
    let concurrency = state.settings().worker().concurrency;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(concurrency);
    for worker_id in 0..concurrency {
        handles.push(tokio::spawn(grading_worker(
            worker_id,
            state.clone(),
            ocr.clone(),
            shutdown_rx.clone(),
        )));
    }

    tracing::info!(
        concurrency,
        queue = %state.settings().worker().queue_name,
        environment = %state.settings().runtime().environment.as_str(),
        "Grading workers started"
    );

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to workers");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Worker join failed");
        }
    }

    Ok(())
}

async fn grading_worker(
    worker_id: usize,
    state: AppState,
    ocr: OcrClient,
    mut shutdown: watch::Receiver<bool>,
) {
    let poll_interval = Duration::from_secs(state.settings().worker().poll_interval_seconds);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match state.queue().pull().await {
            Ok(Some(job)) => {
                if let Err(err) = processor::process(&state, &ocr, &job).await {
                    if let Err(report_err) =
                        state.queue().report_failure(&job, &err.to_string()).await
                    {
                        tracing::error!(
                            worker_id,
                            job_id = job.display_id(),
                            error = %report_err,
                            "Failed to report job failure"
                        );
                    }
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(worker_id, error = %err, "Failed to pull job"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(poll_interval) => {}
        }
    }
}
