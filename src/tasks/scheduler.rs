use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::tasks::batch::BatchSummary;
use crate::tasks::{grading, maintenance, ocr_queue};

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = state.settings().worker().clone();

    let handles = vec![
        tokio::spawn(ocr_loop(
            state.clone(),
            Duration::from_secs(worker.ocr_poll_seconds),
            worker.ocr_batch_size,
            shutdown_rx.clone(),
        )),
        tokio::spawn(grading_loop(
            state.clone(),
            Duration::from_secs(worker.grading_poll_seconds),
            worker.grading_batch_size,
            shutdown_rx.clone(),
        )),
        tokio::spawn(recovery_loop(
            state.clone(),
            Duration::from_secs(worker.recovery_interval_seconds),
            shutdown_rx,
        )),
    ];

    tracing::info!(
        ocr_poll_seconds = worker.ocr_poll_seconds,
        grading_poll_seconds = worker.grading_poll_seconds,
        recovery_interval_seconds = worker.recovery_interval_seconds,
        "Worker loops started"
    );

    crate::core::shutdown::shutdown_signal("worker").await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn ocr_loop(
    state: AppState,
    period: Duration,
    batch_size: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let summary = ocr_queue::process_pending_images(&state, batch_size).await;
                log_summary(&summary);
            }
        }
    }
}

async fn grading_loop(
    state: AppState,
    period: Duration,
    batch_size: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let summary = grading::process_pending_submissions(&state, batch_size).await;
                log_summary(&summary);
            }
        }
    }
}

async fn recovery_loop(state: AppState, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let summary = maintenance::recover_stale_work(&state).await;
                log_summary(&summary);
            }
        }
    }
}

fn log_summary(summary: &BatchSummary) {
    if !summary.success {
        tracing::error!(
            job = summary.job,
            error = summary.error.as_deref().unwrap_or_default(),
            "Batch job aborted"
        );
        return;
    }
    if summary.items.is_empty() {
        return;
    }

    tracing::info!(
        job = summary.job,
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        elapsed_seconds = summary.elapsed_seconds,
        "Batch job finished"
    );
}
