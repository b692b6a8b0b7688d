use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("ocr_images_total", "Answer images processed by status");
    metrics::describe_histogram!("ocr_image_duration_seconds", "Tesseract wall time per image");
    metrics::describe_counter!("ai_requests_total", "LLM calls by outcome, including retries");
    metrics::describe_counter!("grading_questions_total", "Per-question grading outcomes");
    metrics::describe_counter!("grading_submissions_total", "Submission grading outcomes");
    metrics::describe_counter!("session_verdicts_total", "Teaching session verdicts by tier");
    metrics::describe_counter!("http_requests_total", "HTTP responses by status");
}
