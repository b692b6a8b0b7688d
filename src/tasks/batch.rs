use std::time::Instant;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct JobLog {
    pub(crate) level: LogLevel,
    pub(crate) message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub(crate) enum ItemOutcome {
    Succeeded { detail: String },
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ItemResult {
    pub(crate) id: String,
    #[serde(flatten)]
    pub(crate) outcome: ItemOutcome,
}

/// Result of one batch job run. `success` is false only when the job aborted
/// before touching any item; item failures are reported in `items`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchSummary {
    pub(crate) job: &'static str,
    pub(crate) success: bool,
    pub(crate) error: Option<String>,
    pub(crate) processed: usize,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
    pub(crate) skipped: usize,
    pub(crate) items: Vec<ItemResult>,
    pub(crate) logs: Vec<JobLog>,
    pub(crate) elapsed_seconds: f64,
}

impl BatchSummary {
    pub(crate) fn item(&self, id: &str) -> Option<&ItemOutcome> {
        self.items.iter().find(|item| item.id == id).map(|item| &item.outcome)
    }
}

/// Collects per-item outcomes and human-readable log lines for one job run.
/// Every log line is mirrored to `tracing`.
pub(crate) struct BatchRecorder {
    job: &'static str,
    started: Instant,
    items: Vec<ItemResult>,
    logs: Vec<JobLog>,
}

impl BatchRecorder {
    pub(crate) fn new(job: &'static str) -> Self {
        Self { job, started: Instant::now(), items: Vec::new(), logs: Vec::new() }
    }

    pub(crate) fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub(crate) fn success(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Success, message.into());
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message.into());
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into());
    }

    pub(crate) fn record(&mut self, id: impl Into<String>, outcome: ItemOutcome) {
        self.items.push(ItemResult { id: id.into(), outcome });
    }

    pub(crate) fn finish(self) -> BatchSummary {
        self.summarize(None)
    }

    /// Ends the run without processing anything, e.g. on missing configuration.
    pub(crate) fn abort(mut self, error: impl Into<String>) -> BatchSummary {
        let error = error.into();
        self.error(error.clone());
        self.summarize(Some(error))
    }

    fn log(&mut self, level: LogLevel, message: String) {
        let job = self.job;
        match level {
            LogLevel::Info | LogLevel::Success => tracing::info!(job, "{message}"),
            LogLevel::Warning => tracing::warn!(job, "{message}"),
            LogLevel::Error => tracing::error!(job, "{message}"),
        }
        self.logs.push(JobLog { level, message });
    }

    fn summarize(self, error: Option<String>) -> BatchSummary {
        let count = |predicate: fn(&ItemOutcome) -> bool| {
            self.items.iter().filter(|item| predicate(&item.outcome)).count()
        };
        let succeeded = count(|outcome| matches!(outcome, ItemOutcome::Succeeded { .. }));
        let failed = count(|outcome| matches!(outcome, ItemOutcome::Failed { .. }));
        let skipped = count(|outcome| matches!(outcome, ItemOutcome::Skipped { .. }));

        BatchSummary {
            job: self.job,
            success: error.is_none(),
            error,
            processed: succeeded + failed,
            succeeded,
            failed,
            skipped,
            items: self.items,
            logs: self.logs,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
        }
    }
}
