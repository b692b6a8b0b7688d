use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::repositories::{AttendanceStore, GradingStore, PgStore};
use crate::services::ai_grading::{GroqClient, QuestionGrader};
use crate::services::text_extraction::{TesseractExtractor, TextExtractor};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    grading_store: Arc<dyn GradingStore>,
    attendance_store: Arc<dyn AttendanceStore>,
    extractor: Arc<dyn TextExtractor>,
    grader: Option<Arc<dyn QuestionGrader>>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        grading_store: Arc<dyn GradingStore>,
        attendance_store: Arc<dyn AttendanceStore>,
        extractor: Arc<dyn TextExtractor>,
        grader: Option<Arc<dyn QuestionGrader>>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                settings,
                grading_store,
                attendance_store,
                extractor,
                grader,
            }),
        }
    }

    /// Production wiring: Postgres for storage, the tesseract binary for OCR
    /// and Groq for grading. A missing API key leaves grading disabled; the
    /// grading jobs report that before touching any submission.
    pub(crate) fn from_pool(settings: Settings, pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        let extractor = Arc::new(TesseractExtractor::from_settings(settings.ocr()));
        let grader: Option<Arc<dyn QuestionGrader>> = match GroqClient::from_settings(settings.ai())
        {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                tracing::warn!(error = %err, "AI grading disabled");
                None
            }
        };

        Self::new(settings, store.clone(), store, extractor, grader)
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn grading_store(&self) -> &dyn GradingStore {
        self.inner.grading_store.as_ref()
    }

    pub(crate) fn attendance_store(&self) -> &dyn AttendanceStore {
        self.inner.attendance_store.as_ref()
    }

    pub(crate) fn extractor(&self) -> &dyn TextExtractor {
        self.inner.extractor.as_ref()
    }

    pub(crate) fn grader(&self) -> Option<&dyn QuestionGrader> {
        self.inner.grader.as_deref()
    }
}
