use thiserror::Error;
use time::UtcOffset;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) server: ServerSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) cors: CorsSettings,
    pub(super) database: DatabaseSettings,
    pub(super) ocr: OcrSettings,
    pub(super) ai: AiSettings,
    pub(super) attendance: AttendanceSettings,
    pub(super) worker: WorkerSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(super) host: ServerHost,
    pub(super) port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
    /// Shared secret for the batch trigger endpoints. Empty disables the check.
    pub(crate) job_trigger_token: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct OcrSettings {
    pub(crate) tesseract_path: String,
    pub(crate) language: String,
    pub(crate) page_seg_mode: u8,
    pub(crate) engine_mode: u8,
    pub(crate) preprocess: bool,
    pub(crate) temp_dir: String,
    pub(crate) max_attempts: i32,
    pub(crate) stale_processing_minutes: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct AiSettings {
    pub(crate) groq_api_key: String,
    pub(crate) groq_base_url: String,
    pub(crate) model: String,
    pub(crate) temperature: f64,
    pub(crate) max_tokens: u32,
    pub(crate) request_timeout_seconds: u64,
    pub(crate) max_retries: u32,
    pub(crate) retry_base_delay_ms: u64,
    pub(crate) inter_call_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct AttendanceSettings {
    pub(crate) tolerance_minutes: i64,
    pub(crate) min_duration_percent: f64,
    pub(crate) max_minutes_before_slot: i64,
    pub(crate) max_minutes_after_slot: i64,
    pub(crate) default_radius_meters: f64,
    pub(crate) gps_required: bool,
    pub(crate) auto_approve_start_distance_meters: f64,
    pub(crate) max_photo_age_days: i64,
    /// Offset of the schools' wall clock. Slot times and camera timestamps
    /// without a recorded offset are read in this zone.
    pub(crate) utc_offset: UtcOffset,
}

#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub(crate) ocr_batch_size: i64,
    pub(crate) grading_batch_size: i64,
    pub(crate) ocr_poll_seconds: u64,
    pub(crate) grading_poll_seconds: u64,
    pub(crate) recovery_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(pub(super) String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(pub(super) u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

impl AiSettings {
    pub(crate) fn is_configured(&self) -> bool {
        !self.groq_api_key.is_empty() && !self.groq_base_url.is_empty()
    }
}

impl ServerHost {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }

        Ok(Self(value))
    }
}

impl ServerPort {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }

        Ok(Self(parsed))
    }
}
