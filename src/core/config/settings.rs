use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_f64,
    parse_i32, parse_i64, parse_u16, parse_u32, parse_u64, parse_u8, parse_utc_offset,
};
use super::types::{
    AiSettings, ApiSettings, AttendanceSettings, ConfigError, CorsSettings, DatabaseSettings,
    OcrSettings, RuntimeSettings, ServerHost, ServerPort, ServerSettings, Settings,
    TelemetrySettings, WorkerSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("MARKWISE_HOST", "0.0.0.0");
        let port = env_or_default("MARKWISE_PORT", "8000");

        let environment = parse_environment(
            env_optional("MARKWISE_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("MARKWISE_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Markwise API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");
        let job_trigger_token = env_or_default("JOB_TRIGGER_TOKEN", "");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "markwise");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "markwise_db");
        let database_url = env_optional("DATABASE_URL");

        let tesseract_path = env_or_default("TESSERACT_PATH", "tesseract");
        let ocr_language = env_or_default("OCR_LANGUAGE", "eng");
        let page_seg_mode = parse_u8("OCR_PSM", env_or_default("OCR_PSM", "6"))?;
        let engine_mode = parse_u8("OCR_OEM", env_or_default("OCR_OEM", "3"))?;
        let ocr_preprocess =
            env_optional("OCR_PREPROCESS").map(|value| parse_bool(&value)).unwrap_or(true);
        let ocr_temp_dir = env_optional("OCR_TEMP_DIR")
            .unwrap_or_else(|| std::env::temp_dir().to_string_lossy().into_owned());
        let ocr_max_attempts =
            parse_i32("OCR_MAX_ATTEMPTS", env_or_default("OCR_MAX_ATTEMPTS", "3"))?;
        let ocr_stale_processing_minutes = parse_i64(
            "OCR_STALE_PROCESSING_MINUTES",
            env_or_default("OCR_STALE_PROCESSING_MINUTES", "30"),
        )?;

        let groq_api_key = env_or_default("GROQ_API_KEY", "");
        let groq_base_url = env_or_default("GROQ_BASE_URL", "https://api.groq.com/openai/v1");
        let ai_model = env_or_default("AI_MODEL", "llama-3.3-70b-versatile");
        let ai_temperature = parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.3"))?;
        let ai_max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "1024"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "30"))?;
        let ai_max_retries = parse_u32("AI_MAX_RETRIES", env_or_default("AI_MAX_RETRIES", "3"))?;
        let ai_retry_base_delay_ms = parse_u64(
            "AI_RETRY_BASE_DELAY_MS",
            env_or_default("AI_RETRY_BASE_DELAY_MS", "1000"),
        )?;
        let ai_inter_call_delay_ms = parse_u64(
            "AI_INTER_CALL_DELAY_MS",
            env_or_default("AI_INTER_CALL_DELAY_MS", "500"),
        )?;

        let tolerance_minutes = parse_i64(
            "DURATION_TOLERANCE_MINUTES",
            env_or_default("DURATION_TOLERANCE_MINUTES", "10"),
        )?;
        let min_duration_percent = parse_f64(
            "MIN_DURATION_PERCENT",
            env_or_default("MIN_DURATION_PERCENT", "80"),
        )?;
        let max_minutes_before_slot = parse_i64(
            "MAX_MINUTES_BEFORE_SLOT",
            env_or_default("MAX_MINUTES_BEFORE_SLOT", "15"),
        )?;
        let max_minutes_after_slot = parse_i64(
            "MAX_MINUTES_AFTER_SLOT",
            env_or_default("MAX_MINUTES_AFTER_SLOT", "30"),
        )?;
        let default_radius_meters = parse_f64(
            "DEFAULT_SCHOOL_RADIUS_METERS",
            env_or_default("DEFAULT_SCHOOL_RADIUS_METERS", "500"),
        )?;
        let gps_required =
            env_optional("GPS_REQUIRED").map(|value| parse_bool(&value)).unwrap_or(true);
        let auto_approve_start_distance_meters = parse_f64(
            "AUTO_APPROVE_START_DISTANCE_METERS",
            env_or_default("AUTO_APPROVE_START_DISTANCE_METERS", "100"),
        )?;
        let max_photo_age_days =
            parse_i64("MAX_PHOTO_AGE_DAYS", env_or_default("MAX_PHOTO_AGE_DAYS", "7"))?;
        let utc_offset = parse_utc_offset(
            "ATTENDANCE_UTC_OFFSET",
            env_or_default("ATTENDANCE_UTC_OFFSET", "+00:00"),
        )?;

        let ocr_batch_size =
            parse_i64("OCR_BATCH_SIZE", env_or_default("OCR_BATCH_SIZE", "10"))?;
        let grading_batch_size =
            parse_i64("GRADING_BATCH_SIZE", env_or_default("GRADING_BATCH_SIZE", "5"))?;
        let ocr_poll_seconds =
            parse_u64("OCR_POLL_SECONDS", env_or_default("OCR_POLL_SECONDS", "10"))?;
        let grading_poll_seconds =
            parse_u64("GRADING_POLL_SECONDS", env_or_default("GRADING_POLL_SECONDS", "30"))?;
        let recovery_interval_seconds = parse_u64(
            "RECOVERY_INTERVAL_SECONDS",
            env_or_default("RECOVERY_INTERVAL_SECONDS", "900"),
        )?;

        let log_level = env_or_default("MARKWISE_LOG_LEVEL", "info");
        let json = env_optional("MARKWISE_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str, job_trigger_token },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            ocr: OcrSettings {
                tesseract_path,
                language: ocr_language,
                page_seg_mode,
                engine_mode,
                preprocess: ocr_preprocess,
                temp_dir: ocr_temp_dir,
                max_attempts: ocr_max_attempts,
                stale_processing_minutes: ocr_stale_processing_minutes,
            },
            ai: AiSettings {
                groq_api_key,
                groq_base_url,
                model: ai_model,
                temperature: ai_temperature,
                max_tokens: ai_max_tokens,
                request_timeout_seconds: ai_request_timeout,
                max_retries: ai_max_retries,
                retry_base_delay_ms: ai_retry_base_delay_ms,
                inter_call_delay_ms: ai_inter_call_delay_ms,
            },
            attendance: AttendanceSettings {
                tolerance_minutes,
                min_duration_percent,
                max_minutes_before_slot,
                max_minutes_after_slot,
                default_radius_meters,
                gps_required,
                auto_approve_start_distance_meters,
                max_photo_age_days,
                utc_offset,
            },
            worker: WorkerSettings {
                ocr_batch_size,
                grading_batch_size,
                ocr_poll_seconds,
                grading_poll_seconds,
                recovery_interval_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn ocr(&self) -> &OcrSettings {
        &self.ocr
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn attendance(&self) -> &AttendanceSettings {
        &self.attendance
    }

    pub(crate) fn worker(&self) -> &WorkerSettings {
        &self.worker
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ocr.page_seg_mode > 13 {
            return Err(ConfigError::InvalidValue {
                field: "OCR_PSM",
                value: self.ocr.page_seg_mode.to_string(),
            });
        }

        if self.ocr.engine_mode > 3 {
            return Err(ConfigError::InvalidValue {
                field: "OCR_OEM",
                value: self.ocr.engine_mode.to_string(),
            });
        }

        if self.ocr.max_attempts <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "OCR_MAX_ATTEMPTS",
                value: self.ocr.max_attempts.to_string(),
            });
        }

        if self.ai.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_MAX_RETRIES",
                value: "0".to_string(),
            });
        }

        if !(0.0..=100.0).contains(&self.attendance.min_duration_percent) {
            return Err(ConfigError::InvalidValue {
                field: "MIN_DURATION_PERCENT",
                value: self.attendance.min_duration_percent.to_string(),
            });
        }

        if self.attendance.default_radius_meters <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "DEFAULT_SCHOOL_RADIUS_METERS",
                value: self.attendance.default_radius_meters.to_string(),
            });
        }

        if self.attendance.auto_approve_start_distance_meters > self.attendance.default_radius_meters
        {
            return Err(ConfigError::InvalidValue {
                field: "AUTO_APPROVE_START_DISTANCE_METERS",
                value: self.attendance.auto_approve_start_distance_meters.to_string(),
            });
        }

        if self.worker.ocr_batch_size <= 0 || self.worker.grading_batch_size <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "OCR_BATCH_SIZE/GRADING_BATCH_SIZE",
                value: format!("{}/{}", self.worker.ocr_batch_size, self.worker.grading_batch_size),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.groq_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("GROQ_API_KEY"));
        }
        if self.api.job_trigger_token.is_empty() {
            return Err(ConfigError::MissingSecret("JOB_TRIGGER_TOKEN"));
        }

        Ok(())
    }
}
