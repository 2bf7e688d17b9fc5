use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_u16, parse_u64, parse_usize,
};
use super::types::{
    ConfigError, DatabaseSettings, OcrSettings, RedisSettings, RuntimeSettings, S3Settings,
    Settings, TelemetrySettings, WorkerSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("REDINK_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("REDINK_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "redink");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "redink_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let ocr_base_url = env_or_default("OCR_SERVICE_URL", "http://localhost:8000");
        let ocr_timeout_ms =
            parse_u64("OCR_TIMEOUT_MS", env_or_default("OCR_TIMEOUT_MS", "10000"))?;
        let ocr_preprocess =
            env_optional("OCR_PREPROCESS").map(|value| parse_bool(&value)).unwrap_or(false);

        let worker_concurrency =
            parse_usize("WORKER_CONCURRENCY", env_or_default("WORKER_CONCURRENCY", "5"))?;
        let queue_name = env_or_default("GRADING_QUEUE", "grading");
        let poll_interval_seconds = parse_u64(
            "WORKER_POLL_INTERVAL_SECONDS",
            env_or_default("WORKER_POLL_INTERVAL_SECONDS", "2"),
        )?;

        let s3_endpoint = env_or_default("MINIO_ENDPOINT", "http://localhost:9000");
        let s3_access_key = env_or_default("MINIO_ACCESS_KEY", "");
        let s3_secret_key = env_or_default("MINIO_SECRET_KEY", "");
        let s3_bucket = env_or_default("MINIO_BUCKET", "submissions");
        let s3_region = env_or_default("MINIO_REGION", "us-east-1");

        let log_level = env_or_default("REDINK_LOG_LEVEL", "info");
        let json = env_optional("REDINK_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ocr: OcrSettings {
                base_url: ocr_base_url.trim_end_matches('/').to_string(),
                timeout_ms: ocr_timeout_ms,
                preprocess: ocr_preprocess,
            },
            worker: WorkerSettings {
                concurrency: worker_concurrency,
                queue_name,
                poll_interval_seconds,
            },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ocr(&self) -> &OcrSettings {
        &self.ocr
    }

    pub(crate) fn worker(&self) -> &WorkerSettings {
        &self.worker
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        if self.ocr.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "OCR_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        if self.worker.queue_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_QUEUE",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ocr.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("OCR_SERVICE_URL"));
        }
        if self.s3.access_key.is_empty() || self.s3.secret_key.is_empty() {
            return Err(ConfigError::MissingSecret("MINIO_ACCESS_KEY/MINIO_SECRET_KEY"));
        }

        Ok(())
    }
}
