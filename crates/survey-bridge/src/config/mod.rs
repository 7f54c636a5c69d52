use chrono::{DateTime, Utc};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub survey: SurveyApiConfig,
    pub skills: SkillsApiConfig,
    pub email: EmailConfig,
    pub store: StoreConfig,
    pub http: HttpConfig,
    pub test_mode: Option<TestModeConfig>,
    pub drift_max_refreshes: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let start_created_at = match env::var("SM_START_CREATED_AT") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                DateTime::parse_from_rfc3339(raw.trim())
                    .map_err(|_| ConfigError::InvalidTimestamp {
                        key: "SM_START_CREATED_AT",
                    })?
                    .with_timezone(&Utc),
            ),
            _ => None,
        };

        let survey = SurveyApiConfig {
            base_url: var_or("SM_BASE_URL", "https://api.surveymonkey.com/v3/surveys/0"),
            access_token: var_or("SM_ACCESS_TOKEN", ""),
            details_cache: PathBuf::from(var_or(
                "SM_DETAILS_CACHE",
                "data/cache/sm-survey-details.json",
            )),
            listing: ListingConfig {
                per_page: parse_number::<u32>("SM_PER_PAGE", 100)?.clamp(1, 100),
                status: var_or("SM_STATUS", "completed"),
                minimum_minutes: parse_number("SM_MIN_MINUTES", 5)?,
                sort_by: var_or("SM_SORT_BY", "date_modified"),
                sort_order: var_or("SM_SORT_ORDER", "DESC"),
                start_created_at,
            },
        };

        let schema_url = var_or("COS_SCHEMA_URL", "");
        let score_url = match var_or("COS_SCORE_URL", "") {
            url if url.trim().is_empty() => schema_url.clone(),
            url => url,
        };
        let skills = SkillsApiConfig {
            schema_url,
            score_url,
            api_token: var_or("COS_API_TOKEN", ""),
            schema_cache: PathBuf::from(var_or(
                "COS_SCHEMA_CACHE",
                "data/cache/cos-skills-schema.json",
            )),
        };

        let email = EmailConfig {
            smtp_host: var_or("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: var_or("SMTP_PORT", "587")
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber { key: "SMTP_PORT" })?,
            sender: var_or("SMTP_SENDER", ""),
            password: var_or("SMTP_PASSWORD", ""),
            max_recommendations: parse_number("EMAIL_MAX_RECOMMENDATIONS", 10)?,
        };

        let store = StoreConfig {
            responses_path: PathBuf::from(var_or(
                "STORE_RESPONSES_PATH",
                "data/survey-responses.jsonl",
            )),
            failures_path: PathBuf::from(var_or(
                "STORE_FAILURES_PATH",
                "data/problem-responses.jsonl",
            )),
        };

        let http = HttpConfig {
            max_attempts: parse_number::<u32>("HTTP_MAX_ATTEMPTS", 3)?.max(1),
            timeout: Duration::from_secs(parse_number("HTTP_TIMEOUT_SECS", 30)?),
        };

        let test_mode = if parse_flag("APP_TEST_MODE") {
            Some(TestModeConfig {
                responses_path: PathBuf::from(var_or(
                    "TEST_MODE_RESPONSES",
                    "data/test-mode/sm-survey-responses.json",
                )),
                results_path: PathBuf::from(var_or(
                    "TEST_MODE_RESULTS",
                    "data/test-mode/cos-results.json",
                )),
            })
        } else {
            None
        };

        let drift_max_refreshes = parse_number("DRIFT_MAX_REFRESHES", 2)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            survey,
            skills,
            email,
            store,
            http,
            test_mode,
            drift_max_refreshes,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        _ => Ok(default),
    }
}

fn parse_flag(key: &str) -> bool {
    matches!(
        env::var(key)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Survey platform endpoints, credentials and listing filters.
#[derive(Debug, Clone)]
pub struct SurveyApiConfig {
    pub base_url: String,
    pub access_token: String,
    pub details_cache: PathBuf,
    pub listing: ListingConfig,
}

impl SurveyApiConfig {
    pub fn details_url(&self) -> String {
        format!("{}/details", self.base_url.trim_end_matches('/'))
    }

    pub fn responses_url(&self) -> String {
        format!("{}/responses/bulk", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub per_page: u32,
    pub status: String,
    pub minimum_minutes: u32,
    pub sort_by: String,
    pub sort_order: String,
    pub start_created_at: Option<DateTime<Utc>>,
}

/// Skills-matcher endpoints and credentials.
#[derive(Debug, Clone)]
pub struct SkillsApiConfig {
    pub schema_url: String,
    pub score_url: String,
    pub api_token: String,
    pub schema_cache: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    pub password: String,
    pub max_recommendations: usize,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub responses_path: PathBuf,
    pub failures_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_attempts: u32,
    pub timeout: Duration,
}

/// Offline inputs used instead of the live listing and scoring calls.
#[derive(Debug, Clone)]
pub struct TestModeConfig {
    pub responses_path: PathBuf,
    pub results_path: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidTimestamp { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
            ConfigError::InvalidTimestamp { key } => {
                write!(f, "{key} must be an RFC 3339 timestamp")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidTimestamp { .. } => None,
        }
    }
}
