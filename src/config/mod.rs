use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub verifier: VerifierConfig,
    pub graph: GraphConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub policy: PolicyConfig,
}

/// Verifier oracle API configuration
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model identifier used when none is supplied per decision.
    pub default_model: String,
}

/// Graph store configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Verification policy constants.
///
/// Empirically chosen: the threshold and blend weights are tunable
/// configuration, not derived quantities.
#[derive(Debug, Clone, Copy)]
pub struct PolicyConfig {
    /// Combined score at or above which a verification passes.
    pub pass_threshold: f64,
    /// Weight of the schema stage in the combined score.
    pub schema_weight: f64,
    /// Weight of the verifier stage in the combined score.
    pub verifier_weight: f64,
    /// Agreement rate below which the disagreement counter fires.
    pub disagreement_threshold: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let verifier = VerifierConfig {
            api_key: env::var("VERIFIER_API_KEY").map_err(|_| AppError::Config {
                message: "VERIFIER_API_KEY is required".to_string(),
            })?,
            base_url: env::var("VERIFIER_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            default_model: env::var("VERIFIER_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        let graph = GraphConfig {
            path: PathBuf::from(
                env::var("GRAPH_DB_PATH").unwrap_or_else(|_| "./data/evidence.db".to_string()),
            ),
            max_connections: env::var("GRAPH_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        let defaults = PolicyConfig::default();
        let policy = PolicyConfig {
            pass_threshold: env::var("PASS_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pass_threshold),
            schema_weight: env::var("SCHEMA_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.schema_weight),
            verifier_weight: env::var("VERIFIER_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.verifier_weight),
            disagreement_threshold: env::var("DISAGREEMENT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.disagreement_threshold),
        };

        Ok(Config {
            verifier,
            graph,
            logging,
            request,
            policy,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 0.8,
            schema_weight: 0.4,
            verifier_weight: 0.6,
            disagreement_threshold: 0.8,
        }
    }
}
