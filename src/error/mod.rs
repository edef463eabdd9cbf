use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Graph store error: {0}")]
    Graph(#[from] GraphError),

    #[error("Verifier oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Evidence-model validation errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },
}

/// Graph store errors
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Graph connection failed: {message}")]
    Connection { message: String },

    #[error("Graph query failed: {message}")]
    Query { message: String },

    #[error("Malformed identifier: {value}")]
    InvalidId { value: String },

    #[error("Invalid properties for {label} node {id}: expected a JSON object")]
    InvalidProperties { label: String, id: String },

    #[error("Dangling {rel} reference: no {label} node {id} in record")]
    DanglingReference {
        rel: String,
        label: String,
        id: String,
    },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Verifier oracle errors
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid judgment: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Oracle call cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Decision lifecycle contract violations
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("Record sealed: decision {decision_id} already persisted")]
    RecordSealed { decision_id: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for graph store operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for verifier oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

/// Result type alias for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl AppError {
    /// Whether this error is a cancelled oracle call.
    ///
    /// Cancellation must stay distinguishable from genuine verification
    /// failure all the way up to the caller's retry policy.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AppError::Oracle(OracleError::Cancelled))
    }
}
