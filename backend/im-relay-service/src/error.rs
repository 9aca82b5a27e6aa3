use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Service-level errors: startup, configuration and the REST surface.
#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Storage(_) => 503,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => 500,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Config(_) => "ConfigError",
            AppError::StartServer(_) => "StartServerError",
            AppError::BadRequest(_) => "BadRequestError",
            AppError::Storage(_) => "StorageError",
            AppError::Internal => "InternalError",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(ResponseError::status_code(self)).json(json!({
            "error": self.error_type(),
            "message": self.to_string(),
            "status": AppError::status_code(self),
        }))
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Storage(e.to_string())
    }
}

/// Failures of the external stores (history database, conversation cache).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Database(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Stable acknowledgment codes sent back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    Ok,
    MalformedPayload,
    IncompleteMessage,
    IdentityMismatch,
    PersistenceFailed,
}

impl AckCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            AckCode::Ok => 0,
            AckCode::MalformedPayload => 4001,
            AckCode::IncompleteMessage => 4002,
            AckCode::IdentityMismatch => 4003,
            AckCode::PersistenceFailed => 5001,
        }
    }
}

/// Which write failed after validation. Only visible in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    History,
    Cache,
}

impl PersistStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistStage::History => "history",
            PersistStage::Cache => "cache",
        }
    }
}

/// Terminal failure of a single inbound message.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("message could not be decoded: {0}")]
    Decode(String),

    #[error("message is incomplete: `{0}` is missing")]
    Incomplete(&'static str),

    #[error("sender does not match the connection identity, message not sent")]
    IdentityMismatch { claimed: String, bound: String },

    // Same outward message for both stages.
    #[error("failed to record chat history, message not sent")]
    Persistence {
        stage: PersistStage,
        #[source]
        source: StoreError,
    },
}

impl RelayError {
    pub fn code(&self) -> AckCode {
        match self {
            RelayError::Decode(_) => AckCode::MalformedPayload,
            RelayError::Incomplete(_) => AckCode::IncompleteMessage,
            RelayError::IdentityMismatch { .. } => AckCode::IdentityMismatch,
            RelayError::Persistence { .. } => AckCode::PersistenceFailed,
        }
    }

    /// Label used for the `outcome` metric dimension.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::Decode(_) => "decode",
            RelayError::Incomplete(_) => "incomplete",
            RelayError::IdentityMismatch { .. } => "identity_mismatch",
            RelayError::Persistence { .. } => "persistence",
        }
    }
}
