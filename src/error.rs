use std::fmt;

use thiserror::Error;

pub type SkqResult<T> = Result<T, SkqError>;

#[derive(Error, Debug)]
pub enum SkqError {
    #[error("InvalidConfig: {0}")]
    InvalidConfig(String),
    #[error("CreateRedisClient")]
    CreateRedisClient(redis::RedisError),
    #[error("GetRedisConn")]
    GetRedisConn(redis::RedisError),
    #[error("Fetch")]
    Fetch(redis::RedisError),
    #[error("Promote")]
    Promote(redis::RedisError),
    #[error("ScheduleRetry")]
    ScheduleRetry(redis::RedisError),
    #[error("Bookkeeping")]
    Bookkeeping(redis::RedisError),
    #[error("MalformedJob")]
    MalformedJob(serde_json::Error),
    #[error("SerializeJob")]
    SerializeJob(serde_json::Error),
    #[error("DupWorkerType: {0}")]
    DupWorkerType(String),
    #[error("UnknownWorkerType: {0}")]
    UnknownWorkerType(String),
    #[error("Panic: {0}")]
    Panic(String),
    #[error("{0}")]
    Perform(PerformError),
}

/// Failure returned by a handler's `perform`. Carries the error class name
/// that ends up in the envelope's `error_class` field, so dashboards see the
/// same shape Sidekiq workers produce.
#[derive(Debug)]
pub struct PerformError {
    class: String,
    message: String,
}

impl PerformError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Build from any concrete error, using its short type name as the class.
    pub fn from_err<E: std::error::Error>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let class = full.rsplit("::").next().unwrap_or(full);
        Self {
            class: class.to_string(),
            message: err.to_string(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PerformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

impl std::error::Error for PerformError {}
