use async_trait::async_trait;

mod backoff;
mod bookkeeper;
pub mod config;
mod dispatcher;
pub mod error;
mod helper;
pub mod job;
mod manager;
mod pool;
mod redis_keys;
pub mod registry;
mod retry;
mod scheduler;
mod store;

pub use {
    config::{Config, ErrorSink},
    error::{PerformError, SkqError, SkqResult},
    job::Job,
    manager::Manager,
    registry::Registry,
};

/// A job handler. Registered under a class name; a fresh instance is
/// produced per job from the registered factory. `perform` runs behind a
/// catch-unwind barrier, so a panicking handler fails the job instead of
/// the worker slot.
#[async_trait]
pub trait Worker: Send {
    async fn perform(&mut self, args: &[serde_json::Value]) -> Result<(), PerformError>;
}
