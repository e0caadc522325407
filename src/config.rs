use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SkqError;
use crate::job::Job;

/// Callback invoked on dispatcher errors (job = None), scheduler errors
/// (job = None) and handler failures (job = the failing envelope).
pub type ErrorSink = Arc<dyn Fn(&SkqError, Option<&Job>) + Send + Sync>;

const DEFAULT_REDIS_SERVER: &str = "127.0.0.1:6379";
const DEFAULT_WORKER_COUNT: usize = 25;
const DEFAULT_POLL_INTERVAL: u64 = 5;

#[derive(Clone)]
pub struct Config {
    /// Store address, `host:port` or a full `redis://` URL.
    pub redis_server: String,
    /// Key prefix; empty disables namespacing.
    pub redis_namespace: String,
    /// Queue name -> positive weight. Higher weight, earlier in the poll order.
    pub queues: HashMap<String, u32>,
    /// Size of the runner pool.
    pub worker_count: usize,
    /// Scheduler period in seconds.
    pub poll_interval: u64,
    pub report_error: ErrorSink,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            redis_server: DEFAULT_REDIS_SERVER.to_string(),
            redis_namespace: String::new(),
            queues: HashMap::from([("default".to_string(), 1)]),
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            report_error: Arc::new(|_, _| {}),
        }
    }
}
