use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, RwLock};

use crate::config::ErrorSink;
use crate::error::{SkqError, SkqResult};
use crate::job::Job;
use crate::redis_keys;
use crate::store::Store;

const FETCH_TIMEOUT_SECS: usize = 1;

/// Pulls envelopes off the weighted queues with a blocking pop and hands
/// them to the runner pool. The send into the job channel blocks until a
/// runner is free; that is the pool's backpressure.
pub(crate) struct Dispatcher {
    store: Store,
    /// Namespaced queue keys, each repeated weight-many times.
    denormalized: Vec<String>,
    nqueues: usize,
    queue_prefix: String,
    jobs: mpsc::Sender<Job>,
    gate: Arc<RwLock<()>>,
    stopping: Arc<AtomicBool>,
    report_error: ErrorSink,
}

impl Dispatcher {
    pub(crate) fn new(
        store: Store,
        queues: &HashMap<String, u32>,
        jobs: mpsc::Sender<Job>,
        gate: Arc<RwLock<()>>,
        stopping: Arc<AtomicBool>,
        report_error: ErrorSink,
    ) -> Dispatcher {
        let denormalized = denormalize_queues(queues, store.namespace());
        let nqueues = queues.values().filter(|weight| **weight > 0).count();
        let queue_prefix = redis_keys::queue_prefix(store.namespace());
        Dispatcher {
            store,
            denormalized,
            nqueues,
            queue_prefix,
            jobs,
            gate,
            stopping,
            report_error,
        }
    }

    /// Loop until shutdown. Each iteration holds the gate in shared mode so
    /// the signal handler cannot interleave a stop with a fetch-and-enqueue.
    pub(crate) async fn run(self) {
        loop {
            let guard = self.gate.read().await;
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            self.run_once().await;
            drop(guard);
        }
        // dropping self closes the job channel; runners drain and exit
    }

    async fn run_once(&self) {
        let popped = match self.fetch().await {
            Ok(popped) => popped,
            Err(err) => {
                tracing::error!("fetch ERROR: {err:?}");
                (self.report_error)(&err, None);
                // likely a transient redis error, sleep before retrying
                tokio::time::sleep(Duration::from_secs(1)).await;
                return;
            }
        };

        let Some((key, payload)) = popped else {
            // timed out with no data
            return;
        };

        let mut job = match Job::from_json(&payload) {
            Ok(job) => job,
            Err(err) => {
                // the envelope cannot be safely rewritten; report and drop
                tracing::error!("malformed envelope ERROR: {err:?}");
                (self.report_error)(&err, None);
                return;
            }
        };
        job.queue = key
            .strip_prefix(&self.queue_prefix)
            .unwrap_or(&key)
            .to_string();

        if self.jobs.send(job).await.is_err() {
            tracing::error!("job channel closed while dispatching");
        }
    }

    async fn fetch(&self) -> SkqResult<Option<(String, Vec<u8>)>> {
        let mut conn = self.store.get().await?;
        let mut cmd = redis::cmd("BLPOP");
        for key in queue_list(&mut rand::thread_rng(), &self.denormalized, self.nqueues) {
            cmd.arg(key.as_str());
        }
        cmd.arg(FETCH_TIMEOUT_SECS);
        cmd.query_async(&mut *conn).await.map_err(SkqError::Fetch)
    }
}

/// The multiset of namespaced queue keys in which each queue appears
/// weight-many times. Frozen at startup.
pub(crate) fn denormalize_queues(queues: &HashMap<String, u32>, namespace: &str) -> Vec<String> {
    let mut denormalized = Vec::new();
    for (queue, weight) in queues {
        let key = redis_keys::queue_key(namespace, queue);
        for _ in 0..*weight {
            denormalized.push(key.clone());
        }
    }
    denormalized
}

/// Weighted random poll order: draw `nqueues` distinct positions from the
/// multiset, then keep the first occurrence of each queue. A queue's chance
/// of appearing early grows with its weight; BLPOP checks keys in order.
fn queue_list<'a, R: Rng>(
    rng: &mut R,
    denormalized: &'a [String],
    nqueues: usize,
) -> Vec<&'a String> {
    let mut list = Vec::with_capacity(nqueues);
    let mut seen = HashSet::with_capacity(nqueues);
    for index in rand::seq::index::sample(rng, denormalized.len(), nqueues) {
        let queue = &denormalized[index];
        if seen.insert(queue.as_str()) {
            list.push(queue);
        }
    }
    list
}
