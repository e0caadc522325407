use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::ErrorSink;
use crate::error::{SkqError, SkqResult};
use crate::helper;
use crate::redis_keys;
use crate::store::{PooledConn, Store};

/// Periodically promotes due entries from the `retry` and `schedule` sorted
/// sets into their target queues, atomically, so concurrent promoters on
/// other hosts never double-deliver the same envelope.
pub(crate) struct Scheduler {
    store: Store,
    sets: [String; 2],
    gate: Arc<RwLock<()>>,
    stopping: Arc<AtomicBool>,
    poll_interval: Duration,
    report_error: ErrorSink,
}

/// The single field promotion needs; the envelope bytes themselves are
/// pushed verbatim so no metadata is dropped by a re-serialization.
#[derive(Deserialize)]
struct PromotionTarget {
    #[serde(default)]
    queue: String,
}

impl Scheduler {
    pub(crate) fn new(
        store: Store,
        gate: Arc<RwLock<()>>,
        stopping: Arc<AtomicBool>,
        poll_interval: u64,
        report_error: ErrorSink,
    ) -> Scheduler {
        let sets = [
            redis_keys::retry_key(store.namespace()),
            redis_keys::schedule_key(store.namespace()),
        ];
        Scheduler {
            store,
            sets,
            gate,
            stopping,
            poll_interval: Duration::from_secs(poll_interval),
            report_error,
        }
    }

    pub(crate) async fn run(self) {
        let start = tokio::time::Instant::now() + self.poll_interval;
        let mut tick = tokio::time::interval_at(start, self.poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            // shared gate: a shutdown cannot interleave with a promotion
            let _guard = self.gate.read().await;
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            for set in &self.sets {
                if let Err(err) = self.promote_due(set).await {
                    tracing::error!("promote {set} ERROR: {err:?}");
                    (self.report_error)(&err, None);
                }
            }
        }
    }

    async fn promote_due(&self, set: &str) -> SkqResult<()> {
        let now = helper::epoch_seconds();
        let mut conn = self.store.get().await?;

        let (due, _removed): (Vec<Vec<u8>>, u64) = redis::pipe()
            .atomic()
            .cmd("ZRANGEBYSCORE")
            .arg(set)
            .arg("-inf")
            .arg(now)
            .cmd("ZREMRANGEBYSCORE")
            .arg(set)
            .arg("-inf")
            .arg(now)
            .query_async(&mut *conn)
            .await
            .map_err(SkqError::Promote)?;

        for payload in due {
            if let Err(err) = self.push_to_queue(&mut conn, &payload).await {
                // already removed from the set; the envelope is lost, which
                // matches what the Ruby-side scheduler does with bad bytes
                tracing::error!("promote envelope ERROR: {err:?}");
                (self.report_error)(&err, None);
            }
        }
        Ok(())
    }

    async fn push_to_queue(&self, conn: &mut PooledConn<'_>, payload: &[u8]) -> SkqResult<()> {
        let target: PromotionTarget =
            serde_json::from_slice(payload).map_err(SkqError::MalformedJob)?;
        let namespace = self.store.namespace();

        redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(redis_keys::queues_key(namespace))
            .arg(&target.queue)
            .ignore()
            .cmd("RPUSH")
            .arg(redis_keys::queue_key(namespace, &target.queue))
            .arg(payload)
            .ignore()
            .query_async::<_, ()>(&mut **conn)
            .await
            .map_err(SkqError::Promote)
    }
}
