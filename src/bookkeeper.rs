use std::time::Instant;

use time::OffsetDateTime;

use crate::config::ErrorSink;
use crate::error::{SkqError, SkqResult};
use crate::helper;
use crate::job::{Job, RunningJob};
use crate::redis_keys;
use crate::store::Store;

// one day, same as the dashboard expects
const KEY_EXPIRY_SECS: u64 = 86_400;

/// Publishes "worker X is processing job J" and the lifetime counters.
/// Bookkeeping failures are reported but never change a job's outcome.
pub(crate) struct Bookkeeper {
    store: Store,
    report_error: ErrorSink,
}

impl Bookkeeper {
    pub(crate) fn new(store: Store, report_error: ErrorSink) -> Bookkeeper {
        Bookkeeper {
            store,
            report_error,
        }
    }

    pub(crate) async fn job_started(&self, job: &Job, worker_id: &str) -> Instant {
        if let Err(err) = self.record_start(job, worker_id).await {
            tracing::error!("start bookkeeping ERROR: {err:?}");
            (self.report_error)(&err, None);
        }
        tracing::info!(
            jid = %job.jid,
            class = %job.class,
            queue = %job.queue,
            worker_id,
            "job start"
        );
        Instant::now()
    }

    pub(crate) async fn job_finished(
        &self,
        job: &Job,
        worker_id: &str,
        success: bool,
        started: Instant,
    ) {
        tracing::info!(
            jid = %job.jid,
            class = %job.class,
            queue = %job.queue,
            duration = ?started.elapsed(),
            success,
            worker_id,
            "job finish"
        );
        if let Err(err) = self.record_finish(worker_id, success).await {
            tracing::error!("finish bookkeeping ERROR: {err:?}");
            (self.report_error)(&err, None);
        }
    }

    async fn record_start(&self, job: &Job, worker_id: &str) -> SkqResult<()> {
        let running = RunningJob {
            queue: &job.queue,
            payload: job,
            run_at: OffsetDateTime::now_utc().unix_timestamp(),
        };
        let payload = serde_json::to_string(&running).map_err(SkqError::SerializeJob)?;
        let namespace = self.store.namespace();

        let mut conn = self.store.get().await?;
        redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(redis_keys::workers_key(namespace))
            .arg(worker_id)
            .ignore()
            .cmd("SETEX")
            .arg(redis_keys::worker_started_key(namespace, worker_id))
            .arg(KEY_EXPIRY_SECS)
            .arg(helper::now_started_timestamp())
            .ignore()
            .cmd("SETEX")
            .arg(redis_keys::worker_key(namespace, worker_id))
            .arg(KEY_EXPIRY_SECS)
            .arg(payload)
            .ignore()
            .query_async::<_, ()>(&mut *conn)
            .await
            .map_err(SkqError::Bookkeeping)
    }

    async fn record_finish(&self, worker_id: &str, success: bool) -> SkqResult<()> {
        let namespace = self.store.namespace();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SREM")
            .arg(redis_keys::workers_key(namespace))
            .arg(worker_id)
            .ignore()
            .cmd("DEL")
            .arg(redis_keys::worker_started_key(namespace, worker_id))
            .ignore()
            .cmd("DEL")
            .arg(redis_keys::worker_key(namespace, worker_id))
            .ignore()
            .cmd("INCR")
            .arg(redis_keys::stat_processed_key(namespace))
            .ignore();
        if !success {
            pipe.cmd("INCR")
                .arg(redis_keys::stat_failed_key(namespace))
                .ignore();
        }

        let mut conn = self.store.get().await?;
        pipe.query_async::<_, ()>(&mut *conn)
            .await
            .map_err(SkqError::Bookkeeping)
    }
}
