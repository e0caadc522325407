use crate::backoff;
use crate::config::ErrorSink;
use crate::error::{SkqError, SkqResult};
use crate::helper;
use crate::job::Job;
use crate::redis_keys;
use crate::store::Store;

/// Applies the retry policy to a failed job: failure metadata accounting,
/// error reporting, and re-persisting the envelope into the `retry` set
/// with an exponential-backoff due time.
pub(crate) struct RetryEngine {
    store: Store,
    report_error: ErrorSink,
}

impl RetryEngine {
    pub(crate) fn new(store: Store, report_error: ErrorSink) -> RetryEngine {
        RetryEngine {
            store,
            report_error,
        }
    }

    pub(crate) async fn schedule_retry(&self, job: &mut Job, err: &SkqError) {
        (self.report_error)(err, Some(job));

        apply_failure(job, &helper::now_timestamp());

        tracing::warn!(
            jid = %job.jid,
            class = %job.class,
            queue = %job.queue,
            retries = job.retry_count,
            max_retries = job.max_retries,
            error_class = %error_class(err),
            error_message = %error_message(err),
            "job error"
        );

        if job.retry_count >= job.max_retries {
            // off the retry ladder; only stat:failed records this outcome
            return;
        }

        job.error_class = error_class(err);
        job.error_message = error_message(err);
        let due = helper::epoch_seconds() + backoff::retry_delay(job.retry_count) as f64;

        if let Err(err) = self.persist(job, due).await {
            tracing::error!("schedule retry ERROR: {err:?}");
            (self.report_error)(&err, Some(job));
        }
    }

    async fn persist(&self, job: &Job, due: f64) -> SkqResult<()> {
        let payload = job.to_json()?;
        let mut conn = self.store.get().await?;
        redis::cmd("ZADD")
            .arg(redis_keys::retry_key(self.store.namespace()))
            .arg(due)
            .arg(payload)
            .query_async::<_, ()>(&mut *conn)
            .await
            .map_err(SkqError::ScheduleRetry)
    }
}

/// Failure accounting: `failed_at` is set on the first failure only;
/// `retry_count` counts the failures after that; `retried_at` moves on
/// every failure past the first.
fn apply_failure(job: &mut Job, now: &str) {
    if job.failed_at.is_empty() {
        job.failed_at = now.to_string();
    } else {
        job.retry_count += 1;
    }
    if job.retry_count > 0 {
        job.retried_at = now.to_string();
    }
}

fn error_class(err: &SkqError) -> String {
    match err {
        SkqError::Perform(err) => err.class().to_string(),
        SkqError::Panic(_) => "Panic".to_string(),
        SkqError::UnknownWorkerType(_) => "UnknownWorkerType".to_string(),
        other => other.to_string(),
    }
}

fn error_message(err: &SkqError) -> String {
    match err {
        SkqError::Perform(err) => err.message().to_string(),
        SkqError::Panic(message) => message.clone(),
        other => other.to_string(),
    }
}
