use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};

use crate::bookkeeper::Bookkeeper;
use crate::error::SkqError;
use crate::job::Job;
use crate::registry::Registry;
use crate::retry::RetryEngine;

/// One slot of the fixed worker pool. Runners share the job channel; each
/// exits once the channel is closed and drained, which is the completion
/// signal the shutdown path waits on.
pub(crate) struct Runner {
    worker_id: String,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    registry: Arc<Registry>,
    bookkeeper: Bookkeeper,
    retry: RetryEngine,
}

impl Runner {
    pub(crate) fn new(
        worker_id: String,
        jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
        registry: Arc<Registry>,
        bookkeeper: Bookkeeper,
        retry: RetryEngine,
    ) -> Runner {
        Runner {
            worker_id,
            jobs,
            registry,
            bookkeeper,
            retry,
        }
    }

    pub(crate) async fn run(self) {
        loop {
            let job = self.jobs.lock().await.recv().await;
            let Some(mut job) = job else {
                // channel closed and drained
                return;
            };
            self.process(&mut job).await;
        }
    }

    async fn process(&self, job: &mut Job) {
        let mut worker = match self.registry.resolve(&job.class) {
            Ok(worker) => worker,
            Err(err) => {
                // no handler registered: onto the retry ladder, so the
                // backlog drains once the operator registers the class
                self.retry.schedule_retry(job, &err).await;
                return;
            }
        };

        let started = self.bookkeeper.job_started(job, &self.worker_id).await;

        let outcome = AssertUnwindSafe(worker.perform(&job.args))
            .catch_unwind()
            .await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(SkqError::Perform(err)),
            Err(panic) => Some(panic_to_error(panic)),
        };

        let success = failure.is_none();
        if let Some(err) = failure {
            self.retry.schedule_retry(job, &err).await;
        }
        self.bookkeeper
            .job_finished(job, &self.worker_id, success, started)
            .await;
    }
}

fn panic_to_error(payload: Box<dyn Any + Send>) -> SkqError {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    };
    SkqError::Panic(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payload_strings_become_the_message() {
        let err = panic_to_error(Box::new("boom"));
        assert!(matches!(err, SkqError::Panic(message) if message == "boom"));

        let err = panic_to_error(Box::new("boom".to_string()));
        assert!(matches!(err, SkqError::Panic(message) if message == "boom"));
    }

    #[test]
    fn opaque_panic_payloads_get_a_placeholder() {
        let err = panic_to_error(Box::new(42_u32));
        assert!(matches!(err, SkqError::Panic(message) if message == "handler panicked"));
    }

    #[tokio::test]
    async fn catch_unwind_traps_a_panicking_future() {
        let outcome = AssertUnwindSafe(async { panic!("kaboom") })
            .catch_unwind()
            .await;
        let payload = outcome.unwrap_err();
        assert!(matches!(
            panic_to_error(payload),
            SkqError::Panic(message) if message == "kaboom"
        ));
    }
}
