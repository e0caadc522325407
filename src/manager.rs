use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::bookkeeper::Bookkeeper;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{SkqError, SkqResult};
use crate::helper;
use crate::job::Job;
use crate::pool::Runner;
use crate::registry::Registry;
use crate::retry::RetryEngine;
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::Worker;

/// Owns the whole worker process: registry, store, runner pool, scheduler
/// and the signal-driven shutdown sequencing.
pub struct Manager {
    config: Config,
    registry: Registry,
}

impl Manager {
    pub fn new(config: Config) -> Manager {
        Manager {
            config,
            registry: Registry::new(),
        }
    }

    /// Register a handler factory under a job class name. All registrations
    /// must happen before `run`.
    pub fn register<F>(&mut self, class: impl Into<String>, factory: F) -> SkqResult<()>
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        self.registry.register(class, factory)
    }

    /// Run until SIGINT, SIGTERM or SIGQUIT. Returns once every in-flight
    /// job has finished its bookkeeping.
    pub async fn run(self) -> SkqResult<()> {
        let Config {
            redis_server,
            redis_namespace,
            queues,
            worker_count,
            poll_interval,
            report_error,
        } = self.config;

        if worker_count == 0 {
            return Err(SkqError::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if !queues.values().any(|weight| *weight > 0) {
            return Err(SkqError::InvalidConfig(
                "at least one queue with a positive weight is required".to_string(),
            ));
        }

        let (hostname, pid) = helper::process_identity();
        let store = Store::connect(&redis_server, &redis_namespace, worker_count + 1)?;

        tracing::info!(
            worker_count,
            redis = %redis_server,
            namespace = %redis_namespace,
            queues = ?queues,
            pid,
            "starting"
        );

        let registry = Arc::new(self.registry);
        let gate = Arc::new(RwLock::new(()));
        let stopping = Arc::new(AtomicBool::new(false));
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(1);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        let mut runners = Vec::with_capacity(worker_count);
        for slot in 0..worker_count {
            let runner = Runner::new(
                format!("{hostname}:{pid}-{slot}"),
                jobs_rx.clone(),
                registry.clone(),
                Bookkeeper::new(store.clone(), report_error.clone()),
                RetryEngine::new(store.clone(), report_error.clone()),
            );
            runners.push(tokio::spawn(runner.run()));
        }

        let scheduler = Scheduler::new(
            store.clone(),
            gate.clone(),
            stopping.clone(),
            poll_interval,
            report_error.clone(),
        );
        tokio::spawn(scheduler.run());

        tokio::spawn(watch_signals(gate.clone(), stopping.clone()));

        tracing::info!(pid, "started");

        let dispatcher = Dispatcher::new(store, &queues, jobs_tx, gate, stopping, report_error);
        // blocks until the signal handler quiesces the loop; dropping the
        // dispatcher closes the job channel behind it
        dispatcher.run().await;

        for handle in runners {
            if let Err(err) = handle.await {
                tracing::error!("runner exit ERROR: {err:?}");
            }
        }

        tracing::info!(pid, "stopped");
        Ok(())
    }
}

/// Waits for a shutdown signal, then quiesces the dispatcher and scheduler
/// by taking the gate exclusively before flipping the stop flag. Holding
/// the write lock guarantees neither loop is mid-iteration when it flips.
async fn watch_signals(gate: Arc<RwLock<()>>, stopping: Arc<AtomicBool>) {
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!("signal handler ERROR: {err}");
            return;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!("signal handler ERROR: {err}");
            return;
        }
    };
    let mut quit = match signal(SignalKind::quit()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!("signal handler ERROR: {err}");
            return;
        }
    };

    let received = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = received, "stopping");

    let guard = gate.write().await;
    stopping.store(true, Ordering::SeqCst);
    drop(guard);
}
