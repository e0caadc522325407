fn ns(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{namespace}:{key}")
    }
}

// queue:<name>  - list: FIFO of pending envelopes
#[inline]
pub(crate) fn queue_key(namespace: &str, queue: &str) -> String {
    ns(namespace, &format!("queue:{queue}"))
}

// the prefix BLPOP keys carry, stripped to recover the queue name
#[inline]
pub(crate) fn queue_prefix(namespace: &str) -> String {
    ns(namespace, "queue:")
}

// queues        - set: known queue names
#[inline]
pub(crate) fn queues_key(namespace: &str) -> String {
    ns(namespace, "queues")
}

// retry         - sorted set: envelopes awaiting retry, score = due time
#[inline]
pub(crate) fn retry_key(namespace: &str) -> String {
    ns(namespace, "retry")
}

// schedule      - sorted set: future-dated envelopes, score = due time
#[inline]
pub(crate) fn schedule_key(namespace: &str) -> String {
    ns(namespace, "schedule")
}

// workers       - set: currently busy worker ids
#[inline]
pub(crate) fn workers_key(namespace: &str) -> String {
    ns(namespace, "workers")
}

// worker:<id>   - string w/ TTL: JSON of the job being processed
#[inline]
pub(crate) fn worker_key(namespace: &str, worker_id: &str) -> String {
    ns(namespace, &format!("worker:{worker_id}"))
}

// worker:<id>:started - string w/ TTL: human-readable start timestamp
#[inline]
pub(crate) fn worker_started_key(namespace: &str, worker_id: &str) -> String {
    ns(namespace, &format!("worker:{worker_id}:started"))
}

// stat:processed - counter: lifetime processed jobs
#[inline]
pub(crate) fn stat_processed_key(namespace: &str) -> String {
    ns(namespace, "stat:processed")
}

// stat:failed   - counter: lifetime failed jobs
#[inline]
pub(crate) fn stat_failed_key(namespace: &str) -> String {
    ns(namespace, "stat:failed")
}
