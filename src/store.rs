use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{SkqError, SkqResult};

/// Bounded pool of Redis connections shared by the dispatcher, the runners
/// and the scheduler. Capacity is worker_count + 1: one connection per
/// runner plus one for the fetcher, matching what other Sidekiq workers
/// hold open against the same server.
#[derive(Clone)]
pub(crate) struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    client: redis::Client,
    namespace: String,
    limit: Semaphore,
    idle: Mutex<Vec<ConnectionManager>>,
}

impl Store {
    pub(crate) fn connect(server: &str, namespace: &str, capacity: usize) -> SkqResult<Store> {
        let url = if server.contains("://") {
            server.to_string()
        } else {
            format!("redis://{server}")
        };
        let client = redis::Client::open(url).map_err(SkqError::CreateRedisClient)?;
        Ok(Store {
            inner: Arc::new(StoreInner {
                client,
                namespace: namespace.to_string(),
                limit: Semaphore::new(capacity),
                idle: Mutex::new(Vec::with_capacity(capacity)),
            }),
        })
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Check a connection out of the pool, waiting for a slot if every
    /// connection is in use. Connections reconnect on their own after a
    /// transient failure.
    pub(crate) async fn get(&self) -> SkqResult<PooledConn<'_>> {
        let permit = self
            .inner
            .limit
            .acquire()
            .await
            .map_err(|_| SkqError::InvalidConfig("connection pool closed".to_string()))?;

        let conn = self.inner.idle.lock().pop();
        let conn = match conn {
            Some(conn) => conn,
            None => self
                .inner
                .client
                .get_tokio_connection_manager()
                .await
                .map_err(SkqError::GetRedisConn)?,
        };

        Ok(PooledConn {
            conn,
            idle: &self.inner.idle,
            _permit: permit,
        })
    }
}

pub(crate) struct PooledConn<'a> {
    conn: ConnectionManager,
    idle: &'a Mutex<Vec<ConnectionManager>>,
    _permit: SemaphorePermit<'a>,
}

impl Deref for PooledConn<'_> {
    type Target = ConnectionManager;

    fn deref(&self) -> &ConnectionManager {
        &self.conn
    }
}

impl DerefMut for PooledConn<'_> {
    fn deref_mut(&mut self) -> &mut ConnectionManager {
        &mut self.conn
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        // ConnectionManager handles are cheap clones of the same underlying
        // connection; parking one back keeps it alive for the next checkout
        self.idle.lock().push(self.conn.clone());
    }
}
