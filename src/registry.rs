use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use tracing::{debug, error};

use crate::error::Result;

/// identifies a worker within a [`ThreadRegistry`]
pub type WorkerId = u64;

/// Keeps track of the threads serving client connections.
///
/// Every worker gets a completion flag that it sets just before it exits, even when it panics.
/// Only the accept loop touches the registry, so [`reap_completed`] can join finished workers
/// without ever blocking on one that is still running, and [`drain_all`] joins the rest at
/// shutdown. A worker is removed from the registry as it is joined, so it can never be joined
/// twice.
///
/// [`reap_completed`]: #method.reap_completed
/// [`drain_all`]: #method.drain_all
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    workers: HashMap<WorkerId, WorkerRecord>,
    next_id: WorkerId,
}

#[derive(Debug)]
struct WorkerRecord {
    peer: SocketAddr,
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ThreadRegistry {
    /// creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `job` on a new thread serving the client at `peer`, and tracks it.
    ///
    /// # Errors
    /// returns an IO error if the thread could not be created. `job` is dropped in that case.
    pub fn register<F>(&mut self, peer: SocketAddr, job: F) -> Result<WorkerId>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id;
        let done = Arc::new(AtomicBool::new(false));
        let flag = CompletionFlag(Arc::clone(&done));
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || {
                let _flag = flag;
                job();
            })?;

        self.next_id += 1;
        self.workers.insert(id, WorkerRecord { peer, done, handle });
        debug!(id, %peer, live = self.workers.len(), "registered worker");
        Ok(id)
    }

    /// Joins and forgets every worker that has already finished. Workers that are still running
    /// are left alone. Returns the number of reaped workers.
    pub fn reap_completed(&mut self) -> usize {
        let finished: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|(_, record)| record.done.load(Ordering::Acquire))
            .map(|(&id, _)| id)
            .collect();

        for id in &finished {
            if let Some(record) = self.workers.remove(id) {
                join(*id, record);
            }
        }
        finished.len()
    }

    /// Joins every remaining worker, finished or not, and empties the registry.
    /// Returns the number of joined workers.
    pub fn drain_all(&mut self) -> usize {
        let count = self.workers.len();
        debug!(count, "waiting for all workers to finish");
        for (id, record) in self.workers.drain() {
            join(id, record);
        }
        count
    }

    /// number of tracked workers, finished or not
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// `true` if no worker is tracked
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

fn join(id: WorkerId, record: WorkerRecord) {
    let WorkerRecord { peer, handle, .. } = record;
    match handle.join() {
        Ok(()) => debug!(id, %peer, "reaped worker"),
        Err(_) => error!(id, %peer, "worker panicked"),
    }
}

/// Sets the worker's completion flag when dropped, which happens as the worker's thread
/// finishes, whether it returned or panicked.
struct CompletionFlag(Arc<AtomicBool>);

impl Drop for CompletionFlag {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!("worker thread panicked");
        }
        self.0.store(true, Ordering::Release);
    }
}
