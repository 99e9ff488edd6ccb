//! # Worker Pool
//!
//! A fixed set of long-lived tokio workers pulling boxed futures from one bounded
//! queue. The queue holds twice as many tasks as there are workers, so
//! [`WorkerPool::submit`] waits once the workers fall behind instead of buffering the
//! whole candidate list.
//!
//! The pool keeps no results of its own. A task that produces something sends it
//! through a channel it owns.
//!
//! A task must never call [`WorkerPool::wait`] or [`WorkerPool::stop`] on the pool
//! it runs in: the join would wait for itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,
}

pub struct WorkerPool {
    size: usize,
    tx: Mutex<Option<mpsc::Sender<Task>>>,
    cancel: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `size` workers on the current tokio runtime. A size of zero is bumped to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Task>(size * 2);
        let rx = Arc::new(AsyncMutex::new(rx));
        let (cancel, _) = watch::channel(false);

        let workers = (0..size)
            .map(|id| tokio::spawn(run_worker(id, rx.clone(), cancel.subscribe())))
            .collect();

        Self {
            size,
            tx: Mutex::new(Some(tx)),
            cancel,
            workers: Mutex::new(workers),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues `task`, waiting while the queue is full.
    ///
    /// Fails once the pool has been closed by [`WorkerPool::wait`] or [`WorkerPool::stop`].
    pub async fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = self.sender().ok_or(PoolError::Closed)?;
        tx.send(Box::pin(task)).await.map_err(|_| PoolError::Closed)
    }

    /// Closes the queue and returns once every queued task has run and all workers exited.
    pub async fn wait(&self) {
        self.close();
        self.join().await;
    }

    /// Tells workers to quit without taking more tasks, then closes and joins like
    /// [`WorkerPool::wait`]. Tasks still queued are dropped; tasks already running finish.
    pub async fn stop(&self) {
        self.cancel.send_replace(true);
        self.close();
        self.join().await;
    }

    fn sender(&self) -> Option<mpsc::Sender<Task>> {
        self.tx.lock().ok()?.clone()
    }

    fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }

    async fn join(&self) {
        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker ended abnormally: {e}");
            }
        }
    }
}

async fn run_worker(
    id: usize,
    rx: Arc<AsyncMutex<mpsc::Receiver<Task>>>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let next: Option<Task> = tokio::select! {
            biased;
            _ = cancel.wait_for(|stop| *stop) => None,
            task = async { rx.lock().await.recv().await } => task,
        };

        match next {
            Some(task) => task.await,
            None => break,
        }
    }
    trace!("worker {id} exiting");
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
