//! Bounded worker pool with blocking submission.
//!
//! A fixed set of workers is spawned eagerly and shares one task queue.
//! [`WorkPool::submit`] waits until a worker is free before handing a task
//! over, so a producer can never get more than `size` tasks ahead of the
//! workers. [`WorkPool::shutdown`] closes the queue and waits until every
//! submitted task has run. A task that panics is logged and does not cost the
//! pool a worker.
//!
//! The pool owns no results. Tasks report through whatever channel they carry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::error::WorkPoolError;

/// A unit of work executed by a [`WorkPool`].
#[async_trait]
pub trait Task: Send + 'static {
    async fn run(self);
}

struct Queued<T> {
    task: T,
    // Released when the task finishes, freeing a slot for the next submit.
    _slot: OwnedSemaphorePermit,
}

/// Fixed-size pool of tokio workers executing [`Task`]s.
pub struct WorkPool<T: Task> {
    sender: mpsc::UnboundedSender<Queued<T>>,
    slots: Arc<Semaphore>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Task> WorkPool<T> {
    /// Spawn `size` workers on the current tokio runtime. A size of zero is
    /// raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<Queued<T>>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    loop {
                        let next = { receiver.lock().await.recv().await };
                        let Some(Queued { task, _slot: slot }) = next else {
                            break;
                        };
                        // A panicking task takes down its own tokio task, not the worker.
                        if let Err(e) = tokio::spawn(task.run()).await {
                            tracing::warn!(worker = id, error = %e, "task terminated abnormally");
                        }
                        drop(slot);
                    }
                    tracing::trace!(worker = id, "worker stopped");
                })
            })
            .collect();

        Self {
            sender,
            slots: Arc::new(Semaphore::new(size)),
            workers,
        }
    }

    /// Pool sized for `tasks` units of work: never more workers than tasks.
    pub fn for_tasks(max_workers: usize, tasks: usize) -> Self {
        Self::new(max_workers.min(tasks))
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Hand `task` to a worker, waiting while every worker is busy.
    pub async fn submit(&self, task: T) -> Result<(), WorkPoolError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| WorkPoolError::Closed)?;
        self.sender
            .send(Queued { task, _slot: slot })
            .map_err(|_| WorkPoolError::Closed)
    }

    /// Stop accepting work and wait for every submitted task to finish.
    pub async fn shutdown(self) {
        let Self { sender, slots, workers } = self;
        drop(sender);
        for (id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::warn!(worker = id, error = %e, "worker terminated abnormally");
            }
        }
        slots.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Sleep {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        done: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task for Sleep {
        async fn run(self) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counters() -> (Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
        )
    }

    #[tokio::test]
    async fn shutdown_drains_every_task() {
        let (running, peak, done) = counters();
        let pool = WorkPool::new(3);
        for _ in 0..20 {
            pool.submit(Sleep {
                running: running.clone(),
                peak: peak.clone(),
                done: done.clone(),
            })
            .await
            .unwrap();
        }
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_size() {
        let (running, peak, done) = counters();
        let pool = WorkPool::new(4);
        for _ in 0..32 {
            pool.submit(Sleep {
                running: running.clone(),
                peak: peak.clone(),
                done: done.clone(),
            })
            .await
            .unwrap();
        }
        pool.shutdown().await;
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(done.load(Ordering::SeqCst), 32);
    }

    struct Gate(Arc<tokio::sync::Notify>);

    #[async_trait]
    impl Task for Gate {
        async fn run(self) {
            self.0.notified().await;
        }
    }

    #[tokio::test]
    async fn submit_blocks_while_all_workers_busy() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let pool = WorkPool::new(1);
        pool.submit(Gate(gate.clone())).await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), pool.submit(Gate(gate.clone()))).await;
        assert!(blocked.is_err(), "second submit should wait for the busy worker");

        gate.notify_one();
        tokio::time::timeout(Duration::from_secs(1), pool.submit(Gate(gate.clone())))
            .await
            .expect("slot freed after first task finished")
            .unwrap();
        gate.notify_one();
        pool.shutdown().await;
    }

    struct Panic;

    #[async_trait]
    impl Task for Panic {
        async fn run(self) {
            panic!("task failure");
        }
    }

    enum Mixed {
        Panic(Panic),
        Sleep(Sleep),
    }

    #[async_trait]
    impl Task for Mixed {
        async fn run(self) {
            match self {
                Self::Panic(t) => t.run().await,
                Self::Sleep(t) => t.run().await,
            }
        }
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_the_worker() {
        let (running, peak, done) = counters();
        let pool = WorkPool::new(1);
        pool.submit(Mixed::Panic(Panic)).await.unwrap();
        for _ in 0..3 {
            pool.submit(Mixed::Sleep(Sleep {
                running: running.clone(),
                peak: peak.clone(),
                done: done.clone(),
            }))
            .await
            .unwrap();
        }
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn worker_count_capped_by_tasks() {
        let pool: WorkPool<Gate> = WorkPool::for_tasks(1000, 3);
        assert_eq!(pool.size(), 3);
        pool.shutdown().await;

        let pool: WorkPool<Gate> = WorkPool::for_tasks(1000, 0);
        assert_eq!(pool.size(), 1);
        pool.shutdown().await;
    }
}
