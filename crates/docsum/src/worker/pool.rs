use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info};

use crate::error::{DocsumError, WorkerError};
use crate::pipeline::{Outcome, Pipeline};
use crate::queue::MessageQueue;
use crate::worker::consumer::Consumer;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub topic: String,
    pub group_id: String,
    pub worker_count: usize,
    pub receive_timeout: Duration,
}

/// An outcome together with the worker that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutcome {
    pub worker_id: usize,
    pub outcome: Outcome,
}

/// N consumer loops on OS threads, all in one consumer group.
pub struct WorkerPool {
    outcome_receiver: Receiver<WorkerOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Subscribes every worker before any thread starts, so a queue that
    /// cannot be joined fails here rather than inside a thread.
    pub fn start(
        pipeline: Arc<Pipeline>,
        queue: Arc<dyn MessageQueue>,
        config: &WorkerPoolConfig,
    ) -> Result<Self, DocsumError> {
        if config.worker_count == 0 {
            return Err(WorkerError::SpawnFailed("worker_count must be > 0".to_string()).into());
        }

        let (outcome_sender, outcome_receiver) = bounded::<WorkerOutcome>(config.worker_count * 16);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.worker_count);

        for worker_id in 0..config.worker_count {
            let subscription = queue.subscribe(&config.topic, &config.group_id)?;
            let consumer = Consumer::new(Arc::clone(&pipeline), subscription, config.receive_timeout);
            let shutdown_flag = Arc::clone(&shutdown);
            let outcome_tx = outcome_sender.clone();

            let handle = thread::Builder::new()
                .name(format!("docsum-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, consumer, shutdown_flag, outcome_tx))
                .map_err(|e| {
                    shutdown.store(true, Ordering::Relaxed);
                    WorkerError::SpawnFailed(e.to_string())
                })?;
            workers.push(handle);
        }

        info!(
            "Started {} workers on '{}' (group '{}')",
            config.worker_count, config.topic, config.group_id
        );

        Ok(Self {
            outcome_receiver,
            workers,
            shutdown,
        })
    }

    /// Next outcome reported by any worker. Outcomes nobody collects are
    /// dropped once the buffer is full.
    pub fn recv_outcome(&self, timeout: Duration) -> Option<WorkerOutcome> {
        self.outcome_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Flag that stops every worker when raised, e.g. from a signal handler.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Joins all workers. Call after [`WorkerPool::shutdown`].
    pub fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    mut consumer: Consumer,
    shutdown: Arc<AtomicBool>,
    outcome_sender: Sender<WorkerOutcome>,
) {
    consumer.run(worker_id, &shutdown, |outcome| {
        match outcome_sender.try_send(WorkerOutcome { worker_id, outcome }) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(dropped)) => {
                debug!("Outcome buffer full, dropping {:?}", dropped.outcome);
            }
        }
    });
}
