//! # Step Queue and Worker Pool
//!
//! The execution substrate: a bounded in-process queue of `StepRequest`
//! messages and N tokio workers consuming it. Workers share nothing beyond
//! the coordination stores; each message independently identifies one node
//! and one unit of work, so any worker can process any message.

use crate::error::{CoreError, Result};
use crate::orchestration::{StepRequest, WorkflowCoordinator};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Sending half of the bounded step queue
#[derive(Clone)]
pub struct StepQueue {
    sender: mpsc::Sender<StepRequest>,
}

impl StepQueue {
    /// Create a bounded queue, returning the sender and the receiving half
    /// for the worker pool
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<StepRequest>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub async fn send(&self, request: StepRequest) -> Result<()> {
        self.sender
            .send(request)
            .await
            .map_err(|_| CoreError::OrchestrationError("step queue is closed".to_string()))
    }
}

impl std::fmt::Debug for StepQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepQueue")
            .field("capacity", &self.sender.capacity())
            .finish()
    }
}

/// N workers pulling step requests off the shared queue. Workers exit when
/// every queue sender has been dropped and the queue has drained.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        coordinator: Arc<WorkflowCoordinator>,
        receiver: mpsc::Receiver<StepRequest>,
        worker_count: usize,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..worker_count.max(1))
            .map(|worker_id| {
                let coordinator = Arc::clone(&coordinator);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    tracing::debug!(worker_id, "Step worker started");
                    loop {
                        let request = { receiver.lock().await.recv().await };
                        let Some(request) = request else {
                            break;
                        };
                        coordinator.process(request).await;
                    }
                    tracing::debug!(worker_id, "Step worker stopped");
                })
            })
            .collect();

        Self { workers }
    }

    /// Wait for every worker to drain and exit
    pub async fn join(self) {
        futures::future::join_all(self.workers).await;
    }
}
