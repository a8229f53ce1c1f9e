//! Worker → UI task marshaling.
//!
//! Background tasks never touch presentation state directly. They post a
//! callback through a `UiHandle`; the thread that owns the UI drains the
//! matching `UiLoop` whenever it is idle.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::error::CoreError;

pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Create a bounded UI queue.
pub fn ui_channel(capacity: usize) -> (UiHandle, UiLoop) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (UiHandle { tx }, UiLoop { rx })
}

/// Cloneable sending side, handed to background work.
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::Sender<UiTask>,
}

impl UiHandle {
    /// Queue `task`, waiting for room when the queue is full.
    pub async fn post<F>(&self, task: F) -> Result<(), CoreError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(task))
            .await
            .map_err(|_| CoreError::UiLoopClosed)
    }

    /// Queue `task` without waiting. Fails when the queue is full or closed.
    pub fn try_post<F>(&self, task: F) -> Result<(), CoreError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.tx.try_send(Box::new(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                log::warn!("UI queue full, dropping task");
                Err(CoreError::UiQueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(CoreError::UiLoopClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side, owned by the UI thread.
pub struct UiLoop {
    rx: mpsc::Receiver<UiTask>,
}

impl UiLoop {
    /// Run every queued task without blocking. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Process tasks until every `UiHandle` has been dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task();
        }
        log::debug!("UI loop finished, all handles dropped");
    }
}
