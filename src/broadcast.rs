//! Replay-latest state broadcaster.
//!
//! Each `StateBroadcaster` keeps the last published value and a list of
//! subscriber channels. A new subscriber is handed the retained value before
//! anything else, then every later publish in order. Instances are
//! independent: connection state, catalog-ready, quick settings and notices
//! each get their own.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::dispatch::UiHandle;

struct Slot<T> {
    latest: Option<T>,
    subscribers: Vec<UnboundedSender<T>>,
}

pub struct StateBroadcaster<T: Clone + Send + 'static> {
    name: &'static str,
    slot: Mutex<Slot<T>>,
}

impl<T: Clone + Send + 'static> StateBroadcaster<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot {
                latest: None,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Create a broadcaster that already holds a value.
    pub fn with_initial(name: &'static str, value: T) -> Self {
        let broadcaster = Self::new(name);
        broadcaster.slot.lock().latest = Some(value);
        broadcaster
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Retain `value` and fan it out. Subscribers whose receiver was dropped
    /// are pruned here.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot.lock();
        slot.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        slot.latest = Some(value);
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.slot.lock();
        if let Some(latest) = slot.latest.as_ref() {
            // Receiver is alive, cannot fail.
            let _ = tx.send(latest.clone());
        }
        slot.subscribers.push(tx);
        Subscription { rx }
    }

    pub fn latest(&self) -> Option<T> {
        self.slot.lock().latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut slot = self.slot.lock();
        slot.subscribers.retain(|tx| !tx.is_closed());
        slot.subscribers.len()
    }
}

/// Receiving end of a broadcaster subscription.
pub struct Subscription<T> {
    rx: UnboundedReceiver<T>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Wait for the next value. `None` once the broadcaster is dropped.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Everything delivered so far, in publish order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.try_recv() {
            values.push(value);
        }
        values
    }

    /// Run `callback` on the UI loop for every value this subscription
    /// receives. Stops when the broadcaster or the UI loop goes away.
    pub fn forward_to_ui<F>(
        mut self,
        ui: UiHandle,
        runtime: &tokio::runtime::Handle,
        callback: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(T) + Clone + Send + 'static,
    {
        runtime.spawn(async move {
            while let Some(value) = self.recv().await {
                let callback = callback.clone();
                if ui.post(move || callback(value)).await.is_err() {
                    log::debug!("UI loop closed, stopping subscription forwarder");
                    break;
                }
            }
        })
    }
}
