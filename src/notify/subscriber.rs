//! Live write targets attached to a notify client

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("Remote party disconnected")]
    Disconnected,

    #[error("Write failed: {0}")]
    Other(String),
}

/// Receives serialized batches. Must not block: the flush loop calls it
/// for every subscriber in turn.
pub trait SubscriberSink: Send + Sync {
    fn write(&self, batch: Bytes) -> Result<(), WriteError>;
}

impl<F> SubscriberSink for F
where
    F: Fn(Bytes) -> Result<(), WriteError> + Send + Sync,
{
    fn write(&self, batch: Bytes) -> Result<(), WriteError> {
        self(batch)
    }
}

/// A sink plus the signal that ends its attachment
pub struct Subscriber {
    id: Uuid,
    sink: Box<dyn SubscriberSink>,
    stopped: AtomicBool,
    stop: Notify,
}

impl Subscriber {
    pub fn new(sink: impl SubscriberSink + 'static) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sink: Box::new(sink),
            stopped: AtomicBool::new(false),
            stop: Notify::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn write(&self, batch: Bytes) -> Result<(), WriteError> {
        self.sink.write(batch)
    }

    /// Fire the stop signal. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.stop.notify_one();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolves once [`Subscriber::stop`] has been called
    pub async fn stopped(&self) {
        if self.is_stopped() {
            return;
        }
        self.stop.notified().await;
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn stop_before_wait_still_wakes() {
        let sub = Subscriber::new(|_batch: Bytes| -> Result<(), WriteError> { Ok(()) });
        sub.stop();
        sub.stop();

        tokio::time::timeout(Duration::from_secs(1), sub.stopped())
            .await
            .expect("stop signal lost");
    }

    #[tokio::test]
    async fn stop_wakes_a_waiting_task() {
        let sub = Subscriber::new(|_batch: Bytes| -> Result<(), WriteError> { Ok(()) });
        let waiter = tokio::spawn({
            let sub = sub.clone();
            async move { sub.stopped().await }
        });

        tokio::task::yield_now().await;
        sub.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter never woke")
            .unwrap();
    }

    #[test]
    fn closures_are_sinks() {
        let sub = Subscriber::new(|batch: Bytes| {
            if batch.is_empty() {
                Err(WriteError::Other("empty".into()))
            } else {
                Ok(())
            }
        });
        assert!(sub.write(Bytes::from_static(b"[]")).is_ok());
        assert_eq!(
            sub.write(Bytes::new()),
            Err(WriteError::Other("empty".into()))
        );
    }
}
