use kanal::{AsyncReceiver, AsyncSender};
use tokio::sync::Mutex;
use tracing::debug;

/// Broadcasts every value to all live subscribers; a dropped receiver unsubscribes.
pub(crate) struct FanOutSender<T> {
    senders: Mutex<Vec<AsyncSender<T>>>,
}

impl<T> Default for FanOutSender<T> {
    fn default() -> Self {
        Self {
            senders: Mutex::new(vec![]),
        }
    }
}

impl<T: Clone + Send + 'static> FanOutSender<T> {
    pub(crate) async fn subscribe(&self) -> AsyncReceiver<T> {
        let (sender, receiver) = kanal::unbounded_async();
        self.senders.lock().await.push(sender);
        receiver
    }

    pub(crate) async fn send(&self, value: T) {
        let mut senders = self.senders.lock().await;
        let before = senders.len();
        let mut alive = Vec::with_capacity(before);
        for sender in senders.drain(..) {
            if sender.send(value.clone()).await.is_ok() {
                alive.push(sender);
            }
        }
        if alive.len() != before {
            debug!(dropped = before - alive.len(), "Pruned closed subscribers");
        }
        *senders = alive;
    }

    #[cfg(test)]
    pub(crate) async fn subscribers(&self) -> usize {
        self.senders.lock().await.len()
    }
}
