use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::oneshot;
use tracing::{debug, info_span, warn, Instrument};

use crate::inner::error::{CentralError, CentralResult};
use crate::inner::metrics::CALLBACKS_PANICKED;

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A single tokio task owning `S`; jobs run one at a time in the order they were queued.
///
/// Submitting never blocks: the queue is unbounded and the caller returns as soon as the
/// job is enqueued. The task ends once every handle is dropped.
pub(crate) struct SerialExecutor<S> {
    name: &'static str,
    sender: kanal::AsyncSender<Job<S>>,
}

impl<S> Clone for SerialExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<S> SerialExecutor<S>
where
    S: Send + 'static,
{
    pub(crate) fn spawn(name: &'static str, mut state: S) -> Self {
        let (sender, receiver) = kanal::unbounded_async::<Job<S>>();
        let span = info_span!(parent: None, "executor", executor = name);

        tokio::spawn(
            async move {
                while let Ok(job) = receiver.recv().await {
                    job(&mut state);
                }
                debug!("Executor queue closed");
            }
            .instrument(span),
        );

        Self { name, sender }
    }

    pub(crate) fn execute(&self, job: impl FnOnce(&mut S) + Send + 'static) -> CentralResult<()> {
        match self.sender.try_send(Box::new(job)) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => {
                warn!(executor = self.name, "Failed to enqueue job");
                Err(CentralError::ExecutorClosed(self.name))
            }
        }
    }

    /// Runs `job` on the executor and waits for its result.
    pub(crate) async fn query<R>(&self, job: impl FnOnce(&mut S) -> R + Send + 'static) -> CentralResult<R>
    where
        R: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.execute(move |state| {
            let _ = reply.send(job(state));
        })?;
        result.await.map_err(|_| CentralError::ExecutorClosed(self.name))
    }
}

/// Runs caller-supplied continuations off the internal executors.
pub(crate) type CallbackExecutor = SerialExecutor<()>;

impl CallbackExecutor {
    pub(crate) fn callbacks() -> Self {
        SerialExecutor::spawn("callback", ())
    }

    /// A panicking callback is logged and does not take the executor down with it.
    pub(crate) fn invoke(&self, callback: impl FnOnce() + Send + 'static) {
        // a closed executor is already logged by `execute`
        let _ = self.execute(move |_| {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                CALLBACKS_PANICKED.increment(vec![]);
                warn!("Callback panicked");
            }
        });
    }
}
