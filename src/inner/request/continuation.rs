use tokio::sync::oneshot;

use crate::inner::error::{CentralError, CentralResult};
use crate::inner::model::response::Response;

pub(crate) type Success = Box<dyn FnOnce(Option<Response>) + Send>;
pub(crate) type Failure = Box<dyn FnOnce(CentralError) + Send>;

/// Invoked with the error of an abrupt disconnection of an established session.
pub(crate) type Abruption = Box<dyn FnOnce(CentralError) + Send>;

/// The caller's completion path. Consumed by [`Continuation::resolve`], so it runs at most once.
#[derive(Default)]
pub(crate) struct Continuation {
    success: Option<Success>,
    failure: Option<Failure>,
    reply: Option<oneshot::Sender<CentralResult<Option<Response>>>>,
}

impl Continuation {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on_success(mut self, success: impl FnOnce(Option<Response>) + Send + 'static) -> Self {
        self.success = Some(Box::new(success));
        self
    }

    pub(crate) fn on_failure(mut self, failure: impl FnOnce(CentralError) + Send + 'static) -> Self {
        self.failure = Some(Box::new(failure));
        self
    }

    /// A continuation that forwards its outcome into a oneshot channel.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<CentralResult<Option<Response>>>) {
        let (sender, receiver) = oneshot::channel();
        let continuation = Self {
            reply: Some(sender),
            ..Default::default()
        };
        (continuation, receiver)
    }

    pub(crate) fn resolve(self, outcome: CentralResult<Option<Response>>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(outcome);
            return;
        }
        match outcome {
            Ok(response) => {
                if let Some(success) = self.success {
                    success(response);
                }
            }
            Err(error) => {
                if let Some(failure) = self.failure {
                    failure(error);
                }
            }
        }
    }
}
