use std::collections::{BTreeMap, BTreeSet, HashMap};

use metrics::Label;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::inner::error::{CentralError, CentralResult};
use crate::inner::executor::{CallbackExecutor, SerialExecutor};
use crate::inner::metrics::{REQUESTS_ISSUED, REQUESTS_REJECTED, REQUESTS_RESOLVED, REQUESTS_TIMED_OUT, REQUEST_DURATION};
use crate::inner::model::advertisement::Advertisement;
use crate::inner::model::response::Response;
use crate::inner::request::{Continuation, Operation, Request, RequestId, RequestKey, RequestKind, RequestState};

/// Handle to the executor that owns every pending request.
pub(crate) type RequestRegistry = SerialExecutor<Registries>;

/// Pending requests of a single kind: a key index plus registration order.
#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<RequestId, Request>,
    keys: HashMap<RequestKey, RequestId>,
}

impl Registry {
    /// Gives the request back when another one with the same key is pending.
    pub(crate) fn insert(&mut self, request: Request) -> Result<RequestId, Request> {
        let key = request.key();
        if self.keys.contains_key(&key) {
            return Err(request);
        }
        let id = request.id;
        self.keys.insert(key, id);
        self.entries.insert(id, request);
        Ok(id)
    }

    pub(crate) fn find(&self, predicate: impl Fn(&Request) -> bool) -> Option<&Request> {
        self.entries.values().find(|request| predicate(request))
    }

    pub(crate) fn get(&self, id: RequestId) -> Option<&Request> {
        self.entries.get(&id)
    }

    pub(crate) fn remove(&mut self, id: RequestId) -> Option<Request> {
        let request = self.entries.remove(&id)?;
        self.keys.remove(&request.key());
        Some(request)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn pending_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.entries.values_mut().filter(|request| request.is_pending())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// Already resolved or never registered.
    Absent,
    TimedOut,
    /// The scan window closed; `remaining` scans are still pending.
    ScanCompleted { remaining: usize },
}

pub(crate) struct Registries {
    by_kind: HashMap<RequestKind, Registry>,
    callbacks: CallbackExecutor,
}

fn kind_label(kind: RequestKind) -> Label {
    let name: &'static str = kind.into();
    Label::new("kind", name)
}

impl Registries {
    pub(crate) fn new(callbacks: CallbackExecutor) -> Self {
        Self {
            by_kind: RequestKind::iter().map(|kind| (kind, Registry::default())).collect(),
            callbacks,
        }
    }

    pub(crate) fn registry(&mut self, kind: RequestKind) -> &mut Registry {
        self.by_kind.entry(kind).or_default()
    }

    pub(crate) fn len(&self, kind: RequestKind) -> usize {
        self.by_kind.get(&kind).map(Registry::len).unwrap_or(0)
    }

    pub(crate) fn is_empty(&self, kind: RequestKind) -> bool {
        self.by_kind.get(&kind).map(Registry::is_empty).unwrap_or(true)
    }

    /// Inserts the request, or rejects it with `Conflict` when its key is taken.
    pub(crate) fn register(&mut self, request: Request) -> Option<RequestId> {
        let kind = request.kind();
        match self.registry(kind).insert(request) {
            Ok(id) => {
                debug!(%kind, %id, "Registered request");
                REQUESTS_ISSUED.increment(vec![kind_label(kind)]);
                Some(id)
            }
            Err(mut rejected) => {
                let key = rejected.key().to_string();
                warn!(%kind, %key, "Rejected request: the same key is already pending");
                REQUESTS_REJECTED.increment(vec![kind_label(kind)]);
                if let Some(continuation) = rejected.transition(RequestState::Resolved) {
                    self.deliver(continuation, Err(CentralError::Conflict { kind, key }));
                }
                None
            }
        }
    }

    /// Resolves the first pending request of `kind` accepted by `predicate`.
    pub(crate) fn settle(
        &mut self,
        kind: RequestKind,
        predicate: impl Fn(&Request) -> bool,
        outcome: CentralResult<Option<Response>>,
    ) -> Option<Request> {
        self.settle_then(kind, predicate, outcome, |_| {})
    }

    /// Like [`Registries::settle`], with `prepare` running on the removed request before the
    /// continuation is queued.
    pub(crate) fn settle_then(
        &mut self,
        kind: RequestKind,
        predicate: impl Fn(&Request) -> bool,
        outcome: CentralResult<Option<Response>>,
        prepare: impl FnOnce(&mut Request),
    ) -> Option<Request> {
        let registry = self.registry(kind);
        let id = registry.find(|request| request.is_pending() && predicate(request))?.id;
        let mut request = registry.remove(id)?;
        let continuation = request.transition(RequestState::Resolved)?;

        REQUESTS_RESOLVED.increment(vec![kind_label(kind), Label::new("outcome", outcome_name(&outcome))]);
        REQUEST_DURATION.histogram(request.created_at.elapsed().as_millis() as f64, vec![kind_label(kind)]);
        debug!(%request, "Resolved request");

        prepare(&mut request);
        self.deliver(continuation, outcome);
        Some(request)
    }

    /// Deadline of request `id`; a no-op when the request has already been resolved.
    pub(crate) fn expire(&mut self, kind: RequestKind, id: RequestId) -> Expiry {
        let registry = self.registry(kind);
        if !registry.get(id).is_some_and(Request::is_pending) {
            return Expiry::Absent;
        }
        let Some(mut request) = registry.remove(id) else {
            return Expiry::Absent;
        };

        if kind == RequestKind::Scan {
            let Some(continuation) = request.transition(RequestState::Resolved) else {
                return Expiry::Absent;
            };
            let available = request.take_advertisements();
            info!(%request, found = available.len(), "Scan window closed");
            REQUESTS_RESOLVED.increment(vec![kind_label(kind), Label::new("outcome", "success")]);
            self.deliver(continuation, Ok(Some(Response::Advertisements(available))));
            return Expiry::ScanCompleted {
                remaining: self.len(RequestKind::Scan),
            };
        }

        let Some(continuation) = request.transition(RequestState::TimedOut) else {
            return Expiry::Absent;
        };
        warn!(%request, timeout = ?request.timeout, "Request timed out");
        REQUESTS_TIMED_OUT.increment(vec![kind_label(kind)]);
        self.deliver(
            continuation,
            Err(CentralError::TimedOut {
                kind,
                timeout: request.timeout,
            }),
        );
        Expiry::TimedOut
    }

    /// Hands the advertisement to the first pending scan (registration order) that accepts it.
    pub(crate) fn route_advertisement(&mut self, advertisement: &Advertisement) -> Option<RequestId> {
        self.registry(RequestKind::Scan)
            .pending_mut()
            .find_map(|request| request.offer(advertisement).then_some(request.id))
    }

    /// Union of the pending scan filters; `None` once any pending scan is unfiltered.
    pub(crate) fn scan_filter(&self) -> Option<BTreeSet<Uuid>> {
        let registry = self.by_kind.get(&RequestKind::Scan)?;
        let mut union = BTreeSet::new();
        for request in registry.entries.values() {
            match &request.operation {
                Operation::Scan { services: None, .. } => return None,
                Operation::Scan {
                    services: Some(services),
                    ..
                } => union.extend(services.iter().copied()),
                _ => {}
            }
        }
        Some(union)
    }

    fn deliver(&self, continuation: Continuation, outcome: CentralResult<Option<Response>>) {
        self.callbacks.invoke(move || continuation.resolve(outcome));
    }
}

fn outcome_name(outcome: &CentralResult<Option<Response>>) -> &'static str {
    match outcome {
        Ok(_) => "success",
        Err(_) => "failure",
    }
}
