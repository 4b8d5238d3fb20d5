use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::inner::model::advertisement::Advertisement;
use crate::inner::model::fqcn::Fqcn;
use crate::inner::model::peripheral_id::PeripheralId;

mod continuation;

pub(crate) use continuation::{Abruption, Continuation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RequestId(pub(crate) u64);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum RequestKind {
    Scan,
    Connect,
    Disconnect,
    CancelConnect,
    ServiceDiscovering,
    CharacteristicDiscovering,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestState {
    Pending,
    Resolved,
    TimedOut,
}

/// What a request asks the radio for, with the fields that make up its identity.
pub(crate) enum Operation {
    Scan {
        services: Option<BTreeSet<Uuid>>,
        available: Vec<Advertisement>,
    },
    Connect {
        peripheral: PeripheralId,
        abruption: Option<Abruption>,
    },
    Disconnect {
        peripheral: PeripheralId,
    },
    CancelConnect {
        peripheral: PeripheralId,
    },
    ServiceDiscovering {
        peripheral: PeripheralId,
        services: Option<BTreeSet<Uuid>>,
    },
    CharacteristicDiscovering {
        peripheral: PeripheralId,
        service: Uuid,
        characteristics: Option<BTreeSet<Uuid>>,
    },
    Read {
        characteristic: Fqcn,
    },
}

impl Operation {
    pub(crate) fn scan(services: Option<impl IntoIterator<Item = Uuid>>) -> Self {
        Operation::Scan {
            services: services.map(|uuids| uuids.into_iter().collect()),
            available: vec![],
        }
    }

    pub(crate) fn kind(&self) -> RequestKind {
        match self {
            Operation::Scan { .. } => RequestKind::Scan,
            Operation::Connect { .. } => RequestKind::Connect,
            Operation::Disconnect { .. } => RequestKind::Disconnect,
            Operation::CancelConnect { .. } => RequestKind::CancelConnect,
            Operation::ServiceDiscovering { .. } => RequestKind::ServiceDiscovering,
            Operation::CharacteristicDiscovering { .. } => RequestKind::CharacteristicDiscovering,
            Operation::Read { .. } => RequestKind::Read,
        }
    }

    pub(crate) fn peripheral(&self) -> Option<&PeripheralId> {
        match self {
            Operation::Scan { .. } => None,
            Operation::Connect { peripheral, .. }
            | Operation::Disconnect { peripheral }
            | Operation::CancelConnect { peripheral }
            | Operation::ServiceDiscovering { peripheral, .. }
            | Operation::CharacteristicDiscovering { peripheral, .. } => Some(peripheral),
            Operation::Read { characteristic } => Some(&characteristic.peripheral),
        }
    }

    pub(crate) fn key(&self) -> RequestKey {
        match self {
            Operation::Scan { services, .. } => RequestKey::Scan(services.clone()),
            Operation::Connect { peripheral, .. }
            | Operation::Disconnect { peripheral }
            | Operation::CancelConnect { peripheral } => RequestKey::Peripheral(peripheral.clone()),
            Operation::ServiceDiscovering { peripheral, services } => {
                RequestKey::Services(peripheral.clone(), services.clone())
            }
            Operation::CharacteristicDiscovering {
                peripheral,
                service,
                characteristics,
            } => RequestKey::Characteristics(peripheral.clone(), *service, characteristics.clone()),
            Operation::Read { characteristic } => RequestKey::Read(characteristic.clone()),
        }
    }
}

/// Content-based identity of a request within the registry of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RequestKey {
    Scan(Option<BTreeSet<Uuid>>),
    Peripheral(PeripheralId),
    Services(PeripheralId, Option<BTreeSet<Uuid>>),
    Characteristics(PeripheralId, Uuid, Option<BTreeSet<Uuid>>),
    Read(Fqcn),
}

fn join_uuids(uuids: &Option<BTreeSet<Uuid>>) -> String {
    match uuids {
        None => "*".to_string(),
        Some(uuids) => uuids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(","),
    }
}

impl Display for RequestKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKey::Scan(services) => write!(f, "[{}]", join_uuids(services)),
            RequestKey::Peripheral(peripheral) => write!(f, "{peripheral}"),
            RequestKey::Services(peripheral, services) => write!(f, "{peripheral}[{}]", join_uuids(services)),
            RequestKey::Characteristics(peripheral, service, characteristics) => {
                write!(f, "{peripheral}::{service}[{}]", join_uuids(characteristics))
            }
            RequestKey::Read(fqcn) => write!(f, "{fqcn}"),
        }
    }
}

pub(crate) struct Request {
    pub(crate) id: RequestId,
    pub(crate) operation: Operation,
    pub(crate) timeout: Duration,
    pub(crate) created_at: Instant,
    state: RequestState,
    continuation: Option<Continuation>,
}

impl Request {
    pub(crate) fn new(id: RequestId, operation: Operation, continuation: Continuation, timeout: Duration) -> Self {
        Self {
            id,
            operation,
            timeout,
            created_at: Instant::now(),
            state: RequestState::Pending,
            continuation: Some(continuation),
        }
    }

    pub(crate) fn kind(&self) -> RequestKind {
        self.operation.kind()
    }

    pub(crate) fn key(&self) -> RequestKey {
        self.operation.key()
    }

    pub(crate) fn peripheral(&self) -> Option<&PeripheralId> {
        self.operation.peripheral()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> RequestState {
        self.state
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state == RequestState::Pending
    }

    /// Moves a pending request into `next` and hands its continuation out.
    ///
    /// Returns `None` when the request already left `Pending`; the continuation can only
    /// be taken once.
    pub(crate) fn transition(&mut self, next: RequestState) -> Option<Continuation> {
        if self.state != RequestState::Pending || next == RequestState::Pending {
            return None;
        }
        self.state = next;
        self.continuation.take()
    }

    pub(crate) fn take_abruption(&mut self) -> Option<Abruption> {
        match &mut self.operation {
            Operation::Connect { abruption, .. } => abruption.take(),
            _ => None,
        }
    }

    pub(crate) fn take_advertisements(&mut self) -> Vec<Advertisement> {
        match &mut self.operation {
            Operation::Scan { available, .. } => std::mem::take(available),
            _ => vec![],
        }
    }

    /// Accepts the advertisement when this is a scan whose filter is absent or overlaps.
    pub(crate) fn offer(&mut self, advertisement: &Advertisement) -> bool {
        let Operation::Scan { services, available } = &mut self.operation else {
            return false;
        };
        let accepted = match services {
            None => true,
            Some(filter) => advertisement.data.overlaps(filter),
        };
        if accepted && !available.contains(advertisement) {
            available.push(advertisement.clone());
        }
        accepted
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}{}", self.kind(), self.key(), self.id)
    }
}
