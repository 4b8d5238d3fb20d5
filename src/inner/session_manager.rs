use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::inner::executor::SerialExecutor;
use crate::inner::metrics::ACTIVE_SESSIONS;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::request::Abruption;

/// An established connection to one peripheral.
pub(crate) struct Session {
    pub(crate) peripheral: PeripheralId,
    pub(crate) abruption: Option<Abruption>,
    pub(crate) established_at: DateTime<Utc>,
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peripheral", &self.peripheral)
            .field("abruption", &self.abruption.is_some())
            .field("established_at", &self.established_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionInfo {
    pub(crate) peripheral: PeripheralId,
    pub(crate) established_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            peripheral: session.peripheral.clone(),
            established_at: session.established_at,
        }
    }
}

#[derive(Default)]
pub(crate) struct Sessions {
    sessions: HashMap<PeripheralId, Session>,
}

impl Sessions {
    /// Keeps an existing session untouched and returns `false`.
    pub(crate) fn create(&mut self, peripheral: PeripheralId, abruption: Option<Abruption>) -> bool {
        if self.sessions.contains_key(&peripheral) {
            warn!(%peripheral, "Session already exists");
            return false;
        }
        info!(%peripheral, "Session established");
        self.sessions.insert(
            peripheral.clone(),
            Session {
                peripheral,
                abruption,
                established_at: Utc::now(),
            },
        );
        self.report();
        true
    }

    pub(crate) fn find(&self, peripheral: &PeripheralId) -> Option<SessionInfo> {
        self.sessions.get(peripheral).map(SessionInfo::from)
    }

    pub(crate) fn destroy(&mut self, peripheral: &PeripheralId) -> Option<Session> {
        let session = self.sessions.remove(peripheral)?;
        info!(%peripheral, "Session closed");
        self.report();
        Some(session)
    }

    pub(crate) fn connected(&self) -> Vec<PeripheralId> {
        let mut peripherals: Vec<_> = self.sessions.keys().cloned().collect();
        peripherals.sort_unstable();
        peripherals
    }

    fn report(&self) {
        ACTIVE_SESSIONS.gauge(self.sessions.len() as f64, vec![]);
    }
}

pub(crate) type SessionManager = SerialExecutor<Sessions>;

impl SessionManager {
    pub(crate) fn sessions() -> Self {
        SerialExecutor::spawn("session", Sessions::default())
    }
}
