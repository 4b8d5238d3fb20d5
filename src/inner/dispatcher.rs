use std::sync::Arc;

use kanal::AsyncReceiver;
use metrics::Label;
use tracing::{debug, info, warn};

use crate::inner::availability::{AvailabilityCache, Capture};
use crate::inner::error::{CentralError, CentralResult, NativeError};
use crate::inner::executor::CallbackExecutor;
use crate::inner::metrics::{EVENTS_DISPATCHED, EVENTS_UNMATCHED, SESSIONS_ABRUPTED};
use crate::inner::model::advertisement::{Advertisement, AdvertisementData};
use crate::inner::model::central_notification::CentralNotification;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::radio_event::RadioEvent;
use crate::inner::model::response::Response;
use crate::inner::publish::FanOutSender;
use crate::inner::registry::RequestRegistry;
use crate::inner::request::{Request, RequestId, RequestKey, RequestKind};
use crate::inner::session_manager::SessionManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Published on the notification channel only.
    Broadcast,
    /// A peripheral that is already known or that no device class accepts.
    Ignored,
    /// A new peripheral, with the scan it was routed to.
    Captured(Option<RequestId>),
    Resolved(RequestKind),
    Abrupted,
}

/// Correlates every radio event with exactly one pending request or session.
#[derive(Clone)]
pub(crate) struct EventDispatcher {
    pub(crate) registry: RequestRegistry,
    pub(crate) sessions: SessionManager,
    pub(crate) availability: AvailabilityCache,
    pub(crate) callbacks: CallbackExecutor,
    pub(crate) notifications: Arc<FanOutSender<CentralNotification>>,
}

impl EventDispatcher {
    #[tracing::instrument(level = "debug", skip_all, fields(event = event.name(), peripheral = ?event.peripheral()))]
    pub(crate) async fn dispatch(&self, event: RadioEvent) -> CentralResult<DispatchOutcome> {
        let name = event.name();
        EVENTS_DISPATCHED.increment(vec![Label::new("event", name)]);

        match event {
            RadioEvent::StateChanged(state) => {
                info!(%state, "Radio state changed");
                self.notifications.send(CentralNotification::StateChanged(state)).await;
                Ok(DispatchOutcome::Broadcast)
            }
            RadioEvent::PeripheralDiscovered { peripheral, data, rssi } => {
                self.discovered(peripheral, data, rssi).await
            }
            RadioEvent::Connected(peripheral) => {
                let sessions = self.sessions.clone();
                let established = peripheral.clone();
                let predicate = targeting(&peripheral);
                // the session exists before the caller hears about the connection
                let settled = self
                    .registry
                    .query(move |registries| {
                        registries.settle_then(RequestKind::Connect, predicate, Ok(None), |request| {
                            let abruption = request.take_abruption();
                            let _ = sessions.execute(move |sessions| {
                                sessions.create(established, abruption);
                            });
                        })
                    })
                    .await?;
                match settled {
                    Some(_) => Ok(DispatchOutcome::Resolved(RequestKind::Connect)),
                    None => self.unmatched(name, peripheral).await,
                }
            }
            RadioEvent::ConnectFailed { peripheral, error } => {
                warn!(%peripheral, %error, "Connection failed");
                let outcome = Err(CentralError::Native(error));
                match self.settle(RequestKind::Connect, targeting(&peripheral), outcome).await? {
                    Some(_) => Ok(DispatchOutcome::Resolved(RequestKind::Connect)),
                    None => self.unmatched(name, peripheral).await,
                }
            }
            RadioEvent::Disconnected {
                peripheral,
                error: Some(error),
            } => self.abrupted(name, peripheral, error).await,
            RadioEvent::Disconnected { peripheral, error: None } => self.disconnected(name, peripheral).await,
            RadioEvent::ServicesDiscovered {
                peripheral,
                filter,
                result,
            } => {
                let key = RequestKey::Services(peripheral.clone(), filter);
                let outcome = result.map(|services| Some(Response::Services(services)));
                self.resolve_keyed(RequestKind::ServiceDiscovering, key, outcome, name, peripheral)
                    .await
            }
            RadioEvent::CharacteristicsDiscovered {
                peripheral,
                service,
                filter,
                result,
            } => {
                let key = RequestKey::Characteristics(peripheral.clone(), service, filter);
                let outcome = result.map(|characteristics| Some(Response::Characteristics(characteristics)));
                self.resolve_keyed(RequestKind::CharacteristicDiscovering, key, outcome, name, peripheral)
                    .await
            }
            RadioEvent::ValueRead { characteristic, result } => {
                let peripheral = characteristic.peripheral.clone();
                let key = RequestKey::Read(characteristic);
                let outcome = result.map(|value| Some(Response::Value(value)));
                self.resolve_keyed(RequestKind::Read, key, outcome, name, peripheral).await
            }
        }
    }

    /// Drains the radio event channel until every sender is gone.
    pub(crate) async fn dispatch_all(self, receiver: AsyncReceiver<RadioEvent>) -> CentralResult<()> {
        while let Ok(event) = receiver.recv().await {
            match self.dispatch(event).await {
                Ok(outcome) => debug!(?outcome, "Dispatched radio event"),
                Err(CentralError::Unmatched { .. }) => {}
                Err(error @ CentralError::ExecutorClosed(_)) => return Err(error),
                Err(error) => warn!(%error, "Failed to dispatch radio event"),
            }
        }

        Err(CentralError::EndOfStream)
    }

    async fn discovered(
        &self,
        peripheral: PeripheralId,
        data: AdvertisementData,
        rssi: Option<i16>,
    ) -> CentralResult<DispatchOutcome> {
        let capture = {
            let peripheral = peripheral.clone();
            let data = data.clone();
            self.availability
                .query(move |cache| cache.capture(&peripheral, &data))
                .await?
        };

        match capture {
            Capture::Known | Capture::Rejected => Ok(DispatchOutcome::Ignored),
            Capture::Captured(device) => {
                let advertisement = Advertisement::new(peripheral, data, rssi);
                info!(%device, %advertisement, "Discovered peripheral");
                let routed = self
                    .registry
                    .query(move |registries| registries.route_advertisement(&advertisement))
                    .await?;
                Ok(DispatchOutcome::Captured(routed))
            }
        }
    }

    /// Destroys the session and hands the error to its abruption handler. Pending planned
    /// disconnections of the same peripheral are left to their deadlines.
    async fn abrupted(
        &self,
        name: &'static str,
        peripheral: PeripheralId,
        error: NativeError,
    ) -> CentralResult<DispatchOutcome> {
        let session = {
            let peripheral = peripheral.clone();
            self.sessions.query(move |sessions| sessions.destroy(&peripheral)).await?
        };
        let Some(session) = session else {
            return self.unmatched(name, peripheral).await;
        };

        warn!(%peripheral, %error, "Session abrupted");
        SESSIONS_ABRUPTED.increment(vec![]);
        if let Some(abruption) = session.abruption {
            self.callbacks.invoke(move || abruption(CentralError::Native(error)));
        }
        self.notifications
            .send(CentralNotification::SessionAbrupted(peripheral))
            .await;
        Ok(DispatchOutcome::Abrupted)
    }

    async fn disconnected(&self, name: &'static str, peripheral: PeripheralId) -> CentralResult<DispatchOutcome> {
        {
            let peripheral = peripheral.clone();
            self.sessions.execute(move |sessions| {
                sessions.destroy(&peripheral);
            })?;
        }

        for kind in [RequestKind::Disconnect, RequestKind::CancelConnect] {
            if self.settle(kind, targeting(&peripheral), Ok(None)).await?.is_some() {
                return Ok(DispatchOutcome::Resolved(kind));
            }
        }
        self.unmatched(name, peripheral).await
    }

    async fn resolve_keyed(
        &self,
        kind: RequestKind,
        key: RequestKey,
        outcome: Result<Option<Response>, NativeError>,
        name: &'static str,
        peripheral: PeripheralId,
    ) -> CentralResult<DispatchOutcome> {
        let outcome = outcome.map_err(CentralError::Native);
        let settled = self.settle(kind, move |request| request.key() == key, outcome).await?;
        match settled {
            Some(_) => Ok(DispatchOutcome::Resolved(kind)),
            None => self.unmatched(name, peripheral).await,
        }
    }

    async fn settle(
        &self,
        kind: RequestKind,
        predicate: impl Fn(&Request) -> bool + Send + 'static,
        outcome: CentralResult<Option<Response>>,
    ) -> CentralResult<Option<Request>> {
        self.registry
            .query(move |registries| registries.settle(kind, predicate, outcome))
            .await
    }

    async fn unmatched(&self, event: &'static str, peripheral: PeripheralId) -> CentralResult<DispatchOutcome> {
        warn!(event, %peripheral, "No pending request for radio event");
        EVENTS_UNMATCHED.increment(vec![Label::new("event", event)]);
        self.notifications
            .send(CentralNotification::Unmatched {
                event,
                peripheral: peripheral.clone(),
            })
            .await;
        Err(CentralError::Unmatched { event, peripheral })
    }
}

fn targeting(peripheral: &PeripheralId) -> impl Fn(&Request) -> bool + Send + 'static {
    let peripheral = peripheral.clone();
    move |request| request.peripheral() == Some(&peripheral)
}
