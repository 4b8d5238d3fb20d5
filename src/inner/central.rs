use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kanal::AsyncReceiver;
use tracing::warn;
use uuid::Uuid;

use crate::inner::availability::AvailabilityCache;
use crate::inner::conf::dto::central_configuration::CentralConfigurationDto;
use crate::inner::device::factory::PeripheralFactory;
use crate::inner::device::DeviceHandle;
use crate::inner::dispatcher::EventDispatcher;
use crate::inner::error::{CentralError, CentralResult};
use crate::inner::executor::CallbackExecutor;
use crate::inner::model::central_notification::CentralNotification;
use crate::inner::model::fqcn::Fqcn;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::response::Response;
use crate::inner::publish::FanOutSender;
use crate::inner::radio::{AvailabilityGate, CommandExecutor, RadioCommand, RadioStack};
use crate::inner::registry::{Registries, RequestRegistry};
use crate::inner::request::{Abruption, Continuation, Operation, Request, RequestId, RequestKind};
use crate::inner::session_manager::{SessionInfo, SessionManager};
use crate::inner::timeout_supervisor::TimeoutSupervisor;

/// What to send to the radio once the request is registered.
enum Issue {
    /// Restart scanning with the filters of every pending scan.
    Scan,
    Command(RadioCommand),
}

/// Caller-facing entry point. Every operation returns as soon as its request is queued;
/// the outcome arrives through the continuation.
pub(crate) struct Central {
    gate: Arc<dyn AvailabilityGate>,
    registry: RequestRegistry,
    commands: CommandExecutor,
    supervisor: TimeoutSupervisor,
    sessions: SessionManager,
    availability: AvailabilityCache,
    notifications: Arc<FanOutSender<CentralNotification>>,
    configuration: Arc<CentralConfigurationDto>,
    next_id: AtomicU64,
}

impl Central {
    /// Spawns the engine executors; must be called within a tokio runtime.
    pub(crate) fn new<R>(radio: Arc<R>, configuration: Arc<CentralConfigurationDto>) -> (Self, EventDispatcher)
    where
        R: RadioStack + AvailabilityGate + 'static,
    {
        let stack: Arc<dyn RadioStack> = radio.clone();
        let gate: Arc<dyn AvailabilityGate> = radio;

        let callbacks = CallbackExecutor::callbacks();
        let registry = RequestRegistry::spawn("registry", Registries::new(callbacks.clone()));
        let commands = CommandExecutor::commands(stack);
        let supervisor = TimeoutSupervisor::new(commands.clone(), registry.clone());
        let sessions = SessionManager::sessions();
        let availability = AvailabilityCache::availability(PeripheralFactory::from_classes(&configuration.device_classes));
        let notifications = Arc::new(FanOutSender::default());

        let dispatcher = EventDispatcher {
            registry: registry.clone(),
            sessions: sessions.clone(),
            availability: availability.clone(),
            callbacks,
            notifications: notifications.clone(),
        };

        let central = Self {
            gate,
            registry,
            commands,
            supervisor,
            sessions,
            availability,
            notifications,
            configuration,
            next_id: AtomicU64::new(1),
        };
        (central, dispatcher)
    }

    /// Collects advertisements for `duration`; the scan window closing is the success path.
    #[tracing::instrument(level = "info", skip(self, continuation))]
    pub(crate) fn scan(&self, services: Option<Vec<Uuid>>, duration: Option<Duration>, continuation: Continuation) {
        self.submit(Operation::scan(services), Issue::Scan, duration, continuation);
    }

    #[tracing::instrument(level = "info", skip_all, fields(peripheral = %peripheral))]
    pub(crate) fn connect(
        &self,
        peripheral: PeripheralId,
        abruption: Option<Abruption>,
        timeout: Option<Duration>,
        continuation: Continuation,
    ) {
        let command = RadioCommand::Connect(peripheral.clone());
        self.submit(
            Operation::Connect { peripheral, abruption },
            Issue::Command(command),
            timeout,
            continuation,
        );
    }

    #[tracing::instrument(level = "info", skip_all, fields(peripheral = %peripheral))]
    pub(crate) fn disconnect(&self, peripheral: PeripheralId, timeout: Option<Duration>, continuation: Continuation) {
        let command = RadioCommand::Disconnect(peripheral.clone());
        self.submit(Operation::Disconnect { peripheral }, Issue::Command(command), timeout, continuation);
    }

    /// Races an in-flight connection; resolved only by a disconnection without an error.
    #[tracing::instrument(level = "info", skip_all, fields(peripheral = %peripheral))]
    pub(crate) fn cancel_connect(&self, peripheral: PeripheralId, timeout: Option<Duration>, continuation: Continuation) {
        let command = RadioCommand::CancelConnect(peripheral.clone());
        self.submit(
            Operation::CancelConnect { peripheral },
            Issue::Command(command),
            timeout,
            continuation,
        );
    }

    #[tracing::instrument(level = "info", skip_all, fields(peripheral = %peripheral))]
    pub(crate) fn discover_services(
        &self,
        peripheral: PeripheralId,
        services: Option<Vec<Uuid>>,
        timeout: Option<Duration>,
        continuation: Continuation,
    ) {
        let services: Option<BTreeSet<Uuid>> = services.map(|services| services.into_iter().collect());
        let command = RadioCommand::DiscoverServices {
            peripheral: peripheral.clone(),
            services: services.clone(),
        };
        self.submit(
            Operation::ServiceDiscovering { peripheral, services },
            Issue::Command(command),
            timeout,
            continuation,
        );
    }

    #[tracing::instrument(level = "info", skip_all, fields(peripheral = %peripheral))]
    pub(crate) fn discover_characteristics(
        &self,
        peripheral: PeripheralId,
        service: Uuid,
        characteristics: Option<Vec<Uuid>>,
        timeout: Option<Duration>,
        continuation: Continuation,
    ) {
        let characteristics: Option<BTreeSet<Uuid>> =
            characteristics.map(|characteristics| characteristics.into_iter().collect());
        let command = RadioCommand::DiscoverCharacteristics {
            peripheral: peripheral.clone(),
            service,
            characteristics: characteristics.clone(),
        };
        self.submit(
            Operation::CharacteristicDiscovering {
                peripheral,
                service,
                characteristics,
            },
            Issue::Command(command),
            timeout,
            continuation,
        );
    }

    #[tracing::instrument(level = "info", skip_all, fields(characteristic = %characteristic))]
    pub(crate) fn read(&self, characteristic: Fqcn, timeout: Option<Duration>, continuation: Continuation) {
        let command = RadioCommand::Read(characteristic.clone());
        self.submit(Operation::Read { characteristic }, Issue::Command(command), timeout, continuation);
    }

    /// Runs `operation` with a continuation that resolves the returned future.
    ///
    /// ```ignore
    /// let value = central.wait_for(|central, continuation| central.read(fqcn, None, continuation)).await?;
    /// ```
    pub(crate) async fn wait_for(
        &self,
        operation: impl FnOnce(&Self, Continuation),
    ) -> CentralResult<Option<Response>> {
        let (continuation, outcome) = Continuation::channel();
        operation(self, continuation);
        outcome.await.map_err(|_| CentralError::ExecutorClosed("callback"))?
    }

    pub(crate) async fn subscribe(&self) -> AsyncReceiver<CentralNotification> {
        self.notifications.subscribe().await
    }

    pub(crate) async fn device(&self, peripheral: &PeripheralId) -> CentralResult<Option<Arc<dyn DeviceHandle>>> {
        let peripheral = peripheral.clone();
        self.availability.query(move |cache| cache.device(&peripheral)).await
    }

    pub(crate) async fn devices(&self) -> CentralResult<Vec<Arc<dyn DeviceHandle>>> {
        self.availability.query(|cache| cache.devices()).await
    }

    pub(crate) async fn session(&self, peripheral: &PeripheralId) -> CentralResult<Option<SessionInfo>> {
        let peripheral = peripheral.clone();
        self.sessions.query(move |sessions| sessions.find(&peripheral)).await
    }

    pub(crate) async fn connected_peripherals(&self) -> CentralResult<Vec<PeripheralId>> {
        self.sessions.query(|sessions| sessions.connected()).await
    }

    pub(crate) async fn pending(&self, kind: RequestKind) -> CentralResult<usize> {
        self.registry.query(move |registries| registries.len(kind)).await
    }

    fn submit(&self, operation: Operation, issue: Issue, timeout: Option<Duration>, continuation: Continuation) {
        let kind = operation.kind();
        if let Err(error) = self.gate.assert_availability() {
            warn!(%kind, %error, "Refusing request");
            continuation.resolve(Err(error));
            return;
        }

        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let timeout = timeout.unwrap_or_else(|| self.configuration.timeout(kind));
        let request = Request::new(id, operation, continuation, timeout);
        let commands = self.commands.clone();
        let supervisor = self.supervisor.clone();

        let _ = self.registry.execute(move |registries| {
            let Some(id) = registries.register(request) else {
                return;
            };
            let command = match issue {
                Issue::Scan => RadioCommand::StartScan(registries.scan_filter()),
                Issue::Command(command) => command,
            };
            let _ = commands.issue(command);
            supervisor.arm(kind, id, timeout);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::time::{sleep, Instant};

    use super::*;
    use crate::inner::conf::dto::central_configuration::DeviceClassDto;
    use crate::inner::conf::filter::Filter;
    use crate::inner::dispatcher::DispatchOutcome;
    use crate::inner::error::NativeError;
    use crate::inner::model::advertisement::AdvertisementData;
    use crate::inner::model::radio_event::RadioEvent;
    use crate::inner::model::radio_state::RadioState;
    use crate::inner::radio::testing::MockRadio;

    fn central(radio: &Arc<MockRadio>) -> (Central, EventDispatcher) {
        Central::new(radio.clone(), Arc::new(CentralConfigurationDto::default()))
    }

    fn discovered(peripheral: &str, name: &str, services: &[Uuid]) -> RadioEvent {
        RadioEvent::PeripheralDiscovered {
            peripheral: peripheral.into(),
            data: AdvertisementData {
                local_name: Some(name.to_string()),
                services: services.to_vec(),
                ..Default::default()
            },
            rssi: Some(-60),
        }
    }

    /// Waits until every job queued so far on the command executor has run.
    async fn settle_commands(central: &Central) {
        central.registry.query(|_| ()).await.unwrap();
        central.commands.query(|_| ()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn connect_resolves_before_its_deadline() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let started = Instant::now();
        let outcomes: Arc<Mutex<Vec<(Instant, Result<Option<Response>, String>)>>> = Default::default();

        {
            let outcomes = outcomes.clone();
            let failures = outcomes.clone();
            let continuation = Continuation::new()
                .on_success(move |response| outcomes.lock().unwrap().push((Instant::now(), Ok(response))))
                .on_failure(move |error| failures.lock().unwrap().push((Instant::now(), Err(error.to_string()))));
            central.connect("P".into(), None, Some(Duration::from_secs(5)), continuation);
        }
        settle_commands(&central).await;
        assert_eq!(radio.commands(), vec![RadioCommand::Connect("P".into())]);

        sleep(Duration::from_secs(2)).await;
        let outcome = dispatcher.dispatch(RadioEvent::Connected("P".into())).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Resolved(RequestKind::Connect));

        sleep(Duration::from_secs(4)).await;
        let outcomes = outcomes.lock().unwrap().clone();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0 - started, Duration::from_secs(2));
        assert_eq!(outcomes[0].1, Ok(None));

        assert_eq!(central.connected_peripherals().await.unwrap(), vec![PeripheralId::from("P")]);
        assert_eq!(central.pending(RequestKind::Connect).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn read_times_out_without_an_event() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let characteristic = Fqcn::new("P".into(), Uuid::from_u128(1), Uuid::from_u128(2));

        let started = Instant::now();
        let outcome = central
            .wait_for(|central, continuation| central.read(characteristic.clone(), None, continuation))
            .await;

        assert!(matches!(
            outcome,
            Err(CentralError::TimedOut { kind: RequestKind::Read, timeout }) if timeout == Duration::from_secs(3)
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(central.pending(RequestKind::Read).await.unwrap(), 0);

        // the late event no longer has a request to resolve
        let late = dispatcher
            .dispatch(RadioEvent::ValueRead {
                characteristic,
                result: Ok(vec![1]),
            })
            .await;
        assert!(matches!(late, Err(CentralError::Unmatched { event: "value_read", .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn read_resolves_with_value_and_native_error() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let characteristic = Fqcn::new("P".into(), Uuid::from_u128(1), Uuid::from_u128(2));

        let (continuation, value) = Continuation::channel();
        central.read(characteristic.clone(), None, continuation);
        settle_commands(&central).await;
        dispatcher
            .dispatch(RadioEvent::ValueRead {
                characteristic: characteristic.clone(),
                result: Ok(vec![0x2a]),
            })
            .await
            .unwrap();
        assert_eq!(value.await.unwrap().unwrap(), Some(Response::Value(vec![0x2a])));

        let (continuation, failed) = Continuation::channel();
        central.read(characteristic.clone(), None, continuation);
        settle_commands(&central).await;
        dispatcher
            .dispatch(RadioEvent::ValueRead {
                characteristic,
                result: Err(NativeError::with_code(5, "insufficient authentication")),
            })
            .await
            .unwrap();
        assert!(matches!(
            failed.await.unwrap(),
            Err(CentralError::Native(NativeError { code: Some(5), .. }))
        ));
    }

    #[tokio::test]
    async fn unavailable_radio_fails_synchronously() {
        let radio = MockRadio::powered_on();
        radio.set_state(RadioState::PoweredOff);
        let (central, _dispatcher) = central(&radio);
        let failure = Arc::new(Mutex::new(None));

        {
            let failure = failure.clone();
            let continuation = Continuation::new().on_failure(move |error| {
                *failure.lock().unwrap() = Some(error);
            });
            central.connect("P".into(), None, None, continuation);
        }

        assert!(matches!(
            failure.lock().unwrap().take(),
            Some(CentralError::Unavailable(RadioState::PoweredOff))
        ));
        assert_eq!(central.pending(RequestKind::Connect).await.unwrap(), 0);
        settle_commands(&central).await;
        assert!(radio.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_request_is_rejected_and_first_still_resolves() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let a = Uuid::from_u128(0xA);
        let b = Uuid::from_u128(0xB);

        let (first, first_outcome) = Continuation::channel();
        central.discover_services("P".into(), Some(vec![a, b]), None, first);
        let (second, second_outcome) = Continuation::channel();
        central.discover_services("P".into(), Some(vec![b, a]), None, second);

        assert!(matches!(
            second_outcome.await.unwrap(),
            Err(CentralError::Conflict {
                kind: RequestKind::ServiceDiscovering,
                ..
            })
        ));
        settle_commands(&central).await;
        assert_eq!(radio.commands().len(), 1);

        dispatcher
            .dispatch(RadioEvent::ServicesDiscovered {
                peripheral: "P".into(),
                filter: Some(BTreeSet::from([a, b])),
                result: Ok(vec![a]),
            })
            .await
            .unwrap();
        assert_eq!(first_outcome.await.unwrap().unwrap(), Some(Response::Services(vec![a])));
    }

    #[tokio::test(start_paused = true)]
    async fn characteristics_are_matched_by_service_and_filter() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let service = Uuid::from_u128(0x180f);
        let level = Uuid::from_u128(0x2a19);

        let (continuation, outcome) = Continuation::channel();
        central.discover_characteristics("P".into(), service, None, None, continuation);
        settle_commands(&central).await;

        let other_filter = dispatcher
            .dispatch(RadioEvent::CharacteristicsDiscovered {
                peripheral: "P".into(),
                service,
                filter: Some(BTreeSet::from([level])),
                result: Ok(vec![level]),
            })
            .await;
        assert!(matches!(other_filter, Err(CentralError::Unmatched { .. })));

        dispatcher
            .dispatch(RadioEvent::CharacteristicsDiscovered {
                peripheral: "P".into(),
                service,
                filter: None,
                result: Ok(vec![level]),
            })
            .await
            .unwrap();
        assert_eq!(outcome.await.unwrap().unwrap(), Some(Response::Characteristics(vec![level])));
    }

    #[tokio::test(start_paused = true)]
    async fn abrupt_disconnect_invokes_the_abruption_handler() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let notifications = central.subscribe().await;
        let (abrupted, abruption_error) = tokio::sync::oneshot::channel();
        let abruption: Abruption = Box::new(move |error| {
            let _ = abrupted.send(error);
        });

        let (continuation, connected) = Continuation::channel();
        central.connect("P".into(), Some(abruption), None, continuation);
        settle_commands(&central).await;
        dispatcher.dispatch(RadioEvent::Connected("P".into())).await.unwrap();
        connected.await.unwrap().unwrap();

        // a planned disconnect is pending, the abrupt one still wins the session
        let (continuation, planned) = Continuation::channel();
        central.disconnect("P".into(), None, continuation);
        settle_commands(&central).await;

        let outcome = dispatcher
            .dispatch(RadioEvent::Disconnected {
                peripheral: "P".into(),
                error: Some(NativeError::new("link lost")),
            })
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Abrupted);
        assert!(matches!(abruption_error.await.unwrap(), CentralError::Native(error) if error.message == "link lost"));
        assert!(central.connected_peripherals().await.unwrap().is_empty());
        assert_eq!(
            notifications.recv().await.unwrap(),
            CentralNotification::SessionAbrupted("P".into())
        );

        assert!(matches!(
            planned.await.unwrap(),
            Err(CentralError::TimedOut {
                kind: RequestKind::Disconnect,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn planned_disconnect_and_cancel_connect() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);

        let (continuation, connected) = Continuation::channel();
        central.connect("P".into(), None, None, continuation);
        settle_commands(&central).await;
        dispatcher.dispatch(RadioEvent::Connected("P".into())).await.unwrap();
        connected.await.unwrap().unwrap();

        let (continuation, disconnected) = Continuation::channel();
        central.disconnect("P".into(), None, continuation);
        settle_commands(&central).await;
        let outcome = dispatcher
            .dispatch(RadioEvent::Disconnected {
                peripheral: "P".into(),
                error: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Resolved(RequestKind::Disconnect));
        assert_eq!(disconnected.await.unwrap().unwrap(), None);
        assert!(central.session(&"P".into()).await.unwrap().is_none());

        let (continuation, connecting) = Continuation::channel();
        central.connect("Q".into(), None, None, continuation);
        let (continuation, cancelled) = Continuation::channel();
        central.cancel_connect("Q".into(), None, continuation);
        settle_commands(&central).await;
        let outcome = dispatcher
            .dispatch(RadioEvent::Disconnected {
                peripheral: "Q".into(),
                error: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Resolved(RequestKind::CancelConnect));
        assert_eq!(cancelled.await.unwrap().unwrap(), None);
        assert!(matches!(connecting.await.unwrap(), Err(CentralError::TimedOut { .. })));

        assert_eq!(
            radio.commands(),
            vec![
                RadioCommand::Connect("P".into()),
                RadioCommand::Disconnect("P".into()),
                RadioCommand::Connect("Q".into()),
                RadioCommand::CancelConnect("Q".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_creates_no_session() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);

        let outcome = {
            let (continuation, outcome) = Continuation::channel();
            central.connect("P".into(), None, None, continuation);
            settle_commands(&central).await;
            dispatcher
                .dispatch(RadioEvent::ConnectFailed {
                    peripheral: "P".into(),
                    error: NativeError::new("rejected"),
                })
                .await
                .unwrap();
            outcome.await.unwrap()
        };

        assert!(matches!(outcome, Err(CentralError::Native(_))));
        assert!(central.connected_peripherals().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scans_filter_and_stop_the_radio_when_done() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let a = Uuid::from_u128(0xA);
        let b = Uuid::from_u128(0xB);
        let c = Uuid::from_u128(0xC);

        let (continuation, filtered) = Continuation::channel();
        central.scan(Some(vec![a]), Some(Duration::from_secs(5)), continuation);
        settle_commands(&central).await;

        dispatcher.dispatch(discovered("D", "Dev", &[a, b])).await.unwrap();
        dispatcher.dispatch(discovered("E", "Else", &[c])).await.unwrap();
        // the first snapshot of D is kept
        let again = dispatcher.dispatch(discovered("D", "Renamed", &[a])).await.unwrap();
        assert_eq!(again, DispatchOutcome::Ignored);

        let Some(Response::Advertisements(found)) = filtered.await.unwrap().unwrap() else {
            panic!("scan must resolve with advertisements");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].peripheral, PeripheralId::from("D"));
        assert_eq!(found[0].data.local_name.as_deref(), Some("Dev"));

        settle_commands(&central).await;
        assert_eq!(
            radio.commands(),
            vec![RadioCommand::StartScan(Some(BTreeSet::from([a]))), RadioCommand::StopScan]
        );
        assert_eq!(central.devices().await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_scans_share_an_unfiltered_radio_scan() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let a = Uuid::from_u128(0xA);

        let (continuation, filtered) = Continuation::channel();
        central.scan(Some(vec![a]), Some(Duration::from_secs(2)), continuation);
        let (continuation, open) = Continuation::channel();
        central.scan(None, Some(Duration::from_secs(4)), continuation);
        settle_commands(&central).await;

        let routed = dispatcher.dispatch(discovered("D", "Dev", &[a])).await.unwrap();
        assert_eq!(routed, DispatchOutcome::Captured(Some(RequestId(1))));
        let routed = dispatcher.dispatch(discovered("S", "Silent", &[])).await.unwrap();
        assert_eq!(routed, DispatchOutcome::Captured(Some(RequestId(2))));

        let Some(Response::Advertisements(first)) = filtered.await.unwrap().unwrap() else {
            panic!("scan must resolve with advertisements");
        };
        assert_eq!(first.len(), 1);
        settle_commands(&central).await;
        assert!(!radio.commands().contains(&RadioCommand::StopScan));

        let Some(Response::Advertisements(second)) = open.await.unwrap().unwrap() else {
            panic!("scan must resolve with advertisements");
        };
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].peripheral, PeripheralId::from("S"));

        settle_commands(&central).await;
        assert_eq!(
            radio.commands(),
            vec![
                RadioCommand::StartScan(Some(BTreeSet::from([a]))),
                RadioCommand::StartScan(None),
                RadioCommand::StopScan,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn device_classes_decide_what_is_captured() {
        let radio = MockRadio::powered_on();
        let configuration = CentralConfigurationDto {
            device_classes: vec![DeviceClassDto {
                name: Arc::new("thermometer".to_string()),
                device_name: Filter::StartsWith("Thermo".to_string()),
            }],
            ..Default::default()
        };
        let (central, dispatcher) = Central::new(radio.clone(), Arc::new(configuration));

        dispatcher.dispatch(discovered("T", "Thermo-1", &[])).await.unwrap();
        let lamp = dispatcher.dispatch(discovered("L", "Lamp", &[])).await.unwrap();
        assert_eq!(lamp, DispatchOutcome::Ignored);

        let device = central.device(&"T".into()).await.unwrap().unwrap();
        assert_eq!(device.class(), "thermometer");
        assert!(central.device(&"L".into()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn name_in_a_later_advertisement_gets_the_peripheral_captured() {
        let radio = MockRadio::powered_on();
        let configuration = CentralConfigurationDto {
            device_classes: vec![DeviceClassDto {
                name: Arc::new("thermometer".to_string()),
                device_name: Filter::StartsWith("Thermo".to_string()),
            }],
            ..Default::default()
        };
        let (central, dispatcher) = Central::new(radio.clone(), Arc::new(configuration));

        let nameless = dispatcher
            .dispatch(RadioEvent::PeripheralDiscovered {
                peripheral: "T".into(),
                data: AdvertisementData::default(),
                rssi: None,
            })
            .await
            .unwrap();
        assert_eq!(nameless, DispatchOutcome::Ignored);
        assert!(central.device(&"T".into()).await.unwrap().is_none());

        let named = dispatcher.dispatch(discovered("T", "Thermo-1", &[])).await.unwrap();
        assert_eq!(named, DispatchOutcome::Captured(None));
        let device = central.device(&"T".into()).await.unwrap().unwrap();
        assert_eq!(device.class(), "thermometer");
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_continuation_does_not_silence_later_requests() {
        let radio = MockRadio::powered_on();
        let (central, _dispatcher) = central(&radio);
        let first = Fqcn::new("P".into(), Uuid::from_u128(1), Uuid::from_u128(2));
        let second = Fqcn::new("Q".into(), Uuid::from_u128(1), Uuid::from_u128(2));

        let continuation = Continuation::new().on_failure(|error| panic!("caller bug: {error}"));
        central.read(first, None, continuation);
        sleep(Duration::from_secs(4)).await;

        let outcome = central
            .wait_for(|central, continuation| central.read(second, None, continuation))
            .await;
        assert!(matches!(
            outcome,
            Err(CentralError::TimedOut {
                kind: RequestKind::Read,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn planned_disconnect_without_request_ends_the_session() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);

        let (continuation, connected) = Continuation::channel();
        central.connect("P".into(), None, None, continuation);
        settle_commands(&central).await;
        dispatcher.dispatch(RadioEvent::Connected("P".into())).await.unwrap();
        connected.await.unwrap().unwrap();
        assert!(central.session(&"P".into()).await.unwrap().is_some());

        let outcome = dispatcher
            .dispatch(RadioEvent::Disconnected {
                peripheral: "P".into(),
                error: None,
            })
            .await;
        assert!(matches!(outcome, Err(CentralError::Unmatched { event: "disconnected", .. })));
        assert!(central.session(&"P".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn abrupt_disconnect_without_session_is_unmatched() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let notifications = central.subscribe().await;

        let outcome = dispatcher
            .dispatch(RadioEvent::Disconnected {
                peripheral: "P".into(),
                error: Some(NativeError::new("link lost")),
            })
            .await;
        assert!(matches!(outcome, Err(CentralError::Unmatched { event: "disconnected", .. })));
        assert_eq!(
            notifications.recv().await.unwrap(),
            CentralNotification::Unmatched {
                event: "disconnected",
                peripheral: "P".into(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_connect_keeps_the_first_session_and_its_handler() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let abrupted: Arc<Mutex<Vec<&'static str>>> = Default::default();

        for label in ["first", "second"] {
            let abrupted = abrupted.clone();
            let abruption: Abruption = Box::new(move |_| abrupted.lock().unwrap().push(label));
            let (continuation, connected) = Continuation::channel();
            central.connect("P".into(), Some(abruption), None, continuation);
            settle_commands(&central).await;
            let outcome = dispatcher.dispatch(RadioEvent::Connected("P".into())).await.unwrap();
            assert_eq!(outcome, DispatchOutcome::Resolved(RequestKind::Connect));
            connected.await.unwrap().unwrap();
        }
        assert_eq!(central.connected_peripherals().await.unwrap(), vec![PeripheralId::from("P")]);

        dispatcher
            .dispatch(RadioEvent::Disconnected {
                peripheral: "P".into(),
                error: Some(NativeError::new("link lost")),
            })
            .await
            .unwrap();
        dispatcher.callbacks.query(|_| ()).await.unwrap();
        assert_eq!(*abrupted.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn unmatched_events_are_published() {
        let radio = MockRadio::powered_on();
        let (central, dispatcher) = central(&radio);
        let notifications = central.subscribe().await;

        let outcome = dispatcher.dispatch(RadioEvent::Connected("P".into())).await;
        assert!(matches!(outcome, Err(CentralError::Unmatched { event: "connected", .. })));
        assert_eq!(
            notifications.recv().await.unwrap(),
            CentralNotification::Unmatched {
                event: "connected",
                peripheral: "P".into(),
            }
        );

        dispatcher
            .dispatch(RadioEvent::StateChanged(RadioState::PoweredOff))
            .await
            .unwrap();
        assert_eq!(
            notifications.recv().await.unwrap(),
            CentralNotification::StateChanged(RadioState::PoweredOff)
        );
    }
}
