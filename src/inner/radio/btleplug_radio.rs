use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use btleplug::api::{Central as _, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use dashmap::DashMap;
use futures_util::StreamExt;
use kanal::{AsyncReceiver, AsyncSender};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::inner::error::{CentralError, CentralResult, NativeError};
use crate::inner::model::advertisement::AdvertisementData;
use crate::inner::model::fqcn::Fqcn;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::radio_event::RadioEvent;
use crate::inner::model::radio_state::RadioState;
use crate::inner::radio::{AvailabilityGate, RadioStack};

/// How an adapter disconnection relates to a planned one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observed {
    Planned,
    AlreadyReported,
    Abrupt,
}

/// Planned disconnections, each reported exactly once whichever side sees it first: the
/// disconnect call returning or the adapter event. The marker lives until the adapter event
/// arrives or the peripheral connects again.
#[derive(Default)]
struct PlannedDisconnects {
    // peripheral -> already reported
    entries: DashMap<PeripheralId, bool>,
}

impl PlannedDisconnects {
    fn plan(&self, id: &PeripheralId) {
        self.entries.insert(id.clone(), false);
    }

    /// The disconnect call returned; `true` when nobody has reported the disconnection yet.
    fn completed(&self, id: &PeripheralId) -> bool {
        match self.entries.get_mut(id) {
            Some(mut reported) if !*reported => {
                *reported = true;
                true
            }
            _ => false,
        }
    }

    fn observed(&self, id: &PeripheralId) -> Observed {
        match self.entries.remove(id) {
            Some((_, false)) => Observed::Planned,
            Some((_, true)) => Observed::AlreadyReported,
            None => Observed::Abrupt,
        }
    }

    fn forget(&self, id: &PeripheralId) {
        self.entries.remove(id);
    }
}

/// [`RadioStack`] over the first btleplug adapter of the host.
///
/// Peripherals are identified by their address. A planned disconnection (disconnect or
/// cancel) produces exactly one `Disconnected` event without an error.
#[derive(Clone)]
pub(crate) struct BtleplugRadio {
    adapter: Adapter,
    peripherals: Arc<DashMap<PeripheralId, Peripheral>>,
    planned: Arc<PlannedDisconnects>,
    state: Arc<AtomicU8>,
    events: AsyncSender<RadioEvent>,
}

impl BtleplugRadio {
    pub(crate) async fn init() -> CentralResult<(Arc<Self>, AsyncReceiver<RadioEvent>)> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CentralError::AnyError(anyhow!("No bluetooth adapter found")))?;
        let adapter_info = adapter.adapter_info().await?;
        info!(adapter = %adapter_info, "Using adapter");

        let (events, receiver) = kanal::unbounded_async();
        let radio = Arc::new(Self {
            adapter,
            peripherals: Default::default(),
            planned: Default::default(),
            state: Arc::new(AtomicU8::new(RadioState::Unknown.as_u8())),
            events,
        });

        let stream = radio.adapter.events().await?;
        radio.update_state(RadioState::PoweredOn).await;

        let listener = Arc::clone(&radio);
        tokio::spawn(
            async move {
                let mut stream = stream;
                while let Some(event) = stream.next().await {
                    debug!(?event, "Received CentralEvent");
                    if let Err(error) = listener.handle_central_event(event).await {
                        warn!(%error, "Failed to handle CentralEvent");
                    }
                }
                warn!("Adapter event stream has ended");
                listener.update_state(RadioState::PoweredOff).await;
            }
            .instrument(info_span!("adapter_events")),
        );

        Ok((radio, receiver))
    }

    async fn update_state(&self, state: RadioState) {
        let previous = self.state.swap(state.as_u8(), Ordering::SeqCst);
        if previous != state.as_u8() {
            self.emit(RadioEvent::StateChanged(state)).await;
        }
    }

    async fn emit(&self, event: RadioEvent) {
        if self.events.send(event).await.is_err() {
            warn!("Radio event receiver is gone");
        }
    }

    async fn handle_central_event(&self, event: CentralEvent) -> CentralResult<()> {
        match event {
            CentralEvent::DeviceDiscovered(id)
            | CentralEvent::DeviceUpdated(id)
            | CentralEvent::ManufacturerDataAdvertisement { id, .. }
            | CentralEvent::ServiceDataAdvertisement { id, .. }
            | CentralEvent::ServicesAdvertisement { id, .. } => {
                let peripheral = self.adapter.peripheral(&id).await?;
                let Some(properties) = peripheral.properties().await? else {
                    return Ok(());
                };
                let peripheral_id = PeripheralId::from(properties.address);
                self.peripherals.insert(peripheral_id.clone(), peripheral);

                let data = AdvertisementData {
                    local_name: properties.local_name,
                    services: properties.services,
                    manufacturer_data: properties.manufacturer_data,
                    service_data: properties.service_data,
                    tx_power_level: properties.tx_power_level,
                };
                self.emit(RadioEvent::PeripheralDiscovered {
                    peripheral: peripheral_id,
                    data,
                    rssi: properties.rssi,
                })
                .await;
            }
            CentralEvent::DeviceDisconnected(id) => {
                let peripheral = self.adapter.peripheral(&id).await?;
                let peripheral_id = PeripheralId::from(peripheral.address());
                let error = match self.planned.observed(&peripheral_id) {
                    Observed::Planned => None,
                    Observed::AlreadyReported => {
                        debug!(peripheral = %peripheral_id, "Planned disconnection already reported");
                        return Ok(());
                    }
                    Observed::Abrupt => Some(NativeError::new("Connection lost")),
                };
                self.emit(RadioEvent::Disconnected {
                    peripheral: peripheral_id,
                    error,
                })
                .await;
            }
            // connections are reported from the result of the connect call
            _ => {}
        }
        Ok(())
    }

    fn known(&self, id: &PeripheralId) -> Result<Peripheral, NativeError> {
        self.peripherals
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| NativeError::new(format!("Unknown peripheral {id}")))
    }

    fn spawn(&self, name: &'static str, task: impl Future<Output = ()> + Send + 'static) {
        tokio::spawn(task.instrument(info_span!("radio_command", command = name)));
    }

    fn planned_disconnect(&self, name: &'static str, id: &PeripheralId) -> CentralResult<()> {
        let peripheral = self.known(id).map_err(CentralError::Native)?;
        self.planned.plan(id);
        let radio = self.clone();
        let id = id.clone();
        self.spawn(name, async move {
            match peripheral.disconnect().await {
                // the adapter may have reported the disconnection already
                Ok(()) if radio.planned.completed(&id) => {
                    radio
                        .emit(RadioEvent::Disconnected {
                            peripheral: id,
                            error: None,
                        })
                        .await;
                }
                Ok(()) => {}
                Err(error) => {
                    radio.planned.forget(&id);
                    warn!(peripheral = %id, %error, "Failed to disconnect");
                }
            }
        });
        Ok(())
    }
}

async fn services_of(peripheral: &Peripheral) -> Result<BTreeSet<btleplug::api::Service>, btleplug::Error> {
    if peripheral.services().is_empty() {
        peripheral.discover_services().await?;
    }
    Ok(peripheral.services())
}

fn filtered(uuids: impl Iterator<Item = Uuid>, filter: &Option<BTreeSet<Uuid>>) -> Vec<Uuid> {
    uuids
        .filter(|uuid| filter.as_ref().map(|filter| filter.contains(uuid)).unwrap_or(true))
        .collect()
}

impl AvailabilityGate for BtleplugRadio {
    fn state(&self) -> RadioState {
        RadioState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

impl RadioStack for BtleplugRadio {
    fn start_scan(&self, services: Option<BTreeSet<Uuid>>) -> CentralResult<()> {
        let adapter = self.adapter.clone();
        let filter = ScanFilter {
            services: services.map(|services| services.into_iter().collect()).unwrap_or_default(),
        };
        self.spawn("start_scan", async move {
            if let Err(error) = adapter.start_scan(filter).await {
                warn!(%error, "Failed to start scan");
            }
        });
        Ok(())
    }

    fn stop_scan(&self) -> CentralResult<()> {
        let adapter = self.adapter.clone();
        self.spawn("stop_scan", async move {
            if let Err(error) = adapter.stop_scan().await {
                warn!(%error, "Failed to stop scan");
            }
        });
        Ok(())
    }

    fn connect(&self, id: &PeripheralId) -> CentralResult<()> {
        let radio = self.clone();
        let id = id.clone();
        self.spawn("connect", async move {
            let connected = match radio.known(&id) {
                Ok(peripheral) => peripheral.connect().await.map_err(|error| NativeError::from(&error)),
                Err(error) => Err(error),
            };
            let event = match connected {
                Ok(()) => {
                    radio.planned.forget(&id);
                    RadioEvent::Connected(id)
                }
                Err(error) => RadioEvent::ConnectFailed { peripheral: id, error },
            };
            radio.emit(event).await;
        });
        Ok(())
    }

    fn disconnect(&self, id: &PeripheralId) -> CentralResult<()> {
        self.planned_disconnect("disconnect", id)
    }

    /// btleplug cannot abort a pending connection; the link is torn down instead.
    fn cancel_connect(&self, id: &PeripheralId) -> CentralResult<()> {
        self.planned_disconnect("cancel_connect", id)
    }

    fn discover_services(&self, id: &PeripheralId, services: Option<BTreeSet<Uuid>>) -> CentralResult<()> {
        let radio = self.clone();
        let id = id.clone();
        self.spawn("discover_services", async move {
            let result = match radio.known(&id) {
                Ok(peripheral) => services_of(&peripheral)
                    .await
                    .map(|discovered| filtered(discovered.into_iter().map(|service| service.uuid), &services))
                    .map_err(|error| NativeError::from(&error)),
                Err(error) => Err(error),
            };
            radio
                .emit(RadioEvent::ServicesDiscovered {
                    peripheral: id,
                    filter: services,
                    result,
                })
                .await;
        });
        Ok(())
    }

    fn discover_characteristics(
        &self,
        id: &PeripheralId,
        service: Uuid,
        characteristics: Option<BTreeSet<Uuid>>,
    ) -> CentralResult<()> {
        let radio = self.clone();
        let id = id.clone();
        self.spawn("discover_characteristics", async move {
            let result = match radio.known(&id) {
                Ok(peripheral) => match services_of(&peripheral).await {
                    Ok(services) => services
                        .into_iter()
                        .find(|candidate| candidate.uuid == service)
                        .map(|found| {
                            filtered(
                                found.characteristics.into_iter().map(|characteristic| characteristic.uuid),
                                &characteristics,
                            )
                        })
                        .ok_or_else(|| NativeError::new(format!("Service {service} not found"))),
                    Err(error) => Err(NativeError::from(&error)),
                },
                Err(error) => Err(error),
            };
            radio
                .emit(RadioEvent::CharacteristicsDiscovered {
                    peripheral: id,
                    service,
                    filter: characteristics,
                    result,
                })
                .await;
        });
        Ok(())
    }

    fn read(&self, fqcn: &Fqcn) -> CentralResult<()> {
        let radio = self.clone();
        let fqcn = fqcn.clone();
        self.spawn("read", async move {
            let result = match radio.known(&fqcn.peripheral) {
                Ok(peripheral) => {
                    let characteristic = peripheral.characteristics().into_iter().find(|characteristic| {
                        characteristic.service_uuid == fqcn.service && characteristic.uuid == fqcn.characteristic
                    });
                    match characteristic {
                        Some(characteristic) => peripheral
                            .read(&characteristic)
                            .await
                            .map_err(|error| NativeError::from(&error)),
                        None => Err(NativeError::new(format!("Characteristic {fqcn} not found"))),
                    }
                }
                Err(error) => Err(error),
            };
            radio
                .emit(RadioEvent::ValueRead {
                    characteristic: fqcn,
                    result,
                })
                .await;
        });
        Ok(())
    }
}
