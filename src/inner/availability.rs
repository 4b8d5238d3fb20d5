use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::inner::device::factory::PeripheralFactory;
use crate::inner::device::DeviceHandle;
use crate::inner::executor::SerialExecutor;
use crate::inner::model::advertisement::AdvertisementData;
use crate::inner::model::peripheral_id::PeripheralId;

#[derive(Debug)]
pub(crate) enum Capture {
    /// Seen before; the first snapshot is kept.
    Known,
    /// No device class accepts the peripheral.
    Rejected,
    Captured(Arc<dyn DeviceHandle>),
}

/// Every peripheral wrapped so far, keyed by identity.
pub(crate) struct AvailableDevices {
    factory: PeripheralFactory,
    devices: HashMap<PeripheralId, Arc<dyn DeviceHandle>>,
}

impl AvailableDevices {
    pub(crate) fn new(factory: PeripheralFactory) -> Self {
        Self {
            factory,
            devices: Default::default(),
        }
    }

    pub(crate) fn contains(&self, peripheral: &PeripheralId) -> bool {
        self.devices.contains_key(peripheral)
    }

    pub(crate) fn capture(&mut self, peripheral: &PeripheralId, data: &AdvertisementData) -> Capture {
        if self.contains(peripheral) {
            return Capture::Known;
        }
        let Some(device) = self.factory.produce(peripheral, data) else {
            return Capture::Rejected;
        };
        debug!(device = %device, "Captured peripheral");
        self.devices.insert(peripheral.clone(), device.clone());
        Capture::Captured(device)
    }

    pub(crate) fn device(&self, peripheral: &PeripheralId) -> Option<Arc<dyn DeviceHandle>> {
        self.devices.get(peripheral).cloned()
    }

    pub(crate) fn devices(&self) -> Vec<Arc<dyn DeviceHandle>> {
        let mut devices: Vec<_> = self.devices.values().cloned().collect();
        devices.sort_unstable_by(|left, right| left.id().cmp(right.id()));
        devices
    }
}

pub(crate) type AvailabilityCache = SerialExecutor<AvailableDevices>;

impl AvailabilityCache {
    pub(crate) fn availability(factory: PeripheralFactory) -> Self {
        SerialExecutor::spawn("availability", AvailableDevices::new(factory))
    }
}
