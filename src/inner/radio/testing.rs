use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::inner::error::CentralResult;
use crate::inner::model::fqcn::Fqcn;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::radio_state::RadioState;
use crate::inner::radio::{AvailabilityGate, RadioCommand, RadioStack};

/// Records every command; events are fed to the dispatcher by the test itself.
#[derive(Default)]
pub(crate) struct MockRadio {
    commands: Mutex<Vec<RadioCommand>>,
    state: AtomicU8,
}

impl MockRadio {
    pub(crate) fn powered_on() -> Arc<Self> {
        let radio = Self::default();
        radio.set_state(RadioState::PoweredOn);
        Arc::new(radio)
    }

    pub(crate) fn set_state(&self, state: RadioState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn commands(&self) -> Vec<RadioCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: RadioCommand) -> CentralResult<()> {
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

impl AvailabilityGate for MockRadio {
    fn state(&self) -> RadioState {
        RadioState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

impl RadioStack for MockRadio {
    fn start_scan(&self, services: Option<BTreeSet<Uuid>>) -> CentralResult<()> {
        self.record(RadioCommand::StartScan(services))
    }

    fn stop_scan(&self) -> CentralResult<()> {
        self.record(RadioCommand::StopScan)
    }

    fn connect(&self, peripheral: &PeripheralId) -> CentralResult<()> {
        self.record(RadioCommand::Connect(peripheral.clone()))
    }

    fn disconnect(&self, peripheral: &PeripheralId) -> CentralResult<()> {
        self.record(RadioCommand::Disconnect(peripheral.clone()))
    }

    fn cancel_connect(&self, peripheral: &PeripheralId) -> CentralResult<()> {
        self.record(RadioCommand::CancelConnect(peripheral.clone()))
    }

    fn discover_services(&self, peripheral: &PeripheralId, services: Option<BTreeSet<Uuid>>) -> CentralResult<()> {
        self.record(RadioCommand::DiscoverServices {
            peripheral: peripheral.clone(),
            services,
        })
    }

    fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristics: Option<BTreeSet<Uuid>>,
    ) -> CentralResult<()> {
        self.record(RadioCommand::DiscoverCharacteristics {
            peripheral: peripheral.clone(),
            service,
            characteristics,
        })
    }

    fn read(&self, characteristic: &Fqcn) -> CentralResult<()> {
        self.record(RadioCommand::Read(characteristic.clone()))
    }
}
