use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::inner::error::{CentralError, CentralResult};
use crate::inner::executor::SerialExecutor;
use crate::inner::model::fqcn::Fqcn;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::radio_state::RadioState;

pub(crate) mod btleplug_radio;
#[cfg(test)]
pub(crate) mod testing;

/// Commands understood by the radio stack. Calls never block: outcomes come back later
/// as [`RadioEvent`](crate::inner::model::radio_event::RadioEvent)s.
pub(crate) trait RadioStack: Send + Sync {
    fn start_scan(&self, services: Option<BTreeSet<Uuid>>) -> CentralResult<()>;
    fn stop_scan(&self) -> CentralResult<()>;
    fn connect(&self, peripheral: &PeripheralId) -> CentralResult<()>;
    fn disconnect(&self, peripheral: &PeripheralId) -> CentralResult<()>;
    fn cancel_connect(&self, peripheral: &PeripheralId) -> CentralResult<()>;
    fn discover_services(&self, peripheral: &PeripheralId, services: Option<BTreeSet<Uuid>>) -> CentralResult<()>;
    fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristics: Option<BTreeSet<Uuid>>,
    ) -> CentralResult<()>;
    fn read(&self, characteristic: &Fqcn) -> CentralResult<()>;
}

/// Synchronous readiness check asked before every facade operation.
pub(crate) trait AvailabilityGate: Send + Sync {
    fn state(&self) -> RadioState;

    fn assert_availability(&self) -> CentralResult<()> {
        let state = self.state();
        if state.is_available() {
            Ok(())
        } else {
            Err(CentralError::Unavailable(state))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum RadioCommand {
    StartScan(Option<BTreeSet<Uuid>>),
    StopScan,
    Connect(PeripheralId),
    Disconnect(PeripheralId),
    CancelConnect(PeripheralId),
    DiscoverServices {
        peripheral: PeripheralId,
        services: Option<BTreeSet<Uuid>>,
    },
    DiscoverCharacteristics {
        peripheral: PeripheralId,
        service: Uuid,
        characteristics: Option<BTreeSet<Uuid>>,
    },
    Read(Fqcn),
}

impl RadioCommand {
    pub(crate) fn issue(self, radio: &dyn RadioStack) -> CentralResult<()> {
        match self {
            RadioCommand::StartScan(services) => radio.start_scan(services),
            RadioCommand::StopScan => radio.stop_scan(),
            RadioCommand::Connect(peripheral) => radio.connect(&peripheral),
            RadioCommand::Disconnect(peripheral) => radio.disconnect(&peripheral),
            RadioCommand::CancelConnect(peripheral) => radio.cancel_connect(&peripheral),
            RadioCommand::DiscoverServices { peripheral, services } => radio.discover_services(&peripheral, services),
            RadioCommand::DiscoverCharacteristics {
                peripheral,
                service,
                characteristics,
            } => radio.discover_characteristics(&peripheral, service, characteristics),
            RadioCommand::Read(characteristic) => radio.read(&characteristic),
        }
    }
}

/// Owns the radio handle; commands and deadline actions run here in submission order.
pub(crate) type CommandExecutor = SerialExecutor<Arc<dyn RadioStack>>;

impl CommandExecutor {
    pub(crate) fn commands(radio: Arc<dyn RadioStack>) -> Self {
        SerialExecutor::spawn("command", radio)
    }

    /// A rejected command leaves its request pending until the deadline.
    pub(crate) fn issue(&self, command: RadioCommand) -> CentralResult<()> {
        self.execute(move |radio| {
            let name: &'static str = (&command).into();
            debug!(command = name, "Issuing radio command");
            if let Err(error) = command.issue(radio.as_ref()) {
                warn!(command = name, %error, "Radio rejected command");
            }
        })
    }
}
