use std::collections::BTreeSet;

use uuid::Uuid;

use crate::inner::error::NativeError;
use crate::inner::model::advertisement::AdvertisementData;
use crate::inner::model::fqcn::Fqcn;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::radio_state::RadioState;

/// Asynchronous callbacks emitted by the radio stack.
///
/// Discovery completions echo the filter the command was issued with, so the dispatcher
/// can find the request by its key.
#[derive(Debug, Clone, PartialEq, Eq, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum RadioEvent {
    StateChanged(RadioState),
    PeripheralDiscovered {
        peripheral: PeripheralId,
        data: AdvertisementData,
        rssi: Option<i16>,
    },
    Connected(PeripheralId),
    ConnectFailed {
        peripheral: PeripheralId,
        error: NativeError,
    },
    Disconnected {
        peripheral: PeripheralId,
        error: Option<NativeError>,
    },
    ServicesDiscovered {
        peripheral: PeripheralId,
        filter: Option<BTreeSet<Uuid>>,
        result: Result<Vec<Uuid>, NativeError>,
    },
    CharacteristicsDiscovered {
        peripheral: PeripheralId,
        service: Uuid,
        filter: Option<BTreeSet<Uuid>>,
        result: Result<Vec<Uuid>, NativeError>,
    },
    ValueRead {
        characteristic: Fqcn,
        result: Result<Vec<u8>, NativeError>,
    },
}

impl RadioEvent {
    pub(crate) fn name(&self) -> &'static str {
        self.into()
    }

    pub(crate) fn peripheral(&self) -> Option<&PeripheralId> {
        match self {
            RadioEvent::StateChanged(_) => None,
            RadioEvent::PeripheralDiscovered { peripheral, .. }
            | RadioEvent::Connected(peripheral)
            | RadioEvent::ConnectFailed { peripheral, .. }
            | RadioEvent::Disconnected { peripheral, .. }
            | RadioEvent::ServicesDiscovered { peripheral, .. }
            | RadioEvent::CharacteristicsDiscovered { peripheral, .. } => Some(peripheral),
            RadioEvent::ValueRead { characteristic, .. } => Some(&characteristic.peripheral),
        }
    }
}
