use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::radio_state::RadioState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CentralNotification {
    StateChanged(RadioState),
    SessionAbrupted(PeripheralId),
    Unmatched {
        event: &'static str,
        peripheral: PeripheralId,
    },
}
