use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::inner::model::peripheral_id::PeripheralId;

/// Fully qualified characteristic name.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
pub(crate) struct Fqcn {
    pub(crate) peripheral: PeripheralId,
    pub(crate) service: Uuid,
    pub(crate) characteristic: Uuid,
}

impl Display for Fqcn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}:{}", self.peripheral, self.service, self.characteristic)
    }
}

impl Fqcn {
    pub(crate) fn new(peripheral: PeripheralId, service: Uuid, characteristic: Uuid) -> Self {
        Self {
            peripheral,
            service,
            characteristic,
        }
    }
}
