use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque, stable identity of a remote peripheral as handed out by the radio layer.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
pub(crate) struct PeripheralId(Arc<String>);

impl Display for PeripheralId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(value: &str) -> Self {
        Self(Arc::new(value.to_string()))
    }
}

impl From<String> for PeripheralId {
    fn from(value: String) -> Self {
        Self(Arc::new(value))
    }
}

impl From<btleplug::api::BDAddr> for PeripheralId {
    fn from(value: btleplug::api::BDAddr) -> Self {
        Self(Arc::new(value.to_string()))
    }
}
