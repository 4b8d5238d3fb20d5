use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::inner::model::advertisement::AdvertisementData;
use crate::inner::model::peripheral_id::PeripheralId;

pub(crate) mod factory;

pub(crate) const GENERIC_CLASS: &str = "generic";

/// A captured peripheral, as handed out by the availability cache.
pub(crate) trait DeviceHandle: Debug + Send + Sync {
    fn id(&self) -> &PeripheralId;
    fn name(&self) -> Option<&str>;
    fn class(&self) -> &str;
}

impl Display for dyn DeviceHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}] ({})", self.name().unwrap_or("Unknown"), self.id(), self.class())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GenericDevice {
    id: PeripheralId,
    name: Option<String>,
}

impl GenericDevice {
    pub(crate) fn new(id: &PeripheralId, data: &AdvertisementData) -> Self {
        Self {
            id: id.clone(),
            name: data.local_name.clone(),
        }
    }
}

impl DeviceHandle for GenericDevice {
    fn id(&self) -> &PeripheralId {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn class(&self) -> &str {
        GENERIC_CLASS
    }
}

/// A peripheral recognized by one of the configured device classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassifiedDevice {
    id: PeripheralId,
    name: Option<String>,
    class: Arc<String>,
}

impl ClassifiedDevice {
    pub(crate) fn new(class: Arc<String>, id: &PeripheralId, data: &AdvertisementData) -> Self {
        Self {
            id: id.clone(),
            name: data.local_name.clone(),
            class,
        }
    }
}

impl DeviceHandle for ClassifiedDevice {
    fn id(&self) -> &PeripheralId {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn class(&self) -> &str {
        self.class.as_str()
    }
}
