use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use chrono::Utc;
use uuid::Uuid;

use crate::inner::model::peripheral_id::PeripheralId;

/// Raw broadcast payload of a peripheral, as reported at discovery time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AdvertisementData {
    pub(crate) local_name: Option<String>,
    pub(crate) services: Vec<Uuid>,
    pub(crate) manufacturer_data: HashMap<u16, Vec<u8>>,
    pub(crate) service_data: HashMap<Uuid, Vec<u8>>,
    pub(crate) tx_power_level: Option<i16>,
}

impl AdvertisementData {
    pub(crate) fn with_services(services: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            services: services.into_iter().collect(),
            ..Default::default()
        }
    }

    /// `false` when the filter is absent; a peripheral advertising nothing never overlaps.
    pub(crate) fn overlaps(&self, filter: &BTreeSet<Uuid>) -> bool {
        self.services.iter().any(|uuid| filter.contains(uuid))
    }
}

/// Immutable discovery snapshot. Two snapshots of the same peripheral are equal.
#[derive(Debug, Clone)]
pub(crate) struct Advertisement {
    pub(crate) peripheral: PeripheralId,
    pub(crate) data: AdvertisementData,
    pub(crate) rssi: Option<i16>,
    pub(crate) discovered_at: chrono::DateTime<Utc>,
}

impl Advertisement {
    pub(crate) fn new(peripheral: PeripheralId, data: AdvertisementData, rssi: Option<i16>) -> Self {
        Self {
            peripheral,
            data,
            rssi,
            discovered_at: Utc::now(),
        }
    }
}

impl PartialEq for Advertisement {
    fn eq(&self, other: &Self) -> bool {
        self.peripheral == other.peripheral
    }
}

impl Eq for Advertisement {}

impl Hash for Advertisement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.peripheral.hash(state);
    }
}

impl Display for Advertisement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.data.local_name.as_deref().unwrap_or("Unknown");
        write!(
            f,
            "{name}[{}] uuids={:?} rssi={:?}",
            self.peripheral, self.data.services, self.rssi
        )
    }
}
