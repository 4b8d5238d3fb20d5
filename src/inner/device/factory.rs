use std::sync::Arc;

use tracing::debug;

use crate::inner::conf::dto::central_configuration::DeviceClassDto;
use crate::inner::conf::filter::{Evaluate, Filter};
use crate::inner::device::{ClassifiedDevice, DeviceHandle, GenericDevice};
use crate::inner::model::advertisement::AdvertisementData;
use crate::inner::model::peripheral_id::PeripheralId;

pub(crate) type Constructor = Arc<dyn Fn(&PeripheralId, &AdvertisementData) -> Arc<dyn DeviceHandle> + Send + Sync>;

/// Chooses the device class of a newly discovered peripheral by its advertised name.
///
/// Without rules every peripheral is wrapped as a [`GenericDevice`]. With rules the first
/// matching rule wins and peripherals no rule accepts are not wrapped at all.
#[derive(Default, Clone)]
pub(crate) struct PeripheralFactory {
    rules: Vec<(Filter, Constructor)>,
}

impl PeripheralFactory {
    pub(crate) fn with_rule(
        mut self,
        filter: Filter,
        constructor: impl Fn(&PeripheralId, &AdvertisementData) -> Arc<dyn DeviceHandle> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push((filter, Arc::new(constructor)));
        self
    }

    pub(crate) fn from_classes(classes: &[DeviceClassDto]) -> Self {
        classes.iter().fold(Self::default(), |factory, class| {
            let name = class.name.clone();
            factory.with_rule(class.device_name.clone(), move |id, data| {
                Arc::new(ClassifiedDevice::new(name.clone(), id, data)) as Arc<dyn DeviceHandle>
            })
        })
    }

    pub(crate) fn produce(&self, id: &PeripheralId, data: &AdvertisementData) -> Option<Arc<dyn DeviceHandle>> {
        if self.rules.is_empty() {
            return Some(Arc::new(GenericDevice::new(id, data)));
        }

        let name = data.local_name.as_deref();
        let Some((_, constructor)) = self.rules.iter().find(|(filter, _)| filter.evaluate(name)) else {
            debug!(peripheral = %id, ?name, "No device class accepts peripheral");
            return None;
        };
        Some(constructor(id, data))
    }
}
