use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::inner::conf::filter::Filter;
use crate::inner::request::RequestKind;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Per-kind overrides of the default request timeout. For scans this is the scan window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct TimeoutsDto {
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) scan: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) connect: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) disconnect: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) cancel_connect: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) service_discovering: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) characteristic_discovering: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub(crate) read: Option<Duration>,
}

impl TimeoutsDto {
    pub(crate) fn get(&self, kind: RequestKind) -> Option<Duration> {
        match kind {
            RequestKind::Scan => self.scan,
            RequestKind::Connect => self.connect,
            RequestKind::Disconnect => self.disconnect,
            RequestKind::CancelConnect => self.cancel_connect,
            RequestKind::ServiceDiscovering => self.service_discovering,
            RequestKind::CharacteristicDiscovering => self.characteristic_discovering,
            RequestKind::Read => self.read,
        }
    }
}

/// A named class of peripherals recognized by their advertised local name.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct DeviceClassDto {
    pub(crate) name: Arc<String>,
    pub(crate) device_name: Filter,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct CentralConfigurationDto {
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub(crate) default_timeout: Duration,
    #[serde(default)]
    pub(crate) timeouts: TimeoutsDto,
    #[serde(default)]
    pub(crate) device_classes: Vec<DeviceClassDto>,
}

impl Default for CentralConfigurationDto {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            timeouts: Default::default(),
            device_classes: vec![],
        }
    }
}

impl CentralConfigurationDto {
    pub(crate) fn timeout(&self, kind: RequestKind) -> Duration {
        self.timeouts.get(kind).unwrap_or(self.default_timeout)
    }
}
