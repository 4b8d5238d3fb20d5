use std::time::Duration;

use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::radio_state::RadioState;
use crate::inner::request::RequestKind;

/// An error reported verbatim by the radio stack (connect rejected, discovery or read failed).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub(crate) struct NativeError {
    pub(crate) code: Option<i64>,
    pub(crate) message: String,
}

impl NativeError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub(crate) fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl From<&btleplug::Error> for NativeError {
    fn from(value: &btleplug::Error) -> Self {
        Self::new(value.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum CentralError {
    #[error("Radio is unavailable: {0}")]
    Unavailable(RadioState),

    #[error("{kind} request timed out after {timeout:?}")]
    TimedOut { kind: RequestKind, timeout: Duration },

    #[error("Radio error: {0}")]
    Native(#[from] NativeError),

    #[error("No pending request matched {event} for {peripheral}")]
    Unmatched {
        event: &'static str,
        peripheral: PeripheralId,
    },

    #[error("{kind} request for {key} is already pending")]
    Conflict { kind: RequestKind, key: String },

    #[error("Executor {0} is closed")]
    ExecutorClosed(&'static str),

    #[error("Bluetooth error: {0:?}")]
    BluetoothError(#[from] btleplug::Error),

    #[error("End of stream")]
    EndOfStream,

    #[error("IoError: {0:?}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization Error: {0:?}")]
    SerializationError(#[from] serde_yaml::Error),

    #[error("Error: {0:?}")]
    AnyError(#[from] anyhow::Error),
}

pub(crate) type CentralResult<T> = Result<T, CentralError>;
