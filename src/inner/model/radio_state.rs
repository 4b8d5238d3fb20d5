use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub(crate) enum RadioState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl RadioState {
    pub(crate) fn is_available(&self) -> bool {
        matches!(self, RadioState::PoweredOn)
    }

    pub(crate) fn as_u8(&self) -> u8 {
        match self {
            RadioState::Unknown => 0,
            RadioState::Resetting => 1,
            RadioState::Unsupported => 2,
            RadioState::Unauthorized => 3,
            RadioState::PoweredOff => 4,
            RadioState::PoweredOn => 5,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => RadioState::Resetting,
            2 => RadioState::Unsupported,
            3 => RadioState::Unauthorized,
            4 => RadioState::PoweredOff,
            5 => RadioState::PoweredOn,
            _ => RadioState::Unknown,
        }
    }
}

impl Display for RadioState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RadioState::Unknown => write!(f, "unknown"),
            RadioState::Resetting => write!(f, "resetting"),
            RadioState::Unsupported => write!(f, "unsupported"),
            RadioState::Unauthorized => write!(f, "unauthorized"),
            RadioState::PoweredOff => write!(f, "powered off"),
            RadioState::PoweredOn => write!(f, "powered on"),
        }
    }
}
