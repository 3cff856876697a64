//! Quality of service levels and SUBACK return codes.
//!
//! A requested or published QoS is valid only in `0..=2`. A SUBACK return
//! code additionally admits `0x80` (failure), so the two are kept as
//! distinct types with distinct validity checks.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Delivery guarantee level.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum QoS {
    /// At most once delivery
    #[default]
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(ProtocolError::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> u8 {
        qos as u8
    }
}

/// One entry of a SUBACK payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscribeReturnCode {
    /// Subscription accepted with the granted maximum QoS
    Success(QoS),
    /// Subscription refused
    Failure,
}

impl SubscribeReturnCode {
    /// Wire value of the failure code.
    pub const FAILURE: u8 = 0x80;

    pub fn is_failure(self) -> bool {
        matches!(self, SubscribeReturnCode::Failure)
    }
}

impl TryFrom<u8> for SubscribeReturnCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0..=2 => Ok(SubscribeReturnCode::Success(QoS::try_from(value)?)),
            Self::FAILURE => Ok(SubscribeReturnCode::Failure),
            other => Err(ProtocolError::InvalidReturnCode(other)),
        }
    }
}

impl From<SubscribeReturnCode> for u8 {
    fn from(code: SubscribeReturnCode) -> u8 {
        match code {
            SubscribeReturnCode::Success(qos) => qos as u8,
            SubscribeReturnCode::Failure => SubscribeReturnCode::FAILURE,
        }
    }
}

impl From<QoS> for SubscribeReturnCode {
    fn from(qos: QoS) -> Self {
        SubscribeReturnCode::Success(qos)
    }
}
