use core::fmt::{Display, Error as FmtError, Formatter};

use ibc_proto::ibc::core::channel::v1::Packet as RawPacket;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::height::Height;
use crate::identifier::{ChannelId, PortId};

/// Monotonic, per-channel packet sequence number.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Sequence(u64);

impl Sequence {
    pub fn increment(&self) -> Sequence {
        Sequence(self.0 + 1)
    }
}

impl From<u64> for Sequence {
    fn from(seq: u64) -> Self {
        Sequence(seq)
    }
}

impl From<Sequence> for u64 {
    fn from(s: Sequence) -> Self {
        s.0
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}", self.0)
    }
}

/// An IBC packet as committed on its origin chain.
///
/// `timeout_height` of `None` and `timeout_timestamp` of `0` each mean
/// "never times out" on that axis. The timestamp is in nanoseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sequence: Sequence,
    pub source_port: PortId,
    pub source_channel: ChannelId,
    pub destination_port: PortId,
    pub destination_channel: ChannelId,
    pub data: Vec<u8>,
    pub timeout_height: Option<Height>,
    pub timeout_timestamp: u64,
}

impl TryFrom<RawPacket> for Packet {
    type Error = ValidationError;

    fn try_from(raw: RawPacket) -> Result<Self, Self::Error> {
        Ok(Packet {
            sequence: raw.sequence.into(),
            source_port: raw.source_port.parse()?,
            source_channel: raw.source_channel.parse()?,
            destination_port: raw.destination_port.parse()?,
            destination_channel: raw.destination_channel.parse()?,
            data: raw.data,
            timeout_height: raw.timeout_height.map(Into::into),
            timeout_timestamp: raw.timeout_timestamp,
        })
    }
}

impl From<Packet> for RawPacket {
    fn from(packet: Packet) -> Self {
        RawPacket {
            sequence: packet.sequence.into(),
            source_port: packet.source_port.to_string(),
            source_channel: packet.source_channel.to_string(),
            destination_port: packet.destination_port.to_string(),
            destination_channel: packet.destination_channel.to_string(),
            data: packet.data,
            timeout_height: packet.timeout_height.map(Into::into),
            timeout_timestamp: packet.timeout_timestamp,
        }
    }
}
