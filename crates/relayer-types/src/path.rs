//! Paths into the provable IBC store, rendered exactly as the host chain
//! keys them (ICS-24). Provers bind these paths to expected values when
//! producing membership proofs.

use core::fmt::{Display, Error as FmtError, Formatter};

use crate::identifier::{ChannelId, PortId};
use crate::packet::Sequence;

/// The store location of a packet commitment on the sending chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentsPath {
    pub port_id: PortId,
    pub channel_id: ChannelId,
    pub sequence: Sequence,
}

impl Display for CommitmentsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(
            f,
            "commitments/ports/{}/channels/{}/sequences/{}",
            self.port_id, self.channel_id, self.sequence
        )
    }
}

/// The store location of an acknowledgement on the receiving chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcksPath {
    pub port_id: PortId,
    pub channel_id: ChannelId,
    pub sequence: Sequence,
}

impl Display for AcksPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(
            f,
            "acks/ports/{}/channels/{}/sequences/{}",
            self.port_id, self.channel_id, self.sequence
        )
    }
}

/// A provable store path the relay engine asks proofs for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Path {
    Commitments(CommitmentsPath),
    Acks(AcksPath),
}

impl Path {
    pub fn sequence(&self) -> Sequence {
        match self {
            Path::Commitments(p) => p.sequence,
            Path::Acks(p) => p.sequence,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Path::Commitments(p) => p.fmt(f),
            Path::Acks(p) => p.fmt(f),
        }
    }
}

impl From<CommitmentsPath> for Path {
    fn from(path: CommitmentsPath) -> Self {
        Path::Commitments(path)
    }
}

impl From<AcksPath> for Path {
    fn from(path: AcksPath) -> Self {
        Path::Acks(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_render_like_the_host_store() {
        let commitments = CommitmentsPath {
            port_id: "transfer".parse().unwrap(),
            channel_id: "channel-0".parse().unwrap(),
            sequence: 5.into(),
        };
        assert_eq!(
            commitments.to_string(),
            "commitments/ports/transfer/channels/channel-0/sequences/5"
        );

        let acks = AcksPath {
            port_id: "transfer".parse().unwrap(),
            channel_id: "channel-1".parse().unwrap(),
            sequence: 9.into(),
        };
        assert_eq!(
            Path::from(acks).to_string(),
            "acks/ports/transfer/channels/channel-1/sequences/9"
        );
    }
}
