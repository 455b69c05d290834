//! Packets as the discovery queries surface them, before message
//! assembly.

use std::collections::BTreeSet;

use ibc_relay_types::height::Height;
use ibc_relay_types::packet::{Packet, Sequence};

/// A packet (or its acknowledgement) observed as emitted on some chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketInfo {
    pub packet: Packet,
    /// Populated only on acknowledgement flows.
    pub acknowledgement: Option<Vec<u8>>,
    /// Height at which the send (or write-acknowledgement) event was
    /// observed.
    pub event_height: Height,
}

/// An ordered list of [`PacketInfo`], in the order the origin chain
/// emitted them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PacketInfoList {
    items: Vec<PacketInfo>,
}

impl PacketInfoList {
    pub fn new(items: Vec<PacketInfo>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PacketInfo> {
        self.items.iter()
    }

    /// The sequence numbers of the contained packets, in list order.
    pub fn extract_sequence_list(&self) -> Vec<Sequence> {
        self.items.iter().map(|p| p.packet.sequence).collect()
    }

    /// Retain only the packets whose sequence appears in `keep`,
    /// preserving order.
    pub fn filter(&self, keep: &[Sequence]) -> PacketInfoList {
        let keep: BTreeSet<Sequence> = keep.iter().copied().collect();
        Self {
            items: self
                .items
                .iter()
                .filter(|p| keep.contains(&p.packet.sequence))
                .cloned()
                .collect(),
        }
    }
}

impl From<Vec<PacketInfo>> for PacketInfoList {
    fn from(items: Vec<PacketInfo>) -> Self {
        Self::new(items)
    }
}

impl IntoIterator for PacketInfoList {
    type Item = PacketInfo;
    type IntoIter = std::vec::IntoIter<PacketInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// The two directions of unrelayed work discovered in one tick: `src`
/// was observed on the source chain and is bound for the destination,
/// `dst` is the mirror.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayPackets {
    pub src: PacketInfoList,
    pub dst: PacketInfoList,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(seq: u64) -> PacketInfo {
        PacketInfo {
            packet: Packet {
                sequence: seq.into(),
                source_port: "transfer".parse().unwrap(),
                source_channel: "channel-0".parse().unwrap(),
                destination_port: "transfer".parse().unwrap(),
                destination_channel: "channel-1".parse().unwrap(),
                data: vec![],
                timeout_height: None,
                timeout_timestamp: 0,
            },
            acknowledgement: None,
            event_height: Height::new(0, 10),
        }
    }

    #[test]
    fn filter_preserves_order() {
        let list = PacketInfoList::new(vec![info(5), info(1), info(9), info(3)]);
        let kept = list.filter(&[9.into(), 5.into()]);
        assert_eq!(kept.extract_sequence_list(), vec![5.into(), 9.into()]);
    }

    #[test]
    fn filter_with_no_survivors_is_empty() {
        let list = PacketInfoList::new(vec![info(1), info(2)]);
        assert!(list.filter(&[]).is_empty());
    }
}
