use ibc_proto::ibc::core::channel::v1::MsgRecvPacket as RawMsgRecvPacket;

use crate::commitment::CommitmentProofBytes;
use crate::error::ValidationError;
use crate::height::Height;
use crate::msgs::Msg;
use crate::packet::Packet;
use crate::signer::Signer;

pub const RECV_PACKET_TYPE_URL: &str = "/ibc.core.channel.v1.MsgRecvPacket";

/// Delivers a packet to its destination chain, carrying the commitment
/// proof taken on the origin chain at `proof_height`.
#[derive(Clone, Debug, PartialEq)]
pub struct MsgRecvPacket {
    pub packet: Packet,
    pub proof_commitment: CommitmentProofBytes,
    pub proof_height: Height,
    pub signer: Signer,
}

impl MsgRecvPacket {
    pub fn new(
        packet: Packet,
        proof_commitment: CommitmentProofBytes,
        proof_height: Height,
        signer: Signer,
    ) -> Self {
        Self {
            packet,
            proof_commitment,
            proof_height,
            signer,
        }
    }
}

impl Msg for MsgRecvPacket {
    type Raw = RawMsgRecvPacket;

    const TYPE_URL: &'static str = RECV_PACKET_TYPE_URL;
}

impl TryFrom<RawMsgRecvPacket> for MsgRecvPacket {
    type Error = ValidationError;

    fn try_from(raw: RawMsgRecvPacket) -> Result<Self, Self::Error> {
        Ok(MsgRecvPacket {
            packet: raw
                .packet
                .ok_or_else(ValidationError::missing_packet)?
                .try_into()?,
            proof_commitment: raw.proof_commitment.try_into()?,
            proof_height: raw
                .proof_height
                .ok_or_else(ValidationError::missing_proof_height)?
                .into(),
            signer: raw.signer.parse().map_err(ValidationError::signer)?,
        })
    }
}

impl From<MsgRecvPacket> for RawMsgRecvPacket {
    fn from(msg: MsgRecvPacket) -> Self {
        RawMsgRecvPacket {
            packet: Some(msg.packet.into()),
            proof_commitment: msg.proof_commitment.into(),
            proof_height: Some(msg.proof_height.into()),
            signer: msg.signer.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    fn sample_msg() -> MsgRecvPacket {
        MsgRecvPacket::new(
            Packet {
                sequence: 1.into(),
                source_port: "transfer".parse().unwrap(),
                source_channel: "channel-0".parse().unwrap(),
                destination_port: "transfer".parse().unwrap(),
                destination_channel: "channel-1".parse().unwrap(),
                data: b"data".to_vec(),
                timeout_height: None,
                timeout_timestamp: 0,
            },
            CommitmentProofBytes::try_from(b"proof".to_vec()).unwrap(),
            Height::new(0, 100),
            "cosmos1relayer".parse().unwrap(),
        )
    }

    #[test]
    fn any_packing_round_trips() {
        let msg = sample_msg();
        let any = msg.clone().to_any();
        assert_eq!(any.type_url, RECV_PACKET_TYPE_URL);

        let raw = RawMsgRecvPacket::decode(any.value.as_slice()).unwrap();
        assert_eq!(MsgRecvPacket::try_from(raw).unwrap(), msg);
    }

    #[test]
    fn missing_packet_is_rejected() {
        let mut raw = RawMsgRecvPacket::from(sample_msg());
        raw.packet = None;
        assert!(MsgRecvPacket::try_from(raw).is_err());
    }
}
