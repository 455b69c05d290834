use ibc_proto::ibc::core::channel::v1::MsgAcknowledgement as RawMsgAcknowledgement;

use crate::commitment::CommitmentProofBytes;
use crate::error::ValidationError;
use crate::height::Height;
use crate::msgs::Msg;
use crate::packet::Packet;
use crate::signer::Signer;

pub const ACKNOWLEDGEMENT_TYPE_URL: &str = "/ibc.core.channel.v1.MsgAcknowledgement";

/// Delivers an acknowledgement back to the packet's origin chain,
/// carrying the ack proof taken on the receiving chain.
#[derive(Clone, Debug, PartialEq)]
pub struct MsgAcknowledgement {
    pub packet: Packet,
    pub acknowledgement: Vec<u8>,
    pub proof_acked: CommitmentProofBytes,
    pub proof_height: Height,
    pub signer: Signer,
}

impl MsgAcknowledgement {
    pub fn new(
        packet: Packet,
        acknowledgement: Vec<u8>,
        proof_acked: CommitmentProofBytes,
        proof_height: Height,
        signer: Signer,
    ) -> Self {
        Self {
            packet,
            acknowledgement,
            proof_acked,
            proof_height,
            signer,
        }
    }
}

impl Msg for MsgAcknowledgement {
    type Raw = RawMsgAcknowledgement;

    const TYPE_URL: &'static str = ACKNOWLEDGEMENT_TYPE_URL;
}

impl TryFrom<RawMsgAcknowledgement> for MsgAcknowledgement {
    type Error = ValidationError;

    fn try_from(raw: RawMsgAcknowledgement) -> Result<Self, Self::Error> {
        Ok(MsgAcknowledgement {
            packet: raw
                .packet
                .ok_or_else(ValidationError::missing_packet)?
                .try_into()?,
            acknowledgement: raw.acknowledgement,
            proof_acked: raw.proof_acked.try_into()?,
            proof_height: raw
                .proof_height
                .ok_or_else(ValidationError::missing_proof_height)?
                .into(),
            signer: raw.signer.parse().map_err(ValidationError::signer)?,
        })
    }
}

impl From<MsgAcknowledgement> for RawMsgAcknowledgement {
    fn from(msg: MsgAcknowledgement) -> Self {
        RawMsgAcknowledgement {
            packet: Some(msg.packet.into()),
            acknowledgement: msg.acknowledgement,
            proof_acked: msg.proof_acked.into(),
            proof_height: Some(msg.proof_height.into()),
            signer: msg.signer.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn any_packing_round_trips() {
        let msg = MsgAcknowledgement::new(
            Packet {
                sequence: 4.into(),
                source_port: "transfer".parse().unwrap(),
                source_channel: "channel-1".parse().unwrap(),
                destination_port: "transfer".parse().unwrap(),
                destination_channel: "channel-0".parse().unwrap(),
                data: b"data".to_vec(),
                timeout_height: Some(Height::new(1, 50)),
                timeout_timestamp: 7,
            },
            b"ack".to_vec(),
            CommitmentProofBytes::try_from(b"proof".to_vec()).unwrap(),
            Height::new(1, 44),
            "cosmos1relayer".parse().unwrap(),
        );

        let any = msg.clone().to_any();
        assert_eq!(any.type_url, ACKNOWLEDGEMENT_TYPE_URL);

        let raw = RawMsgAcknowledgement::decode(any.value.as_slice()).unwrap();
        assert_eq!(MsgAcknowledgement::try_from(raw).unwrap(), msg);
    }
}
