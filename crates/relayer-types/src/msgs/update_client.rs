use ibc_proto::google::protobuf::Any;
use ibc_proto::ibc::core::client::v1::MsgUpdateClient as RawMsgUpdateClient;

use crate::error::ValidationError;
use crate::identifier::ClientId;
use crate::msgs::Msg;
use crate::signer::Signer;

pub const UPDATE_CLIENT_TYPE_URL: &str = "/ibc.core.client.v1.MsgUpdateClient";

/// Advances an on-chain light client with one consensus header of the
/// chain it tracks.
#[derive(Clone, Debug, PartialEq)]
pub struct MsgUpdateClient {
    pub client_id: ClientId,
    pub header: Any,
    pub signer: Signer,
}

impl MsgUpdateClient {
    pub fn new(client_id: ClientId, header: Any, signer: Signer) -> Self {
        Self {
            client_id,
            header,
            signer,
        }
    }
}

impl Msg for MsgUpdateClient {
    type Raw = RawMsgUpdateClient;

    const TYPE_URL: &'static str = UPDATE_CLIENT_TYPE_URL;
}

impl TryFrom<RawMsgUpdateClient> for MsgUpdateClient {
    type Error = ValidationError;

    fn try_from(raw: RawMsgUpdateClient) -> Result<Self, Self::Error> {
        Ok(MsgUpdateClient {
            client_id: raw.client_id.parse()?,
            header: raw.header.ok_or_else(ValidationError::missing_header)?,
            signer: raw.signer.parse().map_err(ValidationError::signer)?,
        })
    }
}

impl From<MsgUpdateClient> for RawMsgUpdateClient {
    fn from(msg: MsgUpdateClient) -> Self {
        RawMsgUpdateClient {
            client_id: msg.client_id.to_string(),
            header: Some(msg.header),
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
        let msg = MsgUpdateClient::new(
            "07-tendermint-0".parse().unwrap(),
            Any {
                type_url: "/test.Header".to_string(),
                value: vec![1, 2, 3],
            },
            "cosmos1relayer".parse().unwrap(),
        );

        let any = msg.clone().to_any();
        assert_eq!(any.type_url, UPDATE_CLIENT_TYPE_URL);

        let raw = RawMsgUpdateClient::decode(any.value.as_slice()).unwrap();
        assert_eq!(MsgUpdateClient::try_from(raw).unwrap(), msg);
    }
}
