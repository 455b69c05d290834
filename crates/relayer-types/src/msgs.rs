//! Proof-carrying message domain types the relay engine dispatches.
//!
//! Each domain type mirrors the corresponding `ibc-proto` raw struct and
//! packs itself into a `google.protobuf.Any` for transaction assembly.

use ibc_proto::google::protobuf::Any;
use prost::Message;

pub mod acknowledgement;
pub mod recv_packet;
pub mod update_client;

pub use acknowledgement::MsgAcknowledgement;
pub use recv_packet::MsgRecvPacket;
pub use update_client::MsgUpdateClient;

/// Binds a domain message to its raw protobuf form and type URL.
pub trait Msg: Clone + Sized {
    type Raw: Message + From<Self> + Default;

    /// The `Any.type_url` this message is packed under.
    const TYPE_URL: &'static str;

    fn to_any(self) -> Any {
        Any {
            type_url: Self::TYPE_URL.to_string(),
            value: Self::Raw::from(self).encode_to_vec(),
        }
    }
}
