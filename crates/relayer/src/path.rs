//! The identifier bundle for one end of a relay.

use std::sync::Arc;

use ibc_proto::google::protobuf::Any;
use serde::{Deserialize, Serialize};

use ibc_relay_types::channel::Ordering;
use ibc_relay_types::header::Header;
use ibc_relay_types::identifier::{ChainId, ChannelId, ClientId, ConnectionId, PortId};
use ibc_relay_types::msgs::{Msg, MsgUpdateClient};
use ibc_relay_types::signer::Signer;

/// Immutable identifiers of one relay end: which chain, and which
/// client/connection/channel/port on it. The two ends of a relay carry
/// cross-referencing identifiers per the IBC handshakes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathEnd {
    pub chain_id: ChainId,
    pub client_id: ClientId,
    pub connection_id: ConnectionId,
    pub channel_id: ChannelId,
    pub port_id: PortId,
    #[serde(default)]
    pub ordering: Ordering,
}

impl PathEnd {
    /// One header, one update message for this end's client.
    pub fn update_client(&self, header: &dyn Header, signer: Signer) -> Any {
        MsgUpdateClient::new(self.client_id.clone(), header.to_any(), signer).to_any()
    }

    /// One update message per header, preserving order. Headers must be
    /// non-decreasing in height.
    pub fn update_clients(&self, headers: &[Arc<dyn Header>], signer: &Signer) -> Vec<Any> {
        debug_assert!(headers
            .windows(2)
            .all(|pair| pair[0].height() <= pair[1].height()));

        headers
            .iter()
            .map(|header| self.update_client(header.as_ref(), signer.clone()))
            .collect()
    }
}
