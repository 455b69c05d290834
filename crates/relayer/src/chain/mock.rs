//! A deterministic in-memory chain and prover pair.
//!
//! The mock applies the messages it receives to its own state (receipts,
//! acknowledgements, client heights), so repeated relay ticks converge
//! the same way they would against real chains. Per-sequence timeout
//! faults and submission rejection can be injected for failure-path
//! tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ibc_proto::google::protobuf::Any;
use ibc_proto::ibc::core::channel::v1::{
    MsgAcknowledgement as RawMsgAcknowledgement, MsgRecvPacket as RawMsgRecvPacket,
};
use ibc_proto::ibc::core::client::v1::{
    Height as RawHeight, MsgCreateClient as RawMsgCreateClient,
    MsgUpdateClient as RawMsgUpdateClient,
};
use prost::Message;
use tracing::{debug, warn};

use ibc_relay_types::commitment::{
    compute_ack_commitment, compute_packet_commitment, CommitmentProofBytes,
};
use ibc_relay_types::header::Header;
use ibc_relay_types::height::Height;
use ibc_relay_types::identifier::{ChainId, ClientId};
use ibc_relay_types::msgs::acknowledgement::ACKNOWLEDGEMENT_TYPE_URL;
use ibc_relay_types::msgs::recv_packet::RECV_PACKET_TYPE_URL;
use ibc_relay_types::msgs::update_client::UPDATE_CLIENT_TYPE_URL;
use ibc_relay_types::msgs::{MsgAcknowledgement, MsgRecvPacket};
use ibc_relay_types::packet::{Packet, Sequence};
use ibc_relay_types::path::Path;
use ibc_relay_types::signer::Signer;

use crate::chain::{Chain, MsgEventListener, Pagination, QueryContext, TxResponse};
use crate::error::Error;
use crate::path::PathEnd;
use crate::provable::ProvableChain;
use crate::prover::Prover;

pub const MOCK_HEADER_TYPE_URL: &str = "/mock.Header";
pub const CREATE_CLIENT_TYPE_URL: &str = "/ibc.core.client.v1.MsgCreateClient";

/// A header that attests to nothing but a height.
#[derive(Clone, Debug)]
pub struct MockHeader {
    height: Height,
}

impl MockHeader {
    pub fn new(height: Height) -> Self {
        Self { height }
    }

    fn decode(any: &Any) -> Result<Height, Error> {
        let raw = RawHeight::decode(any.value.as_slice())
            .map_err(|e| Error::rpc(ChainId::from_string("mock"), e.to_string()))?;
        Ok(raw.into())
    }
}

impl Header for MockHeader {
    fn height(&self) -> Height {
        self.height
    }

    fn to_any(&self) -> Any {
        Any {
            type_url: MOCK_HEADER_TYPE_URL.to_string(),
            value: RawHeight::from(self.height).encode_to_vec(),
        }
    }
}

#[derive(Debug, Default)]
struct MockChainState {
    latest_height: Height,
    /// Every packet this chain ever sent; send events stay queryable
    /// even after the commitment is cleared.
    sent_packets: BTreeMap<Sequence, Packet>,
    /// Sequences whose packet commitment is still present (ack not yet
    /// relayed back).
    commitments: BTreeSet<Sequence>,
    /// Sequences of counterparty packets received here.
    received: BTreeSet<Sequence>,
    /// Acknowledgements written here, with the packet they answer.
    acks: BTreeMap<Sequence, (Packet, Vec<u8>)>,
    /// Height of the counterparty's client hosted on this chain.
    client_height: Option<Height>,
    /// Sequences whose proof queries fail with a transient timeout.
    timeout_sequences: BTreeSet<Sequence>,
    reject_sends: bool,
    txs: Vec<Vec<Any>>,
    setup_calls: usize,
}

/// One in-memory chain end.
pub struct MockChain {
    chain_id: ChainId,
    signer: Signer,
    path: Mutex<Option<PathEnd>>,
    listeners: Mutex<Vec<Arc<dyn MsgEventListener>>>,
    state: Arc<Mutex<MockChainState>>,
}

impl MockChain {
    pub fn new(chain_id: ChainId, signer: Signer) -> Self {
        let initial_height = Height::new(chain_id.version(), 1);
        let state = MockChainState {
            latest_height: initial_height,
            ..Default::default()
        };

        Self {
            chain_id,
            signer,
            path: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockChainState> {
        self.state.lock().expect("poisoned lock")
    }

    // -- test fixtures ----------------------------------------------

    pub fn set_latest_height(&self, height: Height) {
        self.lock().latest_height = height;
    }

    /// Records a packet as sent from this chain (commitment present).
    pub fn send_packet(&self, packet: Packet) {
        let mut state = self.lock();
        state.commitments.insert(packet.sequence);
        state.sent_packets.insert(packet.sequence, packet);
    }

    /// Marks a counterparty packet as already received here.
    pub fn receive_packet(&self, sequence: Sequence) {
        self.lock().received.insert(sequence);
    }

    /// Records a received packet together with its written
    /// acknowledgement.
    pub fn write_acknowledgement(&self, packet: Packet, ack: Vec<u8>) {
        let mut state = self.lock();
        state.received.insert(packet.sequence);
        state.acks.insert(packet.sequence, (packet, ack));
    }

    pub fn set_client_height(&self, height: Height) {
        self.lock().client_height = Some(height);
    }

    pub fn client_height(&self) -> Option<Height> {
        self.lock().client_height
    }

    pub fn inject_proof_timeout(&self, sequence: Sequence) {
        self.lock().timeout_sequences.insert(sequence);
    }

    pub fn clear_proof_timeout(&self, sequence: Sequence) {
        self.lock().timeout_sequences.remove(&sequence);
    }

    pub fn reject_sends(&self, reject: bool) {
        self.lock().reject_sends = reject;
    }

    // -- test observations ------------------------------------------

    pub fn submitted_txs(&self) -> Vec<Vec<Any>> {
        self.lock().txs.clone()
    }

    pub fn committed_sequences(&self) -> Vec<Sequence> {
        self.lock().commitments.iter().copied().collect()
    }

    pub fn has_received(&self, sequence: Sequence) -> bool {
        self.lock().received.contains(&sequence)
    }

    pub fn setup_calls(&self) -> usize {
        self.lock().setup_calls
    }

    fn apply_msg(&self, state: &mut MockChainState, msg: &Any) -> Result<(), Error> {
        match msg.type_url.as_str() {
            RECV_PACKET_TYPE_URL => {
                let raw = RawMsgRecvPacket::decode(msg.value.as_slice())
                    .map_err(|e| Error::rpc(self.chain_id.clone(), e.to_string()))?;
                let msg = MsgRecvPacket::try_from(raw).map_err(Error::types)?;
                let sequence = msg.packet.sequence;

                state.received.insert(sequence);
                // the receiving application answers immediately
                let ack = format!("ack-{sequence}").into_bytes();
                state.acks.insert(sequence, (msg.packet, ack));
            }
            ACKNOWLEDGEMENT_TYPE_URL => {
                let raw = RawMsgAcknowledgement::decode(msg.value.as_slice())
                    .map_err(|e| Error::rpc(self.chain_id.clone(), e.to_string()))?;
                let msg = MsgAcknowledgement::try_from(raw).map_err(Error::types)?;

                // ack delivered back to the origin clears the commitment
                state.commitments.remove(&msg.packet.sequence);
            }
            UPDATE_CLIENT_TYPE_URL => {
                let raw = RawMsgUpdateClient::decode(msg.value.as_slice())
                    .map_err(|e| Error::rpc(self.chain_id.clone(), e.to_string()))?;
                let header = raw
                    .header
                    .ok_or_else(|| Error::empty_response(self.chain_id.clone(), "header".into()))?;
                let height = MockHeader::decode(&header)?;

                state.client_height = Some(state.client_height.map_or(height, |h| h.max(height)));
            }
            CREATE_CLIENT_TYPE_URL => {
                let raw = RawMsgCreateClient::decode(msg.value.as_slice())
                    .map_err(|e| Error::rpc(self.chain_id.clone(), e.to_string()))?;
                let consensus = raw.consensus_state.ok_or_else(|| {
                    Error::empty_response(self.chain_id.clone(), "consensus state".into())
                })?;
                state.client_height = Some(MockHeader::decode(&consensus)?);
            }
            other => {
                debug!(chain = %self.chain_id, type_url = other, "ignoring message");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Chain for MockChain {
    fn id(&self) -> &ChainId {
        &self.chain_id
    }

    fn get_address(&self) -> Result<Signer, Error> {
        Ok(self.signer.clone())
    }

    fn path(&self) -> Result<PathEnd, Error> {
        self.path
            .lock()
            .expect("poisoned lock")
            .clone()
            .ok_or_else(|| Error::missing_path(self.chain_id.clone()))
    }

    fn set_path(&self, path: PathEnd) -> Result<(), Error> {
        *self.path.lock().expect("poisoned lock") = Some(path);
        Ok(())
    }

    fn register_msg_event_listener(&self, listener: Arc<dyn MsgEventListener>) {
        self.listeners.lock().expect("poisoned lock").push(listener);
    }

    async fn init(
        &self,
        _home_dir: &FsPath,
        _rpc_timeout: Duration,
        _debug: bool,
    ) -> Result<(), Error> {
        Ok(())
    }

    async fn setup_for_relay(&self) -> Result<(), Error> {
        self.lock().setup_calls += 1;
        Ok(())
    }

    async fn latest_height(&self) -> Result<Height, Error> {
        Ok(self.lock().latest_height)
    }

    async fn send_msgs(&self, msgs: Vec<Any>) -> Result<TxResponse, Error> {
        let response = {
            let mut state = self.lock();

            if state.reject_sends {
                return Err(Error::submit(
                    self.chain_id.clone(),
                    "out of gas in check tx".to_string(),
                ));
            }

            for msg in &msgs {
                self.apply_msg(&mut state, msg)?;
            }

            state.txs.push(msgs.clone());

            TxResponse {
                tx_hash: format!("{}-{}", self.chain_id, state.txs.len()),
                height: state.latest_height,
            }
        };

        for listener in self.listeners.lock().expect("poisoned lock").iter() {
            if let Err(e) = listener.on_sent_msg(&msgs) {
                warn!(chain = %self.chain_id, "msg event listener failed: {}", e);
            }
        }

        Ok(response)
    }

    async fn query_packet_commitments(
        &self,
        _ctx: &QueryContext,
        pagination: Pagination,
    ) -> Result<Vec<Sequence>, Error> {
        Ok(self
            .lock()
            .commitments
            .iter()
            .copied()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect())
    }

    async fn query_packet_acknowledgements(
        &self,
        _ctx: &QueryContext,
        pagination: Pagination,
    ) -> Result<Vec<Sequence>, Error> {
        Ok(self
            .lock()
            .acks
            .keys()
            .copied()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect())
    }

    async fn query_unreceived_packets(
        &self,
        _ctx: &QueryContext,
        sequences: Vec<Sequence>,
    ) -> Result<Vec<Sequence>, Error> {
        let state = self.lock();
        Ok(sequences
            .into_iter()
            .filter(|seq| !state.received.contains(seq))
            .collect())
    }

    async fn query_unreceived_acknowledgements(
        &self,
        _ctx: &QueryContext,
        sequences: Vec<Sequence>,
    ) -> Result<Vec<Sequence>, Error> {
        let state = self.lock();
        // an ack is unrelayed as long as the packet commitment here has
        // not been cleared by it
        Ok(sequences
            .into_iter()
            .filter(|seq| state.commitments.contains(seq))
            .collect())
    }

    async fn query_packet(
        &self,
        _ctx: &QueryContext,
        sequence: Sequence,
    ) -> Result<Packet, Error> {
        self.lock()
            .sent_packets
            .get(&sequence)
            .cloned()
            .ok_or_else(|| {
                Error::empty_response(self.chain_id.clone(), format!("packet {sequence}"))
            })
    }

    async fn query_packet_acknowledgement(
        &self,
        _ctx: &QueryContext,
        sequence: Sequence,
    ) -> Result<Vec<u8>, Error> {
        self.lock()
            .acks
            .get(&sequence)
            .map(|(_, ack)| ack.clone())
            .ok_or_else(|| {
                Error::empty_response(self.chain_id.clone(), format!("acknowledgement {sequence}"))
            })
    }
}

/// The prover half of a [`MockChain`].
///
/// A real prover learns the target's stored client height through its
/// own transport; the mock shortcuts that by sharing the counterparty's
/// state handle.
pub struct MockProver {
    chain_id: ChainId,
    state: Arc<Mutex<MockChainState>>,
    counterparty_state: Arc<Mutex<MockChainState>>,
}

impl MockProver {
    pub fn new(chain: &MockChain, counterparty: &MockChain) -> Self {
        Self {
            chain_id: chain.chain_id.clone(),
            state: chain.state.clone(),
            counterparty_state: counterparty.state.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockChainState> {
        self.state.lock().expect("poisoned lock")
    }
}

#[async_trait]
impl Prover for MockProver {
    async fn init(
        &self,
        _home_dir: &FsPath,
        _rpc_timeout: Duration,
        _debug: bool,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn set_path(&self, _path: PathEnd) -> Result<(), Error> {
        Ok(())
    }

    async fn setup_for_relay(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn latest_finalized_header(&self) -> Result<Box<dyn Header>, Error> {
        Ok(Box::new(MockHeader::new(self.lock().latest_height)))
    }

    async fn setup_headers_for_update(
        &self,
        target: &(dyn Chain),
    ) -> Result<Vec<Arc<dyn Header>>, Error> {
        let latest = self.lock().latest_height;
        let stored = self
            .counterparty_state
            .lock()
            .expect("poisoned lock")
            .client_height;

        debug!(
            chain = %self.chain_id,
            target = %target.id(),
            %latest,
            ?stored,
            "computing update headers"
        );

        match stored {
            Some(height) if height >= latest => Ok(Vec::new()),
            _ => {
                let header: Arc<dyn Header> = Arc::new(MockHeader::new(latest));
                Ok(vec![header])
            }
        }
    }

    async fn prove_state(
        &self,
        ctx: &QueryContext,
        path: Path,
        value: Vec<u8>,
    ) -> Result<(CommitmentProofBytes, Height), Error> {
        let state = self.lock();
        let sequence = path.sequence();

        if state.timeout_sequences.contains(&sequence) {
            return Err(Error::query_timeout(
                self.chain_id.clone(),
                format!("proof query for {path}"),
            ));
        }

        // recompute the expected value so an engine that asks for the
        // wrong commitment fails loudly
        let expected = match &path {
            Path::Commitments(p) => {
                let packet = state
                    .commitments
                    .contains(&p.sequence)
                    .then(|| state.sent_packets.get(&p.sequence))
                    .flatten()
                    .ok_or_else(|| {
                        Error::empty_response(
                            self.chain_id.clone(),
                            format!("commitment {sequence}"),
                        )
                    })?;
                compute_packet_commitment(
                    &packet.data,
                    packet.timeout_height,
                    packet.timeout_timestamp,
                )
                .into_vec()
            }
            Path::Acks(p) => {
                let (_, ack) = state.acks.get(&p.sequence).ok_or_else(|| {
                    Error::empty_response(
                        self.chain_id.clone(),
                        format!("acknowledgement {sequence}"),
                    )
                })?;
                compute_ack_commitment(ack).into_vec()
            }
        };

        if expected != value {
            return Err(Error::rpc(
                self.chain_id.clone(),
                format!("value mismatch under {path}"),
            ));
        }

        let proof = CommitmentProofBytes::try_from(format!("proof:{path}").into_bytes())
            .map_err(Error::types)?;
        Ok((proof, ctx.height()))
    }

    async fn create_msg_create_client(
        &self,
        client_id: &ClientId,
        header: &(dyn Header),
        signer: Signer,
    ) -> Result<Any, Error> {
        debug!(chain = %self.chain_id, client = %client_id, "building create client message");

        let raw = RawMsgCreateClient {
            client_state: Some(header.to_any()),
            consensus_state: Some(header.to_any()),
            signer: signer.to_string(),
        };

        Ok(Any {
            type_url: CREATE_CLIENT_TYPE_URL.to_string(),
            value: raw.encode_to_vec(),
        })
    }
}

/// Wires two mock chains into the provable pair the strategy operates
/// on; each side's prover watches the other side's client state.
pub fn provable_pair(src: &Arc<MockChain>, dst: &Arc<MockChain>) -> (ProvableChain, ProvableChain) {
    let src_prover = Arc::new(MockProver::new(src, dst));
    let dst_prover = Arc::new(MockProver::new(dst, src));

    (
        ProvableChain::new(src.clone(), src_prover),
        ProvableChain::new(dst.clone(), dst_prover),
    )
}
