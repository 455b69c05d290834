//! The composite chain-plus-prover the strategy operates on.

use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use ibc_proto::google::protobuf::Any;
use tracing::{debug, error};

use ibc_relay_types::commitment::CommitmentProofBytes;
use ibc_relay_types::header::Header;
use ibc_relay_types::height::Height;
use ibc_relay_types::identifier::{ChainId, ClientId};
use ibc_relay_types::packet::Sequence;
use ibc_relay_types::path::Path;
use ibc_relay_types::signer::Signer;

use crate::chain::{Chain, MsgEventListener, QueryContext, TxResponse};
use crate::error::Error;
use crate::packet::PacketInfoList;
use crate::path::PathEnd;
use crate::prover::Prover;

/// One relayable chain: a [`Chain`] paired with the [`Prover`] that can
/// produce headers and state proofs for it. Owns both capabilities and
/// delegates, so the strategy deals with a single handle per end.
#[derive(Clone)]
pub struct ProvableChain {
    chain: Arc<dyn Chain>,
    prover: Arc<dyn Prover>,
}

impl ProvableChain {
    pub fn new(chain: Arc<dyn Chain>, prover: Arc<dyn Prover>) -> Self {
        Self { chain, prover }
    }

    pub fn chain(&self) -> &dyn Chain {
        self.chain.as_ref()
    }

    pub fn prover(&self) -> &dyn Prover {
        self.prover.as_ref()
    }

    pub fn id(&self) -> &ChainId {
        self.chain.id()
    }

    pub fn get_address(&self) -> Result<Signer, Error> {
        self.chain.get_address()
    }

    pub fn path(&self) -> Result<PathEnd, Error> {
        self.chain.path()
    }

    pub fn set_path(&self, path: PathEnd) -> Result<(), Error> {
        self.chain.set_path(path.clone())?;
        self.prover.set_path(path)
    }

    pub fn register_msg_event_listener(&self, listener: Arc<dyn MsgEventListener>) {
        self.chain.register_msg_event_listener(listener);
    }

    pub async fn init(
        &self,
        home_dir: &FsPath,
        rpc_timeout: Duration,
        debug: bool,
    ) -> Result<(), Error> {
        self.chain.init(home_dir, rpc_timeout, debug).await?;
        self.prover.init(home_dir, rpc_timeout, debug).await
    }

    pub async fn setup_for_relay(&self) -> Result<(), Error> {
        self.chain.setup_for_relay().await?;
        self.prover.setup_for_relay().await
    }

    pub async fn latest_height(&self) -> Result<Height, Error> {
        self.chain.latest_height().await
    }

    pub async fn latest_finalized_header(&self) -> Result<Box<dyn Header>, Error> {
        self.prover.latest_finalized_header().await
    }

    pub async fn setup_headers_for_update(
        &self,
        target: &ProvableChain,
    ) -> Result<Vec<Arc<dyn Header>>, Error> {
        self.prover.setup_headers_for_update(target.chain()).await
    }

    pub async fn prove_state(
        &self,
        ctx: &QueryContext,
        path: Path,
        value: Vec<u8>,
    ) -> Result<(CommitmentProofBytes, Height), Error> {
        self.prover.prove_state(ctx, path, value).await
    }

    pub async fn create_msg_create_client(
        &self,
        client_id: &ClientId,
        header: &dyn Header,
        signer: Signer,
    ) -> Result<Any, Error> {
        self.prover
            .create_msg_create_client(client_id, header, signer)
            .await
    }

    pub async fn query_unfinalized_relay_packets(
        &self,
        ctx: &QueryContext,
        counterparty: &ProvableChain,
    ) -> Result<PacketInfoList, Error> {
        self.chain
            .query_unfinalized_relay_packets(ctx, counterparty.chain())
            .await
    }

    pub async fn query_unfinalized_relay_acknowledgements(
        &self,
        ctx: &QueryContext,
        counterparty: &ProvableChain,
    ) -> Result<PacketInfoList, Error> {
        self.chain
            .query_unfinalized_relay_acknowledgements(ctx, counterparty.chain())
            .await
    }

    pub async fn query_unreceived_packets(
        &self,
        ctx: &QueryContext,
        sequences: Vec<Sequence>,
    ) -> Result<Vec<Sequence>, Error> {
        self.chain.query_unreceived_packets(ctx, sequences).await
    }

    pub async fn query_unreceived_acknowledgements(
        &self,
        ctx: &QueryContext,
        sequences: Vec<Sequence>,
    ) -> Result<Vec<Sequence>, Error> {
        self.chain
            .query_unreceived_acknowledgements(ctx, sequences)
            .await
    }

    pub async fn send_msgs(&self, msgs: Vec<Any>) -> Result<TxResponse, Error> {
        self.chain.send_msgs(msgs).await
    }

    /// Submits `msgs` and reports the outcome as a boolean, logging
    /// either way.
    pub async fn send(&self, msgs: Vec<Any>) -> bool {
        let count = msgs.len();
        match self.send_msgs(msgs).await {
            Ok(response) => {
                debug!(
                    chain = %self.id(),
                    tx_hash = %response.tx_hash,
                    count,
                    "submitted transaction"
                );
                true
            }
            Err(e) => {
                error!(chain = %self.id(), count, "failed to submit transaction: {}", e);
                false
            }
        }
    }
}
