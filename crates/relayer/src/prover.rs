//! The prover capability consumed by the relay engine.

use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ibc_proto::google::protobuf::Any;

use ibc_relay_types::commitment::CommitmentProofBytes;
use ibc_relay_types::header::Header;
use ibc_relay_types::height::Height;
use ibc_relay_types::identifier::ClientId;
use ibc_relay_types::path::Path;
use ibc_relay_types::signer::Signer;

use crate::chain::{Chain, QueryContext};
use crate::error::Error;
use crate::path::PathEnd;

/// Produces the light-client artifacts for one chain: finalized
/// headers, the header sequences that advance a counterparty's client,
/// and membership proofs over the chain's IBC store.
#[async_trait]
pub trait Prover: Send + Sync {
    /// One-time initialisation.
    async fn init(&self, home_dir: &FsPath, rpc_timeout: Duration, debug: bool)
        -> Result<(), Error>;

    /// Binds the relay path end identifiers.
    fn set_path(&self, path: PathEnd) -> Result<(), Error>;

    /// Idempotent warm-up before the first tick.
    async fn setup_for_relay(&self) -> Result<(), Error>;

    /// The latest header considered irreversible by this prover's
    /// finality rule.
    async fn latest_finalized_header(&self) -> Result<Box<dyn Header>, Error>;

    /// The ordered header sequence required to advance `target`'s
    /// on-chain light client from its currently stored height up to
    /// this prover's latest finalized height. Empty when the client is
    /// already current; multi-step when the light client needs
    /// intermediate trusted checkpoints.
    async fn setup_headers_for_update(
        &self,
        target: &(dyn Chain),
    ) -> Result<Vec<Arc<dyn Header>>, Error>;

    /// A membership proof binding `path -> value` at a height no lower
    /// than the context's. The prover may round the height up to the
    /// nearest height it can prove at.
    async fn prove_state(
        &self,
        ctx: &QueryContext,
        path: Path,
        value: Vec<u8>,
    ) -> Result<(CommitmentProofBytes, Height), Error>;

    /// Builds the message that creates this prover's client on the
    /// counterparty, seeded with `header`.
    async fn create_msg_create_client(
        &self,
        client_id: &ClientId,
        header: &(dyn Header),
        signer: Signer,
    ) -> Result<Any, Error>;
}
