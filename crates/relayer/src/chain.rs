//! The chain capability consumed by the relay engine.
//!
//! A [`Chain`] is one end of a relay as the engine sees it: an identity,
//! a query surface over the IBC store, and a synchronous,
//! account-serialised transaction submitter. Everything underneath
//! (RPC transport, signing, keyring) belongs to the adapter
//! implementing this trait.

use core::future::Future;
use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ibc_proto::google::protobuf::Any;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ibc_relay_types::height::Height;
use ibc_relay_types::identifier::ChainId;
use ibc_relay_types::packet::{Packet, Sequence};
use ibc_relay_types::signer::Signer;

use crate::error::Error;
use crate::packet::{PacketInfo, PacketInfoList};
use crate::path::PathEnd;

pub mod mock;

/// Default page size of the paginated commitment queries.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Conveys both *when* (the height) and *how long* (the cancellation
/// token) a query may run. Queries sharing a context see the same
/// height, so a queried value and its proof agree.
#[derive(Clone, Debug)]
pub struct QueryContext {
    height: Height,
    cancel: CancellationToken,
}

impl QueryContext {
    pub fn new(height: Height, cancel: CancellationToken) -> Self {
        Self { height, cancel }
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The same context pinned to a different height.
    pub fn with_height(&self, height: Height) -> Self {
        Self {
            height,
            cancel: self.cancel.clone(),
        }
    }

    /// Race `fut` against cancellation; a cancelled context discards the
    /// in-flight call and surfaces `Cancelled`.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::cancelled()),
            res = fut => res,
        }
    }
}

/// An (offset, limit) window over a paginated query.
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Outcome of a successfully committed transaction.
#[derive(Clone, Debug)]
pub struct TxResponse {
    pub tx_hash: String,
    pub height: Height,
}

/// Observer notified after each successful message dispatch.
pub trait MsgEventListener: Send + Sync {
    fn on_sent_msg(&self, msgs: &[Any]) -> Result<(), Error>;
}

/// Defines a blockchain as understood by the relay engine.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Returns the chain's identifier.
    fn id(&self) -> &ChainId;

    /// Returns the relayer's own address on this chain.
    fn get_address(&self) -> Result<Signer, Error>;

    /// Returns the relay path end bound to this chain.
    fn path(&self) -> Result<PathEnd, Error>;

    /// Binds the relay path end identifiers to this chain.
    fn set_path(&self, path: PathEnd) -> Result<(), Error>;

    /// Registers an observer for successfully dispatched messages.
    fn register_msg_event_listener(&self, listener: Arc<dyn MsgEventListener>);

    /// One-time adapter initialisation.
    async fn init(&self, home_dir: &FsPath, rpc_timeout: Duration, debug: bool)
        -> Result<(), Error>;

    /// Idempotent warm-up before the first tick.
    async fn setup_for_relay(&self) -> Result<(), Error>;

    /// The latest (not necessarily finalized) height of this chain.
    async fn latest_height(&self) -> Result<Height, Error>;

    /// Submits `msgs` as one transaction and waits for it to be
    /// committed. Implementations MUST serialise submissions per
    /// signing account; the engine never calls this concurrently for
    /// the same chain.
    async fn send_msgs(&self, msgs: Vec<Any>) -> Result<TxResponse, Error>;

    /// The sequences with a packet commitment present, in ascending
    /// order, windowed by `pagination`.
    async fn query_packet_commitments(
        &self,
        ctx: &QueryContext,
        pagination: Pagination,
    ) -> Result<Vec<Sequence>, Error>;

    /// The sequences with an acknowledgement written, in ascending
    /// order, windowed by `pagination`.
    async fn query_packet_acknowledgements(
        &self,
        ctx: &QueryContext,
        pagination: Pagination,
    ) -> Result<Vec<Sequence>, Error>;

    /// Filters `sequences` down to those not yet received on this
    /// chain, preserving order.
    async fn query_unreceived_packets(
        &self,
        ctx: &QueryContext,
        sequences: Vec<Sequence>,
    ) -> Result<Vec<Sequence>, Error>;

    /// Filters `sequences` down to those whose acknowledgement has not
    /// yet been relayed back to this chain, preserving order.
    async fn query_unreceived_acknowledgements(
        &self,
        ctx: &QueryContext,
        sequences: Vec<Sequence>,
    ) -> Result<Vec<Sequence>, Error>;

    /// The packet this chain sent under `sequence`.
    async fn query_packet(&self, ctx: &QueryContext, sequence: Sequence)
        -> Result<Packet, Error>;

    /// Bulk variant of [`Chain::query_packet`].
    async fn query_packets(
        &self,
        ctx: &QueryContext,
        sequences: &[Sequence],
    ) -> Result<BTreeMap<Sequence, Packet>, Error> {
        let mut packets = BTreeMap::new();
        for sequence in sequences {
            packets.insert(*sequence, self.query_packet(ctx, *sequence).await?);
        }
        Ok(packets)
    }

    /// The acknowledgement this chain wrote for `sequence`.
    async fn query_packet_acknowledgement(
        &self,
        ctx: &QueryContext,
        sequence: Sequence,
    ) -> Result<Vec<u8>, Error>;

    /// Packets sent by this chain that are finalized here but may not
    /// have been delivered to `counterparty` yet.
    ///
    /// The default implementation composes the paginated commitment
    /// scan with per-sequence packet lookups; adapters with an event
    /// source can override it with event-based discovery.
    async fn query_unfinalized_relay_packets(
        &self,
        ctx: &QueryContext,
        counterparty: &(dyn Chain),
    ) -> Result<PacketInfoList, Error> {
        debug!(
            chain = %self.id(),
            counterparty = %counterparty.id(),
            height = %ctx.height(),
            "scanning packet commitments"
        );

        let sequences = self
            .query_packet_commitments(ctx, Pagination::default())
            .await?;
        let mut packets = self.query_packets(ctx, &sequences).await?;

        let mut infos = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            let packet = packets.remove(&sequence).ok_or_else(|| {
                Error::empty_response(self.id().clone(), format!("packet {sequence}"))
            })?;
            infos.push(PacketInfo {
                packet,
                acknowledgement: None,
                event_height: ctx.height(),
            });
        }

        Ok(infos.into())
    }

    /// Acknowledgements written by this chain (for packets sent by
    /// `counterparty`) that are finalized here but may not have been
    /// relayed back yet.
    async fn query_unfinalized_relay_acknowledgements(
        &self,
        ctx: &QueryContext,
        counterparty: &(dyn Chain),
    ) -> Result<PacketInfoList, Error> {
        debug!(
            chain = %self.id(),
            counterparty = %counterparty.id(),
            height = %ctx.height(),
            "scanning written acknowledgements"
        );

        let sequences = self
            .query_packet_acknowledgements(ctx, Pagination::default())
            .await?;
        if sequences.is_empty() {
            return Ok(PacketInfoList::default());
        }

        // The packet payloads live on the origin chain; packet data is
        // immutable once committed, so its latest height serves.
        let counterparty_ctx = ctx.with_height(counterparty.latest_height().await?);
        let mut packets = counterparty
            .query_packets(&counterparty_ctx, &sequences)
            .await?;

        let mut infos = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            let packet = packets.remove(&sequence).ok_or_else(|| {
                Error::empty_response(counterparty.id().clone(), format!("packet {sequence}"))
            })?;
            let acknowledgement = self.query_packet_acknowledgement(ctx, sequence).await?;
            infos.push(PacketInfo {
                packet,
                acknowledgement: Some(acknowledgement),
                event_height: ctx.height(),
            });
        }

        Ok(infos.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_context_aborts_queries() {
        let cancel = CancellationToken::new();
        let ctx = QueryContext::new(Height::new(0, 10), cancel.clone());

        cancel.cancel();

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result.unwrap_err().detail(),
            crate::error::ErrorDetail::Cancelled(_)
        ));
    }

    #[test]
    fn default_pagination_uses_the_standard_page() {
        let p = Pagination::default();
        assert_eq!(p.offset, 0);
        assert_eq!(p.limit, DEFAULT_PAGE_SIZE);
    }
}
