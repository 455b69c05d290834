//! The naive relay strategy: discover, prove, bundle, dispatch.

use futures::stream::{self, StreamExt, TryStreamExt};
use ibc_proto::google::protobuf::Any;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ibc_relay_types::commitment::{compute_ack_commitment, compute_packet_commitment};
use ibc_relay_types::identifier::ChainId;
use ibc_relay_types::msgs::{Msg, MsgAcknowledgement, MsgRecvPacket};
use ibc_relay_types::packet::Sequence;
use ibc_relay_types::path::{AcksPath, CommitmentsPath};
use ibc_relay_types::signer::Signer;

use crate::chain::QueryContext;
use crate::config::{MaxMsgCount, MaxTxSize, StrategyConfig};
use crate::error::Error;
use crate::packet::{PacketInfoList, RelayPackets};
use crate::provable::ProvableChain;
use crate::relay_msgs::RelayMsgs;
use crate::sync_headers::SyncHeaders;
use crate::util::retry::{
    ack_discovery_retry_strategy, relay_retry_strategy, retry_with_strategy,
};

/// In-flight cap for the per-sequence proof queries. 100-way
/// concurrency produced RPC client timeouts against a single endpoint.
const PROOF_QUERY_CONCURRENCY: usize = 30;

/// Messages assembled for one direction, tagged with their sequences,
/// plus the sequences dropped by the transient-timeout skip.
struct CollectedMsgs {
    msgs: Vec<(Sequence, Any)>,
    skipped: Vec<Sequence>,
}

/// The pump: discovers unrelayed sequences on both chains, assembles
/// proof-carrying messages concurrently, prepends the needed client
/// updates and hands the bundle over for dispatch.
pub struct NaiveStrategy {
    ordered: bool,
    max_tx_size: MaxTxSize,
    max_msg_count: MaxMsgCount,
}

impl NaiveStrategy {
    pub fn new(ordered: bool, max_tx_size: MaxTxSize, max_msg_count: MaxMsgCount) -> Self {
        Self {
            ordered,
            max_tx_size,
            max_msg_count,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.ordered, config.max_tx_size, config.max_msg_count)
    }

    pub fn strategy_type(&self) -> &'static str {
        "naive"
    }

    /// Idempotent warm-up of both ends.
    pub async fn setup_relay(
        &self,
        src: &ProvableChain,
        dst: &ProvableChain,
    ) -> Result<(), Error> {
        src.setup_for_relay().await?;
        dst.setup_for_relay().await?;
        Ok(())
    }

    /// One full discovery/relay cycle under a fresh snapshot.
    pub async fn tick(
        &self,
        src: &ProvableChain,
        dst: &ProvableChain,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        let sh = SyncHeaders::new(src, dst, cancel).await?;

        let packets = self.unrelayed_packets(src, dst, &sh).await?;
        let acks = self.unrelayed_acknowledgements(src, dst, &sh).await?;

        self.relay_packets(src, dst, &packets, &sh).await?;
        self.relay_acknowledgements(src, dst, &acks, &sh).await?;

        Ok(())
    }

    /// Packets committed on either chain and not yet received by the
    /// counterparty.
    ///
    /// Discovery runs at the snapshot heights (so proofs will be
    /// producible), while the already-received check is asked at the
    /// counterparty's *latest* height to avoid re-relaying packets that
    /// just landed.
    pub async fn unrelayed_packets(
        &self,
        src: &ProvableChain,
        dst: &ProvableChain,
        sh: &SyncHeaders,
    ) -> Result<RelayPackets, Error> {
        let (src_packets, dst_packets) = tokio::try_join!(
            retry_with_strategy(
                "query unfinalized packets",
                relay_retry_strategy(),
                || async move {
                    let ctx = sh.get_query_context(src.id())?;
                    src.query_unfinalized_relay_packets(&ctx, dst).await
                }
            ),
            retry_with_strategy(
                "query unfinalized packets",
                relay_retry_strategy(),
                || async move {
                    let ctx = sh.get_query_context(dst.id())?;
                    dst.query_unfinalized_relay_packets(&ctx, src).await
                }
            ),
        )?;

        let (src_unreceived, dst_unreceived) = tokio::try_join!(
            filter_unreceived_packets(dst, &src_packets, sh),
            filter_unreceived_packets(src, &dst_packets, sh),
        )?;

        Ok(RelayPackets {
            src: src_packets.filter(&src_unreceived),
            dst: dst_packets.filter(&dst_unreceived),
        })
    }

    /// Acknowledgements written on either chain and not yet relayed
    /// back to the packet origin. Mirrors [`Self::unrelayed_packets`],
    /// with a snapshot refresh between retry attempts since ack
    /// discovery is the query most sensitive to stale heights.
    pub async fn unrelayed_acknowledgements(
        &self,
        src: &ProvableChain,
        dst: &ProvableChain,
        sh: &SyncHeaders,
    ) -> Result<RelayPackets, Error> {
        let (src_acks, dst_acks) =
            tokio::try_join!(discover_acks(src, dst, sh), discover_acks(dst, src, sh))?;

        let (src_unreceived, dst_unreceived) = tokio::try_join!(
            filter_unreceived_acks(dst, &src_acks, sh),
            filter_unreceived_acks(src, &dst_acks, sh),
        )?;

        Ok(RelayPackets {
            src: src_acks.filter(&src_unreceived),
            dst: dst_acks.filter(&dst_unreceived),
        })
    }

    /// Builds and dispatches the receive messages for both directions,
    /// each behind the client updates its proofs need.
    pub async fn relay_packets(
        &self,
        src: &ProvableChain,
        dst: &ProvableChain,
        packets: &RelayPackets,
        sh: &SyncHeaders,
    ) -> Result<(), Error> {
        let mut msgs = RelayMsgs::new(self.max_tx_size, self.max_msg_count);

        let src_addr = src.get_address()?;
        let dst_addr = dst.get_address()?;
        let src_ctx = sh.get_query_context(src.id())?;
        let dst_ctx = sh.get_query_context(dst.id())?;

        let collected = collect_packets(&src_ctx, src, &packets.src, dst_addr.clone()).await?;
        msgs.dst.msgs = self.apply_ordering_gate(collected, src.id());

        let collected = collect_packets(&dst_ctx, dst, &packets.dst, src_addr.clone()).await?;
        msgs.src.msgs = self.apply_ordering_gate(collected, dst.id());

        if !msgs.ready() {
            info!(src = %src.id(), dst = %dst.id(), "no packets to relay");
            return Ok(());
        }

        self.prepend_client_updates(&mut msgs, src, dst, &src_addr, &dst_addr, sh)?;

        msgs.send(src, dst).await;
        if msgs.success() {
            log_relayed(src, dst, &msgs, "packets");
        }

        Ok(())
    }

    /// Builds and dispatches the acknowledgement messages for both
    /// directions; symmetric to [`Self::relay_packets`].
    pub async fn relay_acknowledgements(
        &self,
        src: &ProvableChain,
        dst: &ProvableChain,
        acks: &RelayPackets,
        sh: &SyncHeaders,
    ) -> Result<(), Error> {
        let mut msgs = RelayMsgs::new(self.max_tx_size, self.max_msg_count);

        let src_addr = src.get_address()?;
        let dst_addr = dst.get_address()?;
        let src_ctx = sh.get_query_context(src.id())?;
        let dst_ctx = sh.get_query_context(dst.id())?;

        let collected = collect_acks(&src_ctx, src, &acks.src, dst_addr.clone()).await?;
        msgs.dst.msgs = self.apply_ordering_gate(collected, src.id());

        let collected = collect_acks(&dst_ctx, dst, &acks.dst, src_addr.clone()).await?;
        msgs.src.msgs = self.apply_ordering_gate(collected, dst.id());

        if !msgs.ready() {
            info!(src = %src.id(), dst = %dst.id(), "no acknowledgements to relay");
            return Ok(());
        }

        self.prepend_client_updates(&mut msgs, src, dst, &src_addr, &dst_addr, sh)?;

        msgs.send(src, dst).await;
        if msgs.success() {
            log_relayed(src, dst, &msgs, "acknowledgements");
        }

        Ok(())
    }

    /// Client updates are only built for sides that carry payload; an
    /// update with nothing behind it is not worth a transaction.
    fn prepend_client_updates(
        &self,
        msgs: &mut RelayMsgs,
        src: &ProvableChain,
        dst: &ProvableChain,
        src_addr: &Signer,
        dst_addr: &Signer,
        sh: &SyncHeaders,
    ) -> Result<(), Error> {
        if !msgs.dst.msgs.is_empty() {
            let headers = sh.setup_headers_for_update(src.id(), dst.id())?;
            msgs.dst.update_clients = dst.path()?.update_clients(&headers, dst_addr);
        }

        if !msgs.src.msgs.is_empty() {
            let headers = sh.setup_headers_for_update(dst.id(), src.id())?;
            msgs.src.update_clients = src.path()?.update_clients(&headers, src_addr);
        }

        Ok(())
    }

    /// On an ordered channel a sequence must never be dispatched before
    /// its predecessor is confirmed, so everything past the first
    /// timeout-skip gap is held back for the next tick.
    fn apply_ordering_gate(&self, collected: CollectedMsgs, origin: &ChainId) -> Vec<Any> {
        let CollectedMsgs { msgs, skipped } = collected;

        if !self.ordered || skipped.is_empty() {
            return msgs.into_iter().map(|(_, msg)| msg).collect();
        }

        let cutoff = skipped
            .iter()
            .copied()
            .min()
            .unwrap_or_else(|| Sequence::from(u64::MAX));

        let kept: Vec<Any> = msgs
            .into_iter()
            .take_while(|(sequence, _)| *sequence < cutoff)
            .map(|(_, msg)| msg)
            .collect();

        warn!(
            chain = %origin,
            %cutoff,
            kept = kept.len(),
            "ordered channel: holding back messages past a missing sequence"
        );

        kept
    }
}

impl Default for NaiveStrategy {
    fn default() -> Self {
        Self::new(false, MaxTxSize::default(), MaxMsgCount::default())
    }
}

async fn filter_unreceived_packets(
    counterparty: &ProvableChain,
    packets: &PacketInfoList,
    sh: &SyncHeaders,
) -> Result<Vec<Sequence>, Error> {
    let sequences = packets.extract_sequence_list();
    if sequences.is_empty() {
        return Ok(Vec::new());
    }

    let ctx = QueryContext::new(
        counterparty.latest_height().await?,
        sh.cancel_token().clone(),
    );
    counterparty.query_unreceived_packets(&ctx, sequences).await
}

async fn filter_unreceived_acks(
    counterparty: &ProvableChain,
    acks: &PacketInfoList,
    sh: &SyncHeaders,
) -> Result<Vec<Sequence>, Error> {
    let sequences = acks.extract_sequence_list();
    if sequences.is_empty() {
        return Ok(Vec::new());
    }

    let ctx = QueryContext::new(
        counterparty.latest_height().await?,
        sh.cancel_token().clone(),
    );
    counterparty
        .query_unreceived_acknowledgements(&ctx, sequences)
        .await
}

/// Ack discovery with bounded retries; the snapshot is refreshed before
/// each retry in case the failure was height-related.
async fn discover_acks(
    chain: &ProvableChain,
    counterparty: &ProvableChain,
    sh: &SyncHeaders,
) -> Result<PacketInfoList, Error> {
    let mut delays = ack_discovery_retry_strategy();
    let mut attempt = 1usize;

    loop {
        let ctx = sh.get_query_context(chain.id())?;
        match chain
            .query_unfinalized_relay_acknowledgements(&ctx, counterparty)
            .await
        {
            Ok(list) => return Ok(list),
            Err(e) => match delays.next() {
                Some(delay) => {
                    warn!(
                        chain = %chain.id(),
                        attempt,
                        "retrying unfinalized acknowledgements query: {}", e
                    );
                    tokio::time::sleep(delay).await;
                    sh.updates(chain, counterparty).await?;
                    attempt += 1;
                }
                None => {
                    error!(
                        chain = %chain.id(),
                        "unfinalized acknowledgements query failed: {}", e
                    );
                    return Err(Error::max_retries_exceeded(
                        "query unfinalized acknowledgements".to_string(),
                        attempt,
                    ));
                }
            },
        }
    }
}

/// Builds the receive message for every packet, fetching commitment
/// proofs from the origin chain with bounded concurrency. Output order
/// matches input order regardless of completion order; a sequence whose
/// proof query times out is skipped (and rediscovered next tick) rather
/// than failing the batch.
async fn collect_packets(
    ctx: &QueryContext,
    chain: &ProvableChain,
    packets: &PacketInfoList,
    signer: Signer,
) -> Result<CollectedMsgs, Error> {
    let futures = packets.iter().map(|info| {
        let signer = signer.clone();
        async move {
            let packet = &info.packet;
            let commitment = compute_packet_commitment(
                &packet.data,
                packet.timeout_height,
                packet.timeout_timestamp,
            );
            let path = CommitmentsPath {
                port_id: packet.source_port.clone(),
                channel_id: packet.source_channel.clone(),
                sequence: packet.sequence,
            };

            match ctx
                .run(chain.prove_state(ctx, path.into(), commitment.into_vec()))
                .await
            {
                Ok((proof, proof_height)) => {
                    let msg =
                        MsgRecvPacket::new(packet.clone(), proof, proof_height, signer).to_any();
                    Ok(Ok((packet.sequence, msg)))
                }
                Err(e) if e.is_query_timeout() => {
                    warn!(
                        chain = %chain.id(),
                        sequence = %packet.sequence,
                        "skipping packet, proof query timed out: {}", e
                    );
                    Ok(Err(packet.sequence))
                }
                Err(e) => Err(e),
            }
        }
    });

    let results: Vec<Result<(Sequence, Any), Sequence>> = stream::iter(futures)
        .buffered(PROOF_QUERY_CONCURRENCY)
        .try_collect()
        .await?;

    Ok(partition_collected(results))
}

/// The acknowledgement mirror of [`collect_packets`]: the proof binds
/// the ack commitment on the receiving chain, and the message is
/// addressed to the packet's origin.
async fn collect_acks(
    ctx: &QueryContext,
    chain: &ProvableChain,
    acks: &PacketInfoList,
    signer: Signer,
) -> Result<CollectedMsgs, Error> {
    let futures = acks.iter().map(|info| {
        let signer = signer.clone();
        async move {
            let packet = &info.packet;
            let acknowledgement = info
                .acknowledgement
                .clone()
                .ok_or_else(|| Error::missing_acknowledgement(packet.sequence))?;

            let commitment = compute_ack_commitment(&acknowledgement);
            let path = AcksPath {
                port_id: packet.destination_port.clone(),
                channel_id: packet.destination_channel.clone(),
                sequence: packet.sequence,
            };

            match ctx
                .run(chain.prove_state(ctx, path.into(), commitment.into_vec()))
                .await
            {
                Ok((proof, proof_height)) => {
                    let msg = MsgAcknowledgement::new(
                        packet.clone(),
                        acknowledgement,
                        proof,
                        proof_height,
                        signer,
                    )
                    .to_any();
                    Ok(Ok((packet.sequence, msg)))
                }
                Err(e) if e.is_query_timeout() => {
                    warn!(
                        chain = %chain.id(),
                        sequence = %packet.sequence,
                        "skipping acknowledgement, proof query timed out: {}", e
                    );
                    Ok(Err(packet.sequence))
                }
                Err(e) => Err(e),
            }
        }
    });

    let results: Vec<Result<(Sequence, Any), Sequence>> = stream::iter(futures)
        .buffered(PROOF_QUERY_CONCURRENCY)
        .try_collect()
        .await?;

    Ok(partition_collected(results))
}

fn partition_collected(results: Vec<Result<(Sequence, Any), Sequence>>) -> CollectedMsgs {
    let mut msgs = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();

    for result in results {
        match result {
            Ok(entry) => msgs.push(entry),
            Err(sequence) => skipped.push(sequence),
        }
    }

    CollectedMsgs { msgs, skipped }
}

fn log_relayed(src: &ProvableChain, dst: &ProvableChain, msgs: &RelayMsgs, kind: &str) {
    if !msgs.dst.msgs.is_empty() {
        info!(
            from = %src.id(),
            to = %dst.id(),
            count = msgs.dst.msgs.len(),
            "relayed {kind}"
        );
    }
    if !msgs.src.msgs.is_empty() {
        info!(
            from = %dst.id(),
            to = %src.id(),
            count = msgs.src.msgs.len(),
            "relayed {kind}"
        );
    }
}
