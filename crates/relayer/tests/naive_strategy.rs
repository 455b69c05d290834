//! End-to-end relay rounds over a pair of in-memory chains.

use std::sync::{Arc, Mutex};

use ibc_proto::google::protobuf::Any;
use ibc_proto::ibc::core::channel::v1::MsgRecvPacket as RawMsgRecvPacket;
use ibc_proto::ibc::core::client::v1::Height as RawHeight;
use prost::Message;
use tokio_util::sync::CancellationToken;

use ibc_relay::chain::mock::{provable_pair, MockChain, CREATE_CLIENT_TYPE_URL};
use ibc_relay::chain::MsgEventListener;
use ibc_relay::client::{create_clients, update_clients};
use ibc_relay::config::{MaxMsgCount, MaxTxSize};
use ibc_relay::error::{Error, ErrorDetail};
use ibc_relay::path::PathEnd;
use ibc_relay::provable::ProvableChain;
use ibc_relay::relay_msgs::RelayMsgs;
use ibc_relay::strategy::NaiveStrategy;
use ibc_relay::sync_headers::SyncHeaders;
use ibc_relay_types::channel::Ordering;
use ibc_relay_types::height::Height;
use ibc_relay_types::identifier::ChainId;
use ibc_relay_types::msgs::acknowledgement::ACKNOWLEDGEMENT_TYPE_URL;
use ibc_relay_types::msgs::recv_packet::RECV_PACKET_TYPE_URL;
use ibc_relay_types::msgs::update_client::UPDATE_CLIENT_TYPE_URL;
use ibc_relay_types::packet::Packet;

struct Harness {
    src: ProvableChain,
    dst: ProvableChain,
    src_chain: Arc<MockChain>,
    dst_chain: Arc<MockChain>,
}

fn harness(ordering: Ordering) -> Harness {
    let src_id = ChainId::from_string("ibc-0");
    let dst_id = ChainId::from_string("ibc-1");

    let src_chain = Arc::new(MockChain::new(
        src_id.clone(),
        "cosmos1srcrelayer".parse().unwrap(),
    ));
    let dst_chain = Arc::new(MockChain::new(
        dst_id.clone(),
        "cosmos1dstrelayer".parse().unwrap(),
    ));

    let (src, dst) = provable_pair(&src_chain, &dst_chain);
    src.set_path(path_end(&src_id, "channel-0", ordering)).unwrap();
    dst.set_path(path_end(&dst_id, "channel-1", ordering)).unwrap();

    Harness {
        src,
        dst,
        src_chain,
        dst_chain,
    }
}

fn path_end(chain_id: &ChainId, channel: &str, ordering: Ordering) -> PathEnd {
    PathEnd {
        chain_id: chain_id.clone(),
        client_id: "07-tendermint-0".parse().unwrap(),
        connection_id: "connection-0".parse().unwrap(),
        channel_id: channel.parse().unwrap(),
        port_id: "transfer".parse().unwrap(),
        ordering,
    }
}

/// A packet sent from `ibc-0` towards `ibc-1`.
fn packet(sequence: u64) -> Packet {
    Packet {
        sequence: sequence.into(),
        source_port: "transfer".parse().unwrap(),
        source_channel: "channel-0".parse().unwrap(),
        destination_port: "transfer".parse().unwrap(),
        destination_channel: "channel-1".parse().unwrap(),
        data: format!("payload-{sequence}").into_bytes(),
        timeout_height: None,
        timeout_timestamp: 0,
    }
}

/// A packet sent from `ibc-1` towards `ibc-0`.
fn reverse_packet(sequence: u64) -> Packet {
    Packet {
        sequence: sequence.into(),
        source_port: "transfer".parse().unwrap(),
        source_channel: "channel-1".parse().unwrap(),
        destination_port: "transfer".parse().unwrap(),
        destination_channel: "channel-0".parse().unwrap(),
        data: format!("payload-{sequence}").into_bytes(),
        timeout_height: None,
        timeout_timestamp: 0,
    }
}

async fn snapshot(h: &Harness) -> SyncHeaders {
    SyncHeaders::new(&h.src, &h.dst, CancellationToken::new())
        .await
        .unwrap()
}

fn type_urls(tx: &[Any]) -> Vec<&str> {
    tx.iter().map(|m| m.type_url.as_str()).collect()
}

fn recv_sequences(tx: &[Any]) -> Vec<u64> {
    tx.iter()
        .filter(|m| m.type_url == RECV_PACKET_TYPE_URL)
        .map(|m| {
            RawMsgRecvPacket::decode(m.value.as_slice())
                .unwrap()
                .packet
                .unwrap()
                .sequence
        })
        .collect()
}

#[test_log::test(tokio::test)]
async fn single_packet_relay() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    h.src_chain.send_packet(packet(1));
    h.src_chain.set_latest_height(Height::new(0, 100));
    h.dst_chain.set_client_height(Height::new(0, 90));

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    assert_eq!(sp.src.extract_sequence_list(), vec![1.into()]);
    assert!(sp.dst.is_empty());

    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    // nothing flows towards the source chain
    assert!(h.src_chain.submitted_txs().is_empty());

    let txs = h.dst_chain.submitted_txs();
    assert_eq!(txs.len(), 1);
    assert_eq!(
        type_urls(&txs[0]),
        vec![UPDATE_CLIENT_TYPE_URL, RECV_PACKET_TYPE_URL]
    );

    // the proof is taken at the snapshotted finalized height, and the
    // prepended update brings the client there
    let raw = RawMsgRecvPacket::decode(txs[0][1].value.as_slice()).unwrap();
    assert_eq!(
        raw.proof_height,
        Some(RawHeight {
            revision_number: 0,
            revision_height: 100,
        })
    );

    assert!(h.dst_chain.has_received(1.into()));
    assert_eq!(h.dst_chain.client_height(), Some(Height::new(0, 100)));
}

#[test_log::test(tokio::test)]
async fn bidirectional_relay_dispatches_independently() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    h.src_chain.send_packet(packet(1));
    h.dst_chain.send_packet(reverse_packet(7));

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    let src_txs = h.src_chain.submitted_txs();
    let dst_txs = h.dst_chain.submitted_txs();
    assert_eq!(src_txs.len(), 1);
    assert_eq!(dst_txs.len(), 1);

    // each dispatch carries its own update-client prefix
    assert_eq!(src_txs[0][0].type_url, UPDATE_CLIENT_TYPE_URL);
    assert_eq!(dst_txs[0][0].type_url, UPDATE_CLIENT_TYPE_URL);
    assert_eq!(recv_sequences(&src_txs[0]), vec![7]);
    assert_eq!(recv_sequences(&dst_txs[0]), vec![1]);
}

#[test_log::test(tokio::test)]
async fn batching_splits_transactions_and_keeps_update_prefix_first() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::new(
        false,
        MaxTxSize::unbounded(),
        MaxMsgCount::new(2).unwrap(),
    );

    for seq in 1..=5 {
        h.src_chain.send_packet(packet(seq));
    }

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    let txs = h.dst_chain.submitted_txs();
    assert_eq!(
        txs.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );

    // only the first transaction carries the client update
    assert_eq!(txs[0][0].type_url, UPDATE_CLIENT_TYPE_URL);
    for tx in &txs[1..] {
        assert!(tx.iter().all(|m| m.type_url == RECV_PACKET_TYPE_URL));
    }

    let relayed: Vec<u64> = txs.iter().flat_map(|tx| recv_sequences(tx)).collect();
    assert_eq!(relayed, vec![1, 2, 3, 4, 5]);
}

#[test_log::test(tokio::test)]
async fn already_received_packets_are_filtered_out() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    for seq in 1..=10 {
        h.src_chain.send_packet(packet(seq));
    }
    for seq in [2u64, 5, 9] {
        h.dst_chain.receive_packet(seq.into());
    }

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    assert_eq!(sp.src.len(), 7);

    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    let txs = h.dst_chain.submitted_txs();
    assert_eq!(txs.len(), 1);
    assert_eq!(recv_sequences(&txs[0]), vec![1, 3, 4, 6, 7, 8, 10]);
}

#[test_log::test(tokio::test)]
async fn proof_timeout_skips_one_sequence_and_recovers_next_tick() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    for seq in 1..=10 {
        h.src_chain.send_packet(packet(seq));
    }
    h.src_chain.inject_proof_timeout(5.into());

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    let txs = h.dst_chain.submitted_txs();
    assert_eq!(txs.len(), 1);
    assert_eq!(recv_sequences(&txs[0]), vec![1, 2, 3, 4, 6, 7, 8, 9, 10]);
    assert!(!h.dst_chain.has_received(5.into()));

    // the skipped sequence is eligible again once the fault clears
    h.src_chain.clear_proof_timeout(5.into());
    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    assert_eq!(sp.src.extract_sequence_list(), vec![5.into()]);

    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();
    assert!(h.dst_chain.has_received(5.into()));
}

#[test_log::test(tokio::test)]
async fn ordered_channel_holds_back_sequences_past_a_gap() {
    let h = harness(Ordering::Ordered);
    let strategy = NaiveStrategy::new(
        true,
        MaxTxSize::unbounded(),
        MaxMsgCount::default(),
    );

    for seq in 1..=3 {
        h.src_chain.send_packet(packet(seq));
    }
    h.src_chain.inject_proof_timeout(2.into());

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    let txs = h.dst_chain.submitted_txs();
    assert_eq!(txs.len(), 1);
    assert_eq!(recv_sequences(&txs[0]), vec![1]);
    assert!(!h.dst_chain.has_received(2.into()));
    assert!(!h.dst_chain.has_received(3.into()));
}

#[test_log::test(tokio::test)]
async fn collected_messages_keep_input_order_under_concurrency() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    // more packets than the proof-query concurrency cap
    for seq in 1..=75 {
        h.src_chain.send_packet(packet(seq));
    }

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    let txs = h.dst_chain.submitted_txs();
    let relayed: Vec<u64> = txs.iter().flat_map(|tx| recv_sequences(tx)).collect();
    assert_eq!(relayed, (1..=75).collect::<Vec<u64>>());
}

#[test_log::test(tokio::test)]
async fn tick_over_settled_state_dispatches_nothing() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    h.src_chain.send_packet(packet(1));

    // first tick delivers the packet, second relays the resulting ack
    for _ in 0..2 {
        strategy
            .tick(&h.src, &h.dst, CancellationToken::new())
            .await
            .unwrap();
    }
    assert_eq!(h.dst_chain.submitted_txs().len(), 1);
    assert_eq!(h.src_chain.submitted_txs().len(), 1);
    assert!(h.src_chain.committed_sequences().is_empty());

    // the state is settled; a further tick is a no-op on both sides
    strategy
        .tick(&h.src, &h.dst, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(h.dst_chain.submitted_txs().len(), 1);
    assert_eq!(h.src_chain.submitted_txs().len(), 1);
}

#[test_log::test(tokio::test)]
async fn acknowledgements_flow_back_and_clear_commitments() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    h.src_chain.send_packet(packet(1));

    // first tick delivers the packet; the mock application answers with
    // an acknowledgement immediately
    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();
    assert_eq!(h.src_chain.committed_sequences(), vec![1.into()]);

    // second tick relays the acknowledgement back to the origin
    let sh = snapshot(&h).await;
    let acks = strategy
        .unrelayed_acknowledgements(&h.src, &h.dst, &sh)
        .await
        .unwrap();
    assert_eq!(acks.dst.extract_sequence_list(), vec![1.into()]);
    assert!(acks.src.is_empty());

    strategy
        .relay_acknowledgements(&h.src, &h.dst, &acks, &sh)
        .await
        .unwrap();

    let src_txs = h.src_chain.submitted_txs();
    assert_eq!(src_txs.len(), 1);
    assert_eq!(
        type_urls(&src_txs[0]),
        vec![UPDATE_CLIENT_TYPE_URL, ACKNOWLEDGEMENT_TYPE_URL]
    );
    assert!(h.src_chain.committed_sequences().is_empty());

    // with the commitment cleared, the ack is no longer unrelayed
    let sh = snapshot(&h).await;
    let acks = strategy
        .unrelayed_acknowledgements(&h.src, &h.dst, &sh)
        .await
        .unwrap();
    assert!(acks.src.is_empty());
    assert!(acks.dst.is_empty());
}

#[test_log::test(tokio::test)]
async fn rejected_submission_leaves_state_for_the_next_tick() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    h.src_chain.send_packet(packet(1));
    h.dst_chain.reject_sends(true);

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    assert!(h.dst_chain.submitted_txs().is_empty());
    assert!(!h.dst_chain.has_received(1.into()));

    // the next tick re-discovers and delivers
    h.dst_chain.reject_sends(false);
    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    assert_eq!(sp.src.extract_sequence_list(), vec![1.into()]);
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();
    assert!(h.dst_chain.has_received(1.into()));
}

#[test_log::test(tokio::test)]
async fn cancellation_discards_partial_work() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    h.src_chain.send_packet(packet(1));

    let cancel = CancellationToken::new();
    let sh = SyncHeaders::new(&h.src, &h.dst, cancel.clone()).await.unwrap();
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();

    cancel.cancel();
    let result = strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await;
    assert!(matches!(
        result.unwrap_err().detail(),
        ErrorDetail::Cancelled(_)
    ));
    assert!(h.dst_chain.submitted_txs().is_empty());
}

#[test_log::test(tokio::test)]
async fn create_then_update_clients() {
    let h = harness(Ordering::Unordered);

    assert_eq!(h.src_chain.client_height(), None);
    assert_eq!(h.dst_chain.client_height(), None);

    create_clients(&h.src, &h.dst).await.unwrap();

    let src_txs = h.src_chain.submitted_txs();
    let dst_txs = h.dst_chain.submitted_txs();
    assert_eq!(src_txs.len(), 1);
    assert_eq!(dst_txs.len(), 1);
    assert_eq!(type_urls(&src_txs[0]), vec![CREATE_CLIENT_TYPE_URL]);
    assert_eq!(type_urls(&dst_txs[0]), vec![CREATE_CLIENT_TYPE_URL]);

    // each chain now hosts a client seeded with the counterparty's
    // finalized header
    assert!(h.src_chain.client_height().is_some());
    assert!(h.dst_chain.client_height().is_some());

    // no header progression: an update round dispatches nothing
    update_clients(&h.src, &h.dst, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(h.src_chain.submitted_txs().len(), 1);
    assert_eq!(h.dst_chain.submitted_txs().len(), 1);

    // once the source progresses, only its client gets refreshed
    h.src_chain.set_latest_height(Height::new(0, 50));
    update_clients(&h.src, &h.dst, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(h.src_chain.submitted_txs().len(), 1);

    let dst_txs = h.dst_chain.submitted_txs();
    assert_eq!(dst_txs.len(), 2);
    assert_eq!(type_urls(&dst_txs[1]), vec![UPDATE_CLIENT_TYPE_URL]);
    assert_eq!(h.dst_chain.client_height(), Some(Height::new(0, 50)));
}

#[test_log::test(tokio::test)]
async fn empty_bundle_send_is_a_successful_noop() {
    let h = harness(Ordering::Unordered);

    let mut msgs = RelayMsgs::new(MaxTxSize::unbounded(), MaxMsgCount::default());
    assert!(!msgs.ready());

    msgs.send(&h.src, &h.dst).await;

    assert!(msgs.success());
    assert!(h.src_chain.submitted_txs().is_empty());
    assert!(h.dst_chain.submitted_txs().is_empty());
}

#[test_log::test(tokio::test)]
async fn setup_relay_warms_both_ends() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    strategy.setup_relay(&h.src, &h.dst).await.unwrap();
    strategy.setup_relay(&h.src, &h.dst).await.unwrap();

    assert_eq!(h.src_chain.setup_calls(), 2);
    assert_eq!(h.dst_chain.setup_calls(), 2);
}

#[test_log::test(tokio::test)]
async fn snapshot_refresh_picks_up_new_heights() {
    let h = harness(Ordering::Unordered);

    let sh = snapshot(&h).await;
    assert_eq!(
        sh.get_latest_height(h.src.id()).unwrap(),
        Height::new(0, 1)
    );

    h.src_chain.set_latest_height(Height::new(0, 20));
    assert_eq!(
        sh.get_latest_height(h.src.id()).unwrap(),
        Height::new(0, 1)
    );

    sh.updates(&h.src, &h.dst).await.unwrap();
    assert_eq!(
        sh.get_latest_height(h.src.id()).unwrap(),
        Height::new(0, 20)
    );

    assert!(matches!(
        sh.get_latest_height(&ChainId::from_string("ibc-9")),
        Err(ref e) if matches!(e.detail(), ErrorDetail::UnknownChain(_))
    ));
}

struct CountingListener {
    batches: Mutex<Vec<usize>>,
}

impl MsgEventListener for CountingListener {
    fn on_sent_msg(&self, msgs: &[Any]) -> Result<(), Error> {
        self.batches.lock().unwrap().push(msgs.len());
        Ok(())
    }
}

#[test_log::test(tokio::test)]
async fn listeners_observe_dispatched_batches() {
    let h = harness(Ordering::Unordered);
    let strategy = NaiveStrategy::default();

    let listener = Arc::new(CountingListener {
        batches: Mutex::new(Vec::new()),
    });
    h.dst.register_msg_event_listener(listener.clone());

    h.src_chain.send_packet(packet(1));
    h.src_chain.send_packet(packet(2));

    let sh = snapshot(&h).await;
    let sp = strategy.unrelayed_packets(&h.src, &h.dst, &sh).await.unwrap();
    strategy.relay_packets(&h.src, &h.dst, &sp, &sh).await.unwrap();

    // one batch: the update prefix plus two receive messages
    assert_eq!(*listener.batches.lock().unwrap(), vec![3]);
}
