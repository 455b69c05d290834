//! The two-sided dispatch bundle of a relay round.

use ibc_proto::google::protobuf::Any;
use prost::Message;
use tracing::debug;

use crate::config::{MaxMsgCount, MaxTxSize};
use crate::provable::ProvableChain;

/// Messages bound for one chain.
///
/// The update-client prefix is kept apart from the payload: it rides
/// only on the first transaction of the side and does not count against
/// the per-transaction message cap.
#[derive(Clone, Debug, Default)]
pub struct OutgoingMsgs {
    pub update_clients: Vec<Any>,
    pub msgs: Vec<Any>,
}

impl OutgoingMsgs {
    pub fn is_empty(&self) -> bool {
        self.update_clients.is_empty() && self.msgs.is_empty()
    }
}

/// A bundle of messages for both chains, with the transaction caps to
/// split each side under. `src` is submitted **to the source chain**,
/// `dst` to the destination.
pub struct RelayMsgs {
    pub src: OutgoingMsgs,
    pub dst: OutgoingMsgs,
    max_tx_size: MaxTxSize,
    max_msg_count: MaxMsgCount,
    succeeded: bool,
}

impl RelayMsgs {
    pub fn new(max_tx_size: MaxTxSize, max_msg_count: MaxMsgCount) -> Self {
        Self {
            src: OutgoingMsgs::default(),
            dst: OutgoingMsgs::default(),
            max_tx_size,
            max_msg_count,
            succeeded: false,
        }
    }

    /// True iff either side has at least one message.
    pub fn ready(&self) -> bool {
        !self.src.is_empty() || !self.dst.is_empty()
    }

    /// Splits each non-empty side into cap-respecting transactions and
    /// dispatches them: sides concurrently, transactions within a side
    /// sequentially (the signing account's nonce orders them). An empty
    /// bundle is a successful no-op.
    pub async fn send(&mut self, src: &ProvableChain, dst: &ProvableChain) {
        let src_batches = batch_messages(&self.src, self.max_msg_count, self.max_tx_size);
        let dst_batches = batch_messages(&self.dst, self.max_msg_count, self.max_tx_size);

        debug!(
            src = %src.id(), src_txs = src_batches.len(),
            dst = %dst.id(), dst_txs = dst_batches.len(),
            "dispatching relay messages"
        );

        let (src_ok, dst_ok) = tokio::join!(
            send_side(src, src_batches),
            send_side(dst, dst_batches)
        );

        self.succeeded = src_ok && dst_ok;
    }

    pub fn success(&self) -> bool {
        self.succeeded
    }
}

async fn send_side(chain: &ProvableChain, batches: Vec<Vec<Any>>) -> bool {
    for batch in batches {
        // a failed transaction short-circuits the side; already
        // committed transactions stand, IBC receipts make re-delivery
        // a rejected no-op
        if !chain.send(batch).await {
            return false;
        }
    }
    true
}

/// Greedy left-to-right split of one side into transactions.
///
/// Payload messages accumulate until adding the next one would exceed
/// `max_msg_count` messages or `max_tx_size` encoded bytes (0 bytes =
/// unbounded); the update-client prefix is then grafted onto the first
/// transaction, taking byte budget but not message-count budget. A
/// single message larger than the byte cap is emitted alone and left
/// for the chain to reject.
fn batch_messages(
    out: &OutgoingMsgs,
    max_msg_count: MaxMsgCount,
    max_tx_size: MaxTxSize,
) -> Vec<Vec<Any>> {
    let max_count = max_msg_count.to_usize();
    let size_cap = max_tx_size.to_usize();

    if out.msgs.is_empty() {
        if out.update_clients.is_empty() {
            return Vec::new();
        }
        return vec![out.update_clients.clone()];
    }

    let update_size: usize = out.update_clients.iter().map(Message::encoded_len).sum();

    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_size = update_size;

    for msg in &out.msgs {
        let msg_size = msg.encoded_len();
        let over_count = current.len() >= max_count;
        let over_size = size_cap != 0 && !current.is_empty() && current_size + msg_size > size_cap;

        if over_count || over_size {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }

        current_size += msg_size;
        current.push(msg.clone());
    }

    if !current.is_empty() {
        batches.push(current);
    }

    if !out.update_clients.is_empty() {
        if let Some(first) = batches.first_mut() {
            let mut prefixed = out.update_clients.clone();
            prefixed.extend(first.drain(..));
            *first = prefixed;
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(type_url: &str, len: usize) -> Any {
        Any {
            type_url: type_url.to_string(),
            value: vec![0; len],
        }
    }

    fn side(updates: usize, payload: usize) -> OutgoingMsgs {
        OutgoingMsgs {
            update_clients: (0..updates).map(|_| any("/test.Update", 8)).collect(),
            msgs: (0..payload).map(|_| any("/test.Recv", 8)).collect(),
        }
    }

    #[test]
    fn empty_side_yields_no_transactions() {
        assert!(batch_messages(&side(0, 0), MaxMsgCount::default(), MaxTxSize::unbounded())
            .is_empty());
    }

    #[test]
    fn update_only_side_yields_one_transaction() {
        let batches = batch_messages(&side(2, 0), MaxMsgCount::default(), MaxTxSize::unbounded());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn transaction_count_is_payload_ceiling() {
        // 850 payload messages under a 400 cap: 401 (update + 400),
        // 400, 50 -- the update prefix rides only the first transaction
        // and does not count against the cap
        let batches = batch_messages(
            &side(1, 850),
            MaxMsgCount::new(400).unwrap(),
            MaxTxSize::unbounded(),
        );

        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![401, 400, 50]
        );
        assert_eq!(batches[0][0].type_url, "/test.Update");
        assert!(batches[1].iter().all(|m| m.type_url == "/test.Recv"));
        assert!(batches[2].iter().all(|m| m.type_url == "/test.Recv"));
    }

    #[test]
    fn no_count_cap_violations_without_updates() {
        let batches = batch_messages(
            &side(0, 7),
            MaxMsgCount::new(3).unwrap(),
            MaxTxSize::unbounded(),
        );
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
    }

    #[test]
    fn byte_cap_splits_batches() {
        let msgs = side(0, 5);
        let per_msg = msgs.msgs[0].encoded_len();

        // room for exactly two payload messages per transaction
        let batches = batch_messages(
            &msgs,
            MaxMsgCount::default(),
            MaxTxSize::new(per_msg * 2).unwrap(),
        );
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );

        for batch in &batches {
            let size: usize = batch.iter().map(Message::encoded_len).sum();
            assert!(size <= per_msg * 2);
        }
    }

    #[test]
    fn update_prefix_consumes_byte_budget_of_first_transaction() {
        let msgs = side(1, 3);
        let per_msg = msgs.msgs[0].encoded_len();
        let update_size = msgs.update_clients[0].encoded_len();

        // first transaction fits the update plus one payload message;
        // later transactions get the full byte budget back
        let batches = batch_messages(
            &msgs,
            MaxMsgCount::default(),
            MaxTxSize::new(update_size + per_msg).unwrap(),
        );

        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![2, 2]
        );
        assert_eq!(batches[0][0].type_url, "/test.Update");
        assert!(batches[1].iter().all(|m| m.type_url == "/test.Recv"));
    }

    #[test]
    fn oversized_message_is_emitted_alone() {
        let out = OutgoingMsgs {
            update_clients: vec![],
            msgs: vec![any("/test.Recv", 4), any("/test.Huge", 256), any("/test.Recv", 4)],
        };

        let batches = batch_messages(&out, MaxMsgCount::default(), MaxTxSize::new(64).unwrap());
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![1, 1, 1]
        );
        assert_eq!(batches[1][0].type_url, "/test.Huge");
    }
}
