//! The per-tick snapshot of both chains' finalized state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use ibc_relay_types::header::Header;
use ibc_relay_types::height::Height;
use ibc_relay_types::identifier::ChainId;

use crate::chain::QueryContext;
use crate::error::Error;
use crate::provable::ProvableChain;

struct Snapshot {
    latest: HashMap<ChainId, Height>,
    // update-client header sequences, keyed by the chain they attest to
    update_headers: HashMap<ChainId, Vec<Arc<dyn Header>>>,
}

/// Fixes, for the duration of one tick, the latest finalized height of
/// each chain together with the header sequences needed to bring the
/// peer's on-chain client up to that height.
///
/// All query contexts handed out by one snapshot carry the same heights,
/// so a queried commitment and its proof agree. [`SyncHeaders::updates`]
/// refreshes the snapshot in place, which the discovery retries use when
/// a failure smells like a stale height.
pub struct SyncHeaders {
    cancel: CancellationToken,
    state: RwLock<Snapshot>,
}

impl SyncHeaders {
    /// Takes the initial snapshot; the two finalized-header fetches run
    /// concurrently and either failure aborts construction.
    pub async fn new(
        src: &ProvableChain,
        dst: &ProvableChain,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let snapshot = take_snapshot(src, dst, &cancel).await?;
        Ok(Self {
            cancel,
            state: RwLock::new(snapshot),
        })
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The snapshot's finalized height for `chain_id`.
    pub fn get_latest_height(&self, chain_id: &ChainId) -> Result<Height, Error> {
        self.state
            .read()
            .expect("poisoned lock")
            .latest
            .get(chain_id)
            .copied()
            .ok_or_else(|| Error::unknown_chain(chain_id.clone()))
    }

    /// A query context pinned to the snapshot height of `chain_id`.
    pub fn get_query_context(&self, chain_id: &ChainId) -> Result<QueryContext, Error> {
        Ok(QueryContext::new(
            self.get_latest_height(chain_id)?,
            self.cancel.clone(),
        ))
    }

    /// The cached header sequence bringing `to`'s view of `from`
    /// current.
    pub fn setup_headers_for_update(
        &self,
        from: &ChainId,
        to: &ChainId,
    ) -> Result<Vec<Arc<dyn Header>>, Error> {
        let state = self.state.read().expect("poisoned lock");

        if !state.latest.contains_key(to) {
            return Err(Error::unknown_chain(to.clone()));
        }

        state
            .update_headers
            .get(from)
            .cloned()
            .ok_or_else(|| Error::unknown_chain(from.clone()))
    }

    /// Re-fetches both finalized headers and recomputes the update
    /// sequences, replacing the snapshot.
    pub async fn updates(&self, src: &ProvableChain, dst: &ProvableChain) -> Result<(), Error> {
        let snapshot = take_snapshot(src, dst, &self.cancel).await?;
        *self.state.write().expect("poisoned lock") = snapshot;
        Ok(())
    }
}

async fn take_snapshot(
    src: &ProvableChain,
    dst: &ProvableChain,
    cancel: &CancellationToken,
) -> Result<Snapshot, Error> {
    let fetch = async {
        let (src_header, dst_header) = tokio::try_join!(
            src.latest_finalized_header(),
            dst.latest_finalized_header()
        )?;
        let (src_update, dst_update) = tokio::try_join!(
            src.setup_headers_for_update(dst),
            dst.setup_headers_for_update(src)
        )?;
        Ok::<_, Error>((src_header, dst_header, src_update, dst_update))
    };

    let (src_header, dst_header, src_update, dst_update) = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::cancelled()),
        res = fetch => res?,
    };

    debug!(
        src = %src.id(), src_height = %src_header.height(),
        dst = %dst.id(), dst_height = %dst_header.height(),
        "snapshotted finalized heights"
    );

    let mut latest = HashMap::new();
    latest.insert(src.id().clone(), src_header.height());
    latest.insert(dst.id().clone(), dst_header.height());

    let mut update_headers = HashMap::new();
    update_headers.insert(src.id().clone(), src_update);
    update_headers.insert(dst.id().clone(), dst_update);

    Ok(Snapshot {
        latest,
        update_headers,
    })
}
