//! Client lifecycle operations: creating and refreshing the two
//! on-chain light clients a relay path depends on.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ibc_relay_types::header::Header;

use crate::config::{MaxMsgCount, MaxTxSize};
use crate::error::Error;
use crate::provable::ProvableChain;
use crate::relay_msgs::RelayMsgs;
use crate::sync_headers::SyncHeaders;

/// Creates the two clients: each chain receives a create message seeded
/// with the *counterparty's* latest finalized header.
pub async fn create_clients(src: &ProvableChain, dst: &ProvableChain) -> Result<(), Error> {
    let mut clients = RelayMsgs::new(MaxTxSize::unbounded(), MaxMsgCount::default());

    let (src_header, dst_header) = get_headers_for_create_client(src, dst).await?;

    let src_addr = src.get_address()?;
    let dst_addr = dst.get_address()?;

    // the client hosted on src tracks dst, so dst's prover builds it
    let msg = dst
        .create_msg_create_client(&src.path()?.client_id, dst_header.as_ref(), src_addr)
        .await?;
    clients.src.msgs.push(msg);

    let msg = src
        .create_msg_create_client(&dst.path()?.client_id, src_header.as_ref(), dst_addr)
        .await?;
    clients.dst.msgs.push(msg);

    if clients.ready() {
        clients.send(src, dst).await;
        if clients.success() {
            info!(src = %src.id(), dst = %dst.id(), "clients created");
        } else {
            error!(src = %src.id(), dst = %dst.id(), "client creation dispatch failed");
        }
    }

    Ok(())
}

/// Brings both on-chain clients up to the peers' latest finalized
/// heights. Dispatches nothing when neither client is behind.
pub async fn update_clients(
    src: &ProvableChain,
    dst: &ProvableChain,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let mut clients = RelayMsgs::new(MaxTxSize::unbounded(), MaxMsgCount::default());

    let sh = SyncHeaders::new(src, dst, cancel).await?;

    let src_headers = sh.setup_headers_for_update(src.id(), dst.id())?;
    let dst_headers = sh.setup_headers_for_update(dst.id(), src.id())?;

    // dst's headers advance the client hosted on src, and vice versa
    if !dst_headers.is_empty() {
        clients.src.update_clients = src.path()?.update_clients(&dst_headers, &src.get_address()?);
    }
    if !src_headers.is_empty() {
        clients.dst.update_clients = dst.path()?.update_clients(&src_headers, &dst.get_address()?);
    }

    if clients.ready() {
        clients.send(src, dst).await;
        if clients.success() {
            info!(src = %src.id(), dst = %dst.id(), "clients updated");
        }
    }

    Ok(())
}

/// Fetches the latest finalized header of both chains concurrently.
async fn get_headers_for_create_client(
    src: &ProvableChain,
    dst: &ProvableChain,
) -> Result<(Box<dyn Header>, Box<dyn Header>), Error> {
    tokio::try_join!(src.latest_finalized_header(), dst.latest_finalized_header())
}
