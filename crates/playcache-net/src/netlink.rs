//! Network interface change detection via netlink

use netlink_packet_core::{NetlinkMessage, NetlinkPayload};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info};

use crate::NetResult;

// RTMGRP_LINK | RTMGRP_IPV4_IFADDR | RTMGRP_IPV6_IFADDR
const MULTICAST_GROUPS: u32 = 0x1 | 0x10 | 0x100;

/// Give the interface time to settle before re-probing
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Watch link/address/route changes and request a re-probe on each.
///
/// Returns an error if the socket cannot be set up; callers log it and carry
/// on with periodic probing only.
pub async fn run_netlink_watcher(
    recheck: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) -> NetResult<()> {
    let mut socket = Socket::new(NETLINK_ROUTE)?;
    socket.bind(&SocketAddr::new(0, MULTICAST_GROUPS))?;
    socket.set_non_blocking(true)?;

    let async_fd = AsyncFd::new(socket.as_raw_fd())?;
    let mut buf = vec![0u8; 4096];

    info!("Netlink watcher started");

    loop {
        tokio::select! {
            result = async_fd.readable() => {
                let mut guard = match result {
                    Ok(guard) => guard,
                    Err(e) => {
                        error!(error = %e, "Async fd error");
                        continue;
                    }
                };

                match socket.recv(&mut &mut buf[..], 0) {
                    Ok(len) if len > 0 && has_relevant_netlink_event(&buf[..len]) => {
                        debug!("Network interface change detected");
                        tokio::time::sleep(SETTLE_DELAY).await;
                        recheck.notify_one();
                    }
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => error!(error = %e, "Netlink recv error"),
                }
                guard.clear_ready();
            }
            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Netlink watcher stopped");
    Ok(())
}

/// Whether a buffer of netlink messages contains a link, address or route change
fn has_relevant_netlink_event(buf: &[u8]) -> bool {
    let mut offset = 0;

    while offset < buf.len() {
        let Ok(msg) = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&buf[offset..]) else {
            break;
        };

        if let NetlinkPayload::InnerMessage(route_msg) = &msg.payload
            && matches!(
                route_msg,
                RouteNetlinkMessage::NewLink(_)
                    | RouteNetlinkMessage::DelLink(_)
                    | RouteNetlinkMessage::NewAddress(_)
                    | RouteNetlinkMessage::DelAddress(_)
                    | RouteNetlinkMessage::NewRoute(_)
                    | RouteNetlinkMessage::DelRoute(_)
            )
        {
            return true;
        }

        let len = msg.header.length as usize;
        if len == 0 {
            break;
        }
        offset += len;
    }

    false
}
