//! Network reachability for playcache
//!
//! This crate provides:
//! - The network monitor, the single source of truth for online/offline
//! - A cloneable handle for observing state and transitions
//! - A periodic HTTP probe that feeds the monitor
//! - Linux netlink interface watching that triggers immediate re-probes

mod monitor;
#[cfg(target_os = "linux")]
mod netlink;
mod probe;

pub use monitor::*;
#[cfg(target_os = "linux")]
pub use netlink::run_netlink_watcher;
pub use probe::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetResult<T> = Result<T, NetError>;
