//! Remote gateway interface for playcache
//!
//! The sync engine only needs one operation from the server side: push a
//! record and learn whether it was committed. This crate defines that seam,
//! a reqwest-backed HTTP implementation and a scriptable mock for tests.

mod error;
mod http;
mod mock;
mod traits;

pub use error::*;
pub use http::*;
pub use mock::*;
pub use traits::*;
