//! Remote gateway trait

use async_trait::async_trait;
use playcache_api::{RecordKind, SyncRecord};

use crate::GatewayResult;

/// Write-path client for the coaching backend.
///
/// `push` either commits the record server-side (`Ok`) or does not. The
/// gateway enforces its own timeout; a hung request resolves to an error.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn push(&self, kind: RecordKind, record: &SyncRecord) -> GatewayResult<()>;

    /// Short name for logs
    fn name(&self) -> &str;
}
