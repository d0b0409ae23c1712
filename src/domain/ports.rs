use super::message::{PkiMessage, TransactionId};
use super::transaction::{StateTransition, TransactionRecord};
use crate::error::Result;
use async_trait::async_trait;
use std::time::SystemTime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Keyed storage of per-transaction state, the only shared mutable resource
/// in the engine. All operations are atomic with respect to concurrent
/// callers; mutations for a single id are serialized.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Atomically inserts `record` if no live record exists for its id.
    /// Returns false when the id is already taken.
    async fn create(&self, record: TransactionRecord) -> Result<bool>;

    async fn lookup(&self, id: &TransactionId) -> Result<Option<TransactionRecord>>;

    /// Atomically applies `transition` and returns the record after the
    /// change. The transition validates the current state, so a stale caller
    /// gets an invalid-transition error instead of winning a lost update.
    async fn update(
        &self,
        id: &TransactionId,
        transition: StateTransition,
    ) -> Result<TransactionRecord>;

    async fn remove(&self, id: &TransactionId) -> Result<()>;

    /// Expires waiting records created before `older_than` and drops terminal
    /// ones older than it. Returns the number of affected records.
    async fn expire(&self, older_than: SystemTime) -> Result<usize>;
}

/// Encode/decode between raw bytes and protocol messages. Externally owned;
/// assumed total and deterministic over well-formed input.
pub trait MessageCodec: Send + Sync {
    fn encode(&self, message: &PkiMessage) -> Result<Vec<u8>>;
    fn decode(&self, raw: &[u8]) -> Result<PkiMessage>;
}

/// Reply of the upstream CA transport. The sync-vs-deferred decision is an
/// explicit mode, not inferred from an absent payload.
#[derive(Debug)]
pub enum UpstreamReply {
    /// The CA answered on the same call.
    Immediate(Vec<u8>),
    /// The CA will answer later through the asynchronous delivery entry
    /// point.
    Deferred,
}

/// The exchange function supplied by the host application.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn exchange(
        &self,
        request: &[u8],
        cert_profile: Option<&str>,
    ) -> std::result::Result<UpstreamReply, BoxError>;
}
