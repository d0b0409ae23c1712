use crate::domain::message::{BodyType, TransactionId};
use crate::domain::transaction::TransitionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaError>;

/// Error raised by a persistency backend. Always fatal for the request that
/// hit it: the engine never answers best-effort when the store is gone.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transaction store unavailable: {0}")]
    Unavailable(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored transaction record corrupted: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum RaError {
    #[error("cannot decode message: {0}")]
    Decode(String),
    #[error("cannot encode message: {0}")]
    Encode(String),
    #[error("message type {0} not supported on the downstream interface")]
    UnsupportedType(BodyType),
    #[error("no upstream exchange configured")]
    UpstreamUnconfigured,
    #[error("exchange with upstream failed while processing request for {cert_profile:?}")]
    UpstreamExchange {
        cert_profile: Option<String>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("cannot correlate upstream response: {0}")]
    Correlation(String),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("transaction id {0} is already in use")]
    TransactionIdInUse(TransactionId),
    #[error("no transaction {0}")]
    UnknownTransaction(TransactionId),
    #[error("transaction {0} expired before the upstream answered")]
    Expired(TransactionId),
    #[error("unknown certificate profile {0:?}")]
    UnknownProfile(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RaError {
    /// Only a broken persistency backend makes answering impossible; every
    /// other failure mode is translated into a protocol error response.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
