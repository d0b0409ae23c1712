use crate::application::dispatcher::Dispatcher;
use crate::application::mediator::UpstreamMediator;
use crate::domain::config::RaConfig;
use crate::domain::message::BodyType;
use crate::domain::ports::{MessageCodec, TransactionStore, UpstreamTransport};
use crate::error::Result;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Message types accepted on the downstream interface.
pub const SUPPORTED_DOWNSTREAM_TYPES: &[BodyType] = &[
    BodyType::InitReq,
    BodyType::CertReq,
    BodyType::KeyUpdateReq,
    BodyType::P10CertReq,
    BodyType::PollReq,
    BodyType::CertConfirm,
    BodyType::RevocationReq,
    BodyType::GenMsg,
];

/// The RA engine, composed from a downstream dispatcher and an upstream
/// mediator that communicate only through the transaction store.
///
/// The two entry points are independent: `process_downstream_request` serves
/// End Entity requests, `deliver_upstream_response` is invoked by the
/// transport when the CA answers out of band.
pub struct RaEngine {
    dispatcher: Dispatcher,
    mediator: UpstreamMediator,
    codec: Arc<dyn MessageCodec>,
    store: Arc<dyn TransactionStore>,
    config: RaConfig,
}

impl RaEngine {
    pub fn new(
        config: RaConfig,
        store: Arc<dyn TransactionStore>,
        codec: Arc<dyn MessageCodec>,
        transport: Option<Arc<dyn UpstreamTransport>>,
    ) -> Self {
        let mediator = UpstreamMediator::new(store.clone(), transport);
        let dispatcher = Dispatcher::new(
            config.clone(),
            store.clone(),
            codec.clone(),
            mediator.clone(),
            SUPPORTED_DOWNSTREAM_TYPES,
        );
        Self {
            dispatcher,
            mediator,
            codec,
            store,
            config,
        }
    }

    /// Entry point for an encoded request from an End Entity. Returns an
    /// encoded response; expected failure modes come back as encoded error
    /// responses, only an unrecoverable internal error is raised.
    pub async fn process_downstream_request(&self, raw: &[u8]) -> Result<Vec<u8>> {
        self.dispatcher.handle(raw).await
    }

    /// Entry point for an asynchronous CA reply. Fails when the bytes cannot
    /// be decoded or matched to a waiting transaction; there is no channel to
    /// answer such a response on, so it is discarded by the caller.
    pub async fn deliver_upstream_response(&self, raw: &[u8]) -> Result<()> {
        // No channel to answer on: a decode failure here is fatal for this
        // response and surfaces to the transport caller as-is.
        let response = self.codec.decode(raw)?;
        trace!(
            transaction = %response.header.transaction_id,
            body = %response.body.body_type(),
            "async response at upstream"
        );
        self.mediator.complete_exchange(response).await
    }

    /// Applies the retention horizon: waiting transactions older than the
    /// horizon expire, terminal ones are garbage-collected. Hosts drive this
    /// from a timer; the dispatcher also expires over-horizon records it
    /// meets on the poll path, so nothing hangs without a sweeper.
    pub async fn expire_stale(&self, now: SystemTime) -> Result<usize> {
        let horizon = now
            .checked_sub(self.config.retention())
            .unwrap_or(UNIX_EPOCH);
        self.store.expire(horizon).await
    }
}
