use crate::domain::message::PkiMessage;
use crate::domain::ports::{
    BoxError, MessageCodec, TransactionStore, UpstreamReply, UpstreamTransport,
};
use crate::domain::transaction::StateTransition;
use crate::error::{RaError, Result};
use std::sync::Arc;
use tracing::trace;

/// Outcome of one upstream exchange attempt.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// The CA answered on the same call stack.
    Completed(PkiMessage),
    /// The transaction stays waiting; the answer arrives through the
    /// asynchronous delivery entry point.
    Deferred,
}

fn exchange_error(cert_profile: Option<&str>, source: BoxError) -> RaError {
    RaError::UpstreamExchange {
        cert_profile: cert_profile.map(str::to_owned),
        source,
    }
}

/// Sends requests to the CA and resolves waiting transactions when the CA
/// answers out of band. Never retries: a failed exchange maps to a single
/// systemFailure and retry policy stays with the host.
#[derive(Clone)]
pub struct UpstreamMediator {
    store: Arc<dyn TransactionStore>,
    transport: Option<Arc<dyn UpstreamTransport>>,
}

impl UpstreamMediator {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        transport: Option<Arc<dyn UpstreamTransport>>,
    ) -> Self {
        Self { store, transport }
    }

    /// Forwards `request` to the CA. Fails with `UpstreamUnconfigured` when
    /// no exchange function is available; any transport failure is wrapped
    /// into a single `UpstreamExchange` error carrying the original cause.
    pub async fn forward(
        &self,
        codec: &dyn MessageCodec,
        request: &PkiMessage,
    ) -> Result<ExchangeOutcome> {
        let Some(transport) = &self.transport else {
            return Err(RaError::UpstreamUnconfigured);
        };
        let profile = request.cert_profile.as_deref();
        trace!(
            transaction = %request.header.transaction_id,
            cert_profile = profile.unwrap_or("-"),
            body = %request.body.body_type(),
            "request at upstream"
        );
        let raw = codec.encode(request)?;
        let reply = transport
            .exchange(&raw, profile)
            .await
            .map_err(|source| exchange_error(profile, source))?;
        match reply {
            UpstreamReply::Immediate(bytes) => {
                let response = codec
                    .decode(&bytes)
                    .map_err(|err| exchange_error(profile, Box::new(err)))?;
                trace!(
                    transaction = %response.header.transaction_id,
                    body = %response.body.body_type(),
                    "response at upstream"
                );
                Ok(ExchangeOutcome::Completed(response))
            }
            UpstreamReply::Deferred => Ok(ExchangeOutcome::Deferred),
        }
    }

    /// Resolves a waiting transaction with an asynchronously delivered
    /// response, matching by transaction id and nonce. An unmatched response
    /// cannot be delivered to any downstream party and is rejected.
    pub async fn complete_exchange(&self, response: PkiMessage) -> Result<()> {
        let id = response.header.transaction_id.clone();
        let Some(record) = self.store.lookup(&id).await? else {
            return Err(RaError::Correlation(format!("no waiting transaction {id}")));
        };
        if !record.state.is_waiting() {
            return Err(RaError::Correlation(format!(
                "transaction {id} is not awaiting an upstream response (state {})",
                record.state
            )));
        }
        match self
            .store
            .update(&id, StateTransition::CompleteExchange { response })
            .await
        {
            Ok(record) => {
                trace!(transaction = %id, state = %record.state, "async exchange completed");
                Ok(())
            }
            // Lost the race against a concurrent delivery or expiry.
            Err(RaError::InvalidTransition(err)) => {
                Err(RaError::Correlation(format!("transaction {id}: {err}")))
            }
            Err(RaError::UnknownTransaction(_)) => Err(RaError::Correlation(format!(
                "transaction {id} vanished before completion"
            ))),
            Err(other) => Err(other),
        }
    }
}
