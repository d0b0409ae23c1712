use crate::application::faults;
use crate::application::mediator::{ExchangeOutcome, UpstreamMediator};
use crate::domain::config::RaConfig;
use crate::domain::message::{BodyType, PkiBody, PkiMessage};
use crate::domain::ports::{MessageCodec, TransactionStore};
use crate::domain::transaction::{
    StateTransition, TransactionRecord, TransactionState, TransitionError,
};
use crate::error::{RaError, Result, StoreError};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{trace, warn};

/// Validates and classifies inbound downstream requests and drives the
/// transaction state machine. Blocks only for the duration of a synchronous
/// upstream exchange; the deferred case answers with a poll hint.
pub struct Dispatcher {
    config: RaConfig,
    store: Arc<dyn TransactionStore>,
    codec: Arc<dyn MessageCodec>,
    mediator: UpstreamMediator,
    supported: &'static [BodyType],
}

impl Dispatcher {
    pub fn new(
        config: RaConfig,
        store: Arc<dyn TransactionStore>,
        codec: Arc<dyn MessageCodec>,
        mediator: UpstreamMediator,
        supported: &'static [BodyType],
    ) -> Self {
        Self {
            config,
            store,
            codec,
            mediator,
            supported,
        }
    }

    /// `handle(rawRequest) -> rawResponse`. Every recoverable failure is
    /// converted into an encoded error response; only a store outage
    /// propagates as a hard error.
    pub async fn handle(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let request = match self.codec.decode(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "rejecting undecodable downstream request");
                return self.codec.encode(&faults::error_message(None, &err));
            }
        };
        trace!(
            transaction = %request.header.transaction_id,
            body = %request.body.body_type(),
            "request at downstream"
        );
        let response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(
                    transaction = %request.header.transaction_id,
                    error = %err,
                    "answering downstream request with error response"
                );
                faults::error_message(Some(&request.header), &err)
            }
        };
        trace!(
            transaction = %response.header.transaction_id,
            body = %response.body.body_type(),
            "response at downstream"
        );
        self.codec.encode(&response)
    }

    async fn dispatch(&self, request: &PkiMessage) -> Result<PkiMessage> {
        let body_type = request.body.body_type();
        if !self.supported.contains(&body_type) {
            return Err(RaError::UnsupportedType(body_type));
        }
        if !self.config.accepts_profile(request.cert_profile.as_deref()) {
            return Err(RaError::UnknownProfile(
                request.cert_profile.clone().unwrap_or_default(),
            ));
        }
        match body_type {
            BodyType::PollReq => self.handle_poll(request).await,
            BodyType::CertConfirm => self.handle_confirm(request).await,
            _ => self.handle_initiating(request, body_type).await,
        }
    }

    /// Opens a transaction and forwards the request upstream. Creation is an
    /// atomic insert-if-absent, which is also what keeps at most one upstream
    /// exchange in flight per id under concurrent dispatch.
    async fn handle_initiating(
        &self,
        request: &PkiMessage,
        body_type: BodyType,
    ) -> Result<PkiMessage> {
        let id = request.header.transaction_id.clone();
        let record = TransactionRecord::new(
            id.clone(),
            body_type,
            request.cert_profile.clone(),
            SystemTime::now(),
        );
        if !self.store.create(record).await? {
            return Err(RaError::TransactionIdInUse(id));
        }
        self.store
            .update(
                &id,
                StateTransition::SendUpstream {
                    request: request.clone(),
                },
            )
            .await?;

        match self.mediator.forward(self.codec.as_ref(), request).await {
            Ok(ExchangeOutcome::Completed(response)) => {
                let record = self
                    .store
                    .update(&id, StateTransition::Conclude { response: response.clone() })
                    .await?;
                if record.state.is_terminal() {
                    self.store.remove(&id).await?;
                }
                Ok(PkiMessage::reply_to(&request.header, response.body))
            }
            Ok(ExchangeOutcome::Deferred) => Ok(self.poll_reply(request)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                // A failed exchange must not linger as a waiting transaction.
                self.store.update(&id, StateTransition::Fail).await?;
                self.store.remove(&id).await?;
                Err(err)
            }
        }
    }

    async fn handle_poll(&self, request: &PkiMessage) -> Result<PkiMessage> {
        let id = &request.header.transaction_id;
        let Some(record) = self.store.lookup(id).await? else {
            return Err(RaError::UnknownTransaction(id.clone()));
        };
        match record.state {
            TransactionState::UpstreamPending => {
                if self.is_stale(&record) {
                    self.store.update(id, StateTransition::Expire).await?;
                    Err(RaError::Expired(id.clone()))
                } else {
                    Ok(self.poll_reply(request))
                }
            }
            TransactionState::ResponseReady => {
                let record = self.store.update(id, StateTransition::TakeResponse).await?;
                let response = record.response.ok_or_else(|| {
                    RaError::Store(StoreError::Corrupt(format!(
                        "transaction {id} ready without a stored response"
                    )))
                })?;
                if record.state.is_terminal() {
                    self.store.remove(id).await?;
                }
                Ok(PkiMessage::reply_to(&request.header, response.body))
            }
            TransactionState::Expired => Err(RaError::Expired(id.clone())),
            state => Err(RaError::InvalidTransition(TransitionError::NotAllowed {
                state,
                transition: "poll",
            })),
        }
    }

    async fn handle_confirm(&self, request: &PkiMessage) -> Result<PkiMessage> {
        let id = &request.header.transaction_id;
        if self.store.lookup(id).await?.is_none() {
            return Err(RaError::UnknownTransaction(id.clone()));
        }
        self.store.update(id, StateTransition::Confirm).await?;
        self.store.remove(id).await?;
        Ok(PkiMessage::reply_to(&request.header, PkiBody::PkiConfirm))
    }

    fn poll_reply(&self, request: &PkiMessage) -> PkiMessage {
        PkiMessage::reply_to(
            &request.header,
            PkiBody::PollResp {
                check_after_secs: self.config.check_after_secs,
            },
        )
    }

    fn is_stale(&self, record: &TransactionRecord) -> bool {
        SystemTime::now()
            .duration_since(record.created_at)
            .is_ok_and(|age| age > self.config.retention())
    }
}
