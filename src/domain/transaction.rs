use crate::domain::message::{BodyType, Nonce, PkiMessage, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Lifecycle state of a transaction. `Completed`, `Failed` and `Expired` are
/// terminal: no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    New,
    UpstreamPending,
    ResponseReady,
    AwaitingConfirm,
    Completed,
    Failed,
    Expired,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }

    /// Waiting for the upstream to answer out of band.
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::UpstreamPending)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::UpstreamPending => "upstream_pending",
            Self::ResponseReady => "response_ready",
            Self::AwaitingConfirm => "awaiting_confirm",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// State change applied atomically by the transaction store. Each transition
/// validates the current state, so a stale writer loses cleanly instead of
/// clobbering a concurrent one.
#[derive(Debug, Clone)]
pub enum StateTransition {
    /// `New -> UpstreamPending`; records the request sent upstream and its
    /// sender nonce for later async correlation.
    SendUpstream { request: PkiMessage },
    /// `UpstreamPending -> ResponseReady` on asynchronous delivery. The
    /// response's recipient nonce must match the upstream request's sender
    /// nonce, otherwise the delivery is rejected as forged or misrouted.
    CompleteExchange { response: PkiMessage },
    /// `UpstreamPending -> AwaitingConfirm | Completed` on a synchronous
    /// exchange, storing the response that is relayed downstream.
    Conclude { response: PkiMessage },
    /// `ResponseReady -> AwaitingConfirm | Completed` when a poll retrieves
    /// the stored response.
    TakeResponse,
    /// `AwaitingConfirm -> Completed` on certificate confirmation.
    Confirm,
    /// Any non-terminal state `-> Failed`.
    Fail,
    /// Any non-terminal state `-> Expired`.
    Expire,
}

impl StateTransition {
    fn name(&self) -> &'static str {
        match self {
            Self::SendUpstream { .. } => "send_upstream",
            Self::CompleteExchange { .. } => "complete_exchange",
            Self::Conclude { .. } => "conclude",
            Self::TakeResponse => "take_response",
            Self::Confirm => "confirm",
            Self::Fail => "fail",
            Self::Expire => "expire",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("transition {transition} not allowed in state {state}")]
    NotAllowed {
        state: TransactionState,
        transition: &'static str,
    },
    #[error("recipient nonce does not match the upstream request nonce")]
    NonceMismatch,
}

/// One logical certificate-lifecycle exchange, owned exclusively by the
/// transaction store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Body type of the request that opened the transaction; decides whether
    /// the flow ends with a confirmation step.
    pub request_type: BodyType,
    pub cert_profile: Option<String>,
    pub state: TransactionState,
    /// Last request sent upstream, if any.
    pub upstream_request: Option<PkiMessage>,
    /// Sender nonce of the upstream request, kept for async correlation.
    pub upstream_nonce: Option<Nonce>,
    /// Stored response awaiting delivery to downstream.
    pub response: Option<PkiMessage>,
    pub created_at: SystemTime,
}

impl TransactionRecord {
    pub fn new(
        id: TransactionId,
        request_type: BodyType,
        cert_profile: Option<String>,
        created_at: SystemTime,
    ) -> Self {
        Self {
            id,
            request_type,
            cert_profile,
            state: TransactionState::New,
            upstream_request: None,
            upstream_nonce: None,
            response: None,
            created_at,
        }
    }

    fn after_response(&self) -> TransactionState {
        if self.request_type.expects_confirmation() {
            TransactionState::AwaitingConfirm
        } else {
            TransactionState::Completed
        }
    }

    /// Applies `transition` or rejects it, leaving the record untouched on
    /// rejection. Callers must hold the store's write side.
    pub fn apply(&mut self, transition: StateTransition) -> Result<(), TransitionError> {
        let state = self.state;
        match (state, transition) {
            (TransactionState::New, StateTransition::SendUpstream { request }) => {
                self.upstream_nonce = Some(request.header.sender_nonce.clone());
                self.upstream_request = Some(request);
                self.state = TransactionState::UpstreamPending;
            }
            (TransactionState::UpstreamPending, StateTransition::CompleteExchange { response }) => {
                if response.header.recip_nonce.as_ref() != self.upstream_nonce.as_ref() {
                    return Err(TransitionError::NonceMismatch);
                }
                self.response = Some(response);
                self.state = TransactionState::ResponseReady;
            }
            (TransactionState::UpstreamPending, StateTransition::Conclude { response }) => {
                self.response = Some(response);
                self.state = self.after_response();
            }
            (TransactionState::ResponseReady, StateTransition::TakeResponse) => {
                self.state = self.after_response();
            }
            (TransactionState::AwaitingConfirm, StateTransition::Confirm) => {
                self.state = TransactionState::Completed;
            }
            (state, StateTransition::Fail) if !state.is_terminal() => {
                self.state = TransactionState::Failed;
            }
            (state, StateTransition::Expire) if !state.is_terminal() => {
                self.state = TransactionState::Expired;
            }
            (_, transition) => {
                return Err(TransitionError::NotAllowed {
                    state,
                    transition: transition.name(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::PkiBody;

    fn record(request_type: BodyType) -> TransactionRecord {
        TransactionRecord::new(
            TransactionId::new(vec![7]),
            request_type,
            None,
            SystemTime::now(),
        )
    }

    fn upstream_request(record: &TransactionRecord) -> PkiMessage {
        PkiMessage::request(record.id.clone(), PkiBody::CertReq(vec![1]), None)
    }

    fn matching_response(request: &PkiMessage) -> PkiMessage {
        PkiMessage::reply_to(&request.header, PkiBody::CertResp(vec![1]))
    }

    #[test]
    fn test_certificate_flow_with_confirmation() {
        let mut txn = record(BodyType::CertReq);
        let request = upstream_request(&txn);
        let response = matching_response(&request);

        txn.apply(StateTransition::SendUpstream { request }).unwrap();
        assert_eq!(txn.state, TransactionState::UpstreamPending);
        assert!(txn.upstream_nonce.is_some());

        txn.apply(StateTransition::CompleteExchange { response })
            .unwrap();
        assert_eq!(txn.state, TransactionState::ResponseReady);

        txn.apply(StateTransition::TakeResponse).unwrap();
        assert_eq!(txn.state, TransactionState::AwaitingConfirm);

        txn.apply(StateTransition::Confirm).unwrap();
        assert_eq!(txn.state, TransactionState::Completed);
    }

    #[test]
    fn test_revocation_flow_completes_without_confirmation() {
        let mut txn = record(BodyType::RevocationReq);
        let request = upstream_request(&txn);
        let response = matching_response(&request);

        txn.apply(StateTransition::SendUpstream { request }).unwrap();
        txn.apply(StateTransition::Conclude { response }).unwrap();
        assert_eq!(txn.state, TransactionState::Completed);
    }

    #[test]
    fn test_nonce_mismatch_rejected_without_state_change() {
        let mut txn = record(BodyType::CertReq);
        let request = upstream_request(&txn);
        txn.apply(StateTransition::SendUpstream { request }).unwrap();

        // Forged response correlating to some other request.
        let forged = PkiMessage::request(txn.id.clone(), PkiBody::CertResp(vec![1]), None);
        let err = txn
            .apply(StateTransition::CompleteExchange { response: forged })
            .unwrap_err();
        assert_eq!(err, TransitionError::NonceMismatch);
        assert_eq!(txn.state, TransactionState::UpstreamPending);
        assert!(txn.response.is_none());
    }

    #[test]
    fn test_terminal_states_reject_all_transitions() {
        for terminal in [
            TransactionState::Completed,
            TransactionState::Failed,
            TransactionState::Expired,
        ] {
            let mut txn = record(BodyType::CertReq);
            txn.state = terminal;
            for transition in [
                StateTransition::TakeResponse,
                StateTransition::Confirm,
                StateTransition::Fail,
                StateTransition::Expire,
            ] {
                let before = txn.clone();
                assert!(txn.apply(transition).is_err());
                assert_eq!(txn, before);
            }
        }
    }

    #[test]
    fn test_double_completion_rejected() {
        let mut txn = record(BodyType::CertReq);
        let request = upstream_request(&txn);
        let response = matching_response(&request);
        txn.apply(StateTransition::SendUpstream { request }).unwrap();
        txn.apply(StateTransition::CompleteExchange {
            response: response.clone(),
        })
        .unwrap();

        let err = txn
            .apply(StateTransition::CompleteExchange { response })
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotAllowed { .. }));
        assert_eq!(txn.state, TransactionState::ResponseReady);
    }

    #[test]
    fn test_expire_from_waiting() {
        let mut txn = record(BodyType::GenMsg);
        let request = upstream_request(&txn);
        txn.apply(StateTransition::SendUpstream { request }).unwrap();
        txn.apply(StateTransition::Expire).unwrap();
        assert_eq!(txn.state, TransactionState::Expired);
        assert!(txn.state.is_terminal());
    }
}
