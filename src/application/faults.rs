use crate::domain::failure::{ErrorContent, FailureInfo};
use crate::domain::message::{Nonce, PkiBody, PkiHeader, PkiMessage, TransactionId};
use crate::error::RaError;

/// Maps an internal error to the standardized failure codes and a diagnostic
/// string. Total over the taxonomy and infallible; anything that reaches the
/// catch-all arms reports `systemFailure`.
pub fn translate(error: &RaError) -> (FailureInfo, String) {
    let failure_info = match error {
        RaError::Decode(_) => FailureInfo::BAD_DATA_FORMAT,
        RaError::UnsupportedType(_) => FailureInfo::BAD_REQUEST,
        RaError::UpstreamUnconfigured => FailureInfo::SYSTEM_UNAVAIL,
        RaError::InvalidTransition(_) | RaError::UnknownTransaction(_) => FailureInfo::BAD_REQUEST,
        RaError::TransactionIdInUse(_) => FailureInfo::TRANSACTION_ID_IN_USE,
        RaError::Expired(_) => FailureInfo::SYSTEM_FAILURE | FailureInfo::BAD_TIME,
        RaError::UnknownProfile(_) => FailureInfo::BAD_CERT_TEMPLATE,
        RaError::Encode(_)
        | RaError::UpstreamExchange { .. }
        | RaError::Correlation(_)
        | RaError::Store(_) => FailureInfo::SYSTEM_FAILURE,
    };
    let status_text = match error {
        // Keep the original cause visible for diagnostics.
        RaError::UpstreamExchange { source, .. } => format!("{error}: {source}"),
        other => other.to_string(),
    };
    (failure_info, status_text)
}

/// Wraps the translation into a protocol-legal error response. Without a
/// request header (undecodable input) the reply carries an empty transaction
/// id and no recipient nonce.
pub fn error_message(request: Option<&PkiHeader>, error: &RaError) -> PkiMessage {
    let (failure_info, status_text) = translate(error);
    let body = PkiBody::Error(ErrorContent {
        failure_info,
        status_text,
    });
    match request {
        Some(header) => PkiMessage::reply_to(header, body),
        None => PkiMessage {
            header: PkiHeader {
                transaction_id: TransactionId::new(Vec::new()),
                sender_nonce: Nonce::random(),
                recip_nonce: None,
                free_text: None,
            },
            body,
            cert_profile: None,
        },
    }
}
