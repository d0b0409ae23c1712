use crate::domain::failure::ErrorContent;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol-level transaction identifier, chosen by the party that opens the
/// transaction and echoed on every message belonging to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Vec<u8>);

impl TransactionId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Per-message random correlation value. A response must carry the sender
/// nonce of the request it answers as its recipient nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(Vec<u8>);

impl Nonce {
    pub const LEN: usize = 16;

    pub fn random() -> Self {
        let mut bytes = [0u8; Self::LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes.to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Tag identifying a message body, used for the supported-set check on the
/// downstream interface and for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyType {
    InitReq,
    InitResp,
    CertReq,
    CertResp,
    KeyUpdateReq,
    KeyUpdateResp,
    P10CertReq,
    PollReq,
    PollResp,
    CertConfirm,
    PkiConfirm,
    RevocationReq,
    RevocationResp,
    GenMsg,
    GenResp,
    Error,
}

impl BodyType {
    /// Request types that open a new transaction when their id is unknown.
    pub fn is_transaction_initiating(self) -> bool {
        matches!(
            self,
            Self::InitReq
                | Self::CertReq
                | Self::KeyUpdateReq
                | Self::P10CertReq
                | Self::RevocationReq
                | Self::GenMsg
        )
    }

    /// Certificate request flows end with an explicit confirmation step;
    /// revocation and generic management complete with their response.
    pub fn expects_confirmation(self) -> bool {
        matches!(
            self,
            Self::InitReq | Self::CertReq | Self::KeyUpdateReq | Self::P10CertReq
        )
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitReq => "ir",
            Self::InitResp => "ip",
            Self::CertReq => "cr",
            Self::CertResp => "cp",
            Self::KeyUpdateReq => "kur",
            Self::KeyUpdateResp => "kup",
            Self::P10CertReq => "p10cr",
            Self::PollReq => "pollReq",
            Self::PollResp => "pollRep",
            Self::CertConfirm => "certConf",
            Self::PkiConfirm => "pkiConf",
            Self::RevocationReq => "rr",
            Self::RevocationResp => "rp",
            Self::GenMsg => "genm",
            Self::GenResp => "genp",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Message body. Request and response payloads are opaque to the engine; the
/// codec owns their wire structure and issuance logic lives upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "camelCase")]
pub enum PkiBody {
    InitReq(Vec<u8>),
    InitResp(Vec<u8>),
    CertReq(Vec<u8>),
    CertResp(Vec<u8>),
    KeyUpdateReq(Vec<u8>),
    KeyUpdateResp(Vec<u8>),
    P10CertReq(Vec<u8>),
    PollReq,
    PollResp { check_after_secs: u64 },
    CertConfirm(Vec<u8>),
    PkiConfirm,
    RevocationReq(Vec<u8>),
    RevocationResp(Vec<u8>),
    GenMsg(Vec<u8>),
    GenResp(Vec<u8>),
    Error(ErrorContent),
}

impl PkiBody {
    pub fn body_type(&self) -> BodyType {
        match self {
            Self::InitReq(_) => BodyType::InitReq,
            Self::InitResp(_) => BodyType::InitResp,
            Self::CertReq(_) => BodyType::CertReq,
            Self::CertResp(_) => BodyType::CertResp,
            Self::KeyUpdateReq(_) => BodyType::KeyUpdateReq,
            Self::KeyUpdateResp(_) => BodyType::KeyUpdateResp,
            Self::P10CertReq(_) => BodyType::P10CertReq,
            Self::PollReq => BodyType::PollReq,
            Self::PollResp { .. } => BodyType::PollResp,
            Self::CertConfirm(_) => BodyType::CertConfirm,
            Self::PkiConfirm => BodyType::PkiConfirm,
            Self::RevocationReq(_) => BodyType::RevocationReq,
            Self::RevocationResp(_) => BodyType::RevocationResp,
            Self::GenMsg(_) => BodyType::GenMsg,
            Self::GenResp(_) => BodyType::GenResp,
            Self::Error(_) => BodyType::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkiHeader {
    pub transaction_id: TransactionId,
    pub sender_nonce: Nonce,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recip_nonce: Option<Nonce>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text: Option<String>,
}

/// A protocol message as produced by the codec. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkiMessage {
    pub header: PkiHeader,
    pub body: PkiBody,
    /// Certificate-profile tag carried out-of-band alongside the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_profile: Option<String>,
}

impl PkiMessage {
    /// Builds a fresh request opening or continuing the given transaction.
    pub fn request(
        transaction_id: TransactionId,
        body: PkiBody,
        cert_profile: Option<String>,
    ) -> Self {
        Self {
            header: PkiHeader {
                transaction_id,
                sender_nonce: Nonce::random(),
                recip_nonce: None,
                free_text: None,
            },
            body,
            cert_profile,
        }
    }

    /// Builds a reply with engine-managed correlation: the transaction id is
    /// echoed, the recipient nonce is the request's sender nonce, and a fresh
    /// sender nonce is generated.
    pub fn reply_to(request: &PkiHeader, body: PkiBody) -> Self {
        Self {
            header: PkiHeader {
                transaction_id: request.transaction_id.clone(),
                sender_nonce: Nonce::random(),
                recip_nonce: Some(request.sender_nonce.clone()),
                free_text: None,
            },
            body,
            cert_profile: None,
        }
    }
}
