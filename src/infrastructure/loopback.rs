use crate::domain::failure::{ErrorContent, FailureInfo};
use crate::domain::message::{PkiBody, PkiMessage};
use crate::domain::ports::{BoxError, MessageCodec, UpstreamReply, UpstreamTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Delivery mode of the loopback CA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackMode {
    /// Answer on the same call.
    Sync,
    /// Queue the answer for later delivery through
    /// `deliver_upstream_response`, modeling an asynchronous CA.
    Deferred,
}

/// An in-process stand-in for the upstream CA: grants every certificate
/// request by echoing its payload into the matching response type.
///
/// Used by the CLI and the integration tests; issuance logic proper is
/// outside the engine.
pub struct LoopbackCa {
    codec: Arc<dyn MessageCodec>,
    mode: LoopbackMode,
    queued: Mutex<Vec<Vec<u8>>>,
}

impl LoopbackCa {
    pub fn new(codec: Arc<dyn MessageCodec>, mode: LoopbackMode) -> Self {
        Self {
            codec,
            mode,
            queued: Mutex::new(Vec::new()),
        }
    }

    /// Drains the responses queued in deferred mode, in arrival order.
    pub async fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.queued.lock().await)
    }

    fn respond(request: &PkiMessage) -> PkiMessage {
        let body = match &request.body {
            PkiBody::InitReq(content) => PkiBody::InitResp(content.clone()),
            PkiBody::CertReq(content) => PkiBody::CertResp(content.clone()),
            PkiBody::KeyUpdateReq(content) => PkiBody::KeyUpdateResp(content.clone()),
            PkiBody::P10CertReq(content) => PkiBody::CertResp(content.clone()),
            PkiBody::RevocationReq(content) => PkiBody::RevocationResp(content.clone()),
            PkiBody::GenMsg(content) => PkiBody::GenResp(content.clone()),
            other => PkiBody::Error(ErrorContent {
                failure_info: FailureInfo::BAD_REQUEST,
                status_text: format!("unexpected body {} at upstream", other.body_type()),
            }),
        };
        PkiMessage::reply_to(&request.header, body)
    }
}

#[async_trait]
impl UpstreamTransport for LoopbackCa {
    async fn exchange(
        &self,
        request: &[u8],
        _cert_profile: Option<&str>,
    ) -> std::result::Result<UpstreamReply, BoxError> {
        let request = self.codec.decode(request)?;
        let raw = self.codec.encode(&Self::respond(&request))?;
        match self.mode {
            LoopbackMode::Sync => Ok(UpstreamReply::Immediate(raw)),
            LoopbackMode::Deferred => {
                self.queued.lock().await.push(raw);
                Ok(UpstreamReply::Deferred)
            }
        }
    }
}
