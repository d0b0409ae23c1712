use crate::domain::message::PkiMessage;
use crate::domain::ports::MessageCodec;
use crate::error::{RaError, Result};

/// Reference codec: one JSON document per message.
///
/// The engine treats the codec as an external collaborator; this
/// implementation exists so the crate is usable end to end without a wire
/// library, and as the format the CLI replays.
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &PkiMessage) -> Result<Vec<u8>> {
        serde_json::to_vec(message).map_err(|err| RaError::Encode(err.to_string()))
    }

    fn decode(&self, raw: &[u8]) -> Result<PkiMessage> {
        serde_json::from_slice(raw).map_err(|err| RaError::Decode(err.to_string()))
    }
}
