#![allow(dead_code)]

use cmp_ra::application::engine::RaEngine;
use cmp_ra::domain::config::RaConfig;
use cmp_ra::domain::failure::ErrorContent;
use cmp_ra::domain::message::{PkiBody, PkiMessage, TransactionId};
use cmp_ra::domain::ports::{MessageCodec, UpstreamTransport};
use cmp_ra::infrastructure::in_memory::InMemoryTransactionStore;
use cmp_ra::interfaces::json::JsonCodec;
use std::sync::Arc;

pub fn config() -> RaConfig {
    RaConfig {
        retention_secs: 600,
        check_after_secs: 7,
        known_profiles: Vec::new(),
    }
}

pub fn engine_with(
    transport: Option<Arc<dyn UpstreamTransport>>,
) -> (RaEngine, Arc<InMemoryTransactionStore>) {
    engine_with_config(config(), transport)
}

pub fn engine_with_config(
    config: RaConfig,
    transport: Option<Arc<dyn UpstreamTransport>>,
) -> (RaEngine, Arc<InMemoryTransactionStore>) {
    let store = Arc::new(InMemoryTransactionStore::new());
    let codec: Arc<dyn MessageCodec> = Arc::new(JsonCodec);
    let engine = RaEngine::new(config, store.clone(), codec, transport);
    (engine, store)
}

pub fn request(id: &[u8], body: PkiBody) -> PkiMessage {
    PkiMessage::request(TransactionId::new(id.to_vec()), body, None)
}

pub fn encode(message: &PkiMessage) -> Vec<u8> {
    JsonCodec.encode(message).unwrap()
}

pub fn decode(raw: &[u8]) -> PkiMessage {
    JsonCodec.decode(raw).unwrap()
}

pub fn error_content(message: &PkiMessage) -> &ErrorContent {
    match &message.body {
        PkiBody::Error(content) => content,
        other => panic!("expected error body, got {}", other.body_type()),
    }
}
