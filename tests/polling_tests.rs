mod common;

use cmp_ra::domain::config::RaConfig;
use cmp_ra::domain::failure::FailureInfo;
use cmp_ra::domain::message::{PkiBody, TransactionId};
use cmp_ra::domain::ports::{MessageCodec, TransactionStore};
use cmp_ra::domain::transaction::TransactionState;
use cmp_ra::infrastructure::loopback::{LoopbackCa, LoopbackMode};
use cmp_ra::interfaces::json::JsonCodec;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn deferred_loopback() -> Arc<LoopbackCa> {
    let codec: Arc<dyn MessageCodec> = Arc::new(JsonCodec);
    Arc::new(LoopbackCa::new(codec, LoopbackMode::Deferred))
}

#[tokio::test]
async fn test_deferred_flow_polls_until_async_delivery() {
    let ca = deferred_loopback();
    let (engine, store) = common::engine_with(Some(ca.clone()));
    let id = [1u8];

    // The initiating request is answered with a poll hint.
    let request = common::request(&id, PkiBody::CertReq(vec![42]));
    let raw = engine
        .process_downstream_request(&common::encode(&request))
        .await
        .unwrap();
    let response = common::decode(&raw);
    assert_eq!(response.body, PkiBody::PollResp { check_after_secs: 7 });

    // Polling while the exchange is outstanding is idempotent: same body,
    // no second upstream call.
    let poll = common::request(&id, PkiBody::PollReq);
    for _ in 0..2 {
        let raw = engine
            .process_downstream_request(&common::encode(&poll))
            .await
            .unwrap();
        let reply = common::decode(&raw);
        assert_eq!(reply.body, PkiBody::PollResp { check_after_secs: 7 });
    }

    // The CA answers out of band; the very next poll retrieves the response.
    let queued = ca.drain().await;
    assert_eq!(queued.len(), 1);
    engine.deliver_upstream_response(&queued[0]).await.unwrap();

    let raw = engine
        .process_downstream_request(&common::encode(&poll))
        .await
        .unwrap();
    let reply = common::decode(&raw);
    assert_eq!(reply.body, PkiBody::CertResp(vec![42]));

    let record = store
        .lookup(&TransactionId::new(id.to_vec()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.state, TransactionState::AwaitingConfirm);

    // Confirmation closes the transaction.
    let confirm = common::request(&id, PkiBody::CertConfirm(vec![]));
    let raw = engine
        .process_downstream_request(&common::encode(&confirm))
        .await
        .unwrap();
    assert_eq!(common::decode(&raw).body, PkiBody::PkiConfirm);
}

#[tokio::test]
async fn test_poll_for_unknown_transaction_is_rejected() {
    let (engine, _store) = common::engine_with(Some(deferred_loopback()));

    let poll = common::request(&[9], PkiBody::PollReq);
    let raw = engine
        .process_downstream_request(&common::encode(&poll))
        .await
        .unwrap();
    let response = common::decode(&raw);
    let content = common::error_content(&response);
    assert!(content.failure_info.contains(FailureInfo::BAD_REQUEST));
}

#[tokio::test]
async fn test_duplicate_initiating_request_is_rejected_while_waiting() {
    let ca = deferred_loopback();
    let (engine, _store) = common::engine_with(Some(ca.clone()));
    let id = [3u8];

    let request = common::request(&id, PkiBody::CertReq(vec![1]));
    engine
        .process_downstream_request(&common::encode(&request))
        .await
        .unwrap();

    let duplicate = common::request(&id, PkiBody::CertReq(vec![1]));
    let raw = engine
        .process_downstream_request(&common::encode(&duplicate))
        .await
        .unwrap();
    let response = common::decode(&raw);
    let content = common::error_content(&response);
    assert!(
        content
            .failure_info
            .contains(FailureInfo::TRANSACTION_ID_IN_USE)
    );
    // Exactly one request reached the CA.
    assert_eq!(ca.drain().await.len(), 1);
}

#[tokio::test]
async fn test_second_async_delivery_is_discarded() {
    let ca = deferred_loopback();
    let (engine, _store) = common::engine_with(Some(ca.clone()));
    let id = [5u8];

    let request = common::request(&id, PkiBody::GenMsg(vec![8]));
    engine
        .process_downstream_request(&common::encode(&request))
        .await
        .unwrap();

    let queued = ca.drain().await;
    engine.deliver_upstream_response(&queued[0]).await.unwrap();
    // A replayed delivery no longer matches a waiting transaction.
    assert!(engine.deliver_upstream_response(&queued[0]).await.is_err());

    // The stored response is still delivered exactly once.
    let poll = common::request(&id, PkiBody::PollReq);
    let raw = engine
        .process_downstream_request(&common::encode(&poll))
        .await
        .unwrap();
    assert_eq!(common::decode(&raw).body, PkiBody::GenResp(vec![8]));
}

#[tokio::test]
async fn test_waiting_transaction_expires_on_poll() {
    let config = RaConfig {
        retention_secs: 0,
        ..common::config()
    };
    let ca = deferred_loopback();
    let (engine, _store) = common::engine_with_config(config, Some(ca.clone()));
    let id = [6u8];

    let request = common::request(&id, PkiBody::CertReq(vec![1]));
    engine
        .process_downstream_request(&common::encode(&request))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let poll = common::request(&id, PkiBody::PollReq);
    let raw = engine
        .process_downstream_request(&common::encode(&poll))
        .await
        .unwrap();
    let response = common::decode(&raw);
    let content = common::error_content(&response);
    assert!(content.failure_info.contains(FailureInfo::SYSTEM_FAILURE));
    assert!(content.failure_info.contains(FailureInfo::BAD_TIME));

    // The expiry is terminal: a later poll reports it again instead of a
    // fresh "processing" hint.
    let raw = engine
        .process_downstream_request(&common::encode(&poll))
        .await
        .unwrap();
    let response = common::decode(&raw);
    let content = common::error_content(&response);
    assert!(content.failure_info.contains(FailureInfo::SYSTEM_FAILURE));

    // A late delivery for the expired transaction is rejected.
    let queued = ca.drain().await;
    assert!(engine.deliver_upstream_response(&queued[0]).await.is_err());
}

#[tokio::test]
async fn test_expire_stale_sweeps_waiting_transactions() {
    let ca = deferred_loopback();
    let (engine, store) = common::engine_with(Some(ca.clone()));
    let id = [7u8];

    let request = common::request(&id, PkiBody::CertReq(vec![1]));
    engine
        .process_downstream_request(&common::encode(&request))
        .await
        .unwrap();

    // Drive the sweeper from one retention horizon in the future.
    let later = SystemTime::now() + common::config().retention() + Duration::from_secs(60);
    let affected = engine.expire_stale(later).await.unwrap();
    assert_eq!(affected, 1);

    let record = store
        .lookup(&TransactionId::new(id.to_vec()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.state, TransactionState::Expired);
}
