//! Session lifecycle tests against the scripted engine
//!
//! # Test Categories
//!
//! 1. **Construction**: validation order, pre-shared key handling,
//!    keep-alive and index bounds
//! 2. **Dispatch**: every tag, unknown tags, oversized outputs
//! 3. **Release**: handles freed exactly once

use std::sync::Arc;

use wg_bridge::config::{BridgeConfig, IndexPolicy};
use wg_bridge::engine::{
    KeyPrimitives, ScriptedCall, ScriptedEngine, ScriptedOutcome, KEY_LEN,
};
use wg_bridge::error::{BridgeError, EngineError, SessionError};
use wg_bridge::{Bridge, ResultStatus};

fn bridge() -> (Arc<ScriptedEngine>, Bridge<ScriptedEngine>) {
    bridge_with(BridgeConfig::default())
}

fn bridge_with(config: BridgeConfig) -> (Arc<ScriptedEngine>, Bridge<ScriptedEngine>) {
    let engine = Arc::new(ScriptedEngine::new());
    let bridge = Bridge::new(Arc::clone(&engine), config).expect("valid config");
    (engine, bridge)
}

// ========================================================================
// Construction
// ========================================================================

#[test]
fn test_tick_produces_handshake_datagram() {
    let (engine, bridge) = bridge();
    let pair = bridge.generate_key_pair();
    let peer = bridge.generate_key_pair();

    let mut session = bridge
        .create_session(&pair.private_key, &peer.public_key, "", 25, 0)
        .unwrap();

    let datagram: Vec<u8> = (0..148u8).collect();
    engine.push(ScriptedOutcome::network(datagram.clone()));

    let envelope = session.tick().unwrap();
    assert_eq!(envelope.status(), ResultStatus::WriteToNetwork);
    assert_eq!(envelope.len(), 148);
    assert_eq!(envelope.data().unwrap(), datagram.as_slice());
    assert_eq!(engine.calls()[0].0, ScriptedCall::Tick);
}

#[test]
fn test_malformed_public_key_never_reaches_engine() {
    let (engine, bridge) = bridge();
    let private_key = bridge.generate_secret_key_base64();

    let err = bridge
        .create_session(&private_key, "not-base64!", "", 25, 0)
        .unwrap_err();

    assert!(matches!(
        err,
        BridgeError::Session(SessionError::InvalidPublicKey)
    ));
    assert!(err.is_user_error());
    assert_eq!(engine.creation_count(), 0);
}

#[test]
fn test_keep_alive_must_be_positive() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();

    for keep_alive in [0, -1] {
        let err = bridge.create_session(&k, &k, "", keep_alive, 0).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Session(SessionError::InvalidKeepAlive(v)) if v == keep_alive
        ));
    }
    assert_eq!(engine.creation_count(), 0);

    let session = bridge.create_session(&k, &k, "", 1, 0).unwrap();
    assert_eq!(session.keep_alive(), 1);
    assert_eq!(engine.created()[0].keep_alive, 1);
}

#[test]
fn test_empty_preshared_key_is_absent_not_zero() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();
    let zero_key = engine.key_to_base64(&[0u8; KEY_LEN]);

    let without = bridge.create_session(&k, &k, "", 25, 0).unwrap();
    let with_zero = bridge.create_session(&k, &k, &zero_key, 25, 0).unwrap();

    let created = engine.created();
    assert_eq!(created[0].preshared_key, None);
    assert_eq!(created[1].preshared_key.as_deref(), Some(zero_key.as_str()));
    assert_eq!(without.preshared_key(), None);
    assert_eq!(with_zero.preshared_key(), Some(zero_key.as_str()));
}

#[test]
fn test_invalid_preshared_key() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();
    let err = bridge.create_session(&k, &k, "AAAA", 25, 0).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Session(SessionError::InvalidPresharedKey)
    ));
    assert_eq!(engine.creation_count(), 0);
}

#[test]
fn test_index_policies() {
    let (_, lenient) = bridge();
    let (_, strict) =
        bridge_with(BridgeConfig::default().with_index_policy(IndexPolicy::PositiveOnly));
    let k = lenient.generate_secret_key_base64();

    assert!(lenient.create_session(&k, &k, "", 25, 0).is_ok());
    assert!(lenient.create_session(&k, &k, "", 25, -7).is_ok());
    assert!(lenient
        .create_session(&k, &k, "", 25, i64::from(i32::MAX) + 1)
        .is_err());

    assert!(strict.create_session(&k, &k, "", 25, 0).is_err());
    assert!(strict.create_session(&k, &k, "", 25, 1).is_ok());
}

#[test]
fn test_engine_refusal_leaks_nothing() {
    let (engine, bridge) = bridge();
    engine.refuse_creation(true);
    let k = bridge.generate_secret_key_base64();

    let err = bridge.create_session(&k, &k, "", 25, 0).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Session(SessionError::TunnelCreationFailed)
    ));
    assert!(!err.is_user_error());
    assert_eq!(engine.creation_count(), 1);
    assert_eq!(engine.freed_count(), 0);
}

// ========================================================================
// Dispatch
// ========================================================================

#[test]
fn test_dispatch_table() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();
    let mut session = bridge.create_session(&k, &k, "", 25, 0).unwrap();

    let cases = [
        (ScriptedOutcome::done(), ResultStatus::Done, false),
        (ScriptedOutcome::error(), ResultStatus::Error, false),
        (
            ScriptedOutcome::network(vec![1; 92]),
            ResultStatus::WriteToNetwork,
            true,
        ),
        (
            ScriptedOutcome::ipv4(vec![0x45; 40]),
            ResultStatus::WriteToTunnelIpv4,
            true,
        ),
        (
            ScriptedOutcome::ipv6(vec![0x60; 60]),
            ResultStatus::WriteToTunnelIpv6,
            true,
        ),
    ];

    for (outcome, status, has_data) in cases {
        let payload = outcome.payload.clone();
        engine.push(outcome);
        let envelope = session.read(&[0xaa; 32]).unwrap();
        assert_eq!(envelope.status(), status);
        assert_eq!(envelope.data().is_some(), has_data);
        if has_data {
            assert_eq!(envelope.data().unwrap(), payload.as_slice());
        }
    }
    assert_eq!(engine.dirty_buffer_count(), 0);
}

#[test]
fn test_unknown_tag_is_contract_violation() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();
    let mut session = bridge.create_session(&k, &k, "", 25, 0).unwrap();

    engine.push(ScriptedOutcome::raw(3, vec![1, 2, 3]));
    let err = session.write(b"payload").unwrap_err();
    assert_eq!(err, EngineError::UnknownTag { tag: 3 });
    assert!(BridgeError::from(err).is_contract_violation());

    // The session stays usable afterwards
    engine.push(ScriptedOutcome::done());
    assert_eq!(session.write(b"payload").unwrap().status(), ResultStatus::Done);
}

#[test]
fn test_oversized_output_is_contract_violation() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();
    let mut session = bridge.create_session(&k, &k, "", 25, 0).unwrap();

    engine.push(ScriptedOutcome::overflow(2001));
    assert_eq!(
        session.force_handshake().unwrap_err(),
        EngineError::LengthOverflow {
            size: 2001,
            capacity: 2000
        }
    );
}

// ========================================================================
// Release
// ========================================================================

#[test]
fn test_each_session_released_once() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();

    let sessions: Vec<_> = (0..5)
        .map(|i| bridge.create_session(&k, &k, "", 25, i).unwrap())
        .collect();
    assert_eq!(engine.freed_count(), 0);

    let mut sessions = sessions.into_iter();
    sessions.next().unwrap().close();
    assert_eq!(engine.freed_count(), 1);

    drop(sessions);
    assert_eq!(engine.freed_count(), 5);
    assert_eq!(engine.creation_count(), 5);
}

#[test]
fn test_session_outlives_bridge() {
    let (engine, bridge) = bridge();
    let k = bridge.generate_secret_key_base64();
    let mut session = bridge.create_session(&k, &k, "", 25, 0).unwrap();
    drop(bridge);

    engine.push(ScriptedOutcome::done());
    assert_eq!(session.tick().unwrap().status(), ResultStatus::Done);
    session.close();
    assert_eq!(engine.freed_count(), 1);
}
