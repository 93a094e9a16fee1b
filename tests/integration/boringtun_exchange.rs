//! Two boringtun peers, end to end
//!
//! Every test wires two sessions back to back in memory: the datagrams one
//! session emits are fed straight into the other.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use wg_bridge::config::BridgeConfig;
use wg_bridge::engine::DATA_OVERHEAD;
use wg_bridge::keys::KeyPair;
use wg_bridge::peer::{parse_allowed_ips, Peer, Route};
use wg_bridge::{BoringtunEngine, Bridge, ResultStatus, TunnelSession};

/// IPv4 TCP segment carrying `GET / HTTP/1.1` to example.com
const IPV4_PACKET: &str = "RQAAfgAAQABABvubCggAEF241w7LfQBQ4L6GTQWBDfWAGAgEBQMAAAEBCApIq7vwRD8MpEdFVCAvIEhUVFAvMS4xDQpIb3N0OiBleGFtcGxlLmNvbQ0KVXNlci1BZ2VudDogY3VybC84LjQuMA0KQWNjZXB0OiAqLyoNCg0K";

type Session = TunnelSession<BoringtunEngine>;

fn bridge() -> Bridge<BoringtunEngine> {
    Bridge::boringtun(BridgeConfig::default()).expect("default config is valid")
}

fn pair_of_sessions(bridge: &Bridge<BoringtunEngine>, index: i64) -> (Session, Session) {
    let a: KeyPair = bridge.generate_key_pair();
    let b: KeyPair = bridge.generate_key_pair();
    let peer1 = bridge
        .create_session(&a.private_key, &b.public_key, "", 25, index)
        .unwrap();
    let peer2 = bridge
        .create_session(&b.private_key, &a.public_key, "", 25, index)
        .unwrap();
    (peer1, peer2)
}

/// Run the full handshake, leaving both sides with an established session
fn handshake(peer1: &mut Session, peer2: &mut Session) {
    let p1 = peer1.force_handshake().unwrap();
    assert_eq!(p1.status(), ResultStatus::WriteToNetwork);
    assert_eq!(p1.len(), 148);

    let p2 = peer2.read(p1.data().unwrap()).unwrap();
    assert_eq!(p2.status(), ResultStatus::WriteToNetwork);
    assert_eq!(p2.len(), 92);

    let p1 = peer1.read(p2.data().unwrap()).unwrap();
    assert_eq!(p1.status(), ResultStatus::WriteToNetwork);

    let p2 = peer2.read(p1.data().unwrap()).unwrap();
    assert_eq!(p2.status(), ResultStatus::Done);
}

// ========================================================================
// Keys and accessors
// ========================================================================

#[test]
fn test_key_pair_and_accessors() {
    let bridge = bridge();
    let pair = bridge.generate_key_pair();
    assert_ne!(pair.private_key, pair.public_key);
    assert_eq!(BASE64.decode(&pair.private_key).unwrap().len(), 32);
    assert!(bridge.check_base64_encoded_x25519_key(&pair.public_key));
    assert_eq!(
        bridge.public_key_from_base64(&pair.private_key).unwrap(),
        pair.public_key
    );

    let private_key = bridge.generate_secret_key_base64();
    let peer_public_key = bridge.generate_secret_key_base64();
    let session = bridge
        .create_session(&private_key, &peer_public_key, "", 25, 1)
        .unwrap();
    assert_eq!(session.private_key(), private_key);
    assert_eq!(session.peer_public_key(), peer_public_key);
}

// ========================================================================
// Handshake and data
// ========================================================================

#[test]
fn test_handshake_via_write() {
    let bridge = bridge();
    let (mut peer1, mut peer2) = pair_of_sessions(&bridge, 10);

    let handshake1 = peer1.force_handshake().unwrap();
    assert_eq!(handshake1.status(), ResultStatus::WriteToNetwork);

    // No session yet: peer2 queues the bytes and starts its own handshake
    let handshake2 = peer2.write(handshake1.data().unwrap()).unwrap();
    assert_eq!(handshake2.status(), ResultStatus::WriteToNetwork);

    // peer1 already has a handshake in flight, so it only queues
    let queued = peer1.write(handshake2.data().unwrap()).unwrap();
    assert_eq!(queued.status(), ResultStatus::Done);
}

#[test]
fn test_send_ipv4_packet() {
    let bridge = bridge();
    let (mut peer1, mut peer2) = pair_of_sessions(&bridge, 500);
    handshake(&mut peer1, &mut peer2);

    let packet = BASE64.decode(IPV4_PACKET).unwrap();
    let sealed = peer1.write(&packet).unwrap();
    assert_eq!(sealed.status(), ResultStatus::WriteToNetwork);
    assert_ne!(sealed.data().unwrap(), packet.as_slice());

    let opened = peer2.read(sealed.data().unwrap()).unwrap();
    assert_eq!(opened.status(), ResultStatus::WriteToTunnelIpv4);
    assert_eq!(opened.data().unwrap(), packet.as_slice());

    let stats = peer2.stats();
    assert!(stats.time_since_last_handshake.is_some());
    assert!(stats.rx_bytes > 0);
}

#[test]
fn test_packet_too_large_for_buffer_is_error_status() {
    let bridge = bridge();
    let capacity = BridgeConfig::default().buffer.capacity;
    let (mut peer1, mut peer2) = pair_of_sessions(&bridge, 3);
    handshake(&mut peer1, &mut peer2);

    let oversized = vec![0x45; 1990];
    let envelope = peer1.write(&oversized).unwrap();
    assert_eq!(envelope.status(), ResultStatus::Error);
    assert!(envelope.data().is_none());

    // The largest packet that still fits seals into the full buffer
    let largest = vec![0x45; capacity - DATA_OVERHEAD];
    let sealed = peer1.write(&largest).unwrap();
    assert_eq!(sealed.status(), ResultStatus::WriteToNetwork);
    assert_eq!(sealed.len(), capacity);
}

#[test]
fn test_garbage_datagram_is_error_status() {
    let bridge = bridge();
    let (mut peer1, _peer2) = pair_of_sessions(&bridge, 1);

    let envelope = peer1.read(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
    assert_eq!(envelope.status(), ResultStatus::Error);
    assert!(envelope.data().is_none());
}

#[test]
fn test_replayed_datagram_rejected() {
    let bridge = bridge();
    let (mut peer1, mut peer2) = pair_of_sessions(&bridge, 2);
    handshake(&mut peer1, &mut peer2);

    let packet = BASE64.decode(IPV4_PACKET).unwrap();
    let sealed = peer1.write(&packet).unwrap().into_data().unwrap();

    assert_eq!(
        peer2.read(&sealed).unwrap().status(),
        ResultStatus::WriteToTunnelIpv4
    );
    assert_eq!(peer2.read(&sealed).unwrap().status(), ResultStatus::Error);
}

#[test]
fn test_preshared_key_mismatch_blocks_handshake() {
    let bridge = bridge();
    let a = bridge.generate_key_pair();
    let b = bridge.generate_key_pair();
    let psk1 = bridge.generate_secret_key_base64();
    let psk2 = bridge.generate_secret_key_base64();

    let mut peer1 = bridge
        .create_session(&a.private_key, &b.public_key, &psk1, 25, 1)
        .unwrap();
    let mut peer2 = bridge
        .create_session(&b.private_key, &a.public_key, &psk2, 25, 2)
        .unwrap();

    let p1 = peer1.force_handshake().unwrap();
    let p2 = peer2.read(p1.data().unwrap()).unwrap();
    assert_eq!(p2.status(), ResultStatus::WriteToNetwork);

    // The response authenticates with the wrong PSK
    let p1 = peer1.read(p2.data().unwrap()).unwrap();
    assert_eq!(p1.status(), ResultStatus::Error);
}

// ========================================================================
// Peer routing over real sessions
// ========================================================================

#[test]
fn test_peers_route_handshake_and_packet() {
    let bridge = bridge();
    let (session1, session2) = pair_of_sessions(&bridge, 7);
    let addr1 = "192.0.2.1:51820".parse().unwrap();
    let addr2 = "192.0.2.2:51820".parse().unwrap();

    let mut peer1 = Peer::new(session1, parse_allowed_ips("10.8.0.2/32").unwrap(), Some(addr2));
    let mut peer2 = Peer::new(session2, parse_allowed_ips("10.8.0.1/32").unwrap(), None);

    let Route::ToNetwork { endpoint, data } = peer1.force_handshake().unwrap() else {
        panic!("initiation should go to the network");
    };
    assert_eq!(endpoint, addr2);

    // The responder learns the initiator's endpoint from the initiation
    let (route, accepted) = peer2.read(&data, Some(addr1)).unwrap();
    assert!(accepted);
    assert_eq!(peer2.endpoint(), Some(addr1));
    let Route::ToNetwork { endpoint, data } = route else {
        panic!("response should go to the network");
    };
    assert_eq!(endpoint, addr1);

    let (route, _) = peer1.read(&data, Some(addr2)).unwrap();
    let Route::ToNetwork { data, .. } = route else {
        panic!("keepalive should go to the network");
    };
    assert_eq!(peer2.read(&data, Some(addr1)).unwrap().0, Route::Nothing);

    let packet = BASE64.decode(IPV4_PACKET).unwrap();
    let Route::ToNetwork { data, .. } = peer1.write(&packet).unwrap() else {
        panic!("sealed packet should go to the network");
    };
    assert_eq!(
        peer2.read(&data, Some(addr1)).unwrap().0,
        Route::ToIpv4(packet)
    );
}
