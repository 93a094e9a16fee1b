//! boringtun log lines reaching the host handler
//!
//! The engine forwards its tracing output through a process-wide
//! subscriber, so this lives in its own test binary where nothing else
//! installs one first.
//!
//! ```bash
//! cargo test --test boringtun_logging
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use wg_bridge::config::BridgeConfig;
use wg_bridge::{Bridge, ResultStatus};

#[test]
fn test_boringtun_handshake_lines_reach_handler() {
    let bridge = Bridge::boringtun(BridgeConfig::default()).unwrap();
    let lines: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&lines);
    assert!(bridge.set_logging_function(move |line| sink.lock().push(line.to_string())));

    let a = bridge.generate_key_pair();
    let b = bridge.generate_key_pair();
    let mut peer1 = bridge
        .create_session(&a.private_key, &b.public_key, "", 25, 1)
        .unwrap();
    let mut peer2 = bridge
        .create_session(&b.private_key, &a.public_key, "", 25, 2)
        .unwrap();

    let p1 = peer1.force_handshake().unwrap();
    let p2 = peer2.read(p1.data().unwrap()).unwrap();
    let p1 = peer1.read(p2.data().unwrap()).unwrap();
    assert_eq!(
        peer2.read(p1.data().unwrap()).unwrap().status(),
        ResultStatus::Done
    );

    let lines = lines.lock().clone();
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|line| line.contains("boringtun")));
    assert!(lines
        .iter()
        .any(|line| line.contains("Sending handshake_initiation")));
    assert!(lines
        .iter()
        .any(|line| line.contains("Received handshake_initiation")));
    assert!(lines
        .iter()
        .any(|line| line.contains("Received handshake_response")));

    // Lines are trimmed and carry no color codes
    assert!(lines.iter().all(|line| !line.ends_with('\n')));
    assert!(lines.iter().all(|line| !line.contains('\u{1b}')));
}
