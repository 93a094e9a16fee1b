//! Engine log forwarding, end to end
//!
//! The log anchor is process-wide, so every scenario lives in one test to
//! keep them from racing each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use wg_bridge::config::BridgeConfig;
use wg_bridge::engine::{ScriptedEngine, ScriptedOutcome};
use wg_bridge::logging::{clear_logging_function, forward_engine_log, set_logging_function};
use wg_bridge::registry::ContextId;
use wg_bridge::{Bridge, TunnelSession, LOG_HANDLER_KEY};

type Lines = Arc<Mutex<Vec<String>>>;

fn collector() -> (Lines, impl Fn(&str) + Send + Sync + 'static) {
    let lines: Lines = Arc::default();
    let sink = Arc::clone(&lines);
    (lines, move |line: &str| sink.lock().push(line.to_string()))
}

fn session(bridge: &Bridge<ScriptedEngine>) -> TunnelSession<ScriptedEngine> {
    let k = bridge.generate_secret_key_base64();
    bridge.create_session(&k, &k, "", 25, 0).unwrap()
}

#[test]
fn test_logging_bridge() {
    let engine = Arc::new(ScriptedEngine::new());
    let bridge = Bridge::new(Arc::clone(&engine), BridgeConfig::default()).unwrap();
    let mut tunnel = session(&bridge);

    // Nothing registered yet: lines vanish quietly
    forward_engine_log("before any handler");
    tunnel.tick().unwrap();

    // ------------------------------------------------------------------
    // Engine lines reach the handler
    // ------------------------------------------------------------------
    let (first, handler) = collector();
    assert!(bridge.set_logging_function(handler));
    assert!(bridge.registry().exists(LOG_HANDLER_KEY));

    tunnel.tick().unwrap();
    engine.push(ScriptedOutcome::network(vec![1; 148]));
    tunnel.force_handshake().unwrap();
    assert_eq!(
        *first.lock(),
        vec![
            "scripted tick -> tag 0".to_string(),
            "scripted force_handshake -> tag 1".to_string(),
        ]
    );

    // ------------------------------------------------------------------
    // Last registration wins
    // ------------------------------------------------------------------
    let (second, handler) = collector();
    assert!(bridge.set_logging_function(handler));
    tunnel.tick().unwrap();
    assert_eq!(first.lock().len(), 2);
    assert_eq!(second.lock().len(), 1);

    // ------------------------------------------------------------------
    // A handler may replace itself while running
    // ------------------------------------------------------------------
    let (third, replacement) = collector();
    let replacement = Arc::new(replacement);
    let registry = Arc::clone(bridge.registry());
    let handler_engine = Arc::clone(&engine);
    let replaced = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&replaced);
    let context = bridge.context();
    assert!(bridge.set_logging_function(move |_line| {
        if !flag.swap(true, Ordering::SeqCst) {
            let next = Arc::clone(&replacement);
            set_logging_function(
                &registry,
                handler_engine.as_ref(),
                Arc::new(move |line: &str| (*next)(line)),
                context,
            );
            // Logging again from inside the handler reaches the new one
            forward_engine_log("nested");
        }
    }));

    tunnel.tick().unwrap();
    assert!(replaced.load(Ordering::SeqCst));
    assert_eq!(*third.lock(), vec!["nested".to_string()]);

    tunnel.tick().unwrap();
    assert_eq!(third.lock().len(), 2);
    assert_eq!(second.lock().len(), 1);

    // ------------------------------------------------------------------
    // Cleared handler drops lines
    // ------------------------------------------------------------------
    assert!(clear_logging_function(bridge.registry()));
    tunnel.tick().unwrap();
    assert_eq!(third.lock().len(), 2);

    // ------------------------------------------------------------------
    // A dropped registry drops lines
    // ------------------------------------------------------------------
    let other_engine = Arc::new(ScriptedEngine::new());
    let other = Bridge::new(Arc::clone(&other_engine), BridgeConfig::default()).unwrap();
    let mut other_tunnel = session(&other);
    let (fourth, handler) = collector();
    assert!(other.set_logging_function(handler));
    other_tunnel.tick().unwrap();
    assert_eq!(fourth.lock().len(), 1);

    drop(other);
    other_tunnel.tick().unwrap();
    forward_engine_log("after drop");
    assert_eq!(fourth.lock().len(), 1);

    // Registries are independent; clearing one leaves the other untouched
    let standalone = Arc::new(wg_bridge::ReferenceRegistry::new());
    let (fifth, handler) = collector();
    set_logging_function(&standalone, engine.as_ref(), Arc::new(handler), ContextId(99));
    forward_engine_log("standalone");
    assert_eq!(*fifth.lock(), vec!["standalone".to_string()]);
    assert!(!bridge.registry().exists(LOG_HANDLER_KEY));
}
