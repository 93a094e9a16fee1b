//! Integration tests for wg-bridge
//!
//! # Test Organization
//!
//! - `session_lifecycle`: construction, dispatch and release against the
//!   scripted engine
//! - `boringtun_exchange`: two real boringtun peers completing a handshake
//!   and exchanging an IPv4 packet
//! - `logging_bridge`: engine log lines reaching the host handler
//!
//! # Test Requirements
//!
//! - No network access; every byte stays in memory

pub mod boringtun_exchange;
pub mod logging_bridge;
pub mod session_lifecycle;
