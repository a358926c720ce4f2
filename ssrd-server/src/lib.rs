//! SSRD host library: accept loop, per-client sessions, and the
//! synthetic capture source used for loopback diagnostics.

pub mod config;
pub mod server;
pub mod session;
pub mod testsrc;
