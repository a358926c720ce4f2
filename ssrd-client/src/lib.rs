//! SSRD viewer library: stream session, presentation loop, and the
//! headless output backends used when no GUI or audio device is wired.

pub mod client;
pub mod config;
pub mod present;
