//! Boundary to the external agent runtime.
//!
//! The runtime owns agent sessions; this crate only starts them, asks how
//! they are doing, and waits for them to finish.
//!
//! # Main types
//!
//! - [`SessionGateway`] — Trait for spawn / status / history calls against the runtime.
//! - [`CliSessionGateway`] — Gateway that drives the runtime's command-line interface.
//! - [`SessionMonitor`] — Polls a session until it is terminal or a timeout elapses.
//! - [`SessionHandle`] — Opaque session key returned by a successful spawn.

/// Subprocess-backed gateway implementation.
pub mod cli_gateway;
/// Gateway trait, session identifiers and status classification.
pub mod gateway;
/// Polling wait for terminal session status.
pub mod monitor;

pub use cli_gateway::{CliSessionGateway, GatewayConfig};
pub use gateway::{
    classify_status, parse_session_handle, SessionGateway, SessionHandle, SessionStatus,
};
pub use monitor::{MonitorConfig, PollOutcome, SessionMonitor};
