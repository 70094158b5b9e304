//! # Platform Host Daemon
//!
//! This crate runs an application against the platform layer on a simulated
//! host.
//!
//! ## Philosophy
//!
//! - **Host owns I/O**: The demo application only talks to `Pal`
//! - **Input is a script**: Host notifications are replayed from text, so a
//!   run is deterministic
//! - **Logs go to stderr**: Structured entries, one per line
//!
//! ## Responsibilities
//!
//! The daemon:
//! - Loads a `PalConfig` from JSON
//! - Replays a host event script through `SimulatedHost`
//! - Drives a small palette-cycling demo through the event queue
//!
//! ## Non-Responsibilities
//!
//! The daemon does NOT:
//! - Open a real window or audio device
//! - Persist anything between runs

pub mod logger;
pub mod runtime;
pub mod script;

pub use logger::{LogEntry, LogLevel, LoggerError, StderrLogger};
pub use runtime::{DaemonConfig, DaemonError, DaemonRuntime, DemoStats};
pub use script::{HostScript, HostScriptError, ScriptStep};
