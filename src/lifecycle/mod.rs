//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → ConnectionPool → ServiceRegistry → initial sweep
//!         → gating policy → HealthSupervisor task → (caller binds listener)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → drain → stop supervisor → close pool
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_handler, wait_for_signal};
pub use startup::{Gateway, StartupError};
