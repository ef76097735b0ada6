//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic sweep (supervisor.rs):
//!     interval tick
//!     → probe.rs for every registered service (concurrently)
//!     → registry record_success / record_failure
//!
//! Manual check (POST /api/v2/services/{name}/health-check):
//!     → supervisor.rs check_one()
//!     → same probe and recording path as the sweep
//! ```
//!
//! # Design Decisions
//! - Probe failures never escape the supervisor; they become registry state
//! - Every failure kind counts toward the same threshold
//! - One success is enough to recover

pub mod probe;
pub mod supervisor;

pub use probe::{HealthProbe, ProbeError, ProbeResult};
pub use supervisor::{CheckOutcome, HealthSupervisor, SweepSummary};
