//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers, body)
//!     → router.rs RouteTable (first matching prefix rule)
//!     → matcher.rs (evaluate prefix, split remainder)
//!     → registry lookup: unknown → 404, not Healthy → 503
//!     → rewrite path, forward through Upstream
//!     → relay response, or 504 / 500 on transport failure
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers in declared order
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - First match wins, in declared order
//! - Never retried at this layer

pub mod matcher;
pub mod router;

pub use router::{RouteError, RouteMatch, RouteRule, RouteTable, Router};
