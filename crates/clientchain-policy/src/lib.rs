//! # ClientChain Policy
//!
//! Composable predicates consulted before any externally visible messaging
//! action. A veto is a deliberate, logged skip — never an error.
//!
//! ## Architecture
//! ```text
//! PolicyPipeline.evaluate(subject, channel)
//!   ├── ConsentGuard     — opt-out flags, withdrawn marketing consent
//!   ├── QuietHoursGuard  — 08:00–21:00 local send window
//!   └── RateLimitGuard   — per-subject per-channel daily ceiling
//!         (counter incremented on every check, veto when over ceiling)
//! ```
//!
//! Guards compose with AND: the first veto wins. The rate-limit counter and
//! the wall clock sit behind traits so the pipeline is testable with a
//! manual clock and an in-memory counter.

pub mod clock;
pub mod consent;
pub mod counter;
pub mod pipeline;
pub mod quiet_hours;
pub mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use consent::ConsentGuard;
pub use counter::{InMemoryCounter, RateCounter};
pub use pipeline::{PolicyGuard, PolicyPipeline, Verdict, VetoReason};
pub use quiet_hours::QuietHoursGuard;
pub use rate_limit::RateLimitGuard;
