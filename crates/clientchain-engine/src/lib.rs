//! The automation workflow engine.
//!
//! ```text
//!   domain event ──► TriggerDispatcher ──► WorkflowExecution records
//!                                               │
//!                                               ▼
//!                                        ExecutionRunner ──► channels / ledger /
//!                                           │    ▲           subjects / webhooks
//!                              wait(n) ─────┘    │
//!                        (dormant, next_step_at) │
//!                                               sweep_due (every 60s)
//! ```
//!
//! Executions are inert rows between advances. A `wait` action suspends by
//! stamping `next_step_at` and returning; the periodic sweep picks the row
//! back up once the timestamp passes. Nothing blocks, so suspended workflows
//! survive process restarts.

pub mod actions;
pub mod definitions;
pub mod dispatcher;
pub mod execution;
pub mod runner;
pub mod store;
pub mod sweep;
pub mod templates;

pub use actions::Action;
pub use definitions::{Trigger, WorkflowDefinition, WorkflowStatus};
pub use dispatcher::TriggerDispatcher;
pub use execution::{ExecutionStatus, WorkflowExecution};
pub use runner::ExecutionRunner;
pub use store::AutomationDb;
pub use sweep::spawn_sweeper;
pub use templates::{WorkflowTemplate, apply_template, template_catalog};
