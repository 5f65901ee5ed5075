//! HTTP operator surface.
//!
//! Workflow CRUD, template application, manual runs, event ingestion, the
//! sweep hook, and subject/credit queries — everything an operator dashboard
//! or an upstream subsystem needs to drive the engine.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
