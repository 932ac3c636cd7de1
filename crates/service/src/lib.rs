//! Taskflow service layer.
//!
//! Wires the pure `taskflow_core` decisions to persistence collaborators:
//! every operation loads entities through the repository traits, checks
//! authorization, applies a core transition at the state's clock time, and
//! saves the result. Exposed as a library so integration tests and an
//! outer transport can share the same entry points.

mod access;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod memory;
pub mod projects;
pub mod repository;
pub mod state;
pub mod tasks;
