//! Task/project workflow core.
//!
//! Pure, synchronous domain logic with no storage, transport, or logging
//! dependencies. Callers load entities, ask [`authz`] whether an actor may
//! act, apply a transition from [`task`] or [`project`] (which consult
//! [`workflow`]), run [`dependency`] checks where edges are added, and hand
//! the resulting values back to persistence. [`metrics`] computes read-only
//! aggregates over already-loaded values.

pub mod authz;
pub mod clock;
pub mod dependency;
pub mod error;
pub mod metrics;
pub mod project;
pub mod roles;
pub mod task;
pub mod types;
pub mod workflow;
