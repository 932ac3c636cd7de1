use std::sync::Arc;

use taskflow_core::clock::{Clock, SystemClock};

use crate::config::ServiceConfig;
use crate::memory::InMemoryStore;
use crate::repository::{DependencyRepository, ProjectRepository, TaskRepository};

/// Shared state passed to every service operation.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct ServiceState {
    pub tasks: Arc<dyn TaskRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub dependencies: Arc<dyn DependencyRepository>,
    /// Source of "now" for every transition.
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ServiceConfig>,
}

impl ServiceState {
    /// State backed by a single [`InMemoryStore`] and the system clock.
    pub fn in_memory(config: ServiceConfig) -> Self {
        Self::in_memory_with_clock(config, Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(config: ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            tasks: store.clone(),
            projects: store.clone(),
            dependencies: store,
            clock,
            config: Arc::new(config),
        }
    }
}
