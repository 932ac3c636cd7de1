use std::sync::Arc;

use chrono::{TimeZone, Utc};
use taskflow_core::authz::Actor;
use taskflow_core::clock::FixedClock;
use taskflow_core::roles::Role;
use taskflow_core::task::{NewTask, Task};
use taskflow_core::types::{DbId, Timestamp};
use taskflow_service::config::ServiceConfig;
use taskflow_service::state::ServiceState;
use taskflow_service::tasks;

pub const CREATOR: DbId = 1;
pub const ASSIGNEE: DbId = 2;
pub const MANAGER: DbId = 3;
pub const STRANGER: DbId = 99;
pub const ADMIN: DbId = 100;

/// Monday 2025-06-02 09:00 UTC.
pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub fn user(id: DbId) -> Actor {
    Actor::new(id, Role::User)
}

pub fn manager() -> Actor {
    Actor::new(MANAGER, Role::ProjectManager)
}

pub fn admin() -> Actor {
    Actor::new(ADMIN, Role::Admin)
}

/// Install a test-writer subscriber once per binary so `tracing` output is
/// captured by the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskflow_service=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// In-memory state pinned to [`t0`]. The returned clock can be advanced.
pub fn test_state(config: ServiceConfig) -> (ServiceState, Arc<FixedClock>) {
    init_tracing();
    let clock = Arc::new(FixedClock::new(t0()));
    let state = ServiceState::in_memory_with_clock(config, clock.clone());
    (state, clock)
}

pub fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        ..Default::default()
    }
}

/// Create a standalone task owned by [`CREATOR`].
pub async fn seed_task(state: &ServiceState, title: &str) -> Task {
    tasks::create_task(state, &user(CREATOR), new_task(title))
        .await
        .unwrap()
}
