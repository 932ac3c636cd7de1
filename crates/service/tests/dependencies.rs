//! Integration tests for dependency edges under both cycle-check modes.

mod common;

use assert_matches::assert_matches;
use common::{seed_task, test_state, user, CREATOR, STRANGER};
use taskflow_core::dependency::{CycleCheck, DependencyType};
use taskflow_core::error::CoreError;
use taskflow_core::types::DbId;
use taskflow_service::config::ServiceConfig;
use taskflow_service::error::ServiceError;
use taskflow_service::state::ServiceState;
use taskflow_service::tasks;

fn config(mode: CycleCheck) -> ServiceConfig {
    ServiceConfig {
        dependency_check: mode,
        ..Default::default()
    }
}

async fn three_tasks(state: &ServiceState) -> (DbId, DbId, DbId) {
    let a = seed_task(state, "five").await.id;
    let b = seed_task(state, "seven").await.id;
    let c = seed_task(state, "nine").await.id;
    (a, b, c)
}

async fn blocks(state: &ServiceState, from: DbId, to: DbId) -> Result<(), ServiceError> {
    tasks::add_dependency(state, &user(CREATOR), from, to, DependencyType::Blocks)
        .await
        .map(|_| ())
}

// ---------------------------------------------------------------------------
// Test: self and direct cycles are rejected in every mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_self_dependency_rejected() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let (a, _, _) = three_tasks(&state).await;

    let err = blocks(&state, a, a).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::InvalidDependency(_)));
    assert_eq!(err.code(), "INVALID_DEPENDENCY");
}

#[tokio::test]
async fn test_direct_cycle_rejected() {
    for mode in [CycleCheck::OneHop, CycleCheck::Full] {
        let (state, _clock) = test_state(config(mode));
        let (a, b, _) = three_tasks(&state).await;

        blocks(&state, a, b).await.unwrap();
        assert_matches!(
            blocks(&state, b, a).await,
            Err(ServiceError::Core(CoreError::InvalidDependency(_))),
            "mode {mode}"
        );
    }
}

#[tokio::test]
async fn test_reverse_of_related_edge_is_also_rejected() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let (a, b, _) = three_tasks(&state).await;

    tasks::add_dependency(&state, &user(CREATOR), a, b, DependencyType::Related)
        .await
        .unwrap();
    assert_matches!(
        blocks(&state, b, a).await,
        Err(ServiceError::Core(CoreError::InvalidDependency(_)))
    );
}

#[tokio::test]
async fn test_duplicate_edge_rejected() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let (a, b, _) = three_tasks(&state).await;

    blocks(&state, a, b).await.unwrap();
    assert_matches!(
        blocks(&state, a, b).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );
}

// ---------------------------------------------------------------------------
// Test: transitive cycles depend on the configured check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_one_hop_accepts_transitive_cycle() {
    let (state, _clock) = test_state(config(CycleCheck::OneHop));
    let (a, b, c) = three_tasks(&state).await;

    blocks(&state, a, b).await.unwrap();
    blocks(&state, b, c).await.unwrap();
    blocks(&state, c, a).await.unwrap();

    let loaded = tasks::get_task(&state, &user(CREATOR), c).await.unwrap();
    assert_eq!(loaded.dependencies.len(), 1);
    assert_eq!(loaded.dependencies[0].depends_on_task_id, a);
}

#[tokio::test]
async fn test_full_check_rejects_transitive_cycle() {
    let (state, _clock) = test_state(config(CycleCheck::Full));
    let (a, b, c) = three_tasks(&state).await;

    blocks(&state, a, b).await.unwrap();
    blocks(&state, b, c).await.unwrap();
    assert_matches!(
        blocks(&state, c, a).await,
        Err(ServiceError::Core(CoreError::InvalidDependency(_)))
    );

    // Non-blocking edges are not part of the cycle check.
    tasks::add_dependency(&state, &user(CREATOR), c, a, DependencyType::Related)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test: removal and authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_remove_dependency_allows_reverse_edge() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let (a, b, _) = three_tasks(&state).await;
    let actor = user(CREATOR);

    blocks(&state, a, b).await.unwrap();
    tasks::remove_dependency(&state, &actor, a, b).await.unwrap();
    blocks(&state, b, a).await.unwrap();

    assert_matches!(
        tasks::remove_dependency(&state, &actor, a, b).await,
        Err(ServiceError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test]
async fn test_stranger_cannot_add_dependency() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let (a, b, _) = three_tasks(&state).await;

    assert_matches!(
        tasks::add_dependency(&state, &user(STRANGER), a, b, DependencyType::Blocks).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
}

#[tokio::test]
async fn test_dependency_on_missing_task_is_not_found() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let (a, _, _) = three_tasks(&state).await;

    assert_matches!(
        blocks(&state, a, 777).await,
        Err(ServiceError::Core(CoreError::NotFound { id: 777, .. }))
    );
}
