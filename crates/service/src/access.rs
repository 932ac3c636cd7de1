//! Shared load-and-authorize helpers for service operations.

use taskflow_core::authz::{self, Actor, Capability};
use taskflow_core::error::CoreError;
use taskflow_core::project::Project;
use taskflow_core::task::Task;
use taskflow_core::types::DbId;

use crate::error::ServiceResult;
use crate::state::ServiceState;

/// Turn an evaluator decision into a `Forbidden` error, logging denials.
pub(crate) fn authorize(
    allowed: bool,
    actor: &Actor,
    capability: Capability,
    entity: &'static str,
    id: DbId,
) -> ServiceResult<()> {
    if !allowed {
        tracing::warn!(
            actor_id = actor.id,
            role = %actor.role,
            entity,
            id,
            capability = %capability,
            "Authorization denied"
        );
    }
    authz::ensure(allowed, capability, entity, id)?;
    Ok(())
}

/// Load a task's own fields, or `NotFound`.
pub(crate) async fn ensure_task_exists(state: &ServiceState, id: DbId) -> ServiceResult<Task> {
    state
        .tasks
        .find_task(id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "Task", id }.into())
}

/// Load a task with its related collections, or `NotFound`.
pub(crate) async fn ensure_task_loaded(state: &ServiceState, id: DbId) -> ServiceResult<Task> {
    state
        .tasks
        .find_task_with_relations(id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "Task", id }.into())
}

/// Load a project with its members, or `NotFound`.
pub(crate) async fn ensure_project_exists(state: &ServiceState, id: DbId) -> ServiceResult<Project> {
    state
        .projects
        .find_project(id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "Project",
                id,
            }
            .into()
        })
}
