//! Task operations: load, authorize, transition, persist.

use taskflow_core::authz::{self, Actor, Capability};
use taskflow_core::dependency::{self, CycleCheck, DependencyType, TaskDependency};
use taskflow_core::error::CoreError;
use taskflow_core::task::{CustomFields, NewTask, Task, TaskComment, TaskPatch};
use taskflow_core::types::{DbId, Timestamp};

use crate::access::{
    authorize, ensure_project_exists, ensure_task_exists, ensure_task_loaded,
};
use crate::error::ServiceResult;
use crate::repository::TaskFilter;
use crate::state::ServiceState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load, check edit rights, apply `f`, persist.
async fn transition<F>(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    action: &'static str,
    f: F,
) -> ServiceResult<Task>
where
    F: FnOnce(&Task, Timestamp) -> Result<Task, CoreError>,
{
    let task = ensure_task_loaded(state, id).await?;
    authorize(
        authz::can_edit_task(&task, actor),
        actor,
        Capability::Edit,
        "Task",
        id,
    )?;

    let updated = f(&task, state.clock.now())?;
    state.tasks.save_task(&updated).await?;

    tracing::info!(
        task_id = id,
        actor_id = actor.id,
        from = %task.status,
        to = %updated.status,
        action,
        "Task updated"
    );
    Ok(updated)
}

/// The actor can access `project_id`, the project is still modifiable, and
/// `assignee` (if any) is one of its members.
async fn ensure_project_accepts(
    state: &ServiceState,
    actor: &Actor,
    project_id: DbId,
    assignee: Option<DbId>,
) -> ServiceResult<()> {
    let project = ensure_project_exists(state, project_id).await?;
    authorize(
        authz::can_access_project(&project, actor),
        actor,
        Capability::Access,
        "Project",
        project_id,
    )?;
    if !project.can_be_modified() {
        return Err(CoreError::ConstraintViolation(format!(
            "Project {project_id} is {} and does not accept new tasks",
            project.status
        ))
        .into());
    }
    if let Some(assignee) = assignee.filter(|a| !project.is_member(*a)) {
        return Err(CoreError::ConstraintViolation(format!(
            "User {assignee} is not a member of project {project_id}"
        ))
        .into());
    }
    Ok(())
}

async fn ensure_parent_visible(
    state: &ServiceState,
    actor: &Actor,
    parent_id: DbId,
) -> ServiceResult<Task> {
    let parent = ensure_task_exists(state, parent_id).await?;
    authorize(
        authz::can_view_task(&parent, actor),
        actor,
        Capability::View,
        "Task",
        parent_id,
    )?;
    Ok(parent)
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

/// Create a task owned by `actor`.
///
/// When the task targets a project, the actor must be able to access it and
/// the project must still be modifiable. A parent task must exist and be
/// visible to the actor.
pub async fn create_task(state: &ServiceState, actor: &Actor, input: NewTask) -> ServiceResult<Task> {
    if let Some(project_id) = input.project_id {
        ensure_project_accepts(state, actor, project_id, input.assignee_id).await?;
    }
    if let Some(parent_id) = input.parent_task_id {
        ensure_parent_visible(state, actor, parent_id).await?;
    }

    let id = state.tasks.next_task_id().await?;
    let task = Task::create(id, actor.id, input, state.clock.now())?;
    state.tasks.save_task(&task).await?;

    tracing::info!(task_id = id, actor_id = actor.id, title = %task.title, "Task created");
    Ok(task)
}

/// Load a task with its relations.
pub async fn get_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Task> {
    let task = ensure_task_loaded(state, id).await?;
    authorize(
        authz::can_view_task(&task, actor),
        actor,
        Capability::View,
        "Task",
        id,
    )?;
    Ok(task)
}

/// List tasks matching `filter` that the actor may view.
pub async fn list_tasks(
    state: &ServiceState,
    actor: &Actor,
    filter: &TaskFilter,
) -> ServiceResult<Vec<Task>> {
    let tasks: Vec<Task> = state
        .tasks
        .list_tasks(filter)
        .await?
        .into_iter()
        .filter(|t| authz::can_view_task(t, actor))
        .collect();
    tracing::debug!(count = tasks.len(), actor_id = actor.id, "Listed tasks");
    Ok(tasks)
}

// ---------------------------------------------------------------------------
// Field updates
// ---------------------------------------------------------------------------

pub async fn update_task(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    patch: TaskPatch,
) -> ServiceResult<Task> {
    transition(state, actor, id, "update_details", |t, now| {
        t.update_details(patch, now)
    })
    .await
}

pub async fn merge_custom_fields(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    fields: CustomFields,
) -> ServiceResult<Task> {
    transition(state, actor, id, "merge_custom_fields", |t, now| {
        t.merge_custom_fields(fields, now)
    })
    .await
}

/// Set or clear the assignee. For project tasks the new assignee must be a
/// member of the project.
pub async fn assign_task(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    assignee_id: Option<DbId>,
) -> ServiceResult<Task> {
    let task = ensure_task_exists(state, id).await?;
    authorize(
        authz::can_assign_task(&task, actor),
        actor,
        Capability::Assign,
        "Task",
        id,
    )?;

    if let (Some(project_id), Some(assignee)) = (task.project_id, assignee_id) {
        let project = ensure_project_exists(state, project_id).await?;
        if !project.is_member(assignee) {
            return Err(CoreError::ConstraintViolation(format!(
                "User {assignee} is not a member of project {project_id}"
            ))
            .into());
        }
    }

    let updated = task.assign(assignee_id, state.clock.now());
    state.tasks.save_task(&updated).await?;

    tracing::info!(task_id = id, actor_id = actor.id, assignee_id, "Task assigned");
    Ok(updated)
}

/// Move a task into another project, or detach it with `None`. The target
/// must be accessible to the actor and still modifiable, and a current
/// assignee must already be on its team.
pub async fn move_task_to_project(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    project_id: Option<DbId>,
) -> ServiceResult<Task> {
    let task = ensure_task_exists(state, id).await?;
    authorize(
        authz::can_edit_task(&task, actor),
        actor,
        Capability::Edit,
        "Task",
        id,
    )?;

    if let Some(target) = project_id {
        ensure_project_accepts(state, actor, target, task.assignee_id).await?;
    }

    let updated = task.move_to_project(project_id, state.clock.now());
    state.tasks.save_task(&updated).await?;

    tracing::info!(task_id = id, actor_id = actor.id, project_id, "Task moved");
    Ok(updated)
}

/// Re-parent a task, rejecting self-parenting and parent-chain cycles.
pub async fn set_parent_task(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    parent_task_id: Option<DbId>,
) -> ServiceResult<Task> {
    let task = ensure_task_exists(state, id).await?;
    authorize(
        authz::can_edit_task(&task, actor),
        actor,
        Capability::Edit,
        "Task",
        id,
    )?;
    if let Some(parent_id) = parent_task_id {
        ensure_parent_visible(state, actor, parent_id).await?;
    }

    // Resolve the proposed parent's ancestor chain up front so the core check
    // can walk it synchronously.
    let mut ancestry: Vec<(DbId, Option<DbId>)> = Vec::new();
    let mut cursor = parent_task_id;
    while let Some(ancestor_id) = cursor {
        if ancestor_id == id || ancestry.iter().any(|(seen, _)| *seen == ancestor_id) {
            break;
        }
        let ancestor = ensure_task_exists(state, ancestor_id).await?;
        ancestry.push((ancestor_id, ancestor.parent_task_id));
        cursor = ancestor.parent_task_id;
    }

    let parent_of = |task_id: DbId| {
        ancestry
            .iter()
            .find(|(candidate, _)| *candidate == task_id)
            .and_then(|(_, parent)| *parent)
    };
    let updated = task.set_parent(parent_task_id, parent_of, state.clock.now())?;
    state.tasks.save_task(&updated).await?;

    tracing::info!(task_id = id, actor_id = actor.id, parent_task_id, "Task re-parented");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

pub async fn start_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Task> {
    transition(state, actor, id, "start", |t, now| t.start(actor, now)).await
}

pub async fn move_task_to_review(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
) -> ServiceResult<Task> {
    transition(state, actor, id, "move_to_review", |t, now| {
        t.move_to_review(actor, now)
    })
    .await
}

pub async fn complete_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Task> {
    transition(state, actor, id, "complete", |t, now| t.complete(actor, now)).await
}

pub async fn block_task(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    reason: &str,
) -> ServiceResult<Task> {
    transition(state, actor, id, "block", |t, now| t.block(reason, now)).await
}

pub async fn unblock_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Task> {
    transition(state, actor, id, "unblock", |t, now| t.unblock(now)).await
}

pub async fn cancel_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Task> {
    transition(state, actor, id, "cancel", |t, now| t.cancel(now)).await
}

// ---------------------------------------------------------------------------
// Archive / delete
// ---------------------------------------------------------------------------

/// Soft-delete. Requires delete rights.
pub async fn archive_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Task> {
    set_archived(state, actor, id, true).await
}

pub async fn unarchive_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Task> {
    set_archived(state, actor, id, false).await
}

async fn set_archived(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    archived: bool,
) -> ServiceResult<Task> {
    let task = ensure_task_exists(state, id).await?;
    authorize(
        authz::can_delete_task(&task, actor),
        actor,
        Capability::Delete,
        "Task",
        id,
    )?;

    let now = state.clock.now();
    let updated = if archived {
        task.archive(now)
    } else {
        task.unarchive(now)
    };
    state.tasks.save_task(&updated).await?;

    tracing::info!(task_id = id, actor_id = actor.id, archived, "Task archive flag changed");
    Ok(updated)
}

/// Hard delete. Refused while the task still has subtasks.
pub async fn delete_task(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<()> {
    let task = ensure_task_loaded(state, id).await?;
    authorize(
        authz::can_delete_task(&task, actor),
        actor,
        Capability::Delete,
        "Task",
        id,
    )?;
    task.ensure_deletable()?;

    if !state.tasks.delete_task(id).await? {
        return Err(CoreError::NotFound { entity: "Task", id }.into());
    }
    tracing::info!(task_id = id, actor_id = actor.id, "Task deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Related records
// ---------------------------------------------------------------------------

/// Anyone who can view a task may comment on it.
pub async fn add_comment(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    content: &str,
) -> ServiceResult<TaskComment> {
    let task = ensure_task_loaded(state, id).await?;
    authorize(
        authz::can_view_task(&task, actor),
        actor,
        Capability::View,
        "Task",
        id,
    )?;

    let comment_id = state.tasks.next_record_id().await?;
    let updated = task.add_comment(comment_id, actor.id, content, state.clock.now())?;
    let comment = updated
        .comments
        .last()
        .cloned()
        .ok_or_else(|| CoreError::Validation("Comment was not recorded".to_string()))?;

    state.tasks.append_comment(&comment).await?;
    state.tasks.save_task(&updated).await?;

    tracing::info!(task_id = id, actor_id = actor.id, comment_id, "Comment added");
    Ok(comment)
}

/// Record time against a task. `actual_hours` is recomputed from all logs.
pub async fn log_time(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    minutes: i64,
    description: Option<String>,
    logged_at: Option<Timestamp>,
) -> ServiceResult<Task> {
    let task = ensure_task_loaded(state, id).await?;
    authorize(
        authz::can_edit_task(&task, actor),
        actor,
        Capability::Edit,
        "Task",
        id,
    )?;

    let log_id = state.tasks.next_record_id().await?;
    let now = state.clock.now();
    let updated = task.log_time(
        log_id,
        actor.id,
        minutes,
        description,
        logged_at.unwrap_or(now),
        now,
    )?;

    if let Some(log) = updated.time_logs.last() {
        state.tasks.append_time_log(log).await?;
    }
    state.tasks.save_task(&updated).await?;

    tracing::info!(
        task_id = id,
        actor_id = actor.id,
        minutes,
        actual_hours = updated.actual_hours,
        "Time logged"
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Add `task_id -> depends_on_task_id` after the configured cycle check.
pub async fn add_dependency(
    state: &ServiceState,
    actor: &Actor,
    task_id: DbId,
    depends_on_task_id: DbId,
    dependency_type: DependencyType,
) -> ServiceResult<TaskDependency> {
    let task = ensure_task_exists(state, task_id).await?;
    authorize(
        authz::can_edit_task(&task, actor),
        actor,
        Capability::Edit,
        "Task",
        task_id,
    )?;
    if task_id != depends_on_task_id {
        ensure_task_exists(state, depends_on_task_id).await?;
    }

    let mode = state.config.dependency_check;
    let mut existing = state.dependencies.list_from(task_id).await?;
    match mode {
        CycleCheck::OneHop => {
            existing.extend(state.dependencies.list_from(depends_on_task_id).await?);
        }
        CycleCheck::Full => {
            existing.extend(
                state
                    .dependencies
                    .list_by_type(DependencyType::Blocks)
                    .await?
                    .into_iter()
                    .filter(|d| d.task_id != task_id),
            );
            existing.extend(
                state
                    .dependencies
                    .list_from(depends_on_task_id)
                    .await?
                    .into_iter()
                    .filter(|d| d.dependency_type != DependencyType::Blocks),
            );
        }
    }

    dependency::validate_new_dependency(
        task_id,
        depends_on_task_id,
        dependency_type,
        &existing,
        mode,
    )?;

    let edge = TaskDependency::new(
        state.dependencies.next_dependency_id().await?,
        task_id,
        depends_on_task_id,
        dependency_type,
        state.clock.now(),
    );
    state.dependencies.insert_dependency(&edge).await?;

    tracing::info!(
        task_id,
        depends_on_task_id,
        actor_id = actor.id,
        check = %mode,
        "Dependency added"
    );
    Ok(edge)
}

pub async fn remove_dependency(
    state: &ServiceState,
    actor: &Actor,
    task_id: DbId,
    depends_on_task_id: DbId,
) -> ServiceResult<()> {
    let task = ensure_task_exists(state, task_id).await?;
    authorize(
        authz::can_edit_task(&task, actor),
        actor,
        Capability::Edit,
        "Task",
        task_id,
    )?;

    if !state
        .dependencies
        .delete_dependency(task_id, depends_on_task_id)
        .await?
    {
        return Err(CoreError::NotFound {
            entity: "TaskDependency",
            id: depends_on_task_id,
        }
        .into());
    }
    tracing::info!(task_id, depends_on_task_id, actor_id = actor.id, "Dependency removed");
    Ok(())
}
