//! Project operations: lifecycle, details, and team management.

use taskflow_core::authz::{self, Actor, Capability};
use taskflow_core::error::CoreError;
use taskflow_core::project::{NewProject, Project, ProjectPatch};
use taskflow_core::roles::TeamRole;
use taskflow_core::types::{DbId, Timestamp};

use crate::access::{authorize, ensure_project_exists};
use crate::error::ServiceResult;
use crate::repository::TaskFilter;
use crate::state::ServiceState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load, check access, apply `f`, check edit rights, persist.
///
/// Access is checked before the transition so callers who cannot see the
/// project learn nothing about its state. Edit rights are checked after it
/// so a terminal project reports the workflow error instead of a denial.
async fn edit<F>(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    action: &'static str,
    f: F,
) -> ServiceResult<Project>
where
    F: FnOnce(&Project, Timestamp) -> Result<Project, CoreError>,
{
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_access_project(&project, actor),
        actor,
        Capability::Access,
        "Project",
        id,
    )?;
    let updated = f(&project, state.clock.now())?;
    authorize(
        authz::can_edit_project(&project, actor),
        actor,
        Capability::Edit,
        "Project",
        id,
    )?;

    state.projects.save_project(&updated).await?;

    tracing::info!(
        project_id = id,
        actor_id = actor.id,
        from = %project.status,
        to = %updated.status,
        action,
        "Project updated"
    );
    Ok(updated)
}

/// Load, check team-management rights, apply `f`, persist.
async fn manage_team<F>(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    f: F,
) -> ServiceResult<Project>
where
    F: FnOnce(&Project, Timestamp) -> Result<Project, CoreError>,
{
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_manage_members(&project, actor),
        actor,
        Capability::ManageMembers,
        "Project",
        id,
    )?;

    let updated = f(&project, state.clock.now())?;
    state.projects.save_project(&updated).await?;
    Ok(updated)
}

async fn project_tasks(state: &ServiceState, project: Project) -> ServiceResult<Project> {
    let filter = TaskFilter {
        project_id: Some(project.id),
        ..Default::default()
    };
    let tasks = state.tasks.list_tasks(&filter).await?;
    Ok(project.with_tasks(tasks))
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

/// Create a project owned by `actor`. Any authenticated user may do this.
pub async fn create_project(
    state: &ServiceState,
    actor: &Actor,
    input: NewProject,
) -> ServiceResult<Project> {
    let id = state.projects.next_project_id().await?;
    let project = Project::create(id, actor.id, input, state.clock.now())?;
    state.projects.save_project(&project).await?;

    tracing::info!(project_id = id, actor_id = actor.id, name = %project.name, "Project created");
    Ok(project)
}

/// Load a project with its members and non-archived tasks.
pub async fn get_project(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Project> {
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_access_project(&project, actor),
        actor,
        Capability::Access,
        "Project",
        id,
    )?;
    project_tasks(state, project).await
}

/// Every project the actor can access, without tasks attached.
pub async fn list_projects(state: &ServiceState, actor: &Actor) -> ServiceResult<Vec<Project>> {
    let projects: Vec<Project> = state
        .projects
        .list_projects()
        .await?
        .into_iter()
        .filter(|p| authz::can_access_project(p, actor))
        .collect();
    tracing::debug!(count = projects.len(), actor_id = actor.id, "Listed projects");
    Ok(projects)
}

pub async fn update_project(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    patch: ProjectPatch,
) -> ServiceResult<Project> {
    edit(state, actor, id, "update_details", |p, now| {
        p.update_details(patch, now)
    })
    .await
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

pub async fn start_project(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Project> {
    edit(state, actor, id, "start", |p, now| p.start(now)).await
}

pub async fn complete_project(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
) -> ServiceResult<Project> {
    edit(state, actor, id, "complete", |p, now| p.complete(now)).await
}

pub async fn pause_project(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<Project> {
    edit(state, actor, id, "pause", |p, now| p.pause(now)).await
}

pub async fn resume_project(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
) -> ServiceResult<Project> {
    edit(state, actor, id, "resume", |p, now| p.resume(now)).await
}

pub async fn cancel_project(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
) -> ServiceResult<Project> {
    edit(state, actor, id, "cancel", |p, now| p.cancel(now)).await
}

// ---------------------------------------------------------------------------
// Ownership / archive / delete
// ---------------------------------------------------------------------------

pub async fn transfer_ownership(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    new_owner_id: DbId,
) -> ServiceResult<Project> {
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_transfer_project(&project, actor),
        actor,
        Capability::TransferOwnership,
        "Project",
        id,
    )?;

    let updated = project.transfer_ownership(new_owner_id, state.clock.now())?;
    state.projects.save_project(&updated).await?;

    tracing::info!(
        project_id = id,
        actor_id = actor.id,
        previous_owner_id = project.owner_id,
        new_owner_id,
        "Project ownership transferred"
    );
    Ok(updated)
}

/// Deactivate a project. Owner or admin only; works in any status.
pub async fn archive_project(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
) -> ServiceResult<Project> {
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_delete_project(&project, actor),
        actor,
        Capability::Delete,
        "Project",
        id,
    )?;

    let updated = project.archive(state.clock.now());
    state.projects.save_project(&updated).await?;
    tracing::info!(project_id = id, actor_id = actor.id, "Project archived");
    Ok(updated)
}

pub async fn restore_project(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
) -> ServiceResult<Project> {
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_delete_project(&project, actor),
        actor,
        Capability::Delete,
        "Project",
        id,
    )?;

    let updated = project.restore(state.clock.now())?;
    state.projects.save_project(&updated).await?;
    tracing::info!(project_id = id, actor_id = actor.id, "Project restored");
    Ok(updated)
}

/// Permanently remove a project. Refused while any task, archived or not,
/// still belongs to it.
pub async fn delete_project(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<()> {
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_delete_project(&project, actor),
        actor,
        Capability::Delete,
        "Project",
        id,
    )?;

    let filter = TaskFilter {
        project_id: Some(id),
        include_archived: true,
        ..Default::default()
    };
    let remaining = state.tasks.list_tasks(&filter).await?.len();
    if remaining > 0 {
        return Err(CoreError::ConstraintViolation(format!(
            "Project {id} still has {remaining} task(s)"
        ))
        .into());
    }

    if !state.projects.delete_project(id).await? {
        return Err(CoreError::NotFound {
            entity: "Project",
            id,
        }
        .into());
    }
    tracing::info!(project_id = id, actor_id = actor.id, "Project deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

pub async fn add_member(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    user_id: DbId,
    team_role: TeamRole,
) -> ServiceResult<Project> {
    let updated = manage_team(state, actor, id, |p, now| {
        p.add_member(user_id, team_role, now)
    })
    .await?;
    tracing::info!(project_id = id, actor_id = actor.id, user_id, role = %team_role, "Member added");
    Ok(updated)
}

pub async fn remove_member(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    user_id: DbId,
) -> ServiceResult<Project> {
    let updated = manage_team(state, actor, id, |p, now| p.remove_member(user_id, now)).await?;
    tracing::info!(project_id = id, actor_id = actor.id, user_id, "Member removed");
    Ok(updated)
}

pub async fn change_member_role(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
    user_id: DbId,
    team_role: TeamRole,
) -> ServiceResult<Project> {
    let updated = manage_team(state, actor, id, |p, now| {
        p.change_member_role(user_id, team_role, now)
    })
    .await?;
    tracing::info!(project_id = id, actor_id = actor.id, user_id, role = %team_role, "Member role changed");
    Ok(updated)
}
