//! Integration tests for project lifecycle, team, and ownership operations.

mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use common::{admin, new_task, t0, test_state, user, ASSIGNEE, CREATOR, STRANGER};
use taskflow_core::error::CoreError;
use taskflow_core::project::{NewProject, ProjectPatch};
use taskflow_core::roles::TeamRole;
use taskflow_core::task::NewTask;
use taskflow_core::types::DbId;
use taskflow_core::workflow::ProjectStatus;
use taskflow_service::config::ServiceConfig;
use taskflow_service::error::ServiceError;
use taskflow_service::projects;
use taskflow_service::state::ServiceState;
use taskflow_service::tasks;

const OWNER: DbId = 10;

fn new_project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        ..Default::default()
    }
}

async fn seed_project(state: &ServiceState) -> DbId {
    projects::create_project(state, &user(OWNER), new_project("P1"))
        .await
        .unwrap()
        .id
}

// ---------------------------------------------------------------------------
// Test: full lifecycle PLANNING -> ACTIVE -> ON_HOLD -> ACTIVE -> COMPLETED
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_project_lifecycle() {
    let (state, clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let id = seed_project(&state).await;

    let active = projects::start_project(&state, &owner, id).await.unwrap();
    assert_eq!(active.status, ProjectStatus::Active);
    assert_eq!(active.start_date, Some(t0()));

    let paused = projects::pause_project(&state, &owner, id).await.unwrap();
    assert_eq!(paused.status, ProjectStatus::OnHold);

    let resumed = projects::resume_project(&state, &owner, id).await.unwrap();
    assert_eq!(resumed.status, ProjectStatus::Active);

    clock.advance(Duration::days(30));
    let completed = projects::complete_project(&state, &owner, id).await.unwrap();
    assert_eq!(completed.status, ProjectStatus::Completed);
    assert_eq!(completed.end_date, Some(t0() + Duration::days(30)));

    let err = projects::cancel_project(&state, &owner, id).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::IllegalTransition { .. }));

    // Details and team are frozen too, even for admins.
    assert_matches!(
        projects::update_project(&state, &admin(), id, ProjectPatch::default()).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );
    assert_matches!(
        projects::add_member(&state, &admin(), id, STRANGER, TeamRole::Member).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
}

#[tokio::test]
async fn test_illegal_project_transition() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let id = seed_project(&state).await;

    let err = projects::complete_project(&state, &owner, id).await.unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::IllegalTransition { .. }));

    let cancelled = projects::cancel_project(&state, &owner, id).await.unwrap();
    assert_eq!(cancelled.status, ProjectStatus::Cancelled);
    assert!(!cancelled.is_active);

    assert_matches!(
        projects::restore_project(&state, &owner, id).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );
}

// ---------------------------------------------------------------------------
// Test: access and edit rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_private_project_is_hidden_from_strangers() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let id = seed_project(&state).await;
    let public = projects::create_project(
        &state,
        &user(OWNER),
        NewProject {
            is_public: true,
            ..new_project("Open")
        },
    )
    .await
    .unwrap();

    let stranger = user(STRANGER);
    assert_matches!(
        projects::get_project(&state, &stranger, id).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
    let visible = projects::list_projects(&state, &stranger).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, public.id);

    // Public access does not imply edit rights.
    assert_matches!(
        projects::start_project(&state, &stranger, public.id).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
}

#[tokio::test]
async fn test_stranger_gets_forbidden_whatever_the_private_project_state() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let stranger = user(STRANGER);
    let id = seed_project(&state).await;

    // PLANNING: completing is illegal for the owner, but a stranger only
    // learns that the project is off limits.
    assert_matches!(
        projects::complete_project(&state, &stranger, id).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
    assert_matches!(
        projects::update_project(&state, &stranger, id, ProjectPatch::default()).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );

    projects::start_project(&state, &owner, id).await.unwrap();
    assert_matches!(
        projects::start_project(&state, &stranger, id).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );

    projects::complete_project(&state, &owner, id).await.unwrap();
    assert_matches!(
        projects::cancel_project(&state, &stranger, id).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
    assert_matches!(
        projects::update_project(&state, &stranger, id, ProjectPatch::default()).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );

    // The owner still sees the workflow error.
    assert_matches!(
        projects::cancel_project(&state, &owner, id).await,
        Err(ServiceError::Core(CoreError::IllegalTransition { .. }))
    );
}

#[tokio::test]
async fn test_team_lead_can_edit_but_developer_cannot() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let id = seed_project(&state).await;

    projects::add_member(&state, &owner, id, CREATOR, TeamRole::TeamLead)
        .await
        .unwrap();
    projects::add_member(&state, &owner, id, ASSIGNEE, TeamRole::Developer)
        .await
        .unwrap();

    let renamed = projects::update_project(
        &state,
        &user(CREATOR),
        id,
        ProjectPatch {
            name: Some("Apollo".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.name, "Apollo");

    assert_matches!(
        projects::start_project(&state, &user(ASSIGNEE), id).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );

    // Developers can still see the project.
    projects::get_project(&state, &user(ASSIGNEE), id).await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: team management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_member_management() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let id = seed_project(&state).await;

    projects::add_member(&state, &owner, id, ASSIGNEE, TeamRole::Developer)
        .await
        .unwrap();
    assert_matches!(
        projects::add_member(&state, &owner, id, ASSIGNEE, TeamRole::Tester).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );

    let changed = projects::change_member_role(&state, &owner, id, ASSIGNEE, TeamRole::Tester)
        .await
        .unwrap();
    assert_eq!(changed.member_role(ASSIGNEE), Some(TeamRole::Tester));

    let removed = projects::remove_member(&state, &owner, id, ASSIGNEE).await.unwrap();
    assert!(!removed.is_member(ASSIGNEE));

    assert_matches!(
        projects::remove_member(&state, &owner, id, OWNER).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );
    assert_matches!(
        projects::remove_member(&state, &owner, id, STRANGER).await,
        Err(ServiceError::Core(CoreError::NotFound { entity: "ProjectMember", .. }))
    );
    assert_matches!(
        projects::add_member(&state, &user(ASSIGNEE), id, STRANGER, TeamRole::Member).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
}

#[tokio::test]
async fn test_transfer_ownership_keeps_previous_owner_as_manager() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let id = seed_project(&state).await;

    assert_matches!(
        projects::transfer_ownership(&state, &user(STRANGER), id, STRANGER).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );

    let transferred = projects::transfer_ownership(&state, &user(OWNER), id, ASSIGNEE)
        .await
        .unwrap();
    assert_eq!(transferred.owner_id, ASSIGNEE);
    assert_eq!(
        transferred.member_role(OWNER),
        Some(TeamRole::ProjectManager)
    );
}

// ---------------------------------------------------------------------------
// Test: tasks inside projects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_project_tasks_and_delete_guard() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let id = seed_project(&state).await;

    let task = tasks::create_task(
        &state,
        &owner,
        NewTask {
            project_id: Some(id),
            ..new_task("kickoff")
        },
    )
    .await
    .unwrap();

    // Assignees must belong to the project.
    assert_matches!(
        tasks::assign_task(&state, &owner, task.id, Some(STRANGER)).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );

    let loaded = projects::get_project(&state, &owner, id).await.unwrap();
    assert_eq!(loaded.tasks.len(), 1);

    assert_matches!(
        projects::delete_project(&state, &owner, id).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );

    tasks::delete_task(&state, &owner, task.id).await.unwrap();
    projects::delete_project(&state, &owner, id).await.unwrap();
    assert_matches!(
        projects::get_project(&state, &owner, id).await,
        Err(ServiceError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test]
async fn test_moving_assigned_task_requires_assignee_on_team() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let id = seed_project(&state).await;

    let task = tasks::create_task(
        &state,
        &owner,
        NewTask {
            assignee_id: Some(ASSIGNEE),
            ..new_task("loose end")
        },
    )
    .await
    .unwrap();

    assert_matches!(
        tasks::move_task_to_project(&state, &owner, task.id, Some(id)).await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );

    projects::add_member(&state, &owner, id, ASSIGNEE, TeamRole::Member)
        .await
        .unwrap();
    let moved = tasks::move_task_to_project(&state, &owner, task.id, Some(id))
        .await
        .unwrap();
    assert_eq!(moved.project_id, Some(id));
    assert_eq!(moved.assignee_id, Some(ASSIGNEE));
}

#[tokio::test]
async fn test_completed_project_refuses_new_tasks() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let owner = user(OWNER);
    let id = seed_project(&state).await;
    projects::start_project(&state, &owner, id).await.unwrap();
    projects::complete_project(&state, &owner, id).await.unwrap();

    assert_matches!(
        tasks::create_task(
            &state,
            &owner,
            NewTask {
                project_id: Some(id),
                ..new_task("late")
            }
        )
        .await,
        Err(ServiceError::Core(CoreError::ConstraintViolation(_)))
    );
}

#[tokio::test]
async fn test_archive_and_restore() {
    let (state, _clock) = test_state(ServiceConfig::default());
    let id = seed_project(&state).await;

    assert_matches!(
        projects::archive_project(&state, &user(STRANGER), id).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
    let archived = projects::archive_project(&state, &user(OWNER), id).await.unwrap();
    assert!(!archived.is_active);
    assert_eq!(archived.status, ProjectStatus::Planning);

    let restored = projects::restore_project(&state, &admin(), id).await.unwrap();
    assert!(restored.is_active);
}
