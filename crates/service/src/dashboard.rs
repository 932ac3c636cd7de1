//! Read-only metric views assembled from repository data.

use serde::Serialize;
use taskflow_core::authz::{self, Actor, Capability};
use taskflow_core::metrics::{self, ProjectStatistics, SubtaskProgress, UserDashboard};
use taskflow_core::types::DbId;
use taskflow_core::workflow::TaskStatus;

use crate::access::{authorize, ensure_project_exists, ensure_task_loaded};
use crate::error::ServiceResult;
use crate::projects;
use crate::repository::TaskFilter;
use crate::state::ServiceState;

/// Per-task derived indicators, computed at the state's current time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMetrics {
    pub task_id: DbId,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub subtasks: SubtaskProgress,
    pub is_overdue: bool,
    pub is_due_today: bool,
    pub is_due_soon: bool,
    pub estimate_accuracy: Option<i64>,
    pub has_estimate_variance: bool,
    pub time_spent_minutes: i64,
}

pub async fn task_metrics(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<TaskMetrics> {
    let task = ensure_task_loaded(state, id).await?;
    authorize(
        authz::can_view_task(&task, actor),
        actor,
        Capability::View,
        "Task",
        id,
    )?;

    let now = state.clock.now();
    let config = &state.config;
    Ok(TaskMetrics {
        task_id: task.id,
        status: task.status,
        progress_percent: metrics::progress_percent(task.status),
        subtasks: metrics::subtask_progress(&task),
        is_overdue: metrics::is_overdue(&task, now),
        is_due_today: metrics::is_due_today(&task, now),
        is_due_soon: metrics::is_due_soon(&task, now, config.due_soon_days),
        estimate_accuracy: metrics::estimate_accuracy(&task),
        has_estimate_variance: metrics::has_estimate_variance(&task, config.estimate_variance_pct),
        time_spent_minutes: metrics::time_spent_minutes(&task),
    })
}

pub async fn project_statistics(
    state: &ServiceState,
    actor: &Actor,
    id: DbId,
) -> ServiceResult<ProjectStatistics> {
    let project = projects::get_project(state, actor, id).await?;
    let stats = metrics::project_statistics(&project, state.clock.now());
    tracing::debug!(
        project_id = id,
        total = stats.tasks.total,
        completion = stats.tasks.completion_percentage,
        "Computed project statistics"
    );
    Ok(stats)
}

/// Completion percentage of a project's non-archived tasks.
pub async fn project_progress(state: &ServiceState, actor: &Actor, id: DbId) -> ServiceResult<u8> {
    let project = ensure_project_exists(state, id).await?;
    authorize(
        authz::can_access_project(&project, actor),
        actor,
        Capability::Access,
        "Project",
        id,
    )?;
    let filter = TaskFilter {
        project_id: Some(id),
        ..Default::default()
    };
    let project = project.with_tasks(state.tasks.list_tasks(&filter).await?);
    Ok(metrics::project_progress(&project, state.clock.now()))
}

/// Dashboard over the tasks assigned to `user_id`. Users see their own;
/// admins may look at anyone's.
pub async fn user_dashboard(
    state: &ServiceState,
    actor: &Actor,
    user_id: DbId,
) -> ServiceResult<UserDashboard> {
    authorize(
        actor.id == user_id || actor.is_admin(),
        actor,
        Capability::View,
        "User",
        user_id,
    )?;

    let filter = TaskFilter {
        assignee_id: Some(user_id),
        ..Default::default()
    };
    let tasks = state.tasks.list_tasks(&filter).await?;
    let config = &state.config;
    let dashboard = metrics::user_dashboard(
        user_id,
        &tasks,
        state.clock.now(),
        config.due_soon_days,
        config.trend_days,
    );

    tracing::debug!(
        user_id,
        assigned = dashboard.assigned,
        overdue = dashboard.overdue,
        "Computed user dashboard"
    );
    Ok(dashboard)
}
