//! Persistence collaborator traits.
//!
//! The service layer loads entity values through these traits, runs the
//! core decision functions, and hands the resulting values back. The core
//! never issues queries; storage strategy lives entirely behind these seams.

use async_trait::async_trait;
use taskflow_core::dependency::{DependencyType, TaskDependency};
use taskflow_core::project::Project;
use taskflow_core::task::{Task, TaskComment, TimeLog};
use taskflow_core::types::DbId;
use taskflow_core::workflow::TaskStatus;

use crate::error::RepositoryError;

/// Optional filters for [`TaskRepository::list_tasks`]. `None` matches all.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<DbId>,
    pub assignee_id: Option<DbId>,
    pub creator_id: Option<DbId>,
    pub parent_task_id: Option<DbId>,
    pub status: Option<TaskStatus>,
    pub include_archived: bool,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.project_id.map_or(true, |p| task.project_id == Some(p))
            && self.assignee_id.map_or(true, |a| task.assignee_id == Some(a))
            && self.creator_id.map_or(true, |c| task.creator_id == c)
            && self
                .parent_task_id
                .map_or(true, |p| task.parent_task_id == Some(p))
            && self.status.map_or(true, |s| task.status == s)
            && (self.include_archived || !task.is_archived)
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn next_task_id(&self) -> Result<DbId, RepositoryError>;

    /// Identity for comments and time logs.
    async fn next_record_id(&self) -> Result<DbId, RepositoryError>;

    /// Load the task's own fields, without attached collections.
    async fn find_task(&self, id: DbId) -> Result<Option<Task>, RepositoryError>;

    /// Load the task with comments, time logs, outgoing dependencies, and
    /// direct subtasks attached.
    async fn find_task_with_relations(&self, id: DbId) -> Result<Option<Task>, RepositoryError>;

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, RepositoryError>;

    /// Insert or replace the task's own fields. Attached collections are
    /// ignored; use the `append_*` methods for related records.
    async fn save_task(&self, task: &Task) -> Result<(), RepositoryError>;

    async fn append_comment(&self, comment: &TaskComment) -> Result<(), RepositoryError>;

    async fn append_time_log(&self, log: &TimeLog) -> Result<(), RepositoryError>;

    /// Permanently remove a task and its related records. Returns `true` if
    /// a row was removed.
    async fn delete_task(&self, id: DbId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn next_project_id(&self) -> Result<DbId, RepositoryError>;

    /// Load the project with its member list (tasks are not attached).
    async fn find_project(&self, id: DbId) -> Result<Option<Project>, RepositoryError>;

    async fn list_projects(&self) -> Result<Vec<Project>, RepositoryError>;

    /// Insert or replace the project and its member list.
    async fn save_project(&self, project: &Project) -> Result<(), RepositoryError>;

    async fn delete_project(&self, id: DbId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait DependencyRepository: Send + Sync {
    async fn next_dependency_id(&self) -> Result<DbId, RepositoryError>;

    /// Edges stored from `task_id` (what `task_id` depends on).
    async fn list_from(&self, task_id: DbId) -> Result<Vec<TaskDependency>, RepositoryError>;

    /// Every stored edge of one type, for whole-graph reachability checks.
    async fn list_by_type(
        &self,
        dependency_type: DependencyType,
    ) -> Result<Vec<TaskDependency>, RepositoryError>;

    async fn insert_dependency(&self, dependency: &TaskDependency)
        -> Result<(), RepositoryError>;

    /// Returns `true` if an edge was removed.
    async fn delete_dependency(
        &self,
        task_id: DbId,
        depends_on_task_id: DbId,
    ) -> Result<bool, RepositoryError>;
}
