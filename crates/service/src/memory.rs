//! In-memory implementation of every repository trait.
//!
//! Backs tests and embedded use. All maps sit behind a single
//! `tokio::sync::RwLock`; identities come from one shared sequence.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use taskflow_core::dependency::{DependencyType, TaskDependency};
use taskflow_core::project::Project;
use taskflow_core::task::{Task, TaskComment, TimeLog};
use taskflow_core::types::DbId;
use tokio::sync::RwLock;

use crate::error::RepositoryError;
use crate::repository::{DependencyRepository, ProjectRepository, TaskFilter, TaskRepository};

#[derive(Debug, Default)]
struct MemoryState {
    tasks: BTreeMap<DbId, Task>,
    comments: Vec<TaskComment>,
    time_logs: Vec<TimeLog>,
    projects: BTreeMap<DbId, Project>,
    dependencies: Vec<TaskDependency>,
}

#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    sequence: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            sequence: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> DbId {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

/// Drop attached collections so only the row's own fields are stored.
fn bare_task(task: &Task) -> Task {
    Task {
        comments: Vec::new(),
        time_logs: Vec::new(),
        dependencies: Vec::new(),
        subtasks: Vec::new(),
        ..task.clone()
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn next_task_id(&self) -> Result<DbId, RepositoryError> {
        Ok(self.next_id())
    }

    async fn next_record_id(&self) -> Result<DbId, RepositoryError> {
        Ok(self.next_id())
    }

    async fn find_task(&self, id: DbId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn find_task_with_relations(&self, id: DbId) -> Result<Option<Task>, RepositoryError> {
        let state = self.state.read().await;
        let Some(task) = state.tasks.get(&id).cloned() else {
            return Ok(None);
        };

        let comments = state
            .comments
            .iter()
            .filter(|c| c.task_id == id)
            .cloned()
            .collect();
        let time_logs = state
            .time_logs
            .iter()
            .filter(|l| l.task_id == id)
            .cloned()
            .collect();
        let dependencies = state
            .dependencies
            .iter()
            .filter(|d| d.task_id == id)
            .cloned()
            .collect();
        let subtasks = state
            .tasks
            .values()
            .filter(|t| t.parent_task_id == Some(id))
            .cloned()
            .collect();

        Ok(Some(task.with_relations(
            comments,
            time_logs,
            dependencies,
            subtasks,
        )))
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn save_task(&self, task: &Task) -> Result<(), RepositoryError> {
        self.state
            .write()
            .await
            .tasks
            .insert(task.id, bare_task(task));
        Ok(())
    }

    async fn append_comment(&self, comment: &TaskComment) -> Result<(), RepositoryError> {
        self.state.write().await.comments.push(comment.clone());
        Ok(())
    }

    async fn append_time_log(&self, log: &TimeLog) -> Result<(), RepositoryError> {
        self.state.write().await.time_logs.push(log.clone());
        Ok(())
    }

    async fn delete_task(&self, id: DbId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let removed = state.tasks.remove(&id).is_some();
        if removed {
            state.comments.retain(|c| c.task_id != id);
            state.time_logs.retain(|l| l.task_id != id);
            state
                .dependencies
                .retain(|d| d.task_id != id && d.depends_on_task_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn next_project_id(&self) -> Result<DbId, RepositoryError> {
        Ok(self.next_id())
    }

    async fn find_project(&self, id: DbId) -> Result<Option<Project>, RepositoryError> {
        Ok(self.state.read().await.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, RepositoryError> {
        Ok(self.state.read().await.projects.values().cloned().collect())
    }

    async fn save_project(&self, project: &Project) -> Result<(), RepositoryError> {
        let stored = Project {
            tasks: Vec::new(),
            ..project.clone()
        };
        self.state.write().await.projects.insert(project.id, stored);
        Ok(())
    }

    async fn delete_project(&self, id: DbId) -> Result<bool, RepositoryError> {
        Ok(self.state.write().await.projects.remove(&id).is_some())
    }
}

#[async_trait]
impl DependencyRepository for InMemoryStore {
    async fn next_dependency_id(&self) -> Result<DbId, RepositoryError> {
        Ok(self.next_id())
    }

    async fn list_from(&self, task_id: DbId) -> Result<Vec<TaskDependency>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .dependencies
            .iter()
            .filter(|d| d.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn list_by_type(
        &self,
        dependency_type: DependencyType,
    ) -> Result<Vec<TaskDependency>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .dependencies
            .iter()
            .filter(|d| d.dependency_type == dependency_type)
            .cloned()
            .collect())
    }

    async fn insert_dependency(
        &self,
        dependency: &TaskDependency,
    ) -> Result<(), RepositoryError> {
        self.state.write().await.dependencies.push(dependency.clone());
        Ok(())
    }

    async fn delete_dependency(
        &self,
        task_id: DbId,
        depends_on_task_id: DbId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let before = state.dependencies.len();
        state
            .dependencies
            .retain(|d| !(d.task_id == task_id && d.depends_on_task_id == depends_on_task_id));
        Ok(state.dependencies.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskflow_core::task::NewTask;

    fn new_task(id: DbId, parent: Option<DbId>) -> Task {
        Task::create(
            id,
            1,
            NewTask {
                title: format!("t{id}"),
                parent_task_id: parent,
                ..Default::default()
            },
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn relations_are_assembled_on_load() {
        let store = InMemoryStore::new();
        store.save_task(&new_task(1, None)).await.unwrap();
        store.save_task(&new_task(2, Some(1))).await.unwrap();
        store.save_task(&new_task(3, Some(1))).await.unwrap();

        let loaded = store.find_task_with_relations(1).await.unwrap().unwrap();
        assert_eq!(loaded.subtasks.len(), 2);

        let bare = store.find_task(1).await.unwrap().unwrap();
        assert!(bare.subtasks.is_empty());
    }

    #[tokio::test]
    async fn save_strips_attached_collections() {
        let store = InMemoryStore::new();
        let parent = new_task(1, None).with_relations(vec![], vec![], vec![], vec![new_task(2, None)]);
        store.save_task(&parent).await.unwrap();
        let loaded = store.find_task_with_relations(1).await.unwrap().unwrap();
        assert!(loaded.subtasks.is_empty());
    }

    #[tokio::test]
    async fn delete_cascades_edges() {
        let store = InMemoryStore::new();
        store.save_task(&new_task(1, None)).await.unwrap();
        store.save_task(&new_task(2, None)).await.unwrap();
        let edge = TaskDependency::new(
            10,
            2,
            1,
            DependencyType::Blocks,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        );
        store.insert_dependency(&edge).await.unwrap();

        assert!(store.delete_task(1).await.unwrap());
        assert!(store.list_from(2).await.unwrap().is_empty());
        assert!(!store.delete_task(1).await.unwrap());
    }

    #[tokio::test]
    async fn ids_are_unique_across_kinds() {
        let store = InMemoryStore::new();
        let a = store.next_task_id().await.unwrap();
        let b = store.next_project_id().await.unwrap();
        let c = store.next_dependency_id().await.unwrap();
        assert!(a != b && b != c && a != c);
    }
}
