//! Task entity, its sub-records, and lifecycle transitions.
//!
//! A [`Task`] is an immutable value. Every transition takes `&self` and the
//! current instant and returns a fresh `Task` (or a [`CoreError`]); nothing
//! here touches storage. Status legality comes from
//! [`crate::workflow::task_workflow`]; relationship and structural guards are
//! checked here.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::authz::Actor;
use crate::dependency::{self, TaskDependency};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::workflow::task_workflow::{self, TaskAction};
use crate::workflow::TaskStatus;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Reserved `custom_fields` key holding the reason a task is blocked.
pub const BLOCKED_REASON_KEY: &str = "blocked_reason";

/// Maximum allowed length for a comment body.
pub const MAX_COMMENT_LENGTH: usize = 10_000;

pub type CustomFields = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Urgency shared by tasks and projects. Ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    Task,
    Bug,
    Feature,
    Epic,
    Story,
    Improvement,
}

// ---------------------------------------------------------------------------
// Sub-records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: DbId,
    pub task_id: DbId,
    pub author_id: DbId,
    pub content: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: DbId,
    pub task_id: DbId,
    pub user_id: DbId,
    pub minutes: i64,
    pub description: Option<String>,
    pub logged_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input for [`Task::create`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewTask {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub task_type: Option<TaskType>,
    #[validate(range(min = 0.0))]
    pub estimated_hours: Option<f64>,
    pub start_date: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    pub assignee_id: Option<DbId>,
    pub project_id: Option<DbId>,
    pub parent_task_id: Option<DbId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

/// Field-level patch for [`Task::update_details`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub task_type: Option<TaskType>,
    #[validate(range(min = 0.0))]
    pub estimated_hours: Option<f64>,
    pub start_date: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    pub tags: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub task_type: TaskType,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub start_date: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub creator_id: DbId,
    pub assignee_id: Option<DbId>,
    pub project_id: Option<DbId>,
    pub parent_task_id: Option<DbId>,
    pub is_archived: bool,
    pub tags: BTreeSet<String>,
    pub custom_fields: CustomFields,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    // Attached collections, populated when loaded with relations.
    #[serde(default)]
    pub comments: Vec<TaskComment>,
    #[serde(default)]
    pub time_logs: Vec<TimeLog>,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

impl Task {
    /// Create a new task in `TODO`, unarchived, stamped with `now`.
    pub fn create(
        id: DbId,
        creator_id: DbId,
        input: NewTask,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        input.validate()?;
        validate_title(&input.title)?;
        if input.parent_task_id == Some(id) {
            return Err(CoreError::ConstraintViolation(
                "A task cannot be its own parent".to_string(),
            ));
        }
        reject_reserved_fields(&input.custom_fields)?;

        Ok(Self {
            id,
            title: input.title,
            description: input.description,
            status: TaskStatus::Todo,
            priority: input.priority.unwrap_or_default(),
            task_type: input.task_type.unwrap_or_default(),
            estimated_hours: input.estimated_hours,
            actual_hours: None,
            start_date: input.start_date,
            due_date: input.due_date,
            completed_at: None,
            creator_id,
            assignee_id: input.assignee_id,
            project_id: input.project_id,
            parent_task_id: input.parent_task_id,
            is_archived: false,
            tags: normalize_tags(input.tags),
            custom_fields: input.custom_fields,
            created_at: now,
            updated_at: now,
            comments: Vec::new(),
            time_logs: Vec::new(),
            dependencies: Vec::new(),
            subtasks: Vec::new(),
        })
    }

    /// Attach related collections loaded by the persistence layer.
    pub fn with_relations(
        self,
        comments: Vec<TaskComment>,
        time_logs: Vec<TimeLog>,
        dependencies: Vec<TaskDependency>,
        subtasks: Vec<Task>,
    ) -> Self {
        Self {
            comments,
            time_logs,
            dependencies,
            subtasks,
            ..self
        }
    }

    // -- queries ------------------------------------------------------------

    pub fn is_creator(&self, user_id: DbId) -> bool {
        self.creator_id == user_id
    }

    pub fn is_assignee(&self, user_id: DbId) -> bool {
        self.assignee_id == Some(user_id)
    }

    pub fn blocked_reason(&self) -> Option<&str> {
        self.custom_fields
            .get(BLOCKED_REASON_KEY)
            .and_then(|v| v.as_str())
    }

    pub fn total_logged_minutes(&self) -> i64 {
        self.time_logs.iter().map(|log| log.minutes).sum()
    }

    // -- status transitions -------------------------------------------------

    /// Move to `IN_PROGRESS`. Sets `start_date` on first start.
    pub fn start(&self, actor: &Actor, now: Timestamp) -> Result<Self, CoreError> {
        let status = task_workflow::validate(TaskAction::Start, self.status)?;
        self.ensure_participant(actor, "start")?;

        Ok(Self {
            status,
            start_date: self.start_date.or(Some(now)),
            custom_fields: self.fields_without_block_reason(),
            updated_at: now,
            ..self.clone()
        })
    }

    /// Move from `IN_PROGRESS` to `REVIEW`. Only the assignee may do this
    /// when one is set.
    pub fn move_to_review(&self, actor: &Actor, now: Timestamp) -> Result<Self, CoreError> {
        let status = task_workflow::validate(TaskAction::MoveToReview, self.status)?;
        if let Some(assignee) = self.assignee_id {
            if assignee != actor.id && !actor.role.is_admin() {
                return Err(CoreError::Forbidden(format!(
                    "Only the assignee can move task {} to review",
                    self.id
                )));
            }
        }

        Ok(Self {
            status,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Move to `DONE`. Every loaded subtask must already be done.
    pub fn complete(&self, actor: &Actor, now: Timestamp) -> Result<Self, CoreError> {
        let status = task_workflow::validate(TaskAction::Complete, self.status)?;
        self.ensure_participant(actor, "complete")?;

        let unfinished = self
            .subtasks
            .iter()
            .filter(|s| s.status != TaskStatus::Done)
            .count();
        if unfinished > 0 {
            return Err(CoreError::ConstraintViolation(format!(
                "Task {} has {unfinished} unfinished subtask(s)",
                self.id
            )));
        }

        Ok(Self {
            status,
            completed_at: Some(now),
            custom_fields: self.fields_without_block_reason(),
            updated_at: now,
            ..self.clone()
        })
    }

    /// Move to `BLOCKED`, recording a mandatory reason.
    pub fn block(&self, reason: &str, now: Timestamp) -> Result<Self, CoreError> {
        let status = task_workflow::validate(TaskAction::Block, self.status)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::ConstraintViolation(
                "A reason is required to block a task".to_string(),
            ));
        }

        let mut custom_fields = self.custom_fields.clone();
        custom_fields.insert(
            BLOCKED_REASON_KEY.to_string(),
            serde_json::Value::String(reason.to_string()),
        );

        Ok(Self {
            status,
            custom_fields,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Leave `BLOCKED`. Always returns to `TODO`.
    pub fn unblock(&self, now: Timestamp) -> Result<Self, CoreError> {
        let status = task_workflow::validate(TaskAction::Unblock, self.status)?;
        Ok(Self {
            status,
            custom_fields: self.fields_without_block_reason(),
            updated_at: now,
            ..self.clone()
        })
    }

    /// Move to `CANCELLED` from any non-terminal state.
    pub fn cancel(&self, now: Timestamp) -> Result<Self, CoreError> {
        let status = task_workflow::validate(TaskAction::Cancel, self.status)?;
        Ok(Self {
            status,
            custom_fields: self.fields_without_block_reason(),
            updated_at: now,
            ..self.clone()
        })
    }

    // -- field transitions --------------------------------------------------

    pub fn update_details(&self, patch: TaskPatch, now: Timestamp) -> Result<Self, CoreError> {
        patch.validate()?;
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        Ok(Self {
            title: patch.title.unwrap_or_else(|| self.title.clone()),
            description: patch.description.or_else(|| self.description.clone()),
            priority: patch.priority.unwrap_or(self.priority),
            task_type: patch.task_type.unwrap_or(self.task_type),
            estimated_hours: patch.estimated_hours.or(self.estimated_hours),
            start_date: patch.start_date.or(self.start_date),
            due_date: patch.due_date.or(self.due_date),
            tags: patch
                .tags
                .map(normalize_tags)
                .unwrap_or_else(|| self.tags.clone()),
            updated_at: now,
            ..self.clone()
        })
    }

    /// Shallow-merge client-supplied custom fields. The block reason key is
    /// owned by the workflow and may not be written here.
    pub fn merge_custom_fields(
        &self,
        updates: CustomFields,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        reject_reserved_fields(&updates)?;
        let mut custom_fields = self.custom_fields.clone();
        custom_fields.extend(updates);
        Ok(Self {
            custom_fields,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Set or clear the assignee.
    pub fn assign(&self, assignee_id: Option<DbId>, now: Timestamp) -> Self {
        Self {
            assignee_id,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn move_to_project(&self, project_id: Option<DbId>, now: Timestamp) -> Self {
        Self {
            project_id,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Re-parent the task. `parent_of` resolves the current parent of any
    /// task id and is used to reject cycles through the parent chain.
    pub fn set_parent<F>(
        &self,
        parent_task_id: Option<DbId>,
        parent_of: F,
        now: Timestamp,
    ) -> Result<Self, CoreError>
    where
        F: Fn(DbId) -> Option<DbId>,
    {
        if let Some(parent_id) = parent_task_id {
            dependency::validate_parent(self.id, parent_id, parent_of)?;
        }
        Ok(Self {
            parent_task_id,
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn archive(&self, now: Timestamp) -> Self {
        Self {
            is_archived: true,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn unarchive(&self, now: Timestamp) -> Self {
        Self {
            is_archived: false,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Hard delete is refused while subtasks exist; archive instead.
    pub fn ensure_deletable(&self) -> Result<(), CoreError> {
        if !self.subtasks.is_empty() {
            return Err(CoreError::ConstraintViolation(format!(
                "Task {} has {} subtask(s); archive it instead",
                self.id,
                self.subtasks.len()
            )));
        }
        Ok(())
    }

    // -- related records ----------------------------------------------------

    pub fn add_comment(
        &self,
        comment_id: DbId,
        author_id: DbId,
        content: &str,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::Validation(
                "Comment must not be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CoreError::Validation(format!(
                "Comment must not exceed {MAX_COMMENT_LENGTH} characters"
            )));
        }

        let mut comments = self.comments.clone();
        comments.push(TaskComment {
            id: comment_id,
            task_id: self.id,
            author_id,
            content: content.to_string(),
            created_at: now,
        });

        Ok(Self {
            comments,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Append a time log and recompute `actual_hours` from every log.
    pub fn log_time(
        &self,
        log_id: DbId,
        user_id: DbId,
        minutes: i64,
        description: Option<String>,
        logged_at: Timestamp,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        if minutes <= 0 {
            return Err(CoreError::Validation(format!(
                "Logged minutes must be positive, got {minutes}"
            )));
        }

        let mut time_logs = self.time_logs.clone();
        time_logs.push(TimeLog {
            id: log_id,
            task_id: self.id,
            user_id,
            minutes,
            description,
            logged_at,
        });
        let total: i64 = time_logs.iter().map(|log| log.minutes).sum();

        Ok(Self {
            time_logs,
            actual_hours: Some(minutes_to_hours(total)),
            updated_at: now,
            ..self.clone()
        })
    }

    // -- helpers ------------------------------------------------------------

    fn ensure_participant(&self, actor: &Actor, action: &str) -> Result<(), CoreError> {
        if actor.role.is_admin() || self.is_creator(actor.id) || self.is_assignee(actor.id) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "Only the creator or assignee can {action} task {}",
                self.id
            )))
        }
    }

    fn fields_without_block_reason(&self) -> CustomFields {
        let mut fields = self.custom_fields.clone();
        fields.remove(BLOCKED_REASON_KEY);
        fields
    }
}

/// Convert minutes to hours rounded to two decimal places.
pub fn minutes_to_hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Task title must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn reject_reserved_fields(fields: &CustomFields) -> Result<(), CoreError> {
    if fields.contains_key(BLOCKED_REASON_KEY) {
        return Err(CoreError::Validation(format!(
            "Custom field '{BLOCKED_REASON_KEY}' is reserved"
        )));
    }
    Ok(())
}

fn normalize_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
