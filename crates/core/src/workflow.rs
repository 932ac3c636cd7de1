//! Status vocabularies and the state machines governing them.
//!
//! Transitions are expressed as named actions rather than raw target states.
//! Each action has a fixed target and a set of source states it is legal
//! from; [`task_workflow::validate`] and [`project_workflow::validate`]
//! return the target or an [`CoreError::IllegalTransition`]. Relationship
//! guards (who may act) and structural guards (subtasks, block reason) are
//! enforced by the entity transitions that call into this module.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        Self::Todo,
        Self::InProgress,
        Self::Review,
        Self::Done,
        Self::Blocked,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Review => "REVIEW",
            Self::Done => "DONE",
            Self::Blocked => "BLOCKED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// DONE and CANCELLED absorb: no action leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Project status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "PLANNING",
            Self::Active => "ACTIVE",
            Self::OnHold => "ON_HOLD",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

pub mod task_workflow {
    use super::*;

    /// Named task transitions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TaskAction {
        Start,
        MoveToReview,
        Complete,
        Block,
        Unblock,
        Cancel,
    }

    impl TaskAction {
        pub const ALL: [TaskAction; 6] = [
            Self::Start,
            Self::MoveToReview,
            Self::Complete,
            Self::Block,
            Self::Unblock,
            Self::Cancel,
        ];

        /// Status the task ends up in after this action.
        ///
        /// Unblock always lands in TODO, never in the status held before
        /// blocking.
        pub fn target(self) -> TaskStatus {
            match self {
                Self::Start => TaskStatus::InProgress,
                Self::MoveToReview => TaskStatus::Review,
                Self::Complete => TaskStatus::Done,
                Self::Block => TaskStatus::Blocked,
                Self::Unblock => TaskStatus::Todo,
                Self::Cancel => TaskStatus::Cancelled,
            }
        }

        /// Whether this action may be applied to a task in `from`.
        pub fn allowed_from(self, from: TaskStatus) -> bool {
            match self {
                Self::Start | Self::Complete | Self::Block | Self::Cancel => !from.is_terminal(),
                Self::MoveToReview => from == TaskStatus::InProgress,
                Self::Unblock => from == TaskStatus::Blocked,
            }
        }
    }

    /// Actions available from the given status, in declaration order.
    pub fn valid_actions(from: TaskStatus) -> Vec<TaskAction> {
        TaskAction::ALL
            .into_iter()
            .filter(|a| a.allowed_from(from))
            .collect()
    }

    /// Validate `action` against the current status, returning the target.
    pub fn validate(action: TaskAction, from: TaskStatus) -> Result<TaskStatus, CoreError> {
        if action.allowed_from(from) {
            Ok(action.target())
        } else {
            Err(CoreError::illegal_transition("Task", from, action.target()))
        }
    }
}

// ---------------------------------------------------------------------------
// Project state machine
// ---------------------------------------------------------------------------

pub mod project_workflow {
    use super::*;

    /// Named project transitions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ProjectAction {
        Start,
        Complete,
        Pause,
        Resume,
        Cancel,
    }

    impl ProjectAction {
        pub fn target(self) -> ProjectStatus {
            match self {
                Self::Start => ProjectStatus::Active,
                Self::Complete => ProjectStatus::Completed,
                Self::Pause => ProjectStatus::OnHold,
                Self::Resume => ProjectStatus::Active,
                Self::Cancel => ProjectStatus::Cancelled,
            }
        }

        pub fn allowed_from(self, from: ProjectStatus) -> bool {
            match self {
                Self::Start => from == ProjectStatus::Planning,
                Self::Complete | Self::Pause => from == ProjectStatus::Active,
                Self::Resume => from == ProjectStatus::OnHold,
                Self::Cancel => !from.is_terminal(),
            }
        }
    }

    pub fn validate(action: ProjectAction, from: ProjectStatus) -> Result<ProjectStatus, CoreError> {
        if action.allowed_from(from) {
            Ok(action.target())
        } else {
            Err(CoreError::illegal_transition("Project", from, action.target()))
        }
    }
}
