//! Project entity, its team, and lifecycle transitions.
//!
//! Like [`crate::task::Task`], a [`Project`] is an immutable value whose
//! transitions return a new value. The owner is always treated as a member
//! with full edit rights even when absent from `members`. Once a project is
//! `COMPLETED` or `CANCELLED` it can no longer be edited or have its team
//! changed.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::roles::TeamRole;
use crate::task::{Priority, Task};
use crate::types::{DbId, Timestamp};
use crate::workflow::project_workflow::{self, ProjectAction};
use crate::workflow::ProjectStatus;

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub user_id: DbId,
    pub team_role: TeamRole,
    pub is_active: bool,
    pub joined_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input for [`Project::create`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewProject {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<Timestamp>,
    #[validate(range(min = 0.0))]
    pub budget: Option<f64>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Field-level patch for [`Project::update_details`].
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProjectPatch {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<Timestamp>,
    #[validate(range(min = 0.0))]
    pub budget: Option<f64>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub is_public: Option<bool>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub priority: Priority,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub deadline: Option<Timestamp>,
    pub budget: Option<f64>,
    pub currency: Option<String>,
    pub is_active: bool,
    pub is_public: bool,
    pub owner_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub members: Vec<ProjectMember>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Project {
    /// Create a new project in `PLANNING`, active, owned by `owner_id`.
    pub fn create(
        id: DbId,
        owner_id: DbId,
        input: NewProject,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        input.validate()?;
        if input.name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Project name must not be blank".to_string(),
            ));
        }

        Ok(Self {
            id,
            name: input.name,
            description: input.description,
            status: ProjectStatus::Planning,
            priority: input.priority.unwrap_or_default(),
            start_date: None,
            end_date: None,
            deadline: input.deadline,
            budget: input.budget,
            currency: input.currency,
            is_active: true,
            is_public: input.is_public,
            owner_id,
            created_at: now,
            updated_at: now,
            members: Vec::new(),
            tasks: Vec::new(),
        })
    }

    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        Self { tasks, ..self }
    }

    // -- queries ------------------------------------------------------------

    /// `false` once the project reached a terminal status.
    pub fn can_be_modified(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Owner or active member.
    pub fn is_member(&self, user_id: DbId) -> bool {
        self.owner_id == user_id || self.active_member(user_id).is_some()
    }

    /// Team role of an active member. The owner has no entry unless listed.
    pub fn member_role(&self, user_id: DbId) -> Option<TeamRole> {
        self.active_member(user_id).map(|m| m.team_role)
    }

    pub fn active_members(&self) -> impl Iterator<Item = &ProjectMember> {
        self.members.iter().filter(|m| m.is_active)
    }

    fn active_member(&self, user_id: DbId) -> Option<&ProjectMember> {
        self.members
            .iter()
            .find(|m| m.user_id == user_id && m.is_active)
    }

    // -- status transitions -------------------------------------------------

    pub fn start(&self, now: Timestamp) -> Result<Self, CoreError> {
        let status = project_workflow::validate(ProjectAction::Start, self.status)?;
        Ok(Self {
            status,
            start_date: Some(now),
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn complete(&self, now: Timestamp) -> Result<Self, CoreError> {
        let status = project_workflow::validate(ProjectAction::Complete, self.status)?;
        Ok(Self {
            status,
            end_date: Some(now),
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn pause(&self, now: Timestamp) -> Result<Self, CoreError> {
        let status = project_workflow::validate(ProjectAction::Pause, self.status)?;
        Ok(Self {
            status,
            updated_at: now,
            ..self.clone()
        })
    }

    pub fn resume(&self, now: Timestamp) -> Result<Self, CoreError> {
        let status = project_workflow::validate(ProjectAction::Resume, self.status)?;
        Ok(Self {
            status,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Cancel and deactivate. Terminal; cannot be repeated.
    pub fn cancel(&self, now: Timestamp) -> Result<Self, CoreError> {
        let status = project_workflow::validate(ProjectAction::Cancel, self.status)?;
        Ok(Self {
            status,
            is_active: false,
            updated_at: now,
            ..self.clone()
        })
    }

    // -- field transitions --------------------------------------------------

    pub fn update_details(&self, patch: ProjectPatch, now: Timestamp) -> Result<Self, CoreError> {
        self.ensure_modifiable()?;
        patch.validate()?;
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CoreError::Validation(
                "Project name must not be blank".to_string(),
            ));
        }

        Ok(Self {
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            description: patch.description.or_else(|| self.description.clone()),
            priority: patch.priority.unwrap_or(self.priority),
            deadline: patch.deadline.or(self.deadline),
            budget: patch.budget.or(self.budget),
            currency: patch.currency.or_else(|| self.currency.clone()),
            is_public: patch.is_public.unwrap_or(self.is_public),
            updated_at: now,
            ..self.clone()
        })
    }

    /// Hand ownership to another user. The previous owner stays on the team
    /// as an active project manager. Status is untouched.
    pub fn transfer_ownership(&self, new_owner_id: DbId, now: Timestamp) -> Result<Self, CoreError> {
        self.ensure_modifiable()?;
        if new_owner_id == self.owner_id {
            return Err(CoreError::ConstraintViolation(format!(
                "User {new_owner_id} already owns project {}",
                self.id
            )));
        }

        let previous = self.owner_id;
        let mut members = self.members.clone();
        match members.iter_mut().find(|m| m.user_id == previous) {
            Some(m) => {
                m.is_active = true;
                m.team_role = TeamRole::ProjectManager;
            }
            None => members.push(ProjectMember {
                user_id: previous,
                team_role: TeamRole::ProjectManager,
                is_active: true,
                joined_at: now,
            }),
        }

        Ok(Self {
            owner_id: new_owner_id,
            members,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Deactivate without changing workflow status.
    pub fn archive(&self, now: Timestamp) -> Self {
        Self {
            is_active: false,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Reactivate an archived project. Cancelled projects stay inactive.
    pub fn restore(&self, now: Timestamp) -> Result<Self, CoreError> {
        if self.status == ProjectStatus::Cancelled {
            return Err(CoreError::ConstraintViolation(format!(
                "Project {} is cancelled and cannot be reactivated",
                self.id
            )));
        }
        Ok(Self {
            is_active: true,
            updated_at: now,
            ..self.clone()
        })
    }

    // -- team ---------------------------------------------------------------

    /// Add a member, or reactivate a former one with a new role.
    pub fn add_member(
        &self,
        user_id: DbId,
        team_role: TeamRole,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        self.ensure_modifiable()?;
        if user_id == self.owner_id {
            return Err(CoreError::ConstraintViolation(format!(
                "User {user_id} owns project {} and is already a member",
                self.id
            )));
        }
        if self.active_member(user_id).is_some() {
            return Err(CoreError::ConstraintViolation(format!(
                "User {user_id} is already a member of project {}",
                self.id
            )));
        }

        let mut members = self.members.clone();
        match members.iter_mut().find(|m| m.user_id == user_id) {
            Some(former) => {
                former.is_active = true;
                former.team_role = team_role;
                former.joined_at = now;
            }
            None => members.push(ProjectMember {
                user_id,
                team_role,
                is_active: true,
                joined_at: now,
            }),
        }

        Ok(Self {
            members,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Deactivate a member. The owner can never be removed.
    pub fn remove_member(&self, user_id: DbId, now: Timestamp) -> Result<Self, CoreError> {
        self.ensure_modifiable()?;
        self.ensure_not_owner(user_id, "removed")?;

        let members = self.with_member(user_id, |m| m.is_active = false)?;
        Ok(Self {
            members,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Change a member's team role. The owner's role is fixed.
    pub fn change_member_role(
        &self,
        user_id: DbId,
        team_role: TeamRole,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        self.ensure_modifiable()?;
        self.ensure_not_owner(user_id, "given a different role")?;

        let members = self.with_member(user_id, |m| m.team_role = team_role)?;
        Ok(Self {
            members,
            updated_at: now,
            ..self.clone()
        })
    }

    // -- helpers ------------------------------------------------------------

    fn ensure_modifiable(&self) -> Result<(), CoreError> {
        if self.can_be_modified() {
            Ok(())
        } else {
            Err(CoreError::ConstraintViolation(format!(
                "Project {} is {} and can no longer be modified",
                self.id, self.status
            )))
        }
    }

    fn ensure_not_owner(&self, user_id: DbId, action: &str) -> Result<(), CoreError> {
        if user_id == self.owner_id {
            return Err(CoreError::ConstraintViolation(format!(
                "The owner of project {} cannot be {action}",
                self.id
            )));
        }
        Ok(())
    }

    /// Clone the member list with `f` applied to the active entry for `user_id`.
    fn with_member<F>(&self, user_id: DbId, f: F) -> Result<Vec<ProjectMember>, CoreError>
    where
        F: FnOnce(&mut ProjectMember),
    {
        let mut members = self.members.clone();
        let member = members
            .iter_mut()
            .find(|m| m.user_id == user_id && m.is_active)
            .ok_or(CoreError::NotFound {
                entity: "ProjectMember",
                id: user_id,
            })?;
        f(member);
        Ok(members)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
