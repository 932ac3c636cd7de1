//! Relationship-derived authorization.
//!
//! Every check is a pure `bool` decision over an entity and an [`Actor`].
//! Access follows from the actor's role plus their structural relationship
//! to the record (creator, assignee, owner, member) rather than from a
//! permission table. Callers turn a `false` into
//! [`CoreError::Forbidden`] via [`ensure`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::project::Project;
use crate::roles::Role;
use crate::task::Task;
use crate::types::DbId;

/// The identity attempting an operation, supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: DbId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: DbId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Named permissions evaluated against an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Access,
    Edit,
    Assign,
    Delete,
    ManageMembers,
    TransferOwnership,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::View => "view",
            Self::Access => "access",
            Self::Edit => "edit",
            Self::Assign => "assign",
            Self::Delete => "delete",
            Self::ManageMembers => "manage members of",
            Self::TransferOwnership => "transfer ownership of",
        };
        f.write_str(s)
    }
}

/// Convert a denied decision into [`CoreError::Forbidden`].
pub fn ensure(
    allowed: bool,
    capability: Capability,
    entity: &'static str,
    id: DbId,
) -> Result<(), CoreError> {
    if allowed {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Not allowed to {capability} {entity} {id}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Task capabilities
// ---------------------------------------------------------------------------

/// Creator, assignee, or any task that belongs to a project.
///
/// The project clause is a proxy for project membership; callers needing
/// strict access should also apply [`can_access_project`].
pub fn can_view_task(task: &Task, actor: &Actor) -> bool {
    actor.is_admin()
        || task.is_creator(actor.id)
        || task.is_assignee(actor.id)
        || task.project_id.is_some()
}

pub fn can_edit_task(task: &Task, actor: &Actor) -> bool {
    actor.is_admin()
        || task.is_creator(actor.id)
        || task.is_assignee(actor.id)
        || (actor.role == Role::ProjectManager && task.project_id.is_some())
}

/// Like edit, but the assignee alone cannot reassign.
pub fn can_assign_task(task: &Task, actor: &Actor) -> bool {
    actor.is_admin()
        || task.is_creator(actor.id)
        || (actor.role == Role::ProjectManager && task.project_id.is_some())
}

pub fn can_delete_task(task: &Task, actor: &Actor) -> bool {
    actor.is_admin() || task.is_creator(actor.id)
}

// ---------------------------------------------------------------------------
// Project capabilities
// ---------------------------------------------------------------------------

pub fn can_access_project(project: &Project, actor: &Actor) -> bool {
    actor.is_admin() || project.is_public || project.is_member(actor.id)
}

/// Modifiable projects only; then owner, admin, or a managing team role.
pub fn can_edit_project(project: &Project, actor: &Actor) -> bool {
    if !project.can_be_modified() {
        return false;
    }
    actor.is_admin()
        || project.owner_id == actor.id
        || project
            .member_role(actor.id)
            .is_some_and(|role| role.can_manage_project())
}

pub fn can_manage_members(project: &Project, actor: &Actor) -> bool {
    can_edit_project(project, actor)
}

pub fn can_delete_project(project: &Project, actor: &Actor) -> bool {
    actor.is_admin() || project.owner_id == actor.id
}

pub fn can_transfer_project(project: &Project, actor: &Actor) -> bool {
    actor.is_admin() || project.owner_id == actor.id
}
