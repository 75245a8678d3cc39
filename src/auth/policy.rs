//! Capability checks, parameterized by (actor, action, resource).

use super::{AuthUser, UserRole};
use crate::errors::ServiceError;
use crate::models::Requirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    ManageItems,
    Submit,
    Cancel,
    Complete,
    RecordApproval,
    Approve,
    Reject,
}

impl Action {
    /// Roles allowed to attempt the action at all, `None` meaning any role.
    fn required_roles(self) -> Option<&'static [UserRole]> {
        match self {
            Action::RecordApproval => Some(&[UserRole::Administrator, UserRole::Buyer]),
            Action::Approve | Action::Reject => Some(&[UserRole::Administrator]),
            _ => None,
        }
    }

    /// Whether only the creator or an administrator may act on the requirement.
    fn requires_ownership(self) -> bool {
        matches!(
            self,
            Action::Update
                | Action::Delete
                | Action::ManageItems
                | Action::Submit
                | Action::Cancel
                | Action::Complete
        )
    }
}

/// Checks `actor` may perform `action`.
///
/// Called once without a resource before the requirement is loaded (role
/// capability), then again with the loaded requirement (ownership).
pub fn authorize(
    actor: &AuthUser,
    action: Action,
    requirement: Option<&Requirement>,
) -> Result<(), ServiceError> {
    if let Some(roles) = action.required_roles() {
        if !roles.contains(&actor.role) {
            return Err(ServiceError::Forbidden(format!(
                "Role {} may not {}",
                actor.role, action
            )));
        }
    }

    if let Some(requirement) = requirement {
        if action.requires_ownership() && !actor.is_admin() && !requirement.is_owned_by(&actor.user_id) {
            return Err(ServiceError::Forbidden(format!(
                "Only the creator or an administrator may {} this requirement",
                action
            )));
        }
    }

    Ok(())
}
