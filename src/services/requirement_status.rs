//! Requirement lifecycle rules.
//!
//! ```text
//! draft ──submit──▶ pending_approval ──all approved──▶ approved ──complete──▶ completed
//!                         │
//!                         └──any rejected──▶ rejected ──submit──▶ pending_approval
//! ```
//!
//! Edits are allowed in `draft` and `rejected`. Every state except `completed`
//! and `cancelled` may be cancelled.

use chrono::{DateTime, Utc};

use crate::errors::ServiceError;
use crate::models::{ApprovalStatus, Requirement, RequirementApproval, RequirementStatus};

/// Result of folding the approval records of one review round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
    /// No decision yet; covers the empty set and pending-only sets.
    Undecided,
}

/// Validates if a status transition is allowed
pub fn is_valid_transition(from: RequirementStatus, to: RequirementStatus) -> bool {
    use RequirementStatus::*;

    match (from, to) {
        (Draft, PendingApproval) | (Rejected, PendingApproval) => true,
        (PendingApproval, Approved) | (PendingApproval, Rejected) => true,
        (Approved, Completed) => true,
        (Completed, Cancelled) | (Cancelled, Cancelled) => false,
        (_, Cancelled) => true,
        _ => false,
    }
}

/// Only drafts and rejected requirements accept edits.
pub fn is_editable(status: RequirementStatus) -> bool {
    matches!(status, RequirementStatus::Draft | RequirementStatus::Rejected)
}

pub fn ensure_editable(requirement: &Requirement) -> Result<(), ServiceError> {
    if is_editable(requirement.status) {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "Requirement cannot be modified while {}",
            requirement.status
        )))
    }
}

pub fn ensure_deletable(requirement: &Requirement) -> Result<(), ServiceError> {
    if requirement.status == RequirementStatus::Draft {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(
            "Only draft requirements can be deleted".to_string(),
        ))
    }
}

pub fn ensure_submittable(requirement: &Requirement, item_count: usize) -> Result<(), ServiceError> {
    if !is_valid_transition(requirement.status, RequirementStatus::PendingApproval) {
        return Err(ServiceError::InvalidState(format!(
            "Cannot submit a requirement that is {}",
            requirement.status
        )));
    }
    if item_count == 0 {
        return Err(ServiceError::InvalidState(
            "Requirement must have at least one item before submission".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_accepts_approvals(requirement: &Requirement) -> Result<(), ServiceError> {
    if requirement.status == RequirementStatus::PendingApproval {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "Approvals can only be recorded while pending approval (currently {})",
            requirement.status
        )))
    }
}

/// Folds the approvals that belong to `round`. An empty set stays undecided.
pub fn aggregate_approvals<'a, I>(approvals: I, round: i32) -> ApprovalOutcome
where
    I: IntoIterator<Item = &'a RequirementApproval>,
{
    let mut seen = false;
    let mut all_approved = true;

    for approval in approvals.into_iter().filter(|a| a.review_round == round) {
        seen = true;
        match approval.status {
            ApprovalStatus::Rejected => return ApprovalOutcome::Rejected,
            ApprovalStatus::Pending => all_approved = false,
            ApprovalStatus::Approved => {}
        }
    }

    if seen && all_approved {
        ApprovalOutcome::Approved
    } else {
        ApprovalOutcome::Undecided
    }
}

/// Applies the decision of the current round's approvals to a pending
/// requirement. Returns `None` when the status does not change.
pub fn settle_approvals(
    requirement: &Requirement,
    approvals: &[RequirementApproval],
    at: DateTime<Utc>,
) -> Result<Option<Requirement>, ServiceError> {
    if requirement.status != RequirementStatus::PendingApproval {
        return Ok(None);
    }
    let next = match aggregate_approvals(approvals, requirement.review_round) {
        ApprovalOutcome::Approved => RequirementStatus::Approved,
        ApprovalOutcome::Rejected => RequirementStatus::Rejected,
        ApprovalOutcome::Undecided => return Ok(None),
    };

    let mut settled = requirement.clone();
    transition(&mut settled, next, at)?;
    Ok(Some(settled))
}

/// Moves `requirement` to `to`, stamping the matching timestamp.
/// Earlier timestamps are left untouched.
pub fn transition(
    requirement: &mut Requirement,
    to: RequirementStatus,
    at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let from = requirement.status;
    if !is_valid_transition(from, to) {
        return Err(ServiceError::InvalidState(format!(
            "Cannot transition from {} to {}",
            from, to
        )));
    }

    match to {
        RequirementStatus::PendingApproval => {
            requirement.submitted_at = Some(at);
            requirement.review_round += 1;
        }
        RequirementStatus::Approved => requirement.approved_at = Some(at),
        RequirementStatus::Rejected => requirement.rejected_at = Some(at),
        RequirementStatus::Completed => requirement.completed_at = Some(at),
        RequirementStatus::Cancelled => requirement.cancelled_at = Some(at),
        RequirementStatus::Draft => {}
    }
    requirement.status = to;
    requirement.updated_at = at;
    Ok(())
}
