use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::RequirementEvent;
use crate::models::{Requirement, RequirementApproval, RequirementFilter, RequirementItem};

pub mod in_memory;
pub mod requirement_repository;

pub use in_memory::InMemoryRequirementRepository;
pub use requirement_repository::SqlRequirementRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    InsertRequirement(Requirement),
    /// Compare-and-swap: the stored version must equal `requirement.version`.
    /// The stored copy ends up at `version + 1`.
    UpdateRequirement(Requirement),
    /// Removes the requirement together with its items and approvals.
    DeleteRequirement(Uuid),
    InsertItem(RequirementItem),
    UpdateItem(RequirementItem),
    DeleteItem { requirement_id: Uuid, item_id: Uuid },
    InsertApproval(RequirementApproval),
}

/// Ordered list of writes applied all-or-nothing by [`RequirementRepository::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl From<WriteOp> for WriteBatch {
    fn from(op: WriteOp) -> Self {
        Self::new().with(op)
    }
}

/// Storage boundary for requirements, their items and approval records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequirementRepository: Send + Sync {
    async fn find_requirement(&self, id: Uuid) -> Result<Option<Requirement>, ServiceError>;

    /// Returns one page ordered by `created_at` descending plus the filtered total.
    async fn list_requirements(
        &self,
        filter: &RequirementFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Requirement>, u64), ServiceError>;

    /// Items ordered by line number.
    async fn items_for(&self, requirement_id: Uuid) -> Result<Vec<RequirementItem>, ServiceError>;

    async fn find_item(
        &self,
        requirement_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<RequirementItem>, ServiceError>;

    /// Approvals ordered by creation time.
    async fn approvals_for(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<RequirementApproval>, ServiceError>;

    /// Applies the batch atomically and returns the resulting events in batch order.
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<RequirementEvent>, ServiceError>;
}

/// Events for a requirement update, plus a status change when the status moved.
pub(crate) fn update_events(
    previous_status: crate::models::RequirementStatus,
    requirement: &Requirement,
) -> Vec<RequirementEvent> {
    let mut events = vec![RequirementEvent::RequirementUpdated {
        requirement_id: requirement.id,
    }];
    if previous_status != requirement.status {
        events.push(RequirementEvent::RequirementStatusChanged {
            requirement_id: requirement.id,
            from: previous_status,
            to: requirement.status,
            changed_at: requirement.updated_at,
        });
    }
    events
}
