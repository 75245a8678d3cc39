use async_trait::async_trait;
use sea_orm::DbErr;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{update_events, RequirementRepository, WriteBatch, WriteOp};
use crate::errors::ServiceError;
use crate::events::RequirementEvent;
use crate::models::{Requirement, RequirementApproval, RequirementFilter, RequirementItem};

#[derive(Debug, Default, Clone)]
struct Tables {
    requirements: HashMap<Uuid, Requirement>,
    items: HashMap<Uuid, RequirementItem>,
    approvals: HashMap<Uuid, RequirementApproval>,
}

impl Tables {
    fn apply(&mut self, op: WriteOp, events: &mut Vec<RequirementEvent>) -> Result<(), ServiceError> {
        match op {
            WriteOp::InsertRequirement(requirement) => {
                if self.requirements.contains_key(&requirement.id) {
                    return Err(duplicate("requirement", requirement.id));
                }
                events.push(RequirementEvent::RequirementCreated {
                    requirement_id: requirement.id,
                });
                self.requirements.insert(requirement.id, requirement);
            }
            WriteOp::UpdateRequirement(mut requirement) => {
                let stored = self
                    .requirements
                    .get(&requirement.id)
                    .ok_or_else(|| ServiceError::requirement_not_found(requirement.id))?;
                if stored.version != requirement.version {
                    return Err(ServiceError::ConcurrentModification(requirement.id));
                }
                events.extend(update_events(stored.status, &requirement));
                requirement.version += 1;
                self.requirements.insert(requirement.id, requirement);
            }
            WriteOp::DeleteRequirement(id) => {
                if self.requirements.remove(&id).is_none() {
                    return Err(ServiceError::requirement_not_found(id));
                }
                self.items.retain(|_, item| item.requirement_id != id);
                self.approvals.retain(|_, approval| approval.requirement_id != id);
                events.push(RequirementEvent::RequirementDeleted { requirement_id: id });
            }
            WriteOp::InsertItem(item) => {
                if !self.requirements.contains_key(&item.requirement_id) {
                    return Err(ServiceError::requirement_not_found(item.requirement_id));
                }
                if self.items.contains_key(&item.id) {
                    return Err(duplicate("item", item.id));
                }
                events.push(RequirementEvent::ItemAdded {
                    requirement_id: item.requirement_id,
                    item_id: item.id,
                });
                self.items.insert(item.id, item);
            }
            WriteOp::UpdateItem(item) => {
                match self.items.get(&item.id) {
                    Some(stored) if stored.requirement_id == item.requirement_id => {}
                    _ => return Err(ServiceError::item_not_found(item.id)),
                }
                events.push(RequirementEvent::ItemUpdated {
                    requirement_id: item.requirement_id,
                    item_id: item.id,
                });
                self.items.insert(item.id, item);
            }
            WriteOp::DeleteItem {
                requirement_id,
                item_id,
            } => {
                match self.items.get(&item_id) {
                    Some(stored) if stored.requirement_id == requirement_id => {}
                    _ => return Err(ServiceError::item_not_found(item_id)),
                }
                self.items.remove(&item_id);
                events.push(RequirementEvent::ItemRemoved {
                    requirement_id,
                    item_id,
                });
            }
            WriteOp::InsertApproval(approval) => {
                if !self.requirements.contains_key(&approval.requirement_id) {
                    return Err(ServiceError::requirement_not_found(approval.requirement_id));
                }
                if self.approvals.contains_key(&approval.id) {
                    return Err(duplicate("approval", approval.id));
                }
                events.push(RequirementEvent::ApprovalRecorded {
                    requirement_id: approval.requirement_id,
                    approval_id: approval.id,
                    status: approval.status,
                });
                self.approvals.insert(approval.id, approval);
            }
        }
        Ok(())
    }
}

fn duplicate(kind: &str, id: Uuid) -> ServiceError {
    ServiceError::db_error(DbErr::Custom(format!("duplicate {} id {}", kind, id)))
}

/// Process-local store. A batch is applied to a scratch copy which replaces
/// the live tables only when every operation succeeded.
#[derive(Debug, Default)]
pub struct InMemoryRequirementRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRequirementRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequirementRepository for InMemoryRequirementRepository {
    async fn find_requirement(&self, id: Uuid) -> Result<Option<Requirement>, ServiceError> {
        Ok(self.tables.read().await.requirements.get(&id).cloned())
    }

    async fn list_requirements(
        &self,
        filter: &RequirementFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Requirement>, u64), ServiceError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Requirement> = tables
            .requirements
            .values()
            .filter(|requirement| filter.matches(requirement))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn items_for(&self, requirement_id: Uuid) -> Result<Vec<RequirementItem>, ServiceError> {
        let tables = self.tables.read().await;
        let mut items: Vec<RequirementItem> = tables
            .items
            .values()
            .filter(|item| item.requirement_id == requirement_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.line_number);
        Ok(items)
    }

    async fn find_item(
        &self,
        requirement_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<RequirementItem>, ServiceError> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .get(&item_id)
            .filter(|item| item.requirement_id == requirement_id)
            .cloned())
    }

    async fn approvals_for(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<RequirementApproval>, ServiceError> {
        let tables = self.tables.read().await;
        let mut approvals: Vec<RequirementApproval> = tables
            .approvals
            .values()
            .filter(|approval| approval.requirement_id == requirement_id)
            .cloned()
            .collect();
        approvals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(approvals)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<RequirementEvent>, ServiceError> {
        let mut tables = self.tables.write().await;
        let mut scratch = tables.clone();
        let mut events = Vec::with_capacity(batch.len());

        for op in batch.into_ops() {
            scratch.apply(op, &mut events)?;
        }

        *tables = scratch;
        Ok(events)
    }
}
