use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{update_events, BaseRepository, Repository, RequirementRepository, WriteBatch, WriteOp};
use crate::entities::{requirement, requirement_approval, requirement_item};
use crate::errors::ServiceError;
use crate::events::RequirementEvent;
use crate::models::{Requirement, RequirementApproval, RequirementFilter, RequirementItem};

/// Requirement storage backed by sea-orm (SQLite or Postgres).
#[derive(Debug)]
pub struct SqlRequirementRepository {
    base: BaseRepository,
}

impl SqlRequirementRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn filtered(filter: &RequirementFilter) -> Select<requirement::Entity> {
        let mut query = requirement::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(requirement::Column::Status.eq(status));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(requirement::Column::Priority.eq(priority));
        }
        if let Some(created_by) = &filter.created_by {
            query = query.filter(requirement::Column::CreatedBy.eq(created_by.as_str()));
        }
        if let Some(company_id) = &filter.company_id {
            query = query.filter(requirement::Column::CompanyId.eq(company_id.as_str()));
        }
        if let Some(cost_center) = &filter.cost_center {
            query = query.filter(requirement::Column::CostCenter.eq(cost_center.as_str()));
        }
        query
    }

    async fn apply(
        txn: &DatabaseTransaction,
        op: WriteOp,
        events: &mut Vec<RequirementEvent>,
    ) -> Result<(), ServiceError> {
        match op {
            WriteOp::InsertRequirement(req) => {
                requirement::Entity::insert(requirement::ActiveModel::from(&req))
                    .exec_without_returning(txn)
                    .await?;
                events.push(RequirementEvent::RequirementCreated {
                    requirement_id: req.id,
                });
            }
            WriteOp::UpdateRequirement(req) => {
                let stored = requirement::Entity::find_by_id(req.id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::requirement_not_found(req.id))?;
                if stored.version != req.version {
                    return Err(ServiceError::ConcurrentModification(req.id));
                }

                let mut model = requirement::ActiveModel::from(&req);
                model.version = Set(req.version + 1);
                let result = requirement::Entity::update_many()
                    .set(model)
                    .filter(requirement::Column::Id.eq(req.id))
                    .filter(requirement::Column::Version.eq(req.version))
                    .exec(txn)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(ServiceError::ConcurrentModification(req.id));
                }
                events.extend(update_events(stored.status, &req));
            }
            WriteOp::DeleteRequirement(id) => {
                requirement_approval::Entity::delete_many()
                    .filter(requirement_approval::Column::RequirementId.eq(id))
                    .exec(txn)
                    .await?;
                requirement_item::Entity::delete_many()
                    .filter(requirement_item::Column::RequirementId.eq(id))
                    .exec(txn)
                    .await?;
                let result = requirement::Entity::delete_by_id(id).exec(txn).await?;
                if result.rows_affected == 0 {
                    return Err(ServiceError::requirement_not_found(id));
                }
                events.push(RequirementEvent::RequirementDeleted { requirement_id: id });
            }
            WriteOp::InsertItem(item) => {
                requirement_item::Entity::insert(requirement_item::ActiveModel::from(&item))
                    .exec_without_returning(txn)
                    .await?;
                events.push(RequirementEvent::ItemAdded {
                    requirement_id: item.requirement_id,
                    item_id: item.id,
                });
            }
            WriteOp::UpdateItem(item) => {
                let result = requirement_item::Entity::update_many()
                    .set(requirement_item::ActiveModel::from(&item))
                    .filter(requirement_item::Column::Id.eq(item.id))
                    .filter(requirement_item::Column::RequirementId.eq(item.requirement_id))
                    .exec(txn)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(ServiceError::item_not_found(item.id));
                }
                events.push(RequirementEvent::ItemUpdated {
                    requirement_id: item.requirement_id,
                    item_id: item.id,
                });
            }
            WriteOp::DeleteItem {
                requirement_id,
                item_id,
            } => {
                let result = requirement_item::Entity::delete_many()
                    .filter(requirement_item::Column::Id.eq(item_id))
                    .filter(requirement_item::Column::RequirementId.eq(requirement_id))
                    .exec(txn)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(ServiceError::item_not_found(item_id));
                }
                events.push(RequirementEvent::ItemRemoved {
                    requirement_id,
                    item_id,
                });
            }
            WriteOp::InsertApproval(approval) => {
                requirement_approval::Entity::insert(requirement_approval::ActiveModel::from(
                    &approval,
                ))
                .exec_without_returning(txn)
                .await?;
                events.push(RequirementEvent::ApprovalRecorded {
                    requirement_id: approval.requirement_id,
                    approval_id: approval.id,
                    status: approval.status,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RequirementRepository for SqlRequirementRepository {
    async fn find_requirement(&self, id: Uuid) -> Result<Option<Requirement>, ServiceError> {
        let model = requirement::Entity::find_by_id(id)
            .one(self.base.get_db())
            .await?;
        Ok(model.map(Requirement::from))
    }

    async fn list_requirements(
        &self,
        filter: &RequirementFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Requirement>, u64), ServiceError> {
        let db = self.base.get_db();
        let total = Self::filtered(filter).count(db).await?;
        let models = Self::filtered(filter)
            .order_by_desc(requirement::Column::CreatedAt)
            .order_by_desc(requirement::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(db)
            .await?;

        Ok((models.into_iter().map(Requirement::from).collect(), total))
    }

    async fn items_for(&self, requirement_id: Uuid) -> Result<Vec<RequirementItem>, ServiceError> {
        let models = requirement_item::Entity::find()
            .filter(requirement_item::Column::RequirementId.eq(requirement_id))
            .order_by_asc(requirement_item::Column::LineNumber)
            .all(self.base.get_db())
            .await?;
        Ok(models.into_iter().map(RequirementItem::from).collect())
    }

    async fn find_item(
        &self,
        requirement_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<RequirementItem>, ServiceError> {
        let model = requirement_item::Entity::find_by_id(item_id)
            .filter(requirement_item::Column::RequirementId.eq(requirement_id))
            .one(self.base.get_db())
            .await?;
        Ok(model.map(RequirementItem::from))
    }

    async fn approvals_for(
        &self,
        requirement_id: Uuid,
    ) -> Result<Vec<RequirementApproval>, ServiceError> {
        let models = requirement_approval::Entity::find()
            .filter(requirement_approval::Column::RequirementId.eq(requirement_id))
            .order_by_asc(requirement_approval::Column::CreatedAt)
            .order_by_asc(requirement_approval::Column::Id)
            .all(self.base.get_db())
            .await?;
        Ok(models.into_iter().map(RequirementApproval::from).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<RequirementEvent>, ServiceError> {
        let ops = batch.len();
        let txn = self.base.get_db().begin().await?;
        let mut events = Vec::with_capacity(ops);

        for op in batch.into_ops() {
            // Dropping `txn` on error rolls the batch back.
            Self::apply(&txn, op, &mut events).await?;
        }

        txn.commit().await?;
        debug!(ops, events = events.len(), "Committed write batch");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::models::{NewRequirement, NewRequirementItem, RequirementPriority, RequirementStatus};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn repository() -> SqlRequirementRepository {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        SqlRequirementRepository::new(Arc::new(pool))
    }

    fn draft() -> Requirement {
        let input = NewRequirement {
            title: "Forklift rental".into(),
            description: Some("Two weeks".into()),
            priority: RequirementPriority::Critical,
            company_id: None,
            cost_center: Some("OPS-7".into()),
            payment_method: None,
            payment_term: None,
            warranty: Some(true),
            warranty_duration: Some(12),
            additional_conditions: None,
            attachments: Some(vec!["quote.pdf".into()]),
            items: vec![],
        };
        Requirement::draft(&input, "buyer-9", None)
    }

    fn item(requirement_id: Uuid, line_number: i32) -> RequirementItem {
        RequirementItem::new(
            requirement_id,
            line_number,
            &NewRequirementItem {
                name: "Forklift".into(),
                description: None,
                quantity: dec!(2),
                unit_of_measure: "week".into(),
                estimated_price: Some(dec!(450.5)),
                currency: Some("EUR".into()),
                category: None,
                subcategory: None,
                specifications: Some(serde_json::json!({"capacity": "2t"})),
                attachments: None,
            },
        )
    }

    #[tokio::test]
    async fn round_trips_requirement_and_items() {
        let repo = repository().await;
        let requirement = draft();
        let line = item(requirement.id, 1);
        repo.commit(
            WriteBatch::new()
                .with(WriteOp::InsertRequirement(requirement.clone()))
                .with(WriteOp::InsertItem(line.clone())),
        )
        .await
        .unwrap();

        let stored = repo.find_requirement(requirement.id).await.unwrap().unwrap();
        assert_eq!(stored.attachments, vec!["quote.pdf".to_string()]);
        assert_eq!(stored.cost_center.as_deref(), Some("OPS-7"));
        assert_eq!(stored.status, RequirementStatus::Draft);

        let items = repo.items_for(requirement.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].currency, "EUR");
        assert_eq!(items[0].specifications, line.specifications);
    }

    #[tokio::test]
    async fn version_mismatch_rolls_back() {
        let repo = repository().await;
        let requirement = draft();
        repo.commit(WriteOp::InsertRequirement(requirement.clone()).into())
            .await
            .unwrap();

        let mut stale = requirement.clone();
        stale.version = 7;
        let result = repo
            .commit(
                WriteBatch::new()
                    .with(WriteOp::InsertItem(item(requirement.id, 1)))
                    .with(WriteOp::UpdateRequirement(stale)),
            )
            .await;

        assert_matches!(result, Err(ServiceError::ConcurrentModification(_)));
        assert!(repo.items_for(requirement.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_children() {
        let repo = repository().await;
        let requirement = draft();
        repo.commit(
            WriteBatch::new()
                .with(WriteOp::InsertRequirement(requirement.clone()))
                .with(WriteOp::InsertItem(item(requirement.id, 1)))
                .with(WriteOp::InsertItem(item(requirement.id, 2))),
        )
        .await
        .unwrap();

        let events = repo
            .commit(WriteOp::DeleteRequirement(requirement.id).into())
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![RequirementEvent::RequirementDeleted {
                requirement_id: requirement.id
            }]
        );
        assert!(repo.items_for(requirement.id).await.unwrap().is_empty());
        assert!(repo.find_requirement(requirement.id).await.unwrap().is_none());
    }
}
