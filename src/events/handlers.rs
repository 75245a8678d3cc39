use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::RequirementEvent;
use crate::errors::ServiceError;
use crate::models::RequirementStatus;
use crate::repositories::{RequirementRepository, WriteBatch, WriteOp};
use crate::services::pricing;
use crate::services::requirement_status;

/// Reacts to a committed event. A returned batch is committed by the
/// dispatcher and its events are dispatched in turn.
#[async_trait]
pub trait RequirementEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        event: &RequirementEvent,
        repo: &dyn RequirementRepository,
    ) -> Result<Option<WriteBatch>, ServiceError>;
}

/// Keeps `total_price` and `currency` in step with the requirement's items.
#[derive(Debug, Clone)]
pub struct PriceAggregator {
    default_currency: String,
}

impl PriceAggregator {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            default_currency: default_currency.into(),
        }
    }
}

#[async_trait]
impl RequirementEventHandler for PriceAggregator {
    fn name(&self) -> &'static str {
        "price_aggregator"
    }

    async fn handle(
        &self,
        event: &RequirementEvent,
        repo: &dyn RequirementRepository,
    ) -> Result<Option<WriteBatch>, ServiceError> {
        if !event.is_item_change() {
            return Ok(None);
        }
        let requirement_id = event.requirement_id();
        let Some(mut requirement) = repo.find_requirement(requirement_id).await? else {
            return Ok(None);
        };

        let items = repo.items_for(requirement_id).await?;
        let summary = pricing::summarize(&items, &self.default_currency)?;
        if summary.mixed_currencies {
            warn!(
                requirement_id = %requirement_id,
                currency = %summary.currency,
                "Requirement items use more than one currency"
            );
        }

        if requirement.total_price == summary.total && requirement.currency == summary.currency {
            return Ok(None);
        }

        info!(
            requirement_id = %requirement_id,
            total = %summary.total,
            currency = %summary.currency,
            items = items.len(),
            "Recomputed requirement total"
        );
        requirement.total_price = summary.total;
        requirement.currency = summary.currency;
        Ok(Some(WriteOp::UpdateRequirement(requirement).into()))
    }
}

/// Moves a pending requirement to approved or rejected once the approvals of
/// the current review round decide it.
#[derive(Debug, Clone, Default)]
pub struct ApprovalStatusUpdater;

#[async_trait]
impl RequirementEventHandler for ApprovalStatusUpdater {
    fn name(&self) -> &'static str {
        "approval_status_updater"
    }

    async fn handle(
        &self,
        event: &RequirementEvent,
        repo: &dyn RequirementRepository,
    ) -> Result<Option<WriteBatch>, ServiceError> {
        let RequirementEvent::ApprovalRecorded { requirement_id, .. } = event else {
            return Ok(None);
        };
        let Some(requirement) = repo.find_requirement(*requirement_id).await? else {
            return Ok(None);
        };

        let approvals = repo.approvals_for(*requirement_id).await?;
        let Some(settled) = requirement_status::settle_approvals(&requirement, &approvals, Utc::now())?
        else {
            return Ok(None);
        };

        info!(
            requirement_id = %requirement_id,
            status = %settled.status,
            review_round = settled.review_round,
            "Approvals decided requirement"
        );
        Ok(Some(WriteOp::UpdateRequirement(settled).into()))
    }
}

/// Announces newly submitted requirements to administrators.
#[derive(Debug, Clone, Default)]
pub struct SubmissionNotifier;

#[async_trait]
impl RequirementEventHandler for SubmissionNotifier {
    fn name(&self) -> &'static str {
        "submission_notifier"
    }

    async fn handle(
        &self,
        event: &RequirementEvent,
        repo: &dyn RequirementRepository,
    ) -> Result<Option<WriteBatch>, ServiceError> {
        if let RequirementEvent::RequirementStatusChanged {
            requirement_id,
            to: RequirementStatus::PendingApproval,
            ..
        } = event
        {
            if let Some(requirement) = repo.find_requirement(*requirement_id).await? {
                info!(
                    requirement_id = %requirement_id,
                    title = %requirement.title,
                    created_by = %requirement.created_by,
                    review_round = requirement.review_round,
                    "Administrators notified of requirement awaiting approval"
                );
            }
        }
        Ok(None)
    }
}

/// The handlers every requirement service runs, in dispatch order.
pub fn default_handlers(default_currency: &str) -> Vec<Arc<dyn RequirementEventHandler>> {
    vec![
        Arc::new(PriceAggregator::new(default_currency)),
        Arc::new(ApprovalStatusUpdater),
        Arc::new(SubmissionNotifier),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ApprovalStatus, NewRequirement, NewRequirementItem, Requirement, RequirementApproval,
        RequirementItem, RequirementPriority,
    };
    use crate::repositories::InMemoryRequirementRepository;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn requirement(status: RequirementStatus) -> Requirement {
        let input = NewRequirement {
            title: "Safety boots".into(),
            description: None,
            priority: RequirementPriority::High,
            company_id: None,
            cost_center: None,
            payment_method: None,
            payment_term: None,
            warranty: None,
            warranty_duration: None,
            additional_conditions: None,
            attachments: None,
            items: vec![],
        };
        let mut requirement = Requirement::draft(&input, "buyer", None);
        requirement.status = status;
        requirement.review_round = 1;
        requirement
    }

    fn approval(requirement_id: Uuid, status: ApprovalStatus) -> RequirementApproval {
        RequirementApproval {
            id: Uuid::new_v4(),
            requirement_id,
            approver_id: "admin".into(),
            approver_name: "Admin".into(),
            status,
            comments: None,
            review_round: 1,
            created_at: Utc::now(),
        }
    }

    async fn seeded(requirement: &Requirement, extra: Vec<WriteOp>) -> InMemoryRequirementRepository {
        let repo = InMemoryRequirementRepository::new();
        let mut batch = WriteBatch::new().with(WriteOp::InsertRequirement(requirement.clone()));
        for op in extra {
            batch.push(op);
        }
        repo.commit(batch).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn aggregator_updates_total() {
        let req = requirement(RequirementStatus::Draft);
        let item = RequirementItem::new(
            req.id,
            1,
            &NewRequirementItem {
                name: "Boots".into(),
                description: None,
                quantity: dec!(4),
                unit_of_measure: "pair".into(),
                estimated_price: Some(dec!(30)),
                currency: Some("EUR".into()),
                category: None,
                subcategory: None,
                specifications: None,
                attachments: None,
            },
        );
        let event = RequirementEvent::ItemAdded {
            requirement_id: req.id,
            item_id: item.id,
        };
        let repo = seeded(&req, vec![WriteOp::InsertItem(item)]).await;

        let batch = PriceAggregator::new("USD")
            .handle(&event, &repo)
            .await
            .unwrap()
            .expect("total changed");
        assert_matches!(
            &batch.ops()[0],
            WriteOp::UpdateRequirement(updated) if updated.total_price == dec!(120) && updated.currency == "EUR"
        );
    }

    #[tokio::test]
    async fn aggregator_skips_unchanged_totals() {
        let req = requirement(RequirementStatus::Draft);
        let repo = seeded(&req, vec![]).await;
        let event = RequirementEvent::ItemRemoved {
            requirement_id: req.id,
            item_id: Uuid::new_v4(),
        };
        let result = PriceAggregator::new("USD").handle(&event, &repo).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn updater_ignores_empty_approval_set() {
        let req = requirement(RequirementStatus::PendingApproval);
        let repo = seeded(&req, vec![]).await;
        let event = RequirementEvent::ApprovalRecorded {
            requirement_id: req.id,
            approval_id: Uuid::new_v4(),
            status: ApprovalStatus::Approved,
        };
        assert!(ApprovalStatusUpdater.handle(&event, &repo).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn updater_rejects_on_any_rejection() {
        let req = requirement(RequirementStatus::PendingApproval);
        let approved = approval(req.id, ApprovalStatus::Approved);
        let rejected = approval(req.id, ApprovalStatus::Rejected);
        let event = RequirementEvent::ApprovalRecorded {
            requirement_id: req.id,
            approval_id: rejected.id,
            status: ApprovalStatus::Rejected,
        };
        let repo = seeded(
            &req,
            vec![WriteOp::InsertApproval(approved), WriteOp::InsertApproval(rejected)],
        )
        .await;

        let batch = ApprovalStatusUpdater
            .handle(&event, &repo)
            .await
            .unwrap()
            .expect("decision reached");
        assert_matches!(
            &batch.ops()[0],
            WriteOp::UpdateRequirement(updated)
                if updated.status == RequirementStatus::Rejected && updated.rejected_at.is_some()
        );
    }

    #[tokio::test]
    async fn notifier_never_writes() {
        let req = requirement(RequirementStatus::PendingApproval);
        let repo = seeded(&req, vec![]).await;
        let event = RequirementEvent::RequirementStatusChanged {
            requirement_id: req.id,
            from: RequirementStatus::Draft,
            to: RequirementStatus::PendingApproval,
            changed_at: Utc::now(),
        };
        assert!(SubmissionNotifier.handle(&event, &repo).await.unwrap().is_none());
    }
}
