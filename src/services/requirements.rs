use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{authorize, Action, AuthUser};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{default_handlers, EventSender, RequirementEvent, RequirementEventHandler};
use crate::models::{
    ApprovalDecision, ApprovalStatus, ItemChanges, NewRequirement, NewRequirementItem,
    Requirement, RequirementApproval, RequirementChanges, RequirementDetails, RequirementFilter,
    RequirementItem, RequirementStatus, DEFAULT_CURRENCY, UNKNOWN_USER_NAME,
};
use crate::repositories::{RequirementRepository, WriteBatch, WriteOp};
use crate::services::locks::RequirementLocks;
use crate::services::{pricing, requirement_status};

/// Upper bound on events handled for a single request, cascades included.
const MAX_DISPATCHED_EVENTS: usize = 256;

/// Tunables taken from configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub default_currency: String,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_currency: DEFAULT_CURRENCY.to_string(),
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl ServiceSettings {
    /// Clamps a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            default_currency: cfg.default_currency.clone(),
            default_page_size: cfg.default_page_size,
            max_page_size: cfg.max_page_size,
        }
    }
}

/// One page of a filtered listing.
#[derive(Debug, Clone)]
pub struct RequirementPage {
    pub requirements: Vec<Requirement>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl RequirementPage {
    pub fn has_more(&self) -> bool {
        self.offset + (self.requirements.len() as u64) < self.total
    }
}

/// Requirement workflow: CRUD, items, approvals and status transitions.
///
/// Every state-changing call runs under the requirement's lock, commits one
/// batch, then dispatches the resulting events to the in-process handlers
/// before the lock is released.
#[derive(Clone)]
pub struct RequirementService {
    repo: Arc<dyn RequirementRepository>,
    event_sender: Arc<EventSender>,
    handlers: Arc<Vec<Arc<dyn RequirementEventHandler>>>,
    locks: Arc<RequirementLocks>,
    settings: ServiceSettings,
}

impl RequirementService {
    pub fn new(
        repo: Arc<dyn RequirementRepository>,
        event_sender: Arc<EventSender>,
        settings: ServiceSettings,
    ) -> Self {
        let handlers = default_handlers(&settings.default_currency);
        Self::with_handlers(repo, event_sender, handlers, settings)
    }

    pub fn with_handlers(
        repo: Arc<dyn RequirementRepository>,
        event_sender: Arc<EventSender>,
        handlers: Vec<Arc<dyn RequirementEventHandler>>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            repo,
            event_sender,
            handlers: Arc::new(handlers),
            locks: Arc::new(RequirementLocks::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Creates a draft requirement, with any initial items, owned by `actor`.
    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id))]
    pub async fn create_requirement(
        &self,
        actor: &AuthUser,
        input: NewRequirement,
    ) -> Result<RequirementDetails, ServiceError> {
        authorize(actor, Action::Create, None)?;
        input.validate()?;
        for item in &input.items {
            item.validate()?;
        }

        let requirement = Requirement::draft(&input, &actor.user_id, actor.display_name());
        let id = requirement.id;
        let items: Vec<RequirementItem> = input
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| RequirementItem::new(id, index as i32 + 1, item))
            .collect();
        self.ensure_priceable(&items)?;

        let mut batch = WriteBatch::new().with(WriteOp::InsertRequirement(requirement));
        for item in items {
            batch.push(WriteOp::InsertItem(item));
        }

        let _guard = self.locks.acquire(id).await;
        self.commit(batch).await?;
        info!(requirement_id = %id, items = input.items.len(), "Requirement created");

        self.details(id).await
    }

    /// Lists requirements newest first. `limit` is clamped to the configured maximum.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn list_requirements(
        &self,
        actor: &AuthUser,
        filter: RequirementFilter,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<RequirementPage, ServiceError> {
        authorize(actor, Action::View, None)?;
        let limit = self.settings.page_size(limit);
        let offset = offset.unwrap_or(0);

        let (requirements, total) = self.repo.list_requirements(&filter, limit, offset).await?;
        Ok(RequirementPage {
            requirements,
            total,
            limit,
            offset,
        })
    }

    #[instrument(skip(self, actor), fields(requirement_id = %id))]
    pub async fn get_requirement(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<RequirementDetails, ServiceError> {
        let requirement = self.load(id).await?;
        authorize(actor, Action::View, Some(&requirement))?;
        self.details(id).await
    }

    #[instrument(skip(self, actor, changes), fields(requirement_id = %id, user_id = %actor.user_id))]
    pub async fn update_requirement(
        &self,
        actor: &AuthUser,
        id: Uuid,
        changes: RequirementChanges,
    ) -> Result<Requirement, ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let mut requirement = self.load(id).await?;
        authorize(actor, Action::Update, Some(&requirement))?;
        requirement_status::ensure_editable(&requirement)?;
        changes.validate()?;
        if !requirement.apply(&changes) {
            return Err(ServiceError::ValidationError(
                "No fields provided for update".to_string(),
            ));
        }

        self.commit(WriteOp::UpdateRequirement(requirement).into())
            .await?;
        info!("Requirement updated");
        self.load(id).await
    }

    /// Deletes a draft together with its items and approvals.
    #[instrument(skip(self, actor), fields(requirement_id = %id, user_id = %actor.user_id))]
    pub async fn delete_requirement(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let requirement = self.load(id).await?;
        authorize(actor, Action::Delete, Some(&requirement))?;
        requirement_status::ensure_deletable(&requirement)?;

        self.commit(WriteOp::DeleteRequirement(id).into()).await?;
        info!("Requirement deleted");
        Ok(())
    }

    #[instrument(skip(self, actor), fields(requirement_id = %id))]
    pub async fn list_items(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<Vec<RequirementItem>, ServiceError> {
        let requirement = self.load(id).await?;
        authorize(actor, Action::View, Some(&requirement))?;
        self.repo.items_for(id).await
    }

    #[instrument(skip(self, actor, input), fields(requirement_id = %id, user_id = %actor.user_id))]
    pub async fn add_item(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: NewRequirementItem,
    ) -> Result<RequirementItem, ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let requirement = self.load(id).await?;
        authorize(actor, Action::ManageItems, Some(&requirement))?;
        requirement_status::ensure_editable(&requirement)?;
        input.validate()?;

        let mut items = self.repo.items_for(id).await?;
        let next_line = items
            .iter()
            .map(|item| item.line_number)
            .max()
            .unwrap_or(0)
            + 1;
        let item = RequirementItem::new(id, next_line, &input);
        let item_id = item.id;
        items.push(item.clone());
        self.ensure_priceable(&items)?;

        self.commit(
            WriteBatch::new()
                .with(WriteOp::InsertItem(item))
                .with(WriteOp::UpdateRequirement(touched(requirement))),
        )
        .await?;
        info!(item_id = %item_id, line_number = next_line, "Item added");

        self.load_item(id, item_id).await
    }

    #[instrument(skip(self, actor, changes), fields(requirement_id = %id, item_id = %item_id, user_id = %actor.user_id))]
    pub async fn update_item(
        &self,
        actor: &AuthUser,
        id: Uuid,
        item_id: Uuid,
        changes: ItemChanges,
    ) -> Result<RequirementItem, ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let requirement = self.load(id).await?;
        authorize(actor, Action::ManageItems, Some(&requirement))?;
        requirement_status::ensure_editable(&requirement)?;
        let mut item = self.load_item(id, item_id).await?;
        changes.validate()?;
        if !item.apply(&changes) {
            return Err(ServiceError::ValidationError(
                "No fields provided for update".to_string(),
            ));
        }
        let projected: Vec<RequirementItem> = self
            .repo
            .items_for(id)
            .await?
            .into_iter()
            .map(|existing| if existing.id == item_id { item.clone() } else { existing })
            .collect();
        self.ensure_priceable(&projected)?;

        self.commit(
            WriteBatch::new()
                .with(WriteOp::UpdateItem(item))
                .with(WriteOp::UpdateRequirement(touched(requirement))),
        )
        .await?;
        info!("Item updated");

        self.load_item(id, item_id).await
    }

    #[instrument(skip(self, actor), fields(requirement_id = %id, item_id = %item_id, user_id = %actor.user_id))]
    pub async fn delete_item(
        &self,
        actor: &AuthUser,
        id: Uuid,
        item_id: Uuid,
    ) -> Result<(), ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let requirement = self.load(id).await?;
        authorize(actor, Action::ManageItems, Some(&requirement))?;
        requirement_status::ensure_editable(&requirement)?;
        self.load_item(id, item_id).await?;

        self.commit(
            WriteBatch::new()
                .with(WriteOp::DeleteItem {
                    requirement_id: id,
                    item_id,
                })
                .with(WriteOp::UpdateRequirement(touched(requirement))),
        )
        .await?;
        info!("Item removed");
        Ok(())
    }

    #[instrument(skip(self, actor), fields(requirement_id = %id))]
    pub async fn list_approvals(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<Vec<RequirementApproval>, ServiceError> {
        let requirement = self.load(id).await?;
        authorize(actor, Action::View, Some(&requirement))?;
        self.repo.approvals_for(id).await
    }

    /// Appends an approver decision; the approval handler then settles the status.
    #[instrument(skip(self, actor, decision), fields(requirement_id = %id, user_id = %actor.user_id))]
    pub async fn record_approval(
        &self,
        actor: &AuthUser,
        id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<RequirementApproval, ServiceError> {
        self.decide(actor, id, Action::RecordApproval, decision).await
    }

    /// Records an `approved` decision on behalf of an administrator.
    pub async fn approve(
        &self,
        actor: &AuthUser,
        id: Uuid,
        comments: Option<String>,
    ) -> Result<Requirement, ServiceError> {
        let decision = ApprovalDecision {
            status: ApprovalStatus::Approved,
            comments,
        };
        self.decide(actor, id, Action::Approve, decision).await?;
        self.load(id).await
    }

    /// Records a `rejected` decision on behalf of an administrator.
    pub async fn reject(
        &self,
        actor: &AuthUser,
        id: Uuid,
        comments: Option<String>,
    ) -> Result<Requirement, ServiceError> {
        let decision = ApprovalDecision {
            status: ApprovalStatus::Rejected,
            comments,
        };
        self.decide(actor, id, Action::Reject, decision).await?;
        self.load(id).await
    }

    #[instrument(skip(self, actor), fields(requirement_id = %id, user_id = %actor.user_id))]
    pub async fn submit(&self, actor: &AuthUser, id: Uuid) -> Result<Requirement, ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let mut requirement = self.load(id).await?;
        authorize(actor, Action::Submit, Some(&requirement))?;
        let items = self.repo.items_for(id).await?;
        requirement_status::ensure_submittable(&requirement, items.len())?;

        requirement_status::transition(
            &mut requirement,
            RequirementStatus::PendingApproval,
            Utc::now(),
        )?;
        let round = requirement.review_round;
        self.commit(WriteOp::UpdateRequirement(requirement).into())
            .await?;
        info!(review_round = round, "Requirement submitted for approval");
        self.load(id).await
    }

    #[instrument(skip(self, actor, reason), fields(requirement_id = %id, user_id = %actor.user_id))]
    pub async fn cancel(
        &self,
        actor: &AuthUser,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<Requirement, ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let mut requirement = self.load(id).await?;
        authorize(actor, Action::Cancel, Some(&requirement))?;
        if !requirement_status::is_valid_transition(requirement.status, RequirementStatus::Cancelled)
        {
            return Err(ServiceError::InvalidState(format!(
                "Cannot cancel a requirement that is {}",
                requirement.status
            )));
        }

        requirement_status::transition(&mut requirement, RequirementStatus::Cancelled, Utc::now())?;
        requirement.cancellation_reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        self.commit(WriteOp::UpdateRequirement(requirement).into())
            .await?;
        info!("Requirement cancelled");
        self.load(id).await
    }

    #[instrument(skip(self, actor), fields(requirement_id = %id, user_id = %actor.user_id))]
    pub async fn complete(&self, actor: &AuthUser, id: Uuid) -> Result<Requirement, ServiceError> {
        let _guard = self.locks.acquire(id).await;
        let mut requirement = self.load(id).await?;
        authorize(actor, Action::Complete, Some(&requirement))?;
        if requirement.status != RequirementStatus::Approved {
            return Err(ServiceError::InvalidState(format!(
                "Only approved requirements can be completed (currently {})",
                requirement.status
            )));
        }

        requirement_status::transition(&mut requirement, RequirementStatus::Completed, Utc::now())?;
        self.commit(WriteOp::UpdateRequirement(requirement).into())
            .await?;
        info!("Requirement completed");
        self.load(id).await
    }

    #[instrument(skip(self, actor, action, decision), fields(requirement_id = %id, user_id = %actor.user_id, action = %action))]
    async fn decide(
        &self,
        actor: &AuthUser,
        id: Uuid,
        action: Action,
        decision: ApprovalDecision,
    ) -> Result<RequirementApproval, ServiceError> {
        authorize(actor, action, None)?;
        let _guard = self.locks.acquire(id).await;
        let requirement = self.load(id).await?;
        authorize(actor, action, Some(&requirement))?;
        requirement_status::ensure_accepts_approvals(&requirement)?;
        decision.validate()?;
        if decision.status == ApprovalStatus::Pending {
            return Err(ServiceError::ValidationError(
                "Approval status must be approved or rejected".to_string(),
            ));
        }

        let approval = RequirementApproval {
            id: Uuid::new_v4(),
            requirement_id: id,
            approver_id: actor.user_id.clone(),
            approver_name: actor
                .display_name()
                .unwrap_or(UNKNOWN_USER_NAME)
                .to_string(),
            status: decision.status,
            comments: decision.comments,
            review_round: requirement.review_round,
            created_at: Utc::now(),
        };

        // The decision and the status it settles are stored together.
        let mut approvals = self.repo.approvals_for(id).await?;
        approvals.push(approval.clone());
        let settled =
            requirement_status::settle_approvals(&requirement, &approvals, approval.created_at)?;

        let mut batch = WriteBatch::new().with(WriteOp::InsertApproval(approval.clone()));
        if let Some(settled) = settled {
            info!(status = %settled.status, "Approvals decided requirement");
            batch.push(WriteOp::UpdateRequirement(settled));
        }
        self.commit(batch).await?;
        info!(
            approval_id = %approval.id,
            status = %approval.status,
            review_round = approval.review_round,
            "Approval recorded"
        );
        Ok(approval)
    }

    /// Rejects item sets whose total cannot be stored, before anything is written.
    fn ensure_priceable(&self, items: &[RequirementItem]) -> Result<(), ServiceError> {
        pricing::summarize(items, &self.settings.default_currency).map(|_| ())
    }

    async fn load(&self, id: Uuid) -> Result<Requirement, ServiceError> {
        self.repo
            .find_requirement(id)
            .await?
            .ok_or_else(|| ServiceError::requirement_not_found(id))
    }

    async fn load_item(&self, id: Uuid, item_id: Uuid) -> Result<RequirementItem, ServiceError> {
        self.repo
            .find_item(id, item_id)
            .await?
            .ok_or_else(|| ServiceError::item_not_found(item_id))
    }

    async fn details(&self, id: Uuid) -> Result<RequirementDetails, ServiceError> {
        let requirement = self.load(id).await?;
        let items = self.repo.items_for(id).await?;
        let approvals = self.repo.approvals_for(id).await?;
        Ok(RequirementDetails {
            requirement,
            items,
            approvals,
        })
    }

    /// Commits `batch` and dispatches everything it produced.
    async fn commit(&self, batch: WriteBatch) -> Result<(), ServiceError> {
        let events = self.repo.commit(batch).await?;
        self.dispatch(events).await
    }

    /// Runs the handlers over `events` in publication order. Batches returned by
    /// handlers are committed and their events queued behind the current ones.
    async fn dispatch(&self, events: Vec<RequirementEvent>) -> Result<(), ServiceError> {
        let mut queue: VecDeque<RequirementEvent> = events.into();
        let mut dispatched = 0usize;

        while let Some(event) = queue.pop_front() {
            dispatched += 1;
            if dispatched > MAX_DISPATCHED_EVENTS {
                error!(requirement_id = %event.requirement_id(), "Event cascade did not settle");
                return Err(ServiceError::EventError(
                    "event cascade exceeded its bound".to_string(),
                ));
            }
            crate::metrics::record_event(&event);

            for handler in self.handlers.iter() {
                let follow_up = handler
                    .handle(&event, self.repo.as_ref())
                    .await
                    .map_err(|e| {
                        error!(handler = handler.name(), event = event.name(), error = %e, "Event handler failed");
                        e
                    })?;

                if let Some(batch) = follow_up.filter(|batch| !batch.is_empty()) {
                    queue.extend(self.repo.commit(batch).await?);
                }
            }

            if let Err(e) = self.event_sender.send(event).await {
                warn!("Failed to forward event: {}", e);
            }
        }

        Ok(())
    }
}

/// Marks the requirement as modified by an item write.
fn touched(mut requirement: Requirement) -> Requirement {
    requirement.updated_at = Utc::now();
    requirement
}
