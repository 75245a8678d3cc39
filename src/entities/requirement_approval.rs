use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use crate::models::requirement::{ApprovalStatus, RequirementApproval};

/// Approval rows are append-only; they are only removed with their requirement.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requirement_approvals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub approver_id: String,
    pub approver_name: String,
    pub status: ApprovalStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,
    pub review_round: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::requirement::Entity",
        from = "Column::RequirementId",
        to = "super::requirement::Column::Id",
        on_delete = "Cascade"
    )]
    Requirement,
}

impl Related<super::requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requirement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RequirementApproval {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            requirement_id: model.requirement_id,
            approver_id: model.approver_id,
            approver_name: model.approver_name,
            status: model.status,
            comments: model.comments,
            review_round: model.review_round,
            created_at: model.created_at,
        }
    }
}

impl From<&RequirementApproval> for ActiveModel {
    fn from(approval: &RequirementApproval) -> Self {
        Self {
            id: Set(approval.id),
            requirement_id: Set(approval.requirement_id),
            approver_id: Set(approval.approver_id.clone()),
            approver_name: Set(approval.approver_name.clone()),
            status: Set(approval.status),
            comments: Set(approval.comments.clone()),
            review_round: Set(approval.review_round),
            created_at: Set(approval.created_at),
        }
    }
}
