use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use super::{json_to_strings, strings_to_json};
use crate::models::requirement::{
    PaymentMethod, Requirement, RequirementPriority, RequirementStatus,
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requirements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub status: RequirementStatus,
    pub priority: RequirementPriority,
    pub created_by: String,
    pub created_by_name: String,
    pub company_id: Option<String>,
    pub cost_center: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_term: Option<String>,
    pub warranty: Option<bool>,
    pub warranty_duration: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub additional_conditions: Option<String>,
    pub attachments: Json,
    pub total_price: Decimal,
    pub currency: String,
    pub cancellation_reason: Option<String>,
    pub version: i32,
    pub review_round: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::requirement_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::requirement_approval::Entity")]
    Approvals,
}

impl Related<super::requirement_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::requirement_approval::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approvals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Requirement {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            created_by: model.created_by,
            created_by_name: model.created_by_name,
            company_id: model.company_id,
            cost_center: model.cost_center,
            payment_method: model.payment_method,
            payment_term: model.payment_term,
            warranty: model.warranty,
            warranty_duration: model.warranty_duration,
            additional_conditions: model.additional_conditions,
            attachments: json_to_strings(&model.attachments),
            total_price: model.total_price,
            currency: model.currency,
            cancellation_reason: model.cancellation_reason,
            version: model.version,
            review_round: model.review_round,
            created_at: model.created_at,
            updated_at: model.updated_at,
            submitted_at: model.submitted_at,
            approved_at: model.approved_at,
            rejected_at: model.rejected_at,
            completed_at: model.completed_at,
            cancelled_at: model.cancelled_at,
        }
    }
}

impl From<&Requirement> for ActiveModel {
    fn from(requirement: &Requirement) -> Self {
        Self {
            id: Set(requirement.id),
            title: Set(requirement.title.clone()),
            description: Set(requirement.description.clone()),
            status: Set(requirement.status),
            priority: Set(requirement.priority),
            created_by: Set(requirement.created_by.clone()),
            created_by_name: Set(requirement.created_by_name.clone()),
            company_id: Set(requirement.company_id.clone()),
            cost_center: Set(requirement.cost_center.clone()),
            payment_method: Set(requirement.payment_method),
            payment_term: Set(requirement.payment_term.clone()),
            warranty: Set(requirement.warranty),
            warranty_duration: Set(requirement.warranty_duration),
            additional_conditions: Set(requirement.additional_conditions.clone()),
            attachments: Set(strings_to_json(&requirement.attachments)),
            total_price: Set(requirement.total_price),
            currency: Set(requirement.currency.clone()),
            cancellation_reason: Set(requirement.cancellation_reason.clone()),
            version: Set(requirement.version),
            review_round: Set(requirement.review_round),
            created_at: Set(requirement.created_at),
            updated_at: Set(requirement.updated_at),
            submitted_at: Set(requirement.submitted_at),
            approved_at: Set(requirement.approved_at),
            rejected_at: Set(requirement.rejected_at),
            completed_at: Set(requirement.completed_at),
            cancelled_at: Set(requirement.cancelled_at),
        }
    }
}
