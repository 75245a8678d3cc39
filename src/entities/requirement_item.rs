use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use super::{json_to_strings, strings_to_json};
use crate::models::requirement::RequirementItem;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requirement_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub line_number: i32,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_of_measure: String,
    pub estimated_price: Option<Decimal>,
    pub currency: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub specifications: Option<Json>,
    pub attachments: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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

impl From<Model> for RequirementItem {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            requirement_id: model.requirement_id,
            line_number: model.line_number,
            name: model.name,
            description: model.description,
            quantity: model.quantity,
            unit_of_measure: model.unit_of_measure,
            estimated_price: model.estimated_price,
            currency: model.currency,
            category: model.category,
            subcategory: model.subcategory,
            specifications: model.specifications,
            attachments: json_to_strings(&model.attachments),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<&RequirementItem> for ActiveModel {
    fn from(item: &RequirementItem) -> Self {
        Self {
            id: Set(item.id),
            requirement_id: Set(item.requirement_id),
            line_number: Set(item.line_number),
            name: Set(item.name.clone()),
            description: Set(item.description.clone()),
            quantity: Set(item.quantity),
            unit_of_measure: Set(item.unit_of_measure.clone()),
            estimated_price: Set(item.estimated_price),
            currency: Set(item.currency.clone()),
            category: Set(item.category.clone()),
            subcategory: Set(item.subcategory.clone()),
            specifications: Set(item.specifications.clone()),
            attachments: Set(strings_to_json(&item.attachments)),
            created_at: Set(item.created_at),
            updated_at: Set(item.updated_at),
        }
    }
}
