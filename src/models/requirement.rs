use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

lazy_static! {
    /// ISO 4217 style three-letter currency code.
    static ref CURRENCY_CODE: Regex = Regex::new(r"^[A-Z]{3}$").expect("currency regex compiles");
}

pub const DEFAULT_CURRENCY: &str = "USD";
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Largest accepted item quantity (1e9).
pub const MAX_ITEM_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
/// Largest accepted unit price (1e9).
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
/// Largest requirement total; stays inside the `decimal(19, 4)` columns (1e14).
pub const MAX_REQUIREMENT_TOTAL: Decimal = Decimal::from_parts(276_447_232, 23_283, 0, false, 0);

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequirementStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequirementPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "purchase_order")]
    PurchaseOrder,
    #[sea_orm(string_value = "cash")]
    Cash,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// A procurement request progressing through the approval lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: Uuid,
    pub title: String,
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
    /// Warranty length in months
    pub warranty_duration: Option<i32>,
    pub additional_conditions: Option<String>,
    pub attachments: Vec<String>,
    #[schema(value_type = String, example = "25.00")]
    pub total_price: Decimal,
    pub currency: String,
    pub cancellation_reason: Option<String>,
    /// Optimistic concurrency counter, bumped on every stored update
    pub version: i32,
    /// Number of times the requirement has been submitted for approval
    pub review_round: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Requirement {
    /// Builds a fresh draft owned by `created_by`.
    pub fn draft(input: &NewRequirement, created_by: &str, created_by_name: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            status: RequirementStatus::Draft,
            priority: input.priority,
            created_by: created_by.to_string(),
            created_by_name: created_by_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(UNKNOWN_USER_NAME)
                .to_string(),
            company_id: input.company_id.clone(),
            cost_center: input.cost_center.clone(),
            payment_method: input.payment_method,
            payment_term: input.payment_term.clone(),
            warranty: input.warranty,
            warranty_duration: input.warranty_duration,
            additional_conditions: input.additional_conditions.clone(),
            attachments: input.attachments.clone().unwrap_or_default(),
            total_price: Decimal::ZERO,
            currency: DEFAULT_CURRENCY.to_string(),
            cancellation_reason: None,
            version: 1,
            review_round: 0,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: None,
            rejected_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    /// Applies a partial update. Returns false when the patch carries no fields.
    pub fn apply(&mut self, changes: &RequirementChanges) -> bool {
        if changes.is_empty() {
            return false;
        }
        if let Some(title) = &changes.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = &changes.description {
            self.description = Some(description.clone());
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(company_id) = &changes.company_id {
            self.company_id = Some(company_id.clone());
        }
        if let Some(cost_center) = &changes.cost_center {
            self.cost_center = Some(cost_center.clone());
        }
        if let Some(method) = changes.payment_method {
            self.payment_method = Some(method);
        }
        if let Some(term) = &changes.payment_term {
            self.payment_term = Some(term.clone());
        }
        if let Some(warranty) = changes.warranty {
            self.warranty = Some(warranty);
        }
        if let Some(duration) = changes.warranty_duration {
            self.warranty_duration = Some(duration);
        }
        if let Some(conditions) = &changes.additional_conditions {
            self.additional_conditions = Some(conditions.clone());
        }
        if let Some(attachments) = &changes.attachments {
            self.attachments = attachments.clone();
        }
        self.updated_at = Utc::now();
        true
    }
}

/// A line item owned by exactly one requirement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementItem {
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub line_number: i32,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "2")]
    pub quantity: Decimal,
    pub unit_of_measure: String,
    #[schema(value_type = Option<String>, example = "10.00")]
    pub estimated_price: Option<Decimal>,
    pub currency: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<serde_json::Value>,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequirementItem {
    pub fn new(requirement_id: Uuid, line_number: i32, input: &NewRequirementItem) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            requirement_id,
            line_number,
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            quantity: input.quantity,
            unit_of_measure: input.unit_of_measure.trim().to_string(),
            estimated_price: input.estimated_price,
            currency: input
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            category: input.category.clone(),
            subcategory: input.subcategory.clone(),
            specifications: input.specifications.clone(),
            attachments: input.attachments.clone().unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update. Returns false when the patch carries no fields.
    pub fn apply(&mut self, changes: &ItemChanges) -> bool {
        if changes.is_empty() {
            return false;
        }
        if let Some(name) = &changes.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = &changes.description {
            self.description = Some(description.clone());
        }
        if let Some(quantity) = changes.quantity {
            self.quantity = quantity;
        }
        if let Some(unit) = &changes.unit_of_measure {
            self.unit_of_measure = unit.trim().to_string();
        }
        if let Some(price) = changes.estimated_price {
            self.estimated_price = Some(price);
        }
        if let Some(currency) = &changes.currency {
            self.currency = currency.clone();
        }
        if let Some(category) = &changes.category {
            self.category = Some(category.clone());
        }
        if let Some(subcategory) = &changes.subcategory {
            self.subcategory = Some(subcategory.clone());
        }
        if let Some(specifications) = &changes.specifications {
            self.specifications = Some(specifications.clone());
        }
        if let Some(attachments) = &changes.attachments {
            self.attachments = attachments.clone();
        }
        self.updated_at = Utc::now();
        true
    }

    /// quantity × estimated price. Unpriced items count as zero; `None` means
    /// the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        match self.estimated_price {
            Some(price) => self.quantity.checked_mul(price),
            None => Some(Decimal::ZERO),
        }
    }
}

/// An immutable approver decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementApproval {
    pub id: Uuid,
    pub requirement_id: Uuid,
    pub approver_id: String,
    pub approver_name: String,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub review_round: i32,
    pub created_at: DateTime<Utc>,
}

/// A requirement with its items and approvals attached.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementDetails {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub items: Vec<RequirementItem>,
    pub approvals: Vec<RequirementApproval>,
}

fn validate_positive_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if *quantity <= Decimal::ZERO {
        let mut err = ValidationError::new("quantity");
        err.message = Some("quantity must be greater than zero".into());
        return Err(err);
    }
    if *quantity > MAX_ITEM_QUANTITY {
        let mut err = ValidationError::new("quantity");
        err.message = Some(format!("quantity cannot exceed {}", MAX_ITEM_QUANTITY).into());
        return Err(err);
    }
    Ok(())
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("estimated_price");
        err.message = Some("estimated price cannot be negative".into());
        return Err(err);
    }
    if *price > MAX_UNIT_PRICE {
        let mut err = ValidationError::new("estimated_price");
        err.message = Some(format!("estimated price cannot exceed {}", MAX_UNIT_PRICE).into());
        return Err(err);
    }
    Ok(())
}

#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRequirementItem {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom = "validate_positive_quantity")]
    #[schema(value_type = String, example = "2")]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 32, message = "unit of measure is required"))]
    pub unit_of_measure: String,
    #[serde(alias = "unitPrice")]
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<String>, example = "10.00")]
    pub estimated_price: Option<Decimal>,
    #[validate(regex(path = "CURRENCY_CODE", message = "currency must be a three-letter code"))]
    pub currency: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub subcategory: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<serde_json::Value>,
    pub attachments: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemChanges {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom = "validate_positive_quantity")]
    #[schema(value_type = Option<String>)]
    pub quantity: Option<Decimal>,
    #[validate(length(min = 1, max = 32))]
    pub unit_of_measure: Option<String>,
    #[serde(alias = "unitPrice")]
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<String>)]
    pub estimated_price: Option<Decimal>,
    #[validate(regex(path = "CURRENCY_CODE", message = "currency must be a three-letter code"))]
    pub currency: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub subcategory: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<serde_json::Value>,
    pub attachments: Option<Vec<String>>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.quantity.is_none()
            && self.unit_of_measure.is_none()
            && self.estimated_price.is_none()
            && self.currency.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.specifications.is_none()
            && self.attachments.is_none()
    }
}

#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRequirement {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub priority: RequirementPriority,
    pub company_id: Option<String>,
    #[validate(length(max = 100))]
    pub cost_center: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 200))]
    pub payment_term: Option<String>,
    pub warranty: Option<bool>,
    #[validate(range(min = 0, message = "warranty duration cannot be negative"))]
    pub warranty_duration: Option<i32>,
    #[validate(length(max = 5000))]
    pub additional_conditions: Option<String>,
    pub attachments: Option<Vec<String>>,
    #[serde(default)]
    pub items: Vec<NewRequirementItem>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementChanges {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub priority: Option<RequirementPriority>,
    pub company_id: Option<String>,
    #[validate(length(max = 100))]
    pub cost_center: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 200))]
    pub payment_term: Option<String>,
    pub warranty: Option<bool>,
    #[validate(range(min = 0, message = "warranty duration cannot be negative"))]
    pub warranty_duration: Option<i32>,
    #[validate(length(max = 5000))]
    pub additional_conditions: Option<String>,
    pub attachments: Option<Vec<String>>,
}

impl RequirementChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.company_id.is_none()
            && self.cost_center.is_none()
            && self.payment_method.is_none()
            && self.payment_term.is_none()
            && self.warranty.is_none()
            && self.warranty_duration.is_none()
            && self.additional_conditions.is_none()
            && self.attachments.is_none()
    }
}

/// Body for recording an approver decision.
#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub status: ApprovalStatus,
    #[validate(length(max = 2000))]
    pub comments: Option<String>,
}

/// Filters accepted by the requirement listing.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementFilter {
    pub status: Option<RequirementStatus>,
    pub priority: Option<RequirementPriority>,
    pub created_by: Option<String>,
    pub company_id: Option<String>,
    pub cost_center: Option<String>,
}

impl RequirementFilter {
    pub fn matches(&self, requirement: &Requirement) -> bool {
        self.status.map_or(true, |s| requirement.status == s)
            && self.priority.map_or(true, |p| requirement.priority == p)
            && self
                .created_by
                .as_ref()
                .map_or(true, |c| &requirement.created_by == c)
            && self
                .company_id
                .as_ref()
                .map_or(true, |c| requirement.company_id.as_ref() == Some(c))
            && self
                .cost_center
                .as_ref()
                .map_or(true, |c| requirement.cost_center.as_ref() == Some(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn new_item(quantity: Decimal, price: Option<Decimal>) -> NewRequirementItem {
        NewRequirementItem {
            name: "Laptop stand".into(),
            description: None,
            quantity,
            unit_of_measure: "unit".into(),
            estimated_price: price,
            currency: None,
            category: None,
            subcategory: None,
            specifications: None,
            attachments: None,
        }
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        assert_eq!(RequirementStatus::PendingApproval.to_string(), "pending_approval");
        assert_eq!(
            RequirementStatus::from_str("cancelled").unwrap(),
            RequirementStatus::Cancelled
        );
        assert!(RequirementStatus::from_str("archived").is_err());
    }

    #[test]
    fn item_validation_rejects_non_positive_quantity() {
        assert!(new_item(dec!(1), None).validate().is_ok());
        assert!(new_item(dec!(0), None).validate().is_err());
        assert!(new_item(dec!(-3), None).validate().is_err());
        assert!(new_item(dec!(1), Some(dec!(-1))).validate().is_err());
    }

    #[test]
    fn item_validation_checks_currency_code() {
        let mut item = new_item(dec!(1), Some(dec!(4.50)));
        item.currency = Some("EUR".into());
        assert!(item.validate().is_ok());
        item.currency = Some("euro".into());
        assert!(item.validate().is_err());
    }

    #[test]
    fn item_defaults_currency_and_computes_line_total() {
        let item = RequirementItem::new(Uuid::new_v4(), 1, &new_item(dec!(2), Some(dec!(10))));
        assert_eq!(item.currency, DEFAULT_CURRENCY);
        assert_eq!(item.line_total(), Some(dec!(20)));

        let unpriced = RequirementItem::new(Uuid::new_v4(), 2, &new_item(dec!(2), None));
        assert_eq!(unpriced.line_total(), Some(Decimal::ZERO));
    }

    #[test]
    fn item_validation_bounds_quantity_and_price() {
        assert_eq!(MAX_REQUIREMENT_TOTAL, dec!(100000000000000));
        assert!(new_item(MAX_ITEM_QUANTITY, Some(MAX_UNIT_PRICE)).validate().is_ok());
        assert!(new_item(dec!(1000000001), None).validate().is_err());
        assert!(new_item(dec!(1), Some(dec!(1000000000.01))).validate().is_err());

        let huge = Decimal::from_str_exact("10000000000000000000").unwrap();
        let item = RequirementItem::new(Uuid::new_v4(), 1, &new_item(huge, Some(huge)));
        assert_eq!(item.line_total(), None);
    }

    #[test]
    fn empty_patch_is_reported() {
        let input = NewRequirement {
            title: "Monitors".into(),
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
        let mut requirement = Requirement::draft(&input, "user-1", None);
        assert_eq!(requirement.created_by_name, UNKNOWN_USER_NAME);
        assert!(!requirement.apply(&RequirementChanges::default()));

        let changes = RequirementChanges {
            priority: Some(RequirementPriority::Low),
            ..Default::default()
        };
        assert!(requirement.apply(&changes));
        assert_eq!(requirement.priority, RequirementPriority::Low);
    }
}
