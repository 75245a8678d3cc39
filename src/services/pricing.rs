use rust_decimal::Decimal;

use crate::errors::ServiceError;
use crate::models::{RequirementItem, MAX_REQUIREMENT_TOTAL};

/// Recomputed total for a requirement's live items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSummary {
    pub total: Decimal,
    pub currency: String,
    /// True when priced items disagree on currency.
    pub mixed_currencies: bool,
}

/// Sums `quantity × estimated_price` over priced items. The currency is taken
/// from the priced item with the highest line number, or `default_currency`
/// when nothing is priced. Unpriced items contribute nothing.
///
/// A total that overflows or exceeds [`MAX_REQUIREMENT_TOTAL`] is a validation error.
pub fn summarize(
    items: &[RequirementItem],
    default_currency: &str,
) -> Result<PriceSummary, ServiceError> {
    let mut priced: Vec<&RequirementItem> = items
        .iter()
        .filter(|item| item.estimated_price.is_some())
        .collect();
    priced.sort_by_key(|item| item.line_number);

    let total = priced
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| {
            item.line_total().and_then(|line| acc.checked_add(line))
        })
        .filter(|total| *total <= MAX_REQUIREMENT_TOTAL)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Requirement total cannot exceed {}",
                MAX_REQUIREMENT_TOTAL
            ))
        })?;

    let currency = priced
        .last()
        .map(|item| item.currency.clone())
        .unwrap_or_else(|| default_currency.to_string());

    let mixed_currencies = priced.iter().any(|item| item.currency != currency);

    Ok(PriceSummary {
        total,
        currency,
        mixed_currencies,
    })
}
