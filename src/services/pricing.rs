//! Order totals in the smallest currency unit.

use crate::errors::ServiceError;
use serde::Serialize;
use utoipa::ToSchema;

/// Default tax rate applied to every order, in percent.
pub const DEFAULT_TAX_RATE_PERCENT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub grandtotal: i64,
}

/// Tax on `subtotal`, rounded half up to the nearest unit.
pub fn compute_tax(subtotal: i64, tax_rate_percent: u32) -> Result<i64, ServiceError> {
    subtotal
        .checked_mul(i64::from(tax_rate_percent))
        .and_then(|scaled| scaled.checked_add(50))
        .map(|scaled| scaled / 100)
        .ok_or_else(|| overflow("tax"))
}

/// Computes totals from `(unit_price, quantity)` pairs.
pub fn compute_totals<I>(lines: I, tax_rate_percent: u32) -> Result<OrderTotals, ServiceError>
where
    I: IntoIterator<Item = (i64, i32)>,
{
    let subtotal = lines.into_iter().try_fold(0i64, |acc, (price, quantity)| {
        price
            .checked_mul(i64::from(quantity))
            .and_then(|line| acc.checked_add(line))
            .ok_or_else(|| overflow("subtotal"))
    })?;

    let tax = compute_tax(subtotal, tax_rate_percent)?;
    let grandtotal = subtotal
        .checked_add(tax)
        .ok_or_else(|| overflow("grandtotal"))?;

    Ok(OrderTotals {
        subtotal,
        tax,
        grandtotal,
    })
}

fn overflow(what: &str) -> ServiceError {
    ServiceError::ValidationError(format!("Order {} exceeds the supported amount", what))
}
