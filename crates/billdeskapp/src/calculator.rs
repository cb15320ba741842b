//! Invoice totals.
//!
//! ```text
//! subtotal    = round2(sum(quantity * unit_price))
//! levy[name]  = round2(subtotal * rate)
//! grand_total = round2(subtotal + sum(levy))
//! ```
//!
//! Rounding is half away from zero at two decimal places. All arithmetic is
//! exact ([`Decimal`]); nothing passes through floating point. Results outside
//! the `Decimal` range are an [`BillingError::InvalidValue`], never a panic.

use crate::error::{BillingError, Result};
use crate::model::LineItem;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named levy applied to the invoice subtotal. `rate` is a fraction: 0.15 is 15%.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevyRate {
    pub name: String,
    pub rate: Decimal,
}

impl LevyRate {
    pub fn new(name: impl Into<String>, rate: Decimal) -> Self {
        Self {
            name: name.into(),
            rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub levies: BTreeMap<String, Decimal>,
    pub grand_total: Decimal,
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn calculate_totals(items: &[LineItem], levies: &[LevyRate]) -> Result<InvoiceTotals> {
    let mut sum = Decimal::ZERO;
    for item in items {
        let line = item
            .quantity
            .checked_mul(item.unit_price)
            .ok_or_else(|| overflow("items"))?;
        sum = sum.checked_add(line).ok_or_else(|| overflow("subtotal"))?;
    }
    let subtotal = round_money(sum);

    let mut amounts = BTreeMap::new();
    let mut levy_total = Decimal::ZERO;
    for levy in levies {
        let amount = round_money(
            subtotal
                .checked_mul(levy.rate)
                .ok_or_else(|| overflow(&levy.name))?,
        );
        levy_total = levy_total
            .checked_add(amount)
            .ok_or_else(|| overflow("levies"))?;
        amounts.insert(levy.name.clone(), amount);
    }

    let grand_total = subtotal
        .checked_add(levy_total)
        .ok_or_else(|| overflow("grand_total"))?;

    Ok(InvoiceTotals {
        subtotal,
        levies: amounts,
        grand_total: round_money(grand_total),
    })
}

fn overflow(field: &str) -> BillingError {
    BillingError::InvalidValue {
        field: field.to_string(),
        message: "amount out of range".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingConfig;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(quantity: &str, unit_price: &str) -> LineItem {
        LineItem {
            description: "Item".to_string(),
            quantity: dec(quantity),
            unit_price: dec(unit_price),
        }
    }

    #[test]
    fn test_standard_levies() {
        let items = vec![item("2", "50"), item("1", "100")];
        let totals = calculate_totals(&items, &BillingConfig::default().levies()).unwrap();

        assert_eq!(totals.subtotal, dec("200.00"));
        assert_eq!(totals.levies["NHIL"], dec("5.00"));
        assert_eq!(totals.levies["GETFUND"], dec("5.00"));
        assert_eq!(totals.levies["COVID"], dec("2.00"));
        assert_eq!(totals.levies["VAT"], dec("30.00"));
        assert_eq!(totals.grand_total, dec("242.00"));
    }

    #[test]
    fn test_levies_round_half_up() {
        // 10.10 * 0.025 = 0.2525 -> 0.25 ; 10.30 * 0.025 = 0.2575 -> 0.26
        let levies = vec![LevyRate::new("NHIL", dec("0.025"))];
        assert_eq!(
            calculate_totals(&[item("1", "10.10")], &levies).unwrap().levies["NHIL"],
            dec("0.25")
        );
        assert_eq!(
            calculate_totals(&[item("1", "10.30")], &levies).unwrap().levies["NHIL"],
            dec("0.26")
        );
        // exact midpoint: 0.5 * 0.01 = 0.005 -> 0.01
        let covid = vec![LevyRate::new("COVID", dec("0.01"))];
        assert_eq!(
            calculate_totals(&[item("1", "0.50")], &covid).unwrap().levies["COVID"],
            dec("0.01")
        );
    }

    #[test]
    fn test_subtotal_rounded_after_sum() {
        let items = vec![item("3", "0.335"), item("1", "0.001")];
        // 1.005 + 0.001 = 1.006 -> 1.01
        let totals = calculate_totals(&items, &[]).unwrap();
        assert_eq!(totals.subtotal, dec("1.01"));
        assert_eq!(totals.grand_total, dec("1.01"));
        assert!(totals.levies.is_empty());
    }

    #[test]
    fn test_no_items() {
        let totals = calculate_totals(&[], &BillingConfig::default().levies()).unwrap();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.grand_total, Decimal::ZERO);
        assert_eq!(totals.levies.len(), 4);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = LineItem {
            description: "Huge".to_string(),
            quantity: Decimal::MAX,
            unit_price: Decimal::new(2, 0),
        };
        assert!(matches!(
            calculate_totals(&[huge], &[]),
            Err(BillingError::InvalidValue { .. })
        ));

        let half = LineItem {
            description: "Half".to_string(),
            quantity: Decimal::ONE,
            unit_price: Decimal::MAX,
        };
        assert!(matches!(
            calculate_totals(&[half.clone(), half], &[]),
            Err(BillingError::InvalidValue { .. })
        ));
    }
}
