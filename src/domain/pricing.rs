//! Pricing engine: deterministic, side-effect-free price quotes.
//!
//! All functions are total over validated input (callers reject negative
//! prices and zero quantities before invoking). Amounts round half-up to
//! 2 decimal places.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::order::LineItem;

/// Applied when the checkout context supplies no tax rate.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Flat component of the shipping formula. Charged even for an empty order.
pub const SHIPPING_BASE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
pub const SHIPPING_PER_KM: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
pub const SHIPPING_PER_KG: Decimal = Decimal::from_parts(2, 0, 0, false, 0);
pub const DEFAULT_WEIGHT_KG: Decimal = Decimal::ONE;

/// Contextual pricing inputs supplied by the cart/checkout UI.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PricingContext {
    pub tax_rate: Option<Decimal>,
    pub distance_km: Decimal,
    pub weight_kg: Option<Decimal>,
    pub discount: Option<Decimal>,
}

/// Price quote frozen into an order at creation time.
///
/// Upholds `grand_total = items_total + tax + shipping - discount`,
/// clamped so the total never goes below zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items_total: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub grand_total: Decimal,
}

fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum of `unit_price * quantity` over all items. Order-independent.
pub fn items_total(items: &[LineItem]) -> Decimal {
    items.iter().fold(Decimal::ZERO, |acc, i| acc + i.line_total())
}

pub fn tax(items_total: Decimal, rate: Option<Decimal>) -> Decimal {
    round_currency(items_total * rate.unwrap_or(DEFAULT_TAX_RATE))
}

/// Flat distance/weight cost model, not a carrier lookup. The base rate
/// applies even when the order is empty.
pub fn shipping(distance_km: Decimal, weight_kg: Option<Decimal>) -> Decimal {
    let weight = weight_kg.unwrap_or(DEFAULT_WEIGHT_KG);
    round_currency(SHIPPING_BASE + distance_km * SHIPPING_PER_KM + weight * SHIPPING_PER_KG)
}

/// Grand total, clamped at zero. Excess discount is capped, never a refund.
pub fn total(items_total: Decimal, tax: Decimal, shipping: Decimal, discount: Decimal) -> Decimal {
    (items_total + tax + shipping - discount).max(Decimal::ZERO)
}

/// Computes the full quote for a set of line items and a pricing context.
pub fn quote(items: &[LineItem], ctx: &PricingContext) -> PriceBreakdown {
    let items_total = items_total(items);
    let tax = tax(items_total, ctx.tax_rate);
    let shipping = shipping(ctx.distance_km, ctx.weight_kg);
    let discount = ctx.discount.unwrap_or(Decimal::ZERO);
    PriceBreakdown {
        items_total,
        tax,
        shipping,
        discount,
        grand_total: total(items_total, tax, shipping, discount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: Decimal, qty: u32) -> LineItem {
        LineItem {
            product_id: "P1".into(),
            name: "Widget".into(),
            image: None,
            quantity: qty,
            unit_price: price,
        }
    }

    #[test]
    fn items_total_sums_per_item_products() {
        let a = item(Decimal::new(20, 0), 2);
        let b = item(Decimal::new(5, 0), 3);
        assert_eq!(items_total(&[a.clone(), b.clone()]), Decimal::new(55, 0));
        // Order-independent
        assert_eq!(items_total(&[b, a]), Decimal::new(55, 0));
    }

    #[test]
    fn empty_order_still_pays_base_shipping() {
        assert_eq!(items_total(&[]), Decimal::ZERO);
        assert_eq!(tax(Decimal::ZERO, None), Decimal::ZERO);
        assert_eq!(shipping(Decimal::ZERO, None), Decimal::new(700, 2)); // 5 + 0 + 2*1
    }

    #[test]
    fn tax_defaults_to_ten_percent_and_rounds_half_up() {
        assert_eq!(tax(Decimal::new(55, 0), None), Decimal::new(550, 2));
        // 10.25 * 0.10 = 1.025 -> 1.03
        assert_eq!(tax(Decimal::new(1025, 2), None), Decimal::new(103, 2));
    }

    #[test]
    fn shipping_formula() {
        // 5 + 10*0.1 + 2*2 = 10.00
        assert_eq!(
            shipping(Decimal::new(10, 0), Some(Decimal::new(2, 0))),
            Decimal::new(1000, 2)
        );
        // default weight 1kg: 5 + 0 + 2 = 7
        assert_eq!(shipping(Decimal::ZERO, None), Decimal::new(7, 0));
    }

    #[test]
    fn excess_discount_clamps_total_to_zero() {
        let t = total(
            Decimal::new(10, 0),
            Decimal::new(1, 0),
            Decimal::new(5, 0),
            Decimal::new(100, 0),
        );
        assert_eq!(t, Decimal::ZERO);
    }

    #[test]
    fn quote_end_to_end() {
        let items = [item(Decimal::new(20, 0), 2), item(Decimal::new(5, 0), 3)];
        let ctx = PricingContext {
            tax_rate: Some(Decimal::new(10, 2)),
            distance_km: Decimal::new(10, 0),
            weight_kg: Some(Decimal::new(2, 0)),
            discount: None,
        };
        let q = quote(&items, &ctx);
        assert_eq!(q.items_total, Decimal::new(55, 0));
        assert_eq!(q.tax, Decimal::new(550, 2));
        assert_eq!(q.shipping, Decimal::new(1000, 2));
        assert_eq!(q.discount, Decimal::ZERO);
        assert_eq!(q.grand_total, Decimal::new(7050, 2));
    }
}
