//! # Pricing Resolver
//!
//! Recomputes effective line prices for a mutable cart under a set of
//! threshold-bundle promotion rules.
//!
//! ## Resolution Rules
//! - The whole cart is re-resolved on any mutation. Bundle thresholds are
//!   cross-line, so incremental patching risks stale state.
//! - Rules are evaluated in declared order; the first rule whose scope and
//!   threshold are satisfied claims its lines. Claimed lines never receive a
//!   second discount (no stacking).
//! - A line with `manual_price_override` keeps the operator's price, is
//!   excluded from threshold accumulation, and never receives a rule
//!   discount.
//! - Discounts are folded into the per-unit price shown to the user, not
//!   emitted as separate negative lines.
//!
//! `resolve` is a pure function: running it twice on the same cart and rules
//! yields identical output.

use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Cart Input
// =============================================================================

/// One line of the cart being priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub sku: String,
    pub variant: String,
    pub qty: i64,

    /// Price per unit before any promotion.
    pub unit_price_base: Money,

    /// Category/promotional tag; scope predicates match against this.
    pub category: Option<String>,

    /// Operator-set price. Wins over every rule; the line opts out of
    /// bundle counting entirely.
    pub manual_price_override: Option<Money>,
}

impl CartLine {
    /// Subtotal at the price the line actually starts from (override or
    /// base).
    fn base_subtotal(&self) -> Money {
        self.manual_price_override
            .unwrap_or(self.unit_price_base)
            .multiply_quantity(self.qty)
    }
}

// =============================================================================
// Promotion Rules
// =============================================================================

/// Which cart lines a rule reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePredicate {
    /// Every line.
    All,
    /// Lines whose category tag equals the given value.
    Category(String),
    /// Lines whose sku is in the given set.
    Skus(Vec<String>),
}

impl ScopePredicate {
    fn matches(&self, line: &CartLine) -> bool {
        match self {
            ScopePredicate::All => true,
            ScopePredicate::Category(cat) => line.category.as_deref() == Some(cat.as_str()),
            ScopePredicate::Skus(skus) => skus.iter().any(|s| s == &line.sku),
        }
    }
}

/// When a rule's discount activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Accumulated quantity across scoped lines reaches a multiple of `n`.
    Quantity(i64),
    /// Accumulated amount across scoped lines reaches a multiple of the
    /// given amount.
    Amount(Money),
}

/// A threshold-bundle promotion: every full multiple of the threshold earns
/// `discount` once, spread across the scoped lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRule {
    /// Shown next to the discounted price.
    pub label: String,
    pub scope: ScopePredicate,
    pub threshold: Threshold,
    pub discount: Money,
}

// =============================================================================
// Priced Output
// =============================================================================

/// One cart line with its resolved price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub sku: String,
    pub variant: String,
    pub qty: i64,

    /// Price per unit the line was resolved from: the operator override
    /// when present, the base price otherwise.
    pub unit_price: Money,

    /// Per-unit price after discount, floored to a whole minor unit. The
    /// exact line-level figure is `discount_applied`.
    pub effective_unit_price: Money,

    /// Exact discount carried by this line.
    pub discount_applied: Money,

    /// Label of the rule that priced this line, if any.
    pub applied_rule: Option<String>,
}

impl PricedLine {
    /// Exact net amount for the line: subtotal minus discount.
    pub fn net_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.qty) - self.discount_applied
    }
}

/// The fully priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub discount_total: Money,
    pub total: Money,
}

// =============================================================================
// Resolution
// =============================================================================

/// Computes the effective price of every cart line under the given rules.
pub fn resolve(cart: &[CartLine], rules: &[PromotionRule]) -> PricedCart {
    // Start every line at its base (or overridden) price.
    let mut discounts: Vec<Money> = vec![Money::zero(); cart.len()];
    let mut applied: Vec<Option<String>> = vec![None; cart.len()];
    // Overridden lines are spoken for from the start.
    let mut claimed: Vec<bool> = cart
        .iter()
        .map(|l| l.manual_price_override.is_some())
        .collect();

    for rule in rules {
        let scoped: Vec<usize> = cart
            .iter()
            .enumerate()
            .filter(|(idx, line)| !claimed[*idx] && rule.scope.matches(line))
            .map(|(idx, _)| idx)
            .collect();
        if scoped.is_empty() {
            continue;
        }

        let multiples = match &rule.threshold {
            Threshold::Quantity(n) if *n > 0 => {
                scoped.iter().map(|&i| cart[i].qty).sum::<i64>() / n
            }
            Threshold::Amount(amount) if amount.minor() > 0 => {
                scoped
                    .iter()
                    .map(|&i| cart[i].base_subtotal().minor())
                    .sum::<i64>()
                    / amount.minor()
            }
            // Zero/negative thresholds would fire on an empty cart; skip.
            _ => 0,
        };
        if multiples == 0 {
            continue;
        }

        let scoped_subtotal: i64 = scoped.iter().map(|&i| cart[i].base_subtotal().minor()).sum();
        // A discount can never push the scoped lines below zero.
        let total_discount =
            rule.discount.multiply_quantity(multiples).min(Money::from_minor(scoped_subtotal));

        let weights: Vec<i64> = scoped.iter().map(|&i| cart[i].base_subtotal().minor()).collect();
        let shares = total_discount.distribute(&weights);
        if shares.is_empty() {
            continue;
        }

        for (&idx, share) in scoped.iter().zip(shares) {
            discounts[idx] = share;
            applied[idx] = Some(rule.label.clone());
            claimed[idx] = true;
        }
    }

    let mut lines = Vec::with_capacity(cart.len());
    let mut subtotal = Money::zero();
    let mut discount_total = Money::zero();

    for (idx, line) in cart.iter().enumerate() {
        let base_unit = line.manual_price_override.unwrap_or(line.unit_price_base);
        let line_subtotal = base_unit.multiply_quantity(line.qty);
        let discount = discounts[idx];
        let net = line_subtotal - discount;
        let effective_unit = if line.qty > 0 {
            Money::from_minor(net.minor() / line.qty)
        } else {
            base_unit
        };

        subtotal += line_subtotal;
        discount_total += discount;

        lines.push(PricedLine {
            sku: line.sku.clone(),
            variant: line.variant.clone(),
            qty: line.qty,
            unit_price: base_unit,
            effective_unit_price: effective_unit,
            discount_applied: discount,
            applied_rule: applied[idx].take(),
        });
    }

    PricedCart {
        lines,
        subtotal,
        discount_total,
        total: subtotal - discount_total,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: &str, qty: i64, unit_price: i64, category: &str) -> CartLine {
        CartLine {
            sku: sku.to_string(),
            variant: String::new(),
            qty,
            unit_price_base: Money::from_minor(unit_price),
            category: Some(category.to_string()),
            manual_price_override: None,
        }
    }

    fn amount_rule(label: &str, category: &str, threshold: i64, discount: i64) -> PromotionRule {
        PromotionRule {
            label: label.to_string(),
            scope: ScopePredicate::Category(category.to_string()),
            threshold: Threshold::Amount(Money::from_minor(threshold)),
            discount: Money::from_minor(discount),
        }
    }

    #[test]
    fn test_bundle_pricing_determinism() {
        // 3 × 100000 = 300000 in scope "REG"; threshold 250000, discount
        // 25000 -> floor(300000/250000) = 1 multiple, one 25000 discount.
        let cart = vec![line("X", 3, 100_000, "REG")];
        let rules = vec![amount_rule("REG bundle", "REG", 250_000, 25_000)];

        let first = resolve(&cart, &rules);
        assert_eq!(first.discount_total.minor(), 25_000);
        assert_eq!(first.total.minor(), 275_000);
        assert_eq!(first.lines[0].discount_applied.minor(), 25_000);
        assert_eq!(first.lines[0].applied_rule.as_deref(), Some("REG bundle"));
        // 275000 / 3 floored.
        assert_eq!(first.lines[0].effective_unit_price.minor(), 91_666);
        assert_eq!(first.lines[0].net_total().minor(), 275_000);

        // Idempotent: same cart, same rules, identical output.
        let second = resolve(&cart, &rules);
        assert_eq!(first, second);
    }

    #[test]
    fn test_quantity_threshold_multiples() {
        // Buy 3 get 500 off, 7 in scope -> 2 multiples.
        let cart = vec![line("A", 4, 2_000, "SNACK"), line("B", 3, 2_000, "SNACK")];
        let rules = vec![PromotionRule {
            label: "3-pack".to_string(),
            scope: ScopePredicate::Category("SNACK".to_string()),
            threshold: Threshold::Quantity(3),
            discount: Money::from_minor(500),
        }];

        let priced = resolve(&cart, &rules);
        assert_eq!(priced.discount_total.minor(), 1_000);
        // Distribution conserves the total exactly.
        let sum: i64 = priced.lines.iter().map(|l| l.discount_applied.minor()).sum();
        assert_eq!(sum, 1_000);
    }

    #[test]
    fn test_below_threshold_no_discount() {
        let cart = vec![line("X", 2, 100_000, "REG")];
        let priced = resolve(&cart, &vec![amount_rule("REG bundle", "REG", 250_000, 25_000)]);
        assert_eq!(priced.discount_total, Money::zero());
        assert_eq!(priced.lines[0].applied_rule, None);
        assert_eq!(priced.lines[0].effective_unit_price.minor(), 100_000);
    }

    #[test]
    fn test_first_satisfied_rule_wins_no_stacking() {
        let cart = vec![line("X", 5, 10_000, "REG")];
        let rules = vec![
            amount_rule("first", "REG", 50_000, 5_000),
            amount_rule("second", "REG", 25_000, 9_999),
        ];

        let priced = resolve(&cart, &rules);
        // Only the first rule applies even though the second also qualifies.
        assert_eq!(priced.lines[0].applied_rule.as_deref(), Some("first"));
        assert_eq!(priced.discount_total.minor(), 5_000);
    }

    #[test]
    fn test_out_of_scope_lines_untouched() {
        let cart = vec![line("X", 3, 100_000, "REG"), line("Y", 1, 40_000, "MISC")];
        let priced = resolve(&cart, &vec![amount_rule("REG bundle", "REG", 250_000, 25_000)]);
        assert_eq!(priced.lines[1].discount_applied, Money::zero());
        assert_eq!(priced.lines[1].applied_rule, None);
    }

    #[test]
    fn test_manual_override_wins_and_is_excluded_from_counting() {
        let mut pinned = line("X", 2, 100_000, "REG");
        pinned.manual_price_override = Some(Money::from_minor(80_000));
        // Without the pinned line the remaining scope is 200000 < 250000.
        let cart = vec![pinned, line("Y", 2, 100_000, "REG")];
        let priced = resolve(&cart, &vec![amount_rule("REG bundle", "REG", 250_000, 25_000)]);

        // Override price used, no discount on the pinned line.
        assert_eq!(priced.lines[0].effective_unit_price.minor(), 80_000);
        assert_eq!(priced.lines[0].discount_applied, Money::zero());
        // And its amount did not count toward the threshold.
        assert_eq!(priced.discount_total, Money::zero());
    }

    #[test]
    fn test_discount_clamped_to_scoped_subtotal() {
        let cart = vec![line("X", 1, 1_000, "REG")];
        let rules = vec![PromotionRule {
            label: "broken rule".to_string(),
            scope: ScopePredicate::Category("REG".to_string()),
            threshold: Threshold::Amount(Money::from_minor(500)),
            discount: Money::from_minor(10_000),
        }];

        let priced = resolve(&cart, &rules);
        assert_eq!(priced.discount_total.minor(), 1_000);
        assert_eq!(priced.total, Money::zero());
        assert!(!priced.total.is_negative());
    }

    #[test]
    fn test_full_recompute_after_mutation() {
        let rules = vec![amount_rule("REG bundle", "REG", 250_000, 25_000)];
        let mut cart = vec![line("X", 2, 100_000, "REG")];
        assert_eq!(resolve(&cart, &rules).discount_total, Money::zero());

        // Adding a line crosses the threshold; the whole cart re-resolves.
        cart.push(line("Z", 1, 100_000, "REG"));
        let priced = resolve(&cart, &rules);
        assert_eq!(priced.discount_total.minor(), 25_000);

        // Removing it drops the discount again.
        cart.pop();
        assert_eq!(resolve(&cart, &rules).discount_total, Money::zero());
    }

    #[test]
    fn test_skus_scope_predicate() {
        let cart = vec![line("X", 3, 100_000, "REG"), line("Y", 3, 100_000, "REG")];
        let rules = vec![PromotionRule {
            label: "X only".to_string(),
            scope: ScopePredicate::Skus(vec!["X".to_string()]),
            threshold: Threshold::Quantity(3),
            discount: Money::from_minor(1_500),
        }];

        let priced = resolve(&cart, &rules);
        assert_eq!(priced.lines[0].discount_applied.minor(), 1_500);
        assert_eq!(priced.lines[1].discount_applied, Money::zero());
    }
}
