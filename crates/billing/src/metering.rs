//! Usage metering
//!
//! Pure arithmetic: given a measured weight and the customer's current
//! allowance, decide how many pounds are billable, how many come off
//! the allowance, and what the charge is. No I/O here; the reconciler
//! applies the result.

use suds_shared::Subscription;

/// Per-pound price for weight beyond the prepaid allowance
pub const UNIT_PRICE_CENTS_PER_LB: i64 = 150;

/// Pricing knobs, injected so a price change never touches the math
#[derive(Debug, Clone, Copy)]
pub struct PricingPolicy {
    pub unit_price_cents_per_lb: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            unit_price_cents_per_lb: UNIT_PRICE_CENTS_PER_LB,
        }
    }
}

/// What the reconciler should do for one weigh-in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeInstruction {
    /// Pounds beyond the allowance, billed at the unit price
    pub billable_lbs: f64,
    /// Pounds to deduct from the remaining allowance
    pub allowance_consumed: f64,
    /// Charge amount in cents (0 when the allowance covers the load)
    pub amount_due_cents: i64,
}

/// Metering engine
#[derive(Debug, Clone, Copy, Default)]
pub struct MeteringEngine {
    pricing: PricingPolicy,
}

impl MeteringEngine {
    pub fn new(pricing: PricingPolicy) -> Self {
        Self { pricing }
    }

    /// Split `weight_lbs` between the allowance and the billable
    /// remainder.
    ///
    /// A missing or exhausted subscription bills the full weight. The
    /// allowance is never consumed below zero and never charged for.
    pub fn compute_charge(
        &self,
        weight_lbs: f64,
        subscription: Option<&Subscription>,
    ) -> ChargeInstruction {
        let lbs_left = subscription.map(|s| s.lbs_left.max(0.0)).unwrap_or(0.0);

        let (billable_lbs, allowance_consumed) = if lbs_left > 0.0 {
            ((weight_lbs - lbs_left).max(0.0), weight_lbs.min(lbs_left))
        } else {
            (weight_lbs, 0.0)
        };

        ChargeInstruction {
            billable_lbs,
            allowance_consumed,
            amount_due_cents: (billable_lbs * self.pricing.unit_price_cents_per_lb as f64).round()
                as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suds_shared::PlanTier;
    use time::OffsetDateTime;

    fn subscription_with(lbs_left: f64) -> Subscription {
        let now = OffsetDateTime::now_utc();
        Subscription {
            provider_subscription_id: "sub_1".to_string(),
            plan: PlanTier::Standard,
            status: "active".to_string(),
            lbs_left,
            anchor_date: now,
            start_date: now,
            period_start: now,
            period_end: now,
        }
    }

    #[test]
    fn allowance_covers_the_whole_load() {
        let engine = MeteringEngine::default();
        let sub = subscription_with(48.0);
        let charge = engine.compute_charge(30.0, Some(&sub));
        assert_eq!(charge.amount_due_cents, 0);
        assert_eq!(charge.billable_lbs, 0.0);
        assert_eq!(charge.allowance_consumed, 30.0);
    }

    #[test]
    fn no_subscription_bills_full_weight() {
        let engine = MeteringEngine::default();
        let charge = engine.compute_charge(20.0, None);
        assert_eq!(charge.amount_due_cents, 3000);
        assert_eq!(charge.billable_lbs, 20.0);
        assert_eq!(charge.allowance_consumed, 0.0);
    }

    #[test]
    fn partial_allowance_bills_the_remainder() {
        let engine = MeteringEngine::default();
        let sub = subscription_with(10.0);
        let charge = engine.compute_charge(25.0, Some(&sub));
        assert_eq!(charge.billable_lbs, 15.0);
        assert_eq!(charge.allowance_consumed, 10.0);
        assert_eq!(charge.amount_due_cents, 2250);
    }

    #[test]
    fn exhausted_allowance_consumes_nothing() {
        let engine = MeteringEngine::default();
        let sub = subscription_with(0.0);
        let charge = engine.compute_charge(12.0, Some(&sub));
        assert_eq!(charge.allowance_consumed, 0.0);
        assert_eq!(charge.amount_due_cents, 1800);
    }

    #[test]
    fn fractional_weight_rounds_to_the_nearest_cent() {
        let engine = MeteringEngine::default();
        let charge = engine.compute_charge(10.333, None);
        assert_eq!(charge.amount_due_cents, 1550);
    }
}
