//! Stripe configuration
//!
//! All provider credentials and price ids come from the environment.
//! The price-id-to-tier mapping is the provider-facing side of the
//! plan table; the allowance side lives on [`PlanTier`].

use suds_shared::PlanTier;

use crate::error::{BillingError, BillingResult};

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Per-tier Stripe price identifiers
#[derive(Debug, Clone)]
pub struct PriceIds {
    pub student: String,
    pub standard: String,
    pub plus: String,
    pub family: String,
}

/// Stripe configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Webhook endpoint secret. When unset, webhook signatures are not
    /// checked (local development only).
    pub webhook_secret: Option<String>,
    pub price_ids: PriceIds,
    /// Where checkout redirects after success / cancellation
    pub success_url: String,
    pub cancel_url: String,
    /// Where the billing portal sends the customer back
    pub portal_return_url: String,
    /// Override for tests; production uses the public API host
    pub api_base: String,
}

impl StripeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let require = |key: &str| {
            std::env::var(key).map_err(|_| BillingError::Config(format!("{key} is not set")))
        };

        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            secret_key: require("STRIPE_SECRET")?,
            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
            price_ids: PriceIds {
                student: require("STRIPE_STUDENT_PRICE_ID")?,
                standard: require("STRIPE_STANDARD_PRICE_ID")?,
                plus: require("STRIPE_PLUS_PRICE_ID")?,
                family: require("STRIPE_FAMILY_PRICE_ID")?,
            },
            success_url: format!("{base_url}/subscribe/success"),
            cancel_url: format!("{base_url}/subscribe"),
            portal_return_url: format!("{base_url}/account"),
            api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        })
    }

    pub fn price_for_tier(&self, tier: PlanTier) -> &str {
        match tier {
            PlanTier::Student => &self.price_ids.student,
            PlanTier::Standard => &self.price_ids.standard,
            PlanTier::Plus => &self.price_ids.plus,
            PlanTier::Family => &self.price_ids.family,
        }
    }

    /// Reverse lookup used by webhook sync
    pub fn tier_for_price(&self, price_id: &str) -> Option<PlanTier> {
        PlanTier::ALL
            .into_iter()
            .find(|tier| self.price_for_tier(*tier) == price_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> StripeConfig {
        StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: None,
            price_ids: PriceIds {
                student: "price_student".to_string(),
                standard: "price_standard".to_string(),
                plus: "price_plus".to_string(),
                family: "price_family".to_string(),
            },
            success_url: "http://localhost:3000/subscribe/success".to_string(),
            cancel_url: "http://localhost:3000/subscribe".to_string(),
            portal_return_url: "http://localhost:3000/account".to_string(),
            api_base: "http://localhost:9".to_string(),
        }
    }

    #[test]
    fn price_lookup_round_trips() {
        let config = test_config();
        for tier in PlanTier::ALL {
            assert_eq!(config.tier_for_price(config.price_for_tier(tier)), Some(tier));
        }
        assert_eq!(config.tier_for_price("price_unknown"), None);
    }
}
