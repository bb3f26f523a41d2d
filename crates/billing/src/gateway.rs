//! Payment provider gateway
//!
//! One trait covers every provider call the billing services make, so
//! tests can swap in a double and the Stripe wire format stays in one
//! file. `StripeGateway` talks to the form-encoded REST API directly.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::StripeConfig;
use crate::error::{BillingError, BillingResult};

/// Setup intent handed to the client for card collection
#[derive(Debug, Clone)]
pub struct SetupIntent {
    pub id: String,
    pub client_secret: String,
}

/// Hosted checkout session
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Hosted billing portal session
#[derive(Debug, Clone)]
pub struct PortalSession {
    pub url: String,
}

/// Subscription as reported by the provider
#[derive(Debug, Clone)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: String,
    pub price_id: String,
    pub status: String,
    /// Unix timestamps, straight off the wire
    pub billing_cycle_anchor: i64,
    pub start_date: i64,
    pub current_period_start: i64,
    pub current_period_end: i64,
}

/// Card summary for the on-file payment method
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
}

/// Everything the billing services need from the payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer record, returning its id
    async fn create_customer(&self, email: &str) -> BillingResult<String>;

    async fn create_setup_intent(&self, customer_id: &str) -> BillingResult<SetupIntent>;

    /// Subscription-mode hosted checkout for one price
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> BillingResult<CheckoutSession>;

    /// Charge the on-file payment method off-session, confirming
    /// immediately. Returns the payment intent id. Declines surface as
    /// [`BillingError::PaymentDeclined`].
    async fn charge(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        amount_cents: i64,
    ) -> BillingResult<String>;

    async fn detach_payment_method(&self, payment_method_id: &str) -> BillingResult<()>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> BillingResult<PortalSession>;

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> BillingResult<ProviderSubscription>;

    async fn retrieve_payment_method(&self, payment_method_id: &str)
        -> BillingResult<CardDetails>;
}

/// Direct client for the Stripe REST API
#[derive(Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn post_form(&self, path: &str, params: &[(&str, String)]) -> BillingResult<Value> {
        let response = self
            .http
            .post(format!("{}{path}", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(params)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;
        Self::into_body(response).await
    }

    async fn get_json(&self, path: &str) -> BillingResult<Value> {
        let response = self
            .http
            .get(format!("{}{path}", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;
        Self::into_body(response).await
    }

    async fn into_body(response: reqwest::Response) -> BillingResult<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(BillingError::Provider(error_message(&body)))
        }
    }

    fn require_str(value: &Value, field: &str) -> BillingResult<String> {
        value[field]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BillingError::Provider(format!("response missing field: {field}")))
    }

    fn require_i64(value: &Value, field: &str) -> BillingResult<i64> {
        value[field]
            .as_i64()
            .ok_or_else(|| BillingError::Provider(format!("response missing field: {field}")))
    }
}

/// Best-effort message from a Stripe error body
fn error_message(body: &Value) -> String {
    body["error"]["message"]
        .as_str()
        .or_else(|| body["error"]["code"].as_str())
        .unwrap_or("unexpected provider response")
        .to_string()
}

/// Decline reason for a failed payment intent: the error code when
/// present (card_declined, authentication_required, ...), message
/// otherwise
fn decline_reason(body: &Value) -> String {
    body["error"]["code"]
        .as_str()
        .or_else(|| body["error"]["message"].as_str())
        .unwrap_or("card_declined")
        .to_string()
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(&self, email: &str) -> BillingResult<String> {
        let body = self
            .post_form("/v1/customers", &[("email", email.to_string())])
            .await?;
        Self::require_str(&body, "id")
    }

    async fn create_setup_intent(&self, customer_id: &str) -> BillingResult<SetupIntent> {
        let body = self
            .post_form(
                "/v1/setup_intents",
                &[("customer", customer_id.to_string())],
            )
            .await?;
        Ok(SetupIntent {
            id: Self::require_str(&body, "id")?,
            client_secret: Self::require_str(&body, "client_secret")?,
        })
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> BillingResult<CheckoutSession> {
        let params = [
            ("mode", "subscription".to_string()),
            ("customer", customer_id.to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
        ];
        let body = self.post_form("/v1/checkout/sessions", &params).await?;
        Ok(CheckoutSession {
            id: Self::require_str(&body, "id")?,
            url: body["url"].as_str().map(str::to_string),
        })
    }

    async fn charge(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        amount_cents: i64,
    ) -> BillingResult<String> {
        let params = [
            ("amount", amount_cents.to_string()),
            ("currency", "usd".to_string()),
            ("customer", customer_id.to_string()),
            ("payment_method", payment_method_id.to_string()),
            ("off_session", "true".to_string()),
            ("confirm", "true".to_string()),
        ];
        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        if status.is_success() {
            return Self::require_str(&body, "id");
        }

        // 402 carries the decline; anything else is a provider fault
        if status == reqwest::StatusCode::PAYMENT_REQUIRED
            || body["error"]["type"].as_str() == Some("card_error")
        {
            Err(BillingError::PaymentDeclined {
                reason: decline_reason(&body),
            })
        } else {
            Err(BillingError::Provider(error_message(&body)))
        }
    }

    async fn detach_payment_method(&self, payment_method_id: &str) -> BillingResult<()> {
        self.post_form(&format!("/v1/payment_methods/{payment_method_id}/detach"), &[])
            .await?;
        Ok(())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> BillingResult<PortalSession> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];
        let body = self.post_form("/v1/billing_portal/sessions", &params).await?;
        Ok(PortalSession {
            url: Self::require_str(&body, "url")?,
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> BillingResult<ProviderSubscription> {
        let body = self
            .get_json(&format!("/v1/subscriptions/{subscription_id}"))
            .await?;

        // Legacy `plan.id`, with the items list as fallback
        let price_id = body["plan"]["id"]
            .as_str()
            .or_else(|| body["items"]["data"][0]["price"]["id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                BillingError::Provider("subscription has no resolvable price".to_string())
            })?;

        Ok(ProviderSubscription {
            id: Self::require_str(&body, "id")?,
            customer_id: Self::require_str(&body, "customer")?,
            price_id,
            status: Self::require_str(&body, "status")?,
            billing_cycle_anchor: Self::require_i64(&body, "billing_cycle_anchor")?,
            start_date: Self::require_i64(&body, "start_date")?,
            current_period_start: Self::require_i64(&body, "current_period_start")?,
            current_period_end: Self::require_i64(&body, "current_period_end")?,
        })
    }

    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> BillingResult<CardDetails> {
        let body = self
            .get_json(&format!("/v1/payment_methods/{payment_method_id}"))
            .await?;
        let card = &body["card"];
        Ok(CardDetails {
            brand: Self::require_str(card, "brand")?,
            last4: Self::require_str(card, "last4")?,
            exp_month: Self::require_i64(card, "exp_month")? as u8,
            exp_year: Self::require_i64(card, "exp_year")? as u16,
        })
    }
}
