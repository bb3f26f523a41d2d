// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge case tests for metering, reconciliation, and webhook sync

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::OffsetDateTime;

use suds_orders::{WeighInError, WeighInProcessor};
use suds_shared::store::{StoreError, StoreResult, UserStore};
use suds_shared::{MemoryStore, PlanTier, Subscription, User};

use crate::config::{PriceIds, StripeConfig};
use crate::error::{BillingError, BillingResult};
use crate::gateway::{
    CardDetails, CheckoutSession, PaymentGateway, PortalSession, ProviderSubscription, SetupIntent,
};
use crate::metering::MeteringEngine;
use crate::reconciler::BillingReconciler;
use crate::subscriptions::SubscriptionSync;
use crate::webhooks::{WebhookDisposition, WebhookHandler};
use crate::customer::CustomerService;
use crate::checkout::CheckoutService;

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct MockGateway {
    /// (customer_id, payment_method_id, amount_cents) per charge call
    charges: Mutex<Vec<(String, String, i64)>>,
    decline_with: Option<String>,
    detach_fails: bool,
    detach_calls: AtomicUsize,
    customers_created: AtomicUsize,
    subscriptions: HashMap<String, ProviderSubscription>,
}

impl MockGateway {
    fn charging() -> Self {
        Self::default()
    }

    fn declining(code: &str) -> Self {
        Self {
            decline_with: Some(code.to_string()),
            ..Self::default()
        }
    }

    fn with_subscription(mut self, sub: ProviderSubscription) -> Self {
        self.subscriptions.insert(sub.id.clone(), sub);
        self
    }

    fn charge_log(&self) -> Vec<(String, String, i64)> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_customer(&self, email: &str) -> BillingResult<String> {
        self.customers_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cus_{email}"))
    }

    async fn create_setup_intent(&self, customer_id: &str) -> BillingResult<SetupIntent> {
        Ok(SetupIntent {
            id: "seti_1".to_string(),
            client_secret: format!("seti_secret_{customer_id}"),
        })
    }

    async fn create_checkout_session(
        &self,
        _customer_id: &str,
        price_id: &str,
        _success_url: &str,
        _cancel_url: &str,
    ) -> BillingResult<CheckoutSession> {
        Ok(CheckoutSession {
            id: format!("cs_{price_id}"),
            url: Some("https://checkout.example/session".to_string()),
        })
    }

    async fn charge(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        amount_cents: i64,
    ) -> BillingResult<String> {
        if let Some(reason) = &self.decline_with {
            return Err(BillingError::PaymentDeclined {
                reason: reason.clone(),
            });
        }
        self.charges.lock().unwrap().push((
            customer_id.to_string(),
            payment_method_id.to_string(),
            amount_cents,
        ));
        Ok("pi_test".to_string())
    }

    async fn detach_payment_method(&self, _payment_method_id: &str) -> BillingResult<()> {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        if self.detach_fails {
            Err(BillingError::Provider("detach failed".to_string()))
        } else {
            Ok(())
        }
    }

    async fn create_portal_session(
        &self,
        _customer_id: &str,
        return_url: &str,
    ) -> BillingResult<PortalSession> {
        Ok(PortalSession {
            url: format!("https://portal.example/?return={return_url}"),
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> BillingResult<ProviderSubscription> {
        self.subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| BillingError::Provider(format!("no such subscription: {subscription_id}")))
    }

    async fn retrieve_payment_method(
        &self,
        _payment_method_id: &str,
    ) -> BillingResult<CardDetails> {
        Ok(CardDetails {
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2030,
        })
    }
}

/// Delegates reads to a `MemoryStore` but fails every subscription
/// write, for exercising the deduction-shortfall path.
struct FlakySubscriptionStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl UserStore for FlakySubscriptionStore {
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.get_by_email(email).await
    }

    async fn get_by_customer_id(&self, customer_id: &str) -> StoreResult<Option<User>> {
        self.inner.get_by_customer_id(customer_id).await
    }

    async fn upsert(&self, user: User) -> StoreResult<()> {
        self.inner.upsert(user).await
    }

    async fn set_subscription_by_customer_id(
        &self,
        _customer_id: &str,
        _subscription: Subscription,
    ) -> StoreResult<bool> {
        Err(StoreError("subscription write failed".to_string()))
    }

    async fn set_subscription(
        &self,
        _email: &str,
        _subscription: Subscription,
    ) -> StoreResult<bool> {
        Err(StoreError("subscription write failed".to_string()))
    }

    async fn set_payment_method(
        &self,
        email: &str,
        payment_method_id: String,
    ) -> StoreResult<Option<String>> {
        self.inner.set_payment_method(email, payment_method_id).await
    }
}

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

fn subscription_with(plan: PlanTier, lbs_left: f64) -> Subscription {
    let now = OffsetDateTime::now_utc();
    Subscription {
        provider_subscription_id: "sub_1".to_string(),
        plan,
        status: "active".to_string(),
        lbs_left,
        anchor_date: now,
        start_date: now,
        period_start: now,
        period_end: now,
    }
}

fn provider_subscription(id: &str, customer_id: &str, price_id: &str) -> ProviderSubscription {
    ProviderSubscription {
        id: id.to_string(),
        customer_id: customer_id.to_string(),
        price_id: price_id.to_string(),
        status: "active".to_string(),
        billing_cycle_anchor: 1_767_225_600,
        start_date: 1_767_225_600,
        current_period_start: 1_767_225_600,
        current_period_end: 1_769_904_000,
    }
}

async fn seed_user(store: &MemoryStore, subscription: Option<Subscription>) -> User {
    let mut user = User::new("cust@example.com", "cus_1");
    user.payment_method_id = Some("pm_1".to_string());
    user.subscription = subscription;
    store.upsert(user.clone()).await.unwrap();
    user
}

fn reconciler_with(
    gateway: Arc<MockGateway>,
    store: Arc<MemoryStore>,
) -> BillingReconciler {
    BillingReconciler::new(gateway, store, MeteringEngine::default())
}

fn sign(payload: &str, secret: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

// ============================================================================
// Reconciliation: allowance vs. overage
// ============================================================================

#[tokio::test]
async fn allowance_covers_load_without_charging() {
    let store = MemoryStore::shared();
    seed_user(&store, Some(subscription_with(PlanTier::Standard, 48.0))).await;
    let gateway = Arc::new(MockGateway::charging());
    let reconciler = reconciler_with(gateway.clone(), store.clone());

    let cost = reconciler
        .charge_and_deduct("cust@example.com", 30.0)
        .await
        .unwrap();

    assert_eq!(cost, 0);
    assert!(gateway.charge_log().is_empty());
    let user = store.get_by_email("cust@example.com").await.unwrap().unwrap();
    assert_eq!(user.subscription.unwrap().lbs_left, 18.0);
}

#[tokio::test]
async fn no_subscription_charges_full_weight() {
    let store = MemoryStore::shared();
    seed_user(&store, None).await;
    let gateway = Arc::new(MockGateway::charging());
    let reconciler = reconciler_with(gateway.clone(), store.clone());

    let cost = reconciler
        .charge_and_deduct("cust@example.com", 20.0)
        .await
        .unwrap();

    assert_eq!(cost, 3000);
    assert_eq!(
        gateway.charge_log(),
        vec![("cus_1".to_string(), "pm_1".to_string(), 3000)]
    );
}

#[tokio::test]
async fn partial_allowance_charges_remainder_and_floors_at_zero() {
    let store = MemoryStore::shared();
    seed_user(&store, Some(subscription_with(PlanTier::Standard, 10.0))).await;
    let gateway = Arc::new(MockGateway::charging());
    let reconciler = reconciler_with(gateway.clone(), store.clone());

    let cost = reconciler
        .charge_and_deduct("cust@example.com", 25.0)
        .await
        .unwrap();

    assert_eq!(cost, 2250);
    let user = store.get_by_email("cust@example.com").await.unwrap().unwrap();
    assert_eq!(user.subscription.unwrap().lbs_left, 0.0);
}

#[tokio::test]
async fn declined_charge_leaves_allowance_untouched() {
    let store = MemoryStore::shared();
    seed_user(&store, Some(subscription_with(PlanTier::Standard, 10.0))).await;
    let gateway = Arc::new(MockGateway::declining("card_declined"));
    let reconciler = reconciler_with(gateway, store.clone());

    let err = reconciler
        .charge_and_deduct("cust@example.com", 25.0)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::PaymentDeclined { .. }));

    // No deduction happened
    let user = store.get_by_email("cust@example.com").await.unwrap().unwrap();
    assert_eq!(user.subscription.unwrap().lbs_left, 10.0);
}

#[tokio::test]
async fn missing_payment_method_blocks_overage_charge() {
    let store = MemoryStore::shared();
    let mut user = User::new("cust@example.com", "cus_1");
    user.subscription = Some(subscription_with(PlanTier::Standard, 5.0));
    store.upsert(user).await.unwrap();
    let reconciler = reconciler_with(Arc::new(MockGateway::charging()), store.clone());

    let err = reconciler
        .charge_and_deduct("cust@example.com", 25.0)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::MissingPaymentMethod));
}

#[tokio::test]
async fn covered_load_needs_no_payment_method() {
    let store = MemoryStore::shared();
    let mut user = User::new("cust@example.com", "cus_1");
    user.subscription = Some(subscription_with(PlanTier::Family, 84.0));
    store.upsert(user).await.unwrap();
    let reconciler = reconciler_with(Arc::new(MockGateway::charging()), store.clone());

    let cost = reconciler
        .charge_and_deduct("cust@example.com", 30.0)
        .await
        .unwrap();
    assert_eq!(cost, 0);
}

#[tokio::test]
async fn deduction_failure_after_charge_still_succeeds() {
    let inner = MemoryStore::shared();
    seed_user(&inner, Some(subscription_with(PlanTier::Standard, 10.0))).await;
    let store = Arc::new(FlakySubscriptionStore {
        inner: inner.clone(),
    });
    let gateway = Arc::new(MockGateway::charging());
    let reconciler = BillingReconciler::new(gateway.clone(), store, MeteringEngine::default());

    // The charge settled, so the weigh-in succeeds; the failed
    // deduction is a logged shortfall, not an error.
    let cost = reconciler
        .charge_and_deduct("cust@example.com", 25.0)
        .await
        .unwrap();

    assert_eq!(cost, 2250);
    assert_eq!(
        gateway.charge_log(),
        vec![("cus_1".to_string(), "pm_1".to_string(), 2250)]
    );

    // The allowance in the backing store is left as it was
    let user = inner.get_by_email("cust@example.com").await.unwrap().unwrap();
    assert_eq!(user.subscription.unwrap().lbs_left, 10.0);
}

#[tokio::test]
async fn unknown_customer_maps_to_weigh_in_not_found() {
    let store = MemoryStore::shared();
    let reconciler = reconciler_with(Arc::new(MockGateway::charging()), store);

    let err = reconciler
        .process("ghost@example.com", 10.0)
        .await
        .unwrap_err();
    assert!(matches!(err, WeighInError::CustomerNotFound(_)));
}

#[tokio::test]
async fn decline_maps_through_the_weigh_in_seam() {
    let store = MemoryStore::shared();
    seed_user(&store, None).await;
    let reconciler = reconciler_with(
        Arc::new(MockGateway::declining("authentication_required")),
        store,
    );

    let err = reconciler.process("cust@example.com", 10.0).await.unwrap_err();
    match err {
        WeighInError::PaymentDeclined { reason } => {
            assert_eq!(reason, "authentication_required");
        }
        other => panic!("expected decline, got {other:?}"),
    }
}

// ============================================================================
// Webhook sync
// ============================================================================

#[tokio::test]
async fn paid_invoice_replaces_subscription_snapshot() {
    let store = MemoryStore::shared();
    seed_user(&store, Some(subscription_with(PlanTier::Student, 3.0))).await;
    let gateway = Arc::new(
        MockGateway::charging()
            .with_subscription(provider_subscription("sub_9", "cus_1", "price_plus")),
    );
    let handler = WebhookHandler::new(
        SubscriptionSync::new(gateway, store.clone(), test_config()),
        test_config(),
    );

    let payload = r#"{"id": "evt_1", "type": "invoice.payment_succeeded",
        "data": {"object": {"subscription": "sub_9"}}}"#;
    let event = handler.verify_event(payload, None).unwrap();
    let disposition = handler.handle_event(event).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::Processed);

    let sub = store
        .get_by_email("cust@example.com")
        .await
        .unwrap()
        .unwrap()
        .subscription
        .unwrap();
    assert_eq!(sub.plan, PlanTier::Plus);
    assert_eq!(sub.lbs_left, 66.0);
    assert_eq!(sub.provider_subscription_id, "sub_9");
}

#[tokio::test]
async fn replayed_invoice_event_is_idempotent() {
    let store = MemoryStore::shared();
    seed_user(&store, None).await;
    let gateway = Arc::new(
        MockGateway::charging()
            .with_subscription(provider_subscription("sub_9", "cus_1", "price_family")),
    );
    let handler = WebhookHandler::new(
        SubscriptionSync::new(gateway, store.clone(), test_config()),
        test_config(),
    );

    let payload = r#"{"id": "evt_1", "type": "invoice.payment_succeeded",
        "data": {"object": {"subscription": "sub_9"}}}"#;
    for _ in 0..3 {
        let event = handler.verify_event(payload, None).unwrap();
        handler.handle_event(event).await.unwrap();
    }

    let sub = store
        .get_by_email("cust@example.com")
        .await
        .unwrap()
        .unwrap()
        .subscription
        .unwrap();
    assert_eq!(sub.lbs_left, 84.0);
}

#[tokio::test]
async fn invoice_for_unknown_customer_fails_sync() {
    let store = MemoryStore::shared();
    let gateway = Arc::new(
        MockGateway::charging()
            .with_subscription(provider_subscription("sub_9", "cus_nobody", "price_plus")),
    );
    let handler = WebhookHandler::new(
        SubscriptionSync::new(gateway, store, test_config()),
        test_config(),
    );

    let payload = r#"{"type": "invoice.payment_succeeded",
        "data": {"object": {"subscription": "sub_9"}}}"#;
    let event = handler.verify_event(payload, None).unwrap();
    let err = handler.handle_event(event).await.unwrap_err();
    assert!(matches!(err, BillingError::NotFound(_)));
}

#[tokio::test]
async fn unknown_price_fails_sync() {
    let store = MemoryStore::shared();
    seed_user(&store, None).await;
    let gateway = Arc::new(
        MockGateway::charging()
            .with_subscription(provider_subscription("sub_9", "cus_1", "price_retired")),
    );
    let handler = WebhookHandler::new(
        SubscriptionSync::new(gateway, store, test_config()),
        test_config(),
    );

    let payload = r#"{"type": "invoice.payment_succeeded",
        "data": {"object": {"subscription": "sub_9"}}}"#;
    let event = handler.verify_event(payload, None).unwrap();
    let err = handler.handle_event(event).await.unwrap_err();
    assert!(matches!(err, BillingError::UnknownPlan(_)));
}

#[tokio::test]
async fn unhandled_event_types_are_ignored() {
    let store = MemoryStore::shared();
    let handler = WebhookHandler::new(
        SubscriptionSync::new(Arc::new(MockGateway::charging()), store, test_config()),
        test_config(),
    );

    let payload = r#"{"type": "customer.created", "data": {"object": {}}}"#;
    let event = handler.verify_event(payload, None).unwrap();
    let disposition = handler.handle_event(event).await.unwrap();
    assert_eq!(
        disposition,
        WebhookDisposition::Ignored {
            event_type: "customer.created".to_string()
        }
    );
}

#[tokio::test]
async fn invoice_event_without_subscription_is_malformed() {
    let store = MemoryStore::shared();
    let handler = WebhookHandler::new(
        SubscriptionSync::new(Arc::new(MockGateway::charging()), store, test_config()),
        test_config(),
    );

    let payload = r#"{"type": "invoice.payment_succeeded", "data": {"object": {}}}"#;
    let event = handler.verify_event(payload, None).unwrap();
    let err = handler.handle_event(event).await.unwrap_err();
    assert!(matches!(err, BillingError::MalformedEvent(_)));
}

#[tokio::test]
async fn configured_secret_enforces_signatures() {
    let mut config = test_config();
    config.webhook_secret = Some("whsec_testsecret".to_string());
    let store = MemoryStore::shared();
    let handler = WebhookHandler::new(
        SubscriptionSync::new(Arc::new(MockGateway::charging()), store, config.clone()),
        config,
    );

    let payload = r#"{"type": "customer.created", "data": {"object": {}}}"#;

    // Missing and forged headers are rejected
    assert!(matches!(
        handler.verify_event(payload, None).unwrap_err(),
        BillingError::WebhookSignatureInvalid
    ));
    assert!(matches!(
        handler
            .verify_event(payload, Some("t=1,v1=deadbeef"))
            .unwrap_err(),
        BillingError::WebhookSignatureInvalid
    ));

    // A valid header passes
    let header = sign(payload, "whsec_testsecret");
    assert!(handler.verify_event(payload, Some(&header)).is_ok());
}

// ============================================================================
// Payment methods and checkout
// ============================================================================

#[tokio::test]
async fn replacing_payment_method_detaches_previous() {
    let store = MemoryStore::shared();
    seed_user(&store, None).await;
    let gateway = Arc::new(MockGateway::charging());
    let service = CustomerService::new(gateway.clone(), store.clone());

    let swap = service
        .replace_payment_method("cust@example.com", "pm_2".to_string())
        .await
        .unwrap();

    assert_eq!(swap.previous, Some("pm_1".to_string()));
    assert!(swap.old_detached);
    assert_eq!(gateway.detach_calls.load(Ordering::SeqCst), 1);
    let user = store.get_by_email("cust@example.com").await.unwrap().unwrap();
    assert_eq!(user.payment_method_id, Some("pm_2".to_string()));
}

#[tokio::test]
async fn failed_detach_still_installs_new_method() {
    let store = MemoryStore::shared();
    seed_user(&store, None).await;
    let gateway = Arc::new(MockGateway {
        detach_fails: true,
        ..MockGateway::default()
    });
    let service = CustomerService::new(gateway, store.clone());

    let swap = service
        .replace_payment_method("cust@example.com", "pm_2".to_string())
        .await
        .unwrap();

    assert!(!swap.old_detached);
    let user = store.get_by_email("cust@example.com").await.unwrap().unwrap();
    assert_eq!(user.payment_method_id, Some("pm_2".to_string()));
}

#[tokio::test]
async fn first_checkout_creates_the_provider_customer() {
    let store = MemoryStore::shared();
    let gateway = Arc::new(MockGateway::charging());
    let service = CheckoutService::new(gateway.clone(), store.clone(), test_config());

    let response = service
        .create_subscription_checkout("new@example.com", PlanTier::Plus)
        .await
        .unwrap();

    assert_eq!(response.session_id, "cs_price_plus");
    assert_eq!(gateway.customers_created.load(Ordering::SeqCst), 1);
    let user = store.get_by_email("new@example.com").await.unwrap().unwrap();
    assert_eq!(user.customer_id, "cus_new@example.com");

    // Second checkout reuses the stored customer
    service
        .create_subscription_checkout("new@example.com", PlanTier::Plus)
        .await
        .unwrap();
    assert_eq!(gateway.customers_created.load(Ordering::SeqCst), 1);
}
