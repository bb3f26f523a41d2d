//! Domain models
//!
//! Orders and users are documents in a keyed store; everything here is
//! plain data. Mutation goes through the orders state machine and the
//! billing reconciler, never through ad-hoc field writes.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::status::OrderStatus;

/// Upper bound on free-text instruction fields (washer notes, address notes)
pub const INSTRUCTION_MAX_CHARS: usize = 200;

/// Role of the actor behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Customer,
    Driver,
    Washer,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Driver => "driver",
            ActorRole::Washer => "washer",
            ActorRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(ActorRole::Customer),
            "driver" => Ok(ActorRole::Driver),
            "washer" => Ok(ActorRole::Washer),
            "admin" => Ok(ActorRole::Admin),
            other => Err(format!("unknown actor role: {other}")),
        }
    }
}

/// Identity attached to every incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub email: String,
    pub role: ActorRole,
}

impl ActorContext {
    pub fn new(email: impl Into<String>, role: ActorRole) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }
}

/// Subscription plan tier
///
/// The tier-to-allowance table lives here and nowhere else; checkout
/// price resolution and webhook sync both consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanTier {
    Student,
    Standard,
    Plus,
    Family,
}

impl PlanTier {
    pub const ALL: [PlanTier; 4] = [
        PlanTier::Student,
        PlanTier::Standard,
        PlanTier::Plus,
        PlanTier::Family,
    ];

    /// Prepaid pounds included per billing period
    pub fn allowance_lbs(&self) -> f64 {
        match self {
            PlanTier::Student => 40.0,
            PlanTier::Standard => 48.0,
            PlanTier::Plus => 66.0,
            PlanTier::Family => 84.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Student => "Student",
            PlanTier::Standard => "Standard",
            PlanTier::Plus => "Plus",
            PlanTier::Family => "Family",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Student" => Ok(PlanTier::Student),
            "Standard" => Ok(PlanTier::Standard),
            "Plus" => Ok(PlanTier::Plus),
            "Family" => Ok(PlanTier::Family),
            other => Err(format!("unknown plan tier: {other}")),
        }
    }
}

/// Subscription snapshot embedded in the user document
///
/// Replaced wholesale by webhook sync; `lbs_left` is the only field the
/// reconciler ever decrements, and it never goes negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Provider-side subscription identifier
    pub provider_subscription_id: String,
    pub plan: PlanTier,
    /// Provider-reported status string ("active", "past_due", ...)
    pub status: String,
    /// Remaining prepaid allowance for the current period, in [0, plan allowance]
    pub lbs_left: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub anchor_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
}

/// User document
///
/// Keyed by email. The Stripe customer id is the secondary lookup key
/// for webhook sync; the payment method is a single replaceable
/// provider-owned reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    /// Stripe customer identifier
    pub customer_id: String,
    /// On-file payment method, if one has been set up
    pub payment_method_id: Option<String>,
    pub subscription: Option<Subscription>,
}

impl User {
    pub fn new(email: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            customer_id: customer_id.into(),
            payment_method_id: None,
            subscription: None,
        }
    }
}

/// Load preference flags chosen at order placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub scented: bool,
    pub delicates: bool,
    pub separate: bool,
    pub towels_sheets: bool,
}

/// One leg of the order (pickup or dropoff)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegInfo {
    pub address: String,
    /// "MM/DD/YYYY" as scheduled by the customer
    pub date: String,
    /// "HH:MM" local 24h time as scheduled by the customer
    pub time: String,
    /// Driver who accepted this leg
    pub driver_email: Option<String>,
}

/// Actor + timestamp recorded at each committed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub status: OrderStatus,
    pub actor_email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

/// Order document
///
/// Never physically deleted; terminal orders are retained for history
/// views. Status only moves along the transition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Owning customer (foreign key into the user store)
    pub customer_email: String,
    pub status: OrderStatus,
    /// Measured weight in pounds; None until the weigh-in commits
    pub weight_lbs: Option<f64>,
    /// Charged amount in cents; None until charged (0 for deduction-only)
    pub cost_cents: Option<i64>,
    pub pickup: LegInfo,
    pub dropoff: LegInfo,
    /// Washer who took the load at dropoff
    pub washer_email: Option<String>,
    pub preferences: Preferences,
    /// Free-text washer notes, bounded to INSTRUCTION_MAX_CHARS
    pub washer_instructions: String,
    /// Free-text address/access notes, bounded to INSTRUCTION_MAX_CHARS
    pub address_instructions: String,
    #[serde(with = "time::serde::rfc3339")]
    pub placed_at: OffsetDateTime,
    pub transitions: Vec<TransitionRecord>,
}

impl Order {
    /// Driver assigned to either leg, if any
    pub fn assigned_driver(&self) -> Option<&str> {
        self.dropoff
            .driver_email
            .as_deref()
            .or(self.pickup.driver_email.as_deref())
    }
}

/// Input to order intake
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub address: String,
    pub pickup_date: String,
    pub pickup_time: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub washer_instructions: String,
    #[serde(default)]
    pub address_instructions: String,
}
