//! Status catalog
//!
//! The single definition of the eight order statuses and the legal
//! transitions between them. Every consumer (state machine, query
//! service, API) goes through this table; there is no per-view switch
//! on raw status integers anywhere else.

use serde::{Deserialize, Serialize};

use crate::models::ActorRole;

/// Canonical order status, integer-tagged for wire stability.
///
/// `Completed(8)` is deliberately absent: washer-facing history views
/// report 8 as a projection of `DeliveredToUser`, never as a stored
/// value. See [`OrderStatus::display_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OrderStatus {
    /// 0: order just placed by the customer
    Placed,
    /// 1: driver accepted the pickup leg
    DriverAcceptedPickup,
    /// 2: weight entered (charge cycle completed)
    WeightEntered,
    /// 3: load dropped off at the washer
    DroppedAtWasher,
    /// 4: washer finished the load
    WashComplete,
    /// 5: driver accepted the dropoff leg
    DriverAcceptedDropoff,
    /// 6: delivered back to the customer
    DeliveredToUser,
    /// 7: cancelled (terminal, never exited)
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Placed,
        OrderStatus::DriverAcceptedPickup,
        OrderStatus::WeightEntered,
        OrderStatus::DroppedAtWasher,
        OrderStatus::WashComplete,
        OrderStatus::DriverAcceptedDropoff,
        OrderStatus::DeliveredToUser,
        OrderStatus::Cancelled,
    ];

    /// Display code reported for washer-facing history: a delivered
    /// order shows as 8 ("completed") there, its stored code elsewhere.
    pub const COMPLETED_PROJECTION: u8 = 8;

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        OrderStatus::ALL.get(code as usize).copied()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::DeliveredToUser | OrderStatus::Cancelled)
    }

    /// Whether a cancellation edge exists from this status
    pub fn is_cancellable(&self) -> bool {
        CANCELLABLE.contains(self)
    }

    /// Wire code for a read view, applying the washer-history
    /// completed projection.
    pub fn display_code(&self, role: ActorRole, group: StatusGroup) -> u8 {
        if *self == OrderStatus::DeliveredToUser
            && role == ActorRole::Washer
            && group == StatusGroup::History
        {
            Self::COMPLETED_PROJECTION
        } else {
            self.code()
        }
    }
}

impl From<OrderStatus> for u8 {
    fn from(status: OrderStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for OrderStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        OrderStatus::from_code(code).ok_or_else(|| format!("unknown order status code: {code}"))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderStatus::Placed => "placed",
            OrderStatus::DriverAcceptedPickup => "driver_accepted_pickup",
            OrderStatus::WeightEntered => "weight_entered",
            OrderStatus::DroppedAtWasher => "dropped_at_washer",
            OrderStatus::WashComplete => "wash_complete",
            OrderStatus::DriverAcceptedDropoff => "driver_accepted_dropoff",
            OrderStatus::DeliveredToUser => "delivered_to_user",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Actor action that drives a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionAction {
    AcceptPickup,
    EnterWeight,
    DropAtWasher,
    CompleteWash,
    AcceptDropoff,
    Deliver,
    Cancel,
}

impl TransitionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionAction::AcceptPickup => "acceptPickup",
            TransitionAction::EnterWeight => "enterWeight",
            TransitionAction::DropAtWasher => "dropAtWasher",
            TransitionAction::CompleteWash => "completeWash",
            TransitionAction::AcceptDropoff => "acceptDropoff",
            TransitionAction::Deliver => "deliver",
            TransitionAction::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One legal edge in the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEdge {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub role: ActorRole,
    pub action: TransitionAction,
}

/// Statuses a cancellation is legal from. Later statuses are past the
/// point of no return (the load is already being washed).
pub const CANCELLABLE: [OrderStatus; 3] = [
    OrderStatus::Placed,
    OrderStatus::DriverAcceptedPickup,
    OrderStatus::WeightEntered,
];

/// The full legal-edge set. Cancellation edges are authorized for the
/// owning customer; the state machine additionally grants admins the
/// same edges.
pub const TRANSITIONS: [TransitionEdge; 9] = [
    TransitionEdge {
        from: OrderStatus::Placed,
        to: OrderStatus::DriverAcceptedPickup,
        role: ActorRole::Driver,
        action: TransitionAction::AcceptPickup,
    },
    TransitionEdge {
        from: OrderStatus::DriverAcceptedPickup,
        to: OrderStatus::WeightEntered,
        role: ActorRole::Driver,
        action: TransitionAction::EnterWeight,
    },
    TransitionEdge {
        from: OrderStatus::WeightEntered,
        to: OrderStatus::DroppedAtWasher,
        role: ActorRole::Driver,
        action: TransitionAction::DropAtWasher,
    },
    TransitionEdge {
        from: OrderStatus::DroppedAtWasher,
        to: OrderStatus::WashComplete,
        role: ActorRole::Washer,
        action: TransitionAction::CompleteWash,
    },
    TransitionEdge {
        from: OrderStatus::WashComplete,
        to: OrderStatus::DriverAcceptedDropoff,
        role: ActorRole::Driver,
        action: TransitionAction::AcceptDropoff,
    },
    TransitionEdge {
        from: OrderStatus::DriverAcceptedDropoff,
        to: OrderStatus::DeliveredToUser,
        role: ActorRole::Driver,
        action: TransitionAction::Deliver,
    },
    TransitionEdge {
        from: OrderStatus::Placed,
        to: OrderStatus::Cancelled,
        role: ActorRole::Customer,
        action: TransitionAction::Cancel,
    },
    TransitionEdge {
        from: OrderStatus::DriverAcceptedPickup,
        to: OrderStatus::Cancelled,
        role: ActorRole::Customer,
        action: TransitionAction::Cancel,
    },
    TransitionEdge {
        from: OrderStatus::WeightEntered,
        to: OrderStatus::Cancelled,
        role: ActorRole::Customer,
        action: TransitionAction::Cancel,
    },
];

/// Look up the edge for an action from a given status
pub fn edge_for(action: TransitionAction, from: OrderStatus) -> Option<&'static TransitionEdge> {
    TRANSITIONS
        .iter()
        .find(|e| e.action == action && e.from == from)
}

/// Named status set backing a dashboard view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusGroup {
    /// Orders a driver can pick up work from: fresh (0) and washed (4)
    DriverAvailable,
    /// Legs this driver has accepted and not finished: {1, 2, 5}
    DriverAccepted,
    /// Loads in a washer's hands: {2, 3}
    WasherActive,
    /// Terminal orders: {6, 7}, with the completed-8 projection for washers
    History,
    /// Everything a customer still has in flight: {0..=5}
    UserActive,
}

impl StatusGroup {
    pub fn members(&self) -> &'static [OrderStatus] {
        match self {
            StatusGroup::DriverAvailable => &[OrderStatus::Placed, OrderStatus::WashComplete],
            StatusGroup::DriverAccepted => &[
                OrderStatus::DriverAcceptedPickup,
                OrderStatus::WeightEntered,
                OrderStatus::DriverAcceptedDropoff,
            ],
            StatusGroup::WasherActive => {
                &[OrderStatus::WeightEntered, OrderStatus::DroppedAtWasher]
            }
            StatusGroup::History => &[OrderStatus::DeliveredToUser, OrderStatus::Cancelled],
            StatusGroup::UserActive => &[
                OrderStatus::Placed,
                OrderStatus::DriverAcceptedPickup,
                OrderStatus::WeightEntered,
                OrderStatus::DroppedAtWasher,
                OrderStatus::WashComplete,
                OrderStatus::DriverAcceptedDropoff,
            ],
        }
    }

    pub fn contains(&self, status: OrderStatus) -> bool {
        self.members().contains(&status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusGroup::DriverAvailable => "driverAvailable",
            StatusGroup::DriverAccepted => "driverAccepted",
            StatusGroup::WasherActive => "washerActive",
            StatusGroup::History => "history",
            StatusGroup::UserActive => "userActive",
        }
    }
}

impl std::str::FromStr for StatusGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driverAvailable" => Ok(StatusGroup::DriverAvailable),
            "driverAccepted" => Ok(StatusGroup::DriverAccepted),
            "washerActive" => Ok(StatusGroup::WasherActive),
            "history" => Ok(StatusGroup::History),
            "userActive" => Ok(StatusGroup::UserActive),
            other => Err(format!("unknown status group: {other}")),
        }
    }
}

impl std::fmt::Display for StatusGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
