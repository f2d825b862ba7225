//! Core types for the resource ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for costs, integers for quantities)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Catalog item identifier (owned by the catalog provider)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create new item ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier (owned by the identity provider)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cost-basis valuation method
///
/// Only `WeightedAverage` is implemented. `Fifo` and `Lifo` are accepted in
/// the data model but rejected at mutation time until lot-based costing
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValuationMethod {
    /// Quantity-weighted mean of prior and acquired cost
    WeightedAverage = 1,
    /// First-in-first-out lot consumption (not implemented)
    Fifo = 2,
    /// Last-in-first-out lot consumption (not implemented)
    Lifo = 3,
}

impl fmt::Display for ValuationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValuationMethod::WeightedAverage => "WEIGHTED_AVERAGE",
            ValuationMethod::Fifo => "FIFO",
            ValuationMethod::Lifo => "LIFO",
        };
        write!(f, "{}", s)
    }
}

/// Stock account: one per tracked catalog item
///
/// `quantity_on_hand` is a denormalized running total; the movement log is
/// the audit trail. The two must never diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAccount {
    /// Catalog item this account belongs to
    pub item_id: ItemId,

    /// If false the account is inert: no checks, no movements
    pub tracking_enabled: bool,

    /// Authoritative stock level (never negative while tracking)
    pub quantity_on_hand: i64,

    /// Current weighted-average unit cost
    pub cost_basis_per_unit: Decimal,

    /// Operator alert threshold
    pub low_stock_threshold: i64,

    /// Valuation method for cost-basis recomputation
    pub valuation_method: ValuationMethod,

    /// Next movement sequence number (per-account log ordering)
    pub movement_seq: u64,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl StockAccount {
    /// Create a fresh account for an item
    pub fn new(item_id: ItemId, tracking_enabled: bool) -> Self {
        Self {
            item_id,
            tracking_enabled,
            quantity_on_hand: 0,
            cost_basis_per_unit: Decimal::ZERO,
            low_stock_threshold: 0,
            valuation_method: ValuationMethod::WeightedAverage,
            movement_seq: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Stock movement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MovementKind {
    /// Restock; requires a unit cost and recomputes the cost basis
    Purchase = 1,
    /// Manual correction; additive only
    Adjustment = 2,
    /// Consumption by a fulfilled order
    Sale = 3,
}

impl MovementKind {
    /// Signed contribution of a movement of this kind to quantity on hand
    pub fn signed_delta(&self, quantity: i64) -> i64 {
        match self {
            MovementKind::Purchase | MovementKind::Adjustment => quantity,
            MovementKind::Sale => -quantity,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementKind::Purchase => "PURCHASE",
            MovementKind::Adjustment => "ADJUSTMENT",
            MovementKind::Sale => "SALE",
        };
        write!(f, "{}", s)
    }
}

/// Immutable stock movement (append-only audit record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    /// Unique movement ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Item this movement belongs to
    pub item_id: ItemId,

    /// Movement kind
    pub kind: MovementKind,

    /// Quantity moved (always positive; sign comes from the kind)
    pub quantity: i64,

    /// Unit cost (required for PURCHASE)
    pub unit_cost: Option<Decimal>,

    /// Total cost (quantity x unit cost, when unit cost present)
    pub total_cost: Option<Decimal>,

    /// Free-form operator note
    pub note: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Token account: one per user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAccount {
    /// Account owner
    pub user_id: UserId,

    /// Current balance (sum of all transaction amounts)
    pub balance: i64,

    /// Next transaction sequence number
    pub txn_seq: u64,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl TokenAccount {
    /// Create a fresh zero-balance account
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: 0,
            txn_seq: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Token transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenTxnKind {
    /// Token-pack purchase grant
    Purchase = 1,
    /// Referral bonus
    ReferralBonus = 2,
    /// One-time PRO upgrade bonus
    ProBonus = 3,
    /// Administrative credit
    AdminCredit = 4,
    /// Administrative debit
    AdminDebit = 5,
    /// Spend: order unlock
    UnlockOrder = 6,
    /// Spend: ad suppression
    AdFree = 7,
}

impl TokenTxnKind {
    /// +1 for credits, -1 for debits
    pub fn sign(&self) -> i64 {
        match self {
            TokenTxnKind::Purchase
            | TokenTxnKind::ReferralBonus
            | TokenTxnKind::ProBonus
            | TokenTxnKind::AdminCredit => 1,
            TokenTxnKind::AdminDebit | TokenTxnKind::UnlockOrder | TokenTxnKind::AdFree => -1,
        }
    }

    /// Whether this kind credits the account
    pub fn is_credit(&self) -> bool {
        self.sign() > 0
    }
}

impl fmt::Display for TokenTxnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenTxnKind::Purchase => "PURCHASE",
            TokenTxnKind::ReferralBonus => "REFERRAL_BONUS",
            TokenTxnKind::ProBonus => "PRO_BONUS",
            TokenTxnKind::AdminCredit => "ADMIN_CREDIT",
            TokenTxnKind::AdminDebit => "ADMIN_DEBIT",
            TokenTxnKind::UnlockOrder => "UNLOCK_ORDER",
            TokenTxnKind::AdFree => "AD_FREE",
        };
        write!(f, "{}", s)
    }
}

/// Immutable token transaction (append-only audit record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Account owner
    pub user_id: UserId,

    /// Transaction kind
    pub kind: TokenTxnKind,

    /// Signed amount: positive credit, negative debit
    pub amount: i64,

    /// Human-readable description
    pub description: String,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Customer contact details captured with an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Customer name
    pub name: String,
    /// Contact phone
    pub phone: String,
    /// Delivery address
    pub address: String,
}

/// Order delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    /// Just placed
    Pending = 1,
    /// Confirmed by an operator
    Confirmed = 2,
    /// Handed to delivery
    InDelivery = 3,
    /// Delivered (terminal)
    Delivered = 4,
    /// Returned (terminal)
    Returned = 5,
}

/// Customer order created by the fulfillment coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Ordered item
    pub item_id: ItemId,

    /// Ordered quantity (>= 1)
    pub quantity: i64,

    /// Customer details
    pub customer: Customer,

    /// Delivery status
    pub status: OrderStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order
    pub fn new(item_id: ItemId, quantity: i64, customer: Customer) -> Self {
        Self {
            id: Uuid::now_v7(),
            item_id,
            quantity,
            customer,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Approval request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ApprovalStatus {
    /// Awaiting review
    Pending = 1,
    /// Approved (terminal)
    Approved = 2,
    /// Rejected (terminal)
    Rejected = 3,
}

/// Approval request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ApprovalKind {
    /// Subscription plan upgrade
    SubscriptionUpgrade = 1,
    /// Token pack purchase
    TokenPurchase = 2,
}

impl fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalKind::SubscriptionUpgrade => "SUBSCRIPTION_UPGRADE",
            ApprovalKind::TokenPurchase => "TOKEN_PURCHASE",
        };
        write!(f, "{}", s)
    }
}

/// Kind-specific request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApprovalPayload {
    /// Upgrade the user's plan by a number of days
    SubscriptionUpgrade {
        /// Plan extension in days
        days: i64,
    },
    /// Purchase of a token pack; the token amount is resolved at approval
    /// time, not at request time
    TokenPurchase {
        /// Pack identifier (resolved via the reward configuration)
        pack_id: String,
        /// Proof-of-payment reference
        payment_ref: String,
    },
}

impl ApprovalPayload {
    /// Kind discriminant for this payload
    pub fn kind(&self) -> ApprovalKind {
        match self {
            ApprovalPayload::SubscriptionUpgrade { .. } => ApprovalKind::SubscriptionUpgrade,
            ApprovalPayload::TokenPurchase { .. } => ApprovalKind::TokenPurchase,
        }
    }
}

/// Human-reviewed request driving a ledger mutation on approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Requesting user
    pub user_id: UserId,

    /// Lifecycle status
    pub status: ApprovalStatus,

    /// Kind-specific payload
    pub payload: ApprovalPayload,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Review timestamp (terminal states only)
    pub reviewed_at: Option<DateTime<Utc>>,

    /// Reviewer-supplied rejection reason
    pub rejection_reason: Option<String>,
}

impl ApprovalRequest {
    /// Create a new pending request
    pub fn new(user_id: UserId, payload: ApprovalPayload) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            status: ApprovalStatus::Pending,
            payload,
            created_at: Utc::now(),
            reviewed_at: None,
            rejection_reason: None,
        }
    }

    /// Kind of this request
    pub fn kind(&self) -> ApprovalKind {
        self.payload.kind()
    }

    /// Whether the request has reached a terminal state
    pub fn is_reviewed(&self) -> bool {
        self.status != ApprovalStatus::Pending
    }
}

/// Per-user subscription state touched by approved upgrades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPlan {
    /// Plan owner
    pub user_id: UserId,

    /// Plan expiry; `None` means no active plan
    pub plan_expires_at: Option<DateTime<Utc>>,

    /// Set on the first approved upgrade so the one-time bonus never repeats
    pub pro_bonus_granted: bool,
}

impl UserPlan {
    /// Create a fresh plan record with no active subscription
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            plan_expires_at: None,
            pro_bonus_granted: false,
        }
    }

    /// Extend the plan: new expiry = max(now, current expiry) + days
    pub fn extend(&mut self, days: i64, now: DateTime<Utc>) {
        let base = match self.plan_expires_at {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        self.plan_expires_at = Some(base + chrono::Duration::days(days));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_signed_delta() {
        assert_eq!(MovementKind::Purchase.signed_delta(5), 5);
        assert_eq!(MovementKind::Adjustment.signed_delta(3), 3);
        assert_eq!(MovementKind::Sale.signed_delta(4), -4);
    }

    #[test]
    fn test_txn_kind_signs() {
        assert_eq!(TokenTxnKind::Purchase.sign(), 1);
        assert_eq!(TokenTxnKind::ReferralBonus.sign(), 1);
        assert_eq!(TokenTxnKind::ProBonus.sign(), 1);
        assert_eq!(TokenTxnKind::AdminCredit.sign(), 1);
        assert_eq!(TokenTxnKind::AdminDebit.sign(), -1);
        assert_eq!(TokenTxnKind::UnlockOrder.sign(), -1);
        assert_eq!(TokenTxnKind::AdFree.sign(), -1);
    }

    #[test]
    fn test_plan_extend_from_scratch() {
        let now = Utc::now();
        let mut plan = UserPlan::new(UserId::new("u1"));
        plan.extend(30, now);
        assert_eq!(plan.plan_expires_at, Some(now + chrono::Duration::days(30)));
    }

    #[test]
    fn test_plan_extend_stacks_on_future_expiry() {
        let now = Utc::now();
        let mut plan = UserPlan::new(UserId::new("u1"));
        plan.plan_expires_at = Some(now + chrono::Duration::days(10));
        plan.extend(30, now);
        assert_eq!(plan.plan_expires_at, Some(now + chrono::Duration::days(40)));
    }

    #[test]
    fn test_plan_extend_ignores_lapsed_expiry() {
        let now = Utc::now();
        let mut plan = UserPlan::new(UserId::new("u1"));
        plan.plan_expires_at = Some(now - chrono::Duration::days(5));
        plan.extend(30, now);
        assert_eq!(plan.plan_expires_at, Some(now + chrono::Duration::days(30)));
    }

    #[test]
    fn test_payload_kind() {
        let p = ApprovalPayload::SubscriptionUpgrade { days: 30 };
        assert_eq!(p.kind(), ApprovalKind::SubscriptionUpgrade);

        let p = ApprovalPayload::TokenPurchase {
            pack_id: "pack_small".to_string(),
            payment_ref: "ref-1".to_string(),
        };
        assert_eq!(p.kind(), ApprovalKind::TokenPurchase);
    }

    #[test]
    fn test_request_is_reviewed() {
        let mut req = ApprovalRequest::new(
            UserId::new("u1"),
            ApprovalPayload::SubscriptionUpgrade { days: 30 },
        );
        assert!(!req.is_reviewed());

        req.status = ApprovalStatus::Approved;
        assert!(req.is_reviewed());

        req.status = ApprovalStatus::Rejected;
        assert!(req.is_reviewed());
    }
}
