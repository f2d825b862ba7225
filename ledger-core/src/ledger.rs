//! Main ledger orchestration layer
//!
//! This module ties storage, valuation, and the per-account lock registry
//! into a high-level API for stock, token, and approval mutations.
//!
//! # Concurrency model
//!
//! The ledger is called from independent, concurrent request handlers; no
//! single task owns an account. Every read-compute-write sequence against one
//! account acquires that account's mutex, performs a fresh read, and commits
//! through one `WriteBatch` before releasing the mutex. Two concurrent
//! mutations of the same account can therefore never both observe the
//! pre-mutation state. Critical sections are synchronous and never block on
//! anything but the lock itself.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger, ItemId, MovementKind};
//! use rust_decimal::Decimal;
//!
//! fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let item = ItemId::new("sku-1");
//!     ledger.register_item(&item, true, 5, None)?;
//!     ledger.record_movement(
//!         &item,
//!         MovementKind::Purchase,
//!         10,
//!         Some(Decimal::from(100)),
//!         None,
//!     )?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    metrics::Metrics,
    types::{
        ApprovalPayload, ApprovalRequest, ApprovalStatus, ItemId, MovementKind,
        Order, StockAccount, StockMovement, TokenAccount, TokenTransaction, TokenTxnKind, UserId,
        UserPlan, ValuationMethod,
    },
    valuation, Config, Error, Result, Storage,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Per-account lock identity
///
/// One lock per (domain, account id). Approval reviews that embed a token
/// credit acquire `Approval` first, then `Token`, always in that order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    /// Stock account, by item ID
    Stock(String),
    /// Token account, by user ID
    Token(String),
    /// Approval workflow, by user ID
    Approval(String),
}

/// Main ledger interface
pub struct Ledger {
    /// Storage backend
    storage: Arc<Storage>,

    /// Per-account serialization points
    locks: DashMap<LockKey, Arc<Mutex<()>>>,

    /// Prometheus metrics
    metrics: Metrics,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("storage", &self.storage)
            .field("active_locks", &self.locks.len())
            .finish()
    }
}

impl Ledger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);

        Ok(Self {
            storage,
            locks: DashMap::new(),
            metrics: Metrics::default(),
        })
    }

    /// Metrics collector (for exposition by a serving layer)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn lock_handle(&self, key: LockKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ---------------------------------------------------------------------
    // Stock ledger
    // ---------------------------------------------------------------------

    /// Register (or reconfigure) the stock account for a catalog item
    ///
    /// The catalog owns item existence; the ledger owns the account row.
    /// Re-registering preserves quantity, cost basis, and the movement log.
    pub fn register_item(
        &self,
        item_id: &ItemId,
        tracking_enabled: bool,
        low_stock_threshold: i64,
        valuation_method: Option<ValuationMethod>,
    ) -> Result<StockAccount> {
        if low_stock_threshold < 0 {
            return Err(Error::InvalidInput(
                "Low-stock threshold must not be negative".to_string(),
            ));
        }

        let handle = self.lock_handle(LockKey::Stock(item_id.as_str().to_string()));
        let _guard = handle.lock();

        let mut account = self
            .storage
            .get_stock_account(item_id)?
            .unwrap_or_else(|| StockAccount::new(item_id.clone(), tracking_enabled));

        account.tracking_enabled = tracking_enabled;
        account.low_stock_threshold = low_stock_threshold;
        if let Some(method) = valuation_method {
            account.valuation_method = method;
        }
        account.updated_at = Utc::now();

        self.storage.put_stock_account(&account)?;
        Ok(account)
    }

    /// Record a stock movement
    ///
    /// Executes as one atomic unit under the item's lock: fresh read of the
    /// account, movement append, running-total write-back, and (for
    /// PURCHASE) cost-basis recomputation.
    pub fn record_movement(
        &self,
        item_id: &ItemId,
        kind: MovementKind,
        quantity: i64,
        unit_cost: Option<Decimal>,
        note: Option<String>,
    ) -> Result<StockMovement> {
        if quantity <= 0 {
            return Err(Error::InvalidInput(
                "Movement quantity must be positive".to_string(),
            ));
        }
        if kind == MovementKind::Purchase {
            match unit_cost {
                Some(cost) if cost >= Decimal::ZERO => {}
                Some(_) => {
                    return Err(Error::InvalidInput(
                        "Purchase unit cost must not be negative".to_string(),
                    ))
                }
                None => {
                    return Err(Error::InvalidInput(
                        "Purchase movements require a unit cost".to_string(),
                    ))
                }
            }
        }

        let handle = self.lock_handle(LockKey::Stock(item_id.as_str().to_string()));
        let _guard = handle.lock();

        let mut account = self
            .storage
            .get_stock_account(item_id)?
            .ok_or_else(|| Error::AccountNotFound(item_id.to_string()))?;

        if !account.tracking_enabled {
            return Err(Error::InvalidInput(format!(
                "Stock tracking is disabled for item {}",
                item_id
            )));
        }

        self.apply_movement_locked(&mut account, kind, quantity, unit_cost, note, None)
    }

    /// Reserve stock for an order: check-and-decrement plus order creation
    /// in one atomic unit
    ///
    /// The account is re-read under the item's lock, so the availability
    /// check cannot race a concurrent buyer. The order row commits in the
    /// same `WriteBatch` as the SALE movement, so an order is never recorded
    /// without a matching decrement and vice versa.
    pub fn reserve_for_order(&self, order: &Order) -> Result<StockMovement> {
        if order.quantity < 1 {
            return Err(Error::InvalidInput(
                "Order quantity must be at least 1".to_string(),
            ));
        }

        let handle = self.lock_handle(LockKey::Stock(order.item_id.as_str().to_string()));
        let _guard = handle.lock();

        let mut account = self
            .storage
            .get_stock_account(&order.item_id)?
            .ok_or_else(|| Error::AccountNotFound(order.item_id.to_string()))?;

        if !account.tracking_enabled {
            return Err(Error::InvalidInput(format!(
                "Stock tracking is disabled for item {}",
                order.item_id
            )));
        }

        let movement = self.apply_movement_locked(
            &mut account,
            MovementKind::Sale,
            order.quantity,
            None,
            Some(format!("order {}", order.id)),
            Some(order),
        )?;

        self.metrics.orders_total.inc();
        Ok(movement)
    }

    /// The single internal mutation primitive for stock
    ///
    /// Both `record_movement` and the fulfillment decrement funnel through
    /// here so every caller gets identical atomicity and audit guarantees.
    /// Caller must hold the item's lock.
    fn apply_movement_locked(
        &self,
        account: &mut StockAccount,
        kind: MovementKind,
        quantity: i64,
        unit_cost: Option<Decimal>,
        note: Option<String>,
        order: Option<&Order>,
    ) -> Result<StockMovement> {
        let timer = self.metrics.mutation_duration.start_timer();

        let new_quantity = account.quantity_on_hand + kind.signed_delta(quantity);
        if new_quantity < 0 {
            self.metrics.insufficient_resource_total.inc();
            return Err(Error::InsufficientStock {
                available: account.quantity_on_hand,
            });
        }

        if kind == MovementKind::Purchase {
            let cost = unit_cost.ok_or_else(|| {
                Error::InvalidInput("Purchase movements require a unit cost".to_string())
            })?;
            account.cost_basis_per_unit = valuation::next_cost_basis(
                account.valuation_method,
                account.quantity_on_hand,
                account.cost_basis_per_unit,
                quantity,
                cost,
            )?;
        }

        let movement = StockMovement {
            id: Uuid::now_v7(),
            item_id: account.item_id.clone(),
            kind,
            quantity,
            unit_cost,
            total_cost: unit_cost.map(|c| c * Decimal::from(quantity)),
            note,
            created_at: Utc::now(),
        };

        let seq = account.movement_seq;
        account.quantity_on_hand = new_quantity;
        account.movement_seq += 1;
        account.updated_at = movement.created_at;

        self.storage.apply_stock_mutation(&movement, seq, account, order)?;

        self.metrics.stock_movements_total.inc();
        timer.observe_duration();

        Ok(movement)
    }

    /// Get the stock account for an item
    pub fn get_stock_account(&self, item_id: &ItemId) -> Result<StockAccount> {
        self.storage
            .get_stock_account(item_id)?
            .ok_or_else(|| Error::AccountNotFound(item_id.to_string()))
    }

    /// Get an item's movement log in creation order
    pub fn list_movements(&self, item_id: &ItemId) -> Result<Vec<StockMovement>> {
        self.storage.list_movements(item_id)
    }

    /// Items running low: tracking enabled and `0 < quantity <= threshold`,
    /// ascending by quantity
    ///
    /// The per-item threshold applies; `default_threshold` covers items that
    /// never had one configured. Used for operator alerts, never to block
    /// sales.
    pub fn get_low_stock(&self, default_threshold: i64) -> Result<Vec<StockAccount>> {
        let mut low: Vec<StockAccount> = self
            .storage
            .scan_stock_accounts()?
            .into_iter()
            .filter(|a| {
                let threshold = if a.low_stock_threshold > 0 {
                    a.low_stock_threshold
                } else {
                    default_threshold
                };
                a.tracking_enabled && a.quantity_on_hand > 0 && a.quantity_on_hand <= threshold
            })
            .collect();

        low.sort_by_key(|a| a.quantity_on_hand);
        Ok(low)
    }

    /// Verify the stock invariant: the running total equals the signed
    /// replay of the movement log
    pub fn check_stock_reconciliation(&self, item_id: &ItemId) -> Result<bool> {
        let account = self.get_stock_account(item_id)?;
        let replayed: i64 = self
            .storage
            .list_movements(item_id)?
            .iter()
            .map(|m| m.kind.signed_delta(m.quantity))
            .sum();

        Ok(replayed == account.quantity_on_hand)
    }

    // ---------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------

    /// Insert an order with no stock effect (untracked items, simulation)
    pub fn insert_order(&self, order: &Order) -> Result<()> {
        if order.quantity < 1 {
            return Err(Error::InvalidInput(
                "Order quantity must be at least 1".to_string(),
            ));
        }

        self.storage.insert_order(order)?;
        self.metrics.orders_total.inc();
        Ok(())
    }

    /// Get order by ID
    pub fn get_order(&self, order_id: Uuid) -> Result<Order> {
        self.storage.get_order(order_id)
    }

    // ---------------------------------------------------------------------
    // Token ledger
    // ---------------------------------------------------------------------

    /// Credit a user's token account
    ///
    /// Upserts the account and appends the transaction in one atomic unit
    /// under the user's token lock.
    pub fn credit(
        &self,
        user_id: &UserId,
        kind: TokenTxnKind,
        amount: i64,
        description: impl Into<String>,
        metadata: HashMap<String, String>,
    ) -> Result<TokenTransaction> {
        if !kind.is_credit() {
            return Err(Error::InvalidInput(format!(
                "{} is not a credit transaction kind",
                kind
            )));
        }

        let handle = self.lock_handle(LockKey::Token(user_id.as_str().to_string()));
        let _guard = handle.lock();

        self.apply_token_locked(user_id, kind, amount, description.into(), metadata)
    }

    /// Debit a user's token account
    ///
    /// The balance check runs inside the atomic unit, under the same lock as
    /// the write, so two concurrent debits cannot both pass it: a balance can
    /// never be driven below zero.
    pub fn debit(
        &self,
        user_id: &UserId,
        kind: TokenTxnKind,
        amount: i64,
        description: impl Into<String>,
        metadata: HashMap<String, String>,
    ) -> Result<TokenTransaction> {
        if kind.is_credit() {
            return Err(Error::InvalidInput(format!(
                "{} is not a debit transaction kind",
                kind
            )));
        }

        let handle = self.lock_handle(LockKey::Token(user_id.as_str().to_string()));
        let _guard = handle.lock();

        let available = self
            .storage
            .get_token_account(user_id)?
            .map(|a| a.balance)
            .unwrap_or(0);
        if amount > available {
            self.metrics.insufficient_resource_total.inc();
            return Err(Error::InsufficientBalance { available });
        }

        self.apply_token_locked(user_id, kind, amount, description.into(), metadata)
    }

    /// The single internal mutation primitive for tokens
    ///
    /// Caller must hold the user's token lock. `amount` is unsigned; the
    /// sign comes from the kind.
    fn apply_token_locked(
        &self,
        user_id: &UserId,
        kind: TokenTxnKind,
        amount: i64,
        description: String,
        metadata: HashMap<String, String>,
    ) -> Result<TokenTransaction> {
        if amount <= 0 {
            return Err(Error::InvalidInput(
                "Transaction amount must be positive".to_string(),
            ));
        }

        let timer = self.metrics.mutation_duration.start_timer();

        let mut account = self
            .storage
            .get_token_account(user_id)?
            .unwrap_or_else(|| TokenAccount::new(user_id.clone()));

        let txn = TokenTransaction {
            id: Uuid::now_v7(),
            user_id: user_id.clone(),
            kind,
            amount: kind.sign() * amount,
            description,
            metadata,
            created_at: Utc::now(),
        };

        let seq = account.txn_seq;
        account.balance += txn.amount;
        account.txn_seq += 1;
        account.updated_at = txn.created_at;

        self.storage.apply_token_mutation(&txn, seq, &account)?;

        self.metrics.token_transactions_total.inc();
        timer.observe_duration();

        Ok(txn)
    }

    /// Current balance; a missing account reads as zero without creating a
    /// row
    pub fn get_balance(&self, user_id: &UserId) -> Result<i64> {
        Ok(self
            .storage
            .get_token_account(user_id)?
            .map(|a| a.balance)
            .unwrap_or(0))
    }

    /// A user's transactions, most recent first
    pub fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<TokenTransaction>> {
        let mut txns = self.storage.list_token_transactions(user_id)?;
        txns.reverse();
        txns.truncate(limit);
        Ok(txns)
    }

    /// Verify the token invariant: the balance equals the sum of the
    /// transaction log
    pub fn check_token_reconciliation(&self, user_id: &UserId) -> Result<bool> {
        let balance = self.get_balance(user_id)?;
        let replayed: i64 = self
            .storage
            .list_token_transactions(user_id)?
            .iter()
            .map(|t| t.amount)
            .sum();

        Ok(replayed == balance)
    }

    // ---------------------------------------------------------------------
    // Approval workflow
    // ---------------------------------------------------------------------

    /// Create a pending approval request
    ///
    /// A user may hold at most one PENDING request per kind; the check and
    /// the insert run under the user's approval lock.
    pub fn create_request(
        &self,
        user_id: &UserId,
        payload: ApprovalPayload,
    ) -> Result<ApprovalRequest> {
        let handle = self.lock_handle(LockKey::Approval(user_id.as_str().to_string()));
        let _guard = handle.lock();

        if self
            .storage
            .get_pending_request_id(payload.kind(), user_id)?
            .is_some()
        {
            return Err(Error::DuplicatePending(user_id.to_string()));
        }

        let request = ApprovalRequest::new(user_id.clone(), payload);
        self.storage.insert_request(&request)?;
        Ok(request)
    }

    /// Reject a pending request
    pub fn reject_request(
        &self,
        request_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<ApprovalRequest> {
        let probe = self.storage.get_request(request_id)?;

        let handle = self.lock_handle(LockKey::Approval(probe.user_id.as_str().to_string()));
        let _guard = handle.lock();

        // Fresh read under the lock; the probe may have raced a reviewer
        let mut request = self.storage.get_request(request_id)?;
        if request.is_reviewed() {
            return Err(Error::AlreadyReviewed(request_id.to_string()));
        }

        request.status = ApprovalStatus::Rejected;
        request.reviewed_at = Some(Utc::now());
        request.rejection_reason = Some(reason.into());

        self.storage.finalize_request(&request, None, None)?;
        Ok(request)
    }

    /// Approve a subscription upgrade
    ///
    /// One atomic unit: request goes APPROVED, the plan expiry extends to
    /// `max(now, current) + days`, and the one-time PRO bonus is credited iff
    /// it was never granted before. `bonus_tokens` is resolved by the caller
    /// at approval time.
    pub fn approve_subscription(
        &self,
        request_id: Uuid,
        bonus_tokens: i64,
    ) -> Result<ApprovalRequest> {
        let probe = self.storage.get_request(request_id)?;
        let user_id = probe.user_id.clone();

        // Lock order: approval first, then token
        let approval = self.lock_handle(LockKey::Approval(user_id.as_str().to_string()));
        let _approval_guard = approval.lock();
        let token = self.lock_handle(LockKey::Token(user_id.as_str().to_string()));
        let _token_guard = token.lock();

        let mut request = self.storage.get_request(request_id)?;
        if request.is_reviewed() {
            return Err(Error::AlreadyReviewed(request_id.to_string()));
        }

        let days = match request.payload {
            ApprovalPayload::SubscriptionUpgrade { days } => days,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Request {} is not a subscription upgrade",
                    request_id
                )))
            }
        };

        let now = Utc::now();
        let mut plan = self
            .storage
            .get_user_plan(&user_id)?
            .unwrap_or_else(|| UserPlan::new(user_id.clone()));
        plan.extend(days, now);

        // The first approval consumes the one-time bonus slot even when the
        // configured bonus is zero at that moment; a bonus configured later
        // never applies retroactively
        let first_approval = !plan.pro_bonus_granted;
        plan.pro_bonus_granted = true;

        let credit = if first_approval && bonus_tokens > 0 {
            let mut account = self
                .storage
                .get_token_account(&user_id)?
                .unwrap_or_else(|| TokenAccount::new(user_id.clone()));

            let txn = TokenTransaction {
                id: Uuid::now_v7(),
                user_id: user_id.clone(),
                kind: TokenTxnKind::ProBonus,
                amount: bonus_tokens,
                description: "PRO upgrade bonus".to_string(),
                metadata: HashMap::new(),
                created_at: now,
            };

            let seq = account.txn_seq;
            account.balance += txn.amount;
            account.txn_seq += 1;
            account.updated_at = now;

            Some((txn, account, seq))
        } else {
            None
        };

        request.status = ApprovalStatus::Approved;
        request.reviewed_at = Some(now);

        self.storage.finalize_request(
            &request,
            credit.as_ref().map(|(t, a, s)| (t, a, *s)),
            Some(&plan),
        )?;

        if credit.is_some() {
            self.metrics.token_transactions_total.inc();
        }

        Ok(request)
    }

    /// Approve a token-pack purchase
    ///
    /// One atomic unit: request goes APPROVED and the pack's tokens are
    /// credited. `tokens` is resolved by the caller at approval time, not at
    /// request time.
    pub fn approve_token_purchase(
        &self,
        request_id: Uuid,
        tokens: i64,
        description: impl Into<String>,
    ) -> Result<ApprovalRequest> {
        if tokens <= 0 {
            return Err(Error::InvalidInput(
                "Token amount must be positive".to_string(),
            ));
        }

        let probe = self.storage.get_request(request_id)?;
        let user_id = probe.user_id.clone();

        // Lock order: approval first, then token
        let approval = self.lock_handle(LockKey::Approval(user_id.as_str().to_string()));
        let _approval_guard = approval.lock();
        let token = self.lock_handle(LockKey::Token(user_id.as_str().to_string()));
        let _token_guard = token.lock();

        let mut request = self.storage.get_request(request_id)?;
        if request.is_reviewed() {
            return Err(Error::AlreadyReviewed(request_id.to_string()));
        }

        let (pack_id, payment_ref) = match &request.payload {
            ApprovalPayload::TokenPurchase {
                pack_id,
                payment_ref,
            } => (pack_id.clone(), payment_ref.clone()),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Request {} is not a token purchase",
                    request_id
                )))
            }
        };

        let now = Utc::now();
        let mut account = self
            .storage
            .get_token_account(&user_id)?
            .unwrap_or_else(|| TokenAccount::new(user_id.clone()));

        let mut metadata = HashMap::new();
        metadata.insert("pack_id".to_string(), pack_id);
        metadata.insert("payment_ref".to_string(), payment_ref);

        let txn = TokenTransaction {
            id: Uuid::now_v7(),
            user_id: user_id.clone(),
            kind: TokenTxnKind::Purchase,
            amount: tokens,
            description: description.into(),
            metadata,
            created_at: now,
        };

        let seq = account.txn_seq;
        account.balance += txn.amount;
        account.txn_seq += 1;
        account.updated_at = now;

        request.status = ApprovalStatus::Approved;
        request.reviewed_at = Some(now);

        self.storage
            .finalize_request(&request, Some((&txn, &account, seq)), None)?;

        self.metrics.token_transactions_total.inc();
        Ok(request)
    }

    /// Get request by ID
    pub fn get_request(&self, request_id: Uuid) -> Result<ApprovalRequest> {
        self.storage.get_request(request_id)
    }

    /// List requests, optionally filtered by user and/or status
    pub fn list_requests(
        &self,
        user_id: Option<&UserId>,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>> {
        let mut requests: Vec<ApprovalRequest> = self
            .storage
            .scan_requests()?
            .into_iter()
            .filter(|r| user_id.map_or(true, |u| &r.user_id == u))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();

        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    /// Get a user's subscription state; missing reads as a blank plan
    pub fn get_user_plan(&self, user_id: &UserId) -> Result<UserPlan> {
        Ok(self
            .storage
            .get_user_plan(user_id)?
            .unwrap_or_else(|| UserPlan::new(user_id.clone())))
    }
}
