//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `stock_accounts` - One record per catalog item (key: item_id)
//! - `stock_movements` - Append-only movement log (key: item_id || seq)
//! - `token_accounts` - One record per user (key: user_id)
//! - `token_transactions` - Append-only transaction log (key: user_id || seq)
//! - `orders` - Customer orders (key: order_id)
//! - `approval_requests` - Review workflow requests (key: request_id)
//! - `user_plans` - Subscription state (key: user_id)
//! - `indices` - Secondary indices (pending-request lookup)
//!
//! Every multi-record mutation goes through a single `WriteBatch` so a
//! movement/transaction is never persisted without its account update, and
//! vice versa.

use crate::{
    error::{Error, Result},
    types::{
        ApprovalKind, ApprovalRequest, ItemId, Order, StockAccount, StockMovement, TokenAccount,
        TokenTransaction, UserId, UserPlan,
    },
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_STOCK_ACCOUNTS: &str = "stock_accounts";
const CF_STOCK_MOVEMENTS: &str = "stock_movements";
const CF_TOKEN_ACCOUNTS: &str = "token_accounts";
const CF_TOKEN_TXNS: &str = "token_transactions";
const CF_ORDERS: &str = "orders";
const CF_REQUESTS: &str = "approval_requests";
const CF_PLANS: &str = "user_plans";
const CF_INDICES: &str = "indices";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    // Column family handles are stored in DB, accessed by name
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_STOCK_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_STOCK_MOVEMENTS, Self::cf_options_logs()),
            ColumnFamilyDescriptor::new(CF_TOKEN_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TOKEN_TXNS, Self::cf_options_logs()),
            ColumnFamilyDescriptor::new(CF_ORDERS, Self::cf_options_logs()),
            ColumnFamilyDescriptor::new(CF_REQUESTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_PLANS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Accounts are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_logs() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers
    //
    // Log keys are `id_len_be32 || account_id || seq_be64` so each account's
    // log is a contiguous, creation-ordered key range. Account ids are opaque
    // strings from external providers; the length prefix keeps an id that
    // embeds another id (say "a" and "a|b") from aliasing its key range.

    fn log_key(account: &str, seq: u64) -> Vec<u8> {
        let mut key = Self::log_prefix(account);
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn log_prefix(account: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(4 + account.len() + 8);
        prefix.extend_from_slice(&(account.len() as u32).to_be_bytes());
        prefix.extend_from_slice(account.as_bytes());
        prefix
    }

    fn index_key_pending(kind: ApprovalKind, user: &UserId) -> Vec<u8> {
        let mut key = vec![kind as u8];
        key.extend_from_slice(user.as_str().as_bytes());
        key
    }

    // Stock account operations

    /// Put stock account (account registration only; mutations go through
    /// [`Storage::apply_stock_mutation`])
    pub fn put_stock_account(&self, account: &StockAccount) -> Result<()> {
        let cf = self.cf_handle(CF_STOCK_ACCOUNTS)?;
        let value = bincode::serialize(account)?;
        self.db.put_cf(cf, account.item_id.as_str().as_bytes(), &value)?;
        Ok(())
    }

    /// Get stock account by item ID
    pub fn get_stock_account(&self, item_id: &ItemId) -> Result<Option<StockAccount>> {
        let cf = self.cf_handle(CF_STOCK_ACCOUNTS)?;
        match self.db.get_cf(cf, item_id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Scan all stock accounts (low-stock reporting)
    pub fn scan_stock_accounts(&self) -> Result<Vec<StockAccount>> {
        let cf = self.cf_handle(CF_STOCK_ACCOUNTS)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut accounts = Vec::new();
        for item in iter {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }
        Ok(accounts)
    }

    /// Apply one stock mutation atomically: append the movement, write back
    /// the account, and (for fulfillment) insert the order in the same batch
    ///
    /// `seq` is this movement's log position; the caller bumps the account's
    /// `movement_seq` past it before committing.
    pub fn apply_stock_mutation(
        &self,
        movement: &StockMovement,
        seq: u64,
        account: &StockAccount,
        order: Option<&Order>,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Movement, keyed so replay order matches creation order
        let cf_movements = self.cf_handle(CF_STOCK_MOVEMENTS)?;
        let movement_key = Self::log_key(movement.item_id.as_str(), seq);
        batch.put_cf(cf_movements, &movement_key, bincode::serialize(movement)?);

        // 2. Account running total
        let cf_accounts = self.cf_handle(CF_STOCK_ACCOUNTS)?;
        batch.put_cf(
            cf_accounts,
            account.item_id.as_str().as_bytes(),
            bincode::serialize(account)?,
        );

        // 3. Order (fulfillment path only)
        if let Some(order) = order {
            let cf_orders = self.cf_handle(CF_ORDERS)?;
            batch.put_cf(cf_orders, order.id.as_bytes(), bincode::serialize(order)?);
        }

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            movement_id = %movement.id,
            item_id = %movement.item_id,
            kind = %movement.kind,
            quantity = movement.quantity,
            "Stock mutation committed"
        );

        Ok(())
    }

    /// Get movements for an item in creation order
    pub fn list_movements(&self, item_id: &ItemId) -> Result<Vec<StockMovement>> {
        let cf = self.cf_handle(CF_STOCK_MOVEMENTS)?;
        let prefix = Self::log_prefix(item_id.as_str());

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_slice(), Direction::Forward));

        let mut movements = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            movements.push(bincode::deserialize(&value)?);
        }
        Ok(movements)
    }

    // Token account operations

    /// Get token account by user ID
    pub fn get_token_account(&self, user_id: &UserId) -> Result<Option<TokenAccount>> {
        let cf = self.cf_handle(CF_TOKEN_ACCOUNTS)?;
        match self.db.get_cf(cf, user_id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Apply one token mutation atomically: append the transaction and write
    /// back the account in the same batch
    ///
    /// `seq` is this transaction's log position; the caller bumps the
    /// account's `txn_seq` past it before committing.
    pub fn apply_token_mutation(
        &self,
        txn: &TokenTransaction,
        seq: u64,
        account: &TokenAccount,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_txns = self.cf_handle(CF_TOKEN_TXNS)?;
        let txn_key = Self::log_key(txn.user_id.as_str(), seq);
        batch.put_cf(cf_txns, &txn_key, bincode::serialize(txn)?);

        let cf_accounts = self.cf_handle(CF_TOKEN_ACCOUNTS)?;
        batch.put_cf(
            cf_accounts,
            account.user_id.as_str().as_bytes(),
            bincode::serialize(account)?,
        );

        self.db.write(batch)?;

        tracing::debug!(
            txn_id = %txn.id,
            user_id = %txn.user_id,
            kind = %txn.kind,
            amount = txn.amount,
            balance = account.balance,
            "Token mutation committed"
        );

        Ok(())
    }

    /// Get transactions for a user in creation order
    pub fn list_token_transactions(&self, user_id: &UserId) -> Result<Vec<TokenTransaction>> {
        let cf = self.cf_handle(CF_TOKEN_TXNS)?;
        let prefix = Self::log_prefix(user_id.as_str());

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_slice(), Direction::Forward));

        let mut txns = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            txns.push(bincode::deserialize(&value)?);
        }
        Ok(txns)
    }

    // Order operations

    /// Insert order without stock effects (untracked/simulated path)
    pub fn insert_order(&self, order: &Order) -> Result<()> {
        let cf = self.cf_handle(CF_ORDERS)?;
        self.db
            .put_cf(cf, order.id.as_bytes(), bincode::serialize(order)?)?;

        tracing::debug!(order_id = %order.id, item_id = %order.item_id, "Order inserted");
        Ok(())
    }

    /// Get order by ID
    pub fn get_order(&self, order_id: Uuid) -> Result<Order> {
        let cf = self.cf_handle(CF_ORDERS)?;
        let value = self
            .db
            .get_cf(cf, order_id.as_bytes())?
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    // Approval request operations

    /// Insert a pending request together with its pending-index entry
    pub fn insert_request(&self, request: &ApprovalRequest) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_requests = self.cf_handle(CF_REQUESTS)?;
        batch.put_cf(cf_requests, request.id.as_bytes(), bincode::serialize(request)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_key = Self::index_key_pending(request.kind(), &request.user_id);
        batch.put_cf(cf_indices, &idx_key, request.id.as_bytes());

        self.db.write(batch)?;

        tracing::debug!(
            request_id = %request.id,
            user_id = %request.user_id,
            kind = %request.kind(),
            "Approval request created"
        );

        Ok(())
    }

    /// Get request by ID
    pub fn get_request(&self, request_id: Uuid) -> Result<ApprovalRequest> {
        let cf = self.cf_handle(CF_REQUESTS)?;
        let value = self
            .db
            .get_cf(cf, request_id.as_bytes())?
            .ok_or_else(|| Error::RequestNotFound(request_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Look up the pending request of a given kind for a user
    pub fn get_pending_request_id(
        &self,
        kind: ApprovalKind,
        user_id: &UserId,
    ) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key_pending(kind, user_id);

        match self.db.get_cf(cf, &key)? {
            Some(value) => {
                let bytes: [u8; 16] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt pending-request index".to_string()))?;
                Ok(Some(Uuid::from_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    /// Finalize a reviewed request atomically: write the terminal request,
    /// clear its pending-index entry, and persist the approval side effects
    /// (token credit and/or plan update) in the same batch
    ///
    /// A credit carries its transaction's log position, as in
    /// [`Storage::apply_token_mutation`].
    pub fn finalize_request(
        &self,
        request: &ApprovalRequest,
        credit: Option<(&TokenTransaction, &TokenAccount, u64)>,
        plan: Option<&UserPlan>,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_requests = self.cf_handle(CF_REQUESTS)?;
        batch.put_cf(cf_requests, request.id.as_bytes(), bincode::serialize(request)?);

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx_key = Self::index_key_pending(request.kind(), &request.user_id);
        batch.delete_cf(cf_indices, &idx_key);

        if let Some((txn, account, seq)) = credit {
            let cf_txns = self.cf_handle(CF_TOKEN_TXNS)?;
            let txn_key = Self::log_key(txn.user_id.as_str(), seq);
            batch.put_cf(cf_txns, &txn_key, bincode::serialize(txn)?);

            let cf_accounts = self.cf_handle(CF_TOKEN_ACCOUNTS)?;
            batch.put_cf(
                cf_accounts,
                account.user_id.as_str().as_bytes(),
                bincode::serialize(account)?,
            );
        }

        if let Some(plan) = plan {
            let cf_plans = self.cf_handle(CF_PLANS)?;
            batch.put_cf(
                cf_plans,
                plan.user_id.as_str().as_bytes(),
                bincode::serialize(plan)?,
            );
        }

        self.db.write(batch)?;

        tracing::info!(
            request_id = %request.id,
            user_id = %request.user_id,
            status = ?request.status,
            "Approval request finalized"
        );

        Ok(())
    }

    /// Scan all requests (review surface; filtered by the caller)
    pub fn scan_requests(&self) -> Result<Vec<ApprovalRequest>> {
        let cf = self.cf_handle(CF_REQUESTS)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut requests = Vec::new();
        for item in iter {
            let (_, value) = item?;
            requests.push(bincode::deserialize(&value)?);
        }
        Ok(requests)
    }

    // User plan operations

    /// Get user plan by user ID
    pub fn get_user_plan(&self, user_id: &UserId) -> Result<Option<UserPlan>> {
        let cf = self.cf_handle(CF_PLANS)?;
        match self.db.get_cf(cf, user_id.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ApprovalPayload, Customer, MovementKind, OrderStatus, TokenTxnKind,
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_movement(item: &ItemId, kind: MovementKind, quantity: i64) -> StockMovement {
        StockMovement {
            id: Uuid::now_v7(),
            item_id: item.clone(),
            kind,
            quantity,
            unit_cost: None,
            total_cost: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_storage_open() {
        let (storage, _temp) = test_storage();
        assert!(storage.db.cf_handle(CF_STOCK_ACCOUNTS).is_some());
        assert!(storage.db.cf_handle(CF_TOKEN_TXNS).is_some());
        assert!(storage.db.cf_handle(CF_INDICES).is_some());
    }

    #[test]
    fn test_stock_account_roundtrip() {
        let (storage, _temp) = test_storage();

        let item = ItemId::new("item-1");
        let account = StockAccount::new(item.clone(), true);
        storage.put_stock_account(&account).unwrap();

        let retrieved = storage.get_stock_account(&item).unwrap().unwrap();
        assert_eq!(retrieved.item_id, item);
        assert_eq!(retrieved.quantity_on_hand, 0);
        assert!(retrieved.tracking_enabled);
    }

    #[test]
    fn test_apply_stock_mutation_atomic() {
        let (storage, _temp) = test_storage();

        let item = ItemId::new("item-1");
        let mut account = StockAccount::new(item.clone(), true);
        storage.put_stock_account(&account).unwrap();

        account.quantity_on_hand = 5;
        account.cost_basis_per_unit = Decimal::from(100);
        account.movement_seq = 1;
        let movement = test_movement(&item, MovementKind::Purchase, 5);

        storage.apply_stock_mutation(&movement, 0, &account, None).unwrap();

        let retrieved = storage.get_stock_account(&item).unwrap().unwrap();
        assert_eq!(retrieved.quantity_on_hand, 5);

        let movements = storage.list_movements(&item).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].id, movement.id);
    }

    #[test]
    fn test_first_movement_at_position_zero() {
        let (storage, _temp) = test_storage();

        // A fresh account whose sequence was never bumped still produces a
        // well-formed key when the caller names position 0 explicitly
        let item = ItemId::new("item-1");
        let account = StockAccount::new(item.clone(), true);
        let movement = test_movement(&item, MovementKind::Adjustment, 1);
        storage.apply_stock_mutation(&movement, 0, &account, None).unwrap();

        let movements = storage.list_movements(&item).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].id, movement.id);
    }

    #[test]
    fn test_movements_are_per_item() {
        let (storage, _temp) = test_storage();

        let item_a = ItemId::new("item-a");
        let item_b = ItemId::new("item-b");

        for item in [&item_a, &item_b] {
            let mut account = StockAccount::new(item.clone(), true);
            account.quantity_on_hand = 3;
            account.movement_seq = 1;
            let movement = test_movement(item, MovementKind::Adjustment, 3);
            storage.apply_stock_mutation(&movement, 0, &account, None).unwrap();
        }

        assert_eq!(storage.list_movements(&item_a).unwrap().len(), 1);
        assert_eq!(storage.list_movements(&item_b).unwrap().len(), 1);
    }

    #[test]
    fn test_mutation_with_order_in_same_batch() {
        let (storage, _temp) = test_storage();

        let item = ItemId::new("item-1");
        let mut account = StockAccount::new(item.clone(), true);
        account.quantity_on_hand = 8;
        account.movement_seq = 1;

        let order = Order::new(
            item.clone(),
            2,
            Customer {
                name: "Ada".to_string(),
                phone: "555-0100".to_string(),
                address: "1 Main St".to_string(),
            },
        );
        let movement = test_movement(&item, MovementKind::Sale, 2);

        storage
            .apply_stock_mutation(&movement, 0, &account, Some(&order))
            .unwrap();

        let retrieved = storage.get_order(order.id).unwrap();
        assert_eq!(retrieved.item_id, item);
        assert_eq!(retrieved.status, OrderStatus::Pending);
    }

    #[test]
    fn test_token_mutation_and_log_order() {
        let (storage, _temp) = test_storage();

        let user = UserId::new("user-1");
        let mut account = TokenAccount::new(user.clone());

        for (i, amount) in [50i64, -20, 30].iter().enumerate() {
            account.balance += amount;
            account.txn_seq = i as u64 + 1;
            let txn = TokenTransaction {
                id: Uuid::now_v7(),
                user_id: user.clone(),
                kind: if *amount > 0 {
                    TokenTxnKind::AdminCredit
                } else {
                    TokenTxnKind::AdminDebit
                },
                amount: *amount,
                description: format!("txn {}", i),
                metadata: Default::default(),
                created_at: Utc::now(),
            };
            storage.apply_token_mutation(&txn, i as u64, &account).unwrap();
        }

        let retrieved = storage.get_token_account(&user).unwrap().unwrap();
        assert_eq!(retrieved.balance, 60);

        let txns = storage.list_token_transactions(&user).unwrap();
        assert_eq!(txns.len(), 3);
        assert_eq!(txns[0].amount, 50);
        assert_eq!(txns[2].amount, 30);
    }

    #[test]
    fn test_pending_request_index() {
        let (storage, _temp) = test_storage();

        let user = UserId::new("user-1");
        let request = ApprovalRequest::new(
            user.clone(),
            ApprovalPayload::SubscriptionUpgrade { days: 30 },
        );
        storage.insert_request(&request).unwrap();

        let pending = storage
            .get_pending_request_id(ApprovalKind::SubscriptionUpgrade, &user)
            .unwrap();
        assert_eq!(pending, Some(request.id));

        // Other kind is independent
        let pending = storage
            .get_pending_request_id(ApprovalKind::TokenPurchase, &user)
            .unwrap();
        assert_eq!(pending, None);
    }

    #[test]
    fn test_finalize_clears_pending_index() {
        let (storage, _temp) = test_storage();

        let user = UserId::new("user-1");
        let mut request = ApprovalRequest::new(
            user.clone(),
            ApprovalPayload::SubscriptionUpgrade { days: 30 },
        );
        storage.insert_request(&request).unwrap();

        request.status = crate::types::ApprovalStatus::Rejected;
        request.reviewed_at = Some(Utc::now());
        request.rejection_reason = Some("no proof of payment".to_string());
        storage.finalize_request(&request, None, None).unwrap();

        let pending = storage
            .get_pending_request_id(ApprovalKind::SubscriptionUpgrade, &user)
            .unwrap();
        assert_eq!(pending, None);

        let retrieved = storage.get_request(request.id).unwrap();
        assert_eq!(retrieved.status, crate::types::ApprovalStatus::Rejected);
    }
}
