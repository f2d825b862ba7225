//! Reward configuration seam
//!
//! Pack sizes and bonus amounts are tunable constants owned by an external
//! configuration provider. The engine reads them through this trait at
//! approval time rather than request creation time, so pack changes between
//! the two moments take effect, and tests can inject deterministic values
//! without touching process-global state.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Tunable reward constants, read at call time
pub trait RewardSource: Send + Sync {
    /// One-time bonus credited on a user's first approved upgrade
    fn pro_bonus_tokens(&self) -> i64;

    /// Token amount for a pack; `None` if the pack does not exist
    fn pack_tokens(&self, pack_id: &str) -> Option<i64>;
}

/// In-memory reward source for tests and demos
pub struct StaticRewards {
    pro_bonus: RwLock<i64>,
    packs: RwLock<HashMap<String, i64>>,
}

impl StaticRewards {
    /// Create with a bonus amount and an initial pack table
    pub fn new(pro_bonus: i64, packs: impl IntoIterator<Item = (String, i64)>) -> Self {
        Self {
            pro_bonus: RwLock::new(pro_bonus),
            packs: RwLock::new(packs.into_iter().collect()),
        }
    }

    /// Insert or resize a pack
    pub fn set_pack(&self, pack_id: impl Into<String>, tokens: i64) {
        self.packs.write().insert(pack_id.into(), tokens);
    }

    /// Change the bonus amount
    pub fn set_pro_bonus(&self, tokens: i64) {
        *self.pro_bonus.write() = tokens;
    }
}

impl RewardSource for StaticRewards {
    fn pro_bonus_tokens(&self) -> i64 {
        *self.pro_bonus.read()
    }

    fn pack_tokens(&self, pack_id: &str) -> Option<i64> {
        self.packs.read().get(pack_id).copied()
    }
}
