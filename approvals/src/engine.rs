//! Approval workflow engine
//!
//! Drives state transitions on human-reviewed requests. A request starts
//! PENDING and transitions exactly once to APPROVED or REJECTED; an
//! approval performs its ledger mutation (token credit, plan extension)
//! inside the same atomic unit as the status change. Reward amounts are
//! resolved from the injected [`RewardSource`] at review time, not at
//! request time.

use crate::{
    config::RewardSource,
    error::{Error, Result},
};
use ledger_core::{
    ApprovalPayload, ApprovalRequest, ApprovalStatus, Ledger, UserId,
};
use std::sync::Arc;
use uuid::Uuid;

/// Reviewer decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Approve and perform the ledger mutation
    Approve,
    /// Reject with a reason
    Reject,
}

/// Approval workflow engine
pub struct ApprovalEngine {
    /// Ledger core (owns request persistence and the atomic units)
    ledger: Arc<Ledger>,

    /// Tunable reward constants, read at call time
    rewards: Arc<dyn RewardSource>,
}

impl ApprovalEngine {
    /// Create new engine
    pub fn new(ledger: Arc<Ledger>, rewards: Arc<dyn RewardSource>) -> Self {
        Self { ledger, rewards }
    }

    /// File a subscription upgrade request
    pub fn request_subscription_upgrade(
        &self,
        user_id: &UserId,
        days: i64,
    ) -> Result<ApprovalRequest> {
        if days <= 0 {
            return Err(Error::InvalidInput(
                "Upgrade duration must be positive".to_string(),
            ));
        }

        let request = self
            .ledger
            .create_request(user_id, ApprovalPayload::SubscriptionUpgrade { days })?;

        tracing::info!(request_id = %request.id, user_id = %user_id, days, "Upgrade requested");
        Ok(request)
    }

    /// File a token-pack purchase request with a proof-of-payment reference
    pub fn request_token_purchase(
        &self,
        user_id: &UserId,
        pack_id: impl Into<String>,
        payment_ref: impl Into<String>,
    ) -> Result<ApprovalRequest> {
        let pack_id = pack_id.into();
        if pack_id.is_empty() {
            return Err(Error::InvalidInput("Pack identifier is empty".to_string()));
        }

        let request = self.ledger.create_request(
            user_id,
            ApprovalPayload::TokenPurchase {
                pack_id: pack_id.clone(),
                payment_ref: payment_ref.into(),
            },
        )?;

        tracing::info!(request_id = %request.id, user_id = %user_id, pack_id, "Pack requested");
        Ok(request)
    }

    /// Review a pending request
    ///
    /// Rejection only records the decision. Approval resolves the reward
    /// amount now (pack sizes may have changed since the request was filed)
    /// and dispatches to the matching atomic ledger operation, which
    /// re-checks PENDING under the account locks.
    pub fn review(
        &self,
        request_id: Uuid,
        decision: Decision,
        rejection_reason: Option<String>,
    ) -> Result<ApprovalRequest> {
        match decision {
            Decision::Reject => {
                let reason = rejection_reason.unwrap_or_else(|| "rejected".to_string());
                Ok(self.ledger.reject_request(request_id, reason)?)
            }
            Decision::Approve => {
                let request = self.ledger.get_request(request_id)?;
                match &request.payload {
                    ApprovalPayload::SubscriptionUpgrade { .. } => {
                        let bonus = self.rewards.pro_bonus_tokens();
                        Ok(self.ledger.approve_subscription(request_id, bonus)?)
                    }
                    ApprovalPayload::TokenPurchase { pack_id, .. } => {
                        let tokens = self
                            .rewards
                            .pack_tokens(pack_id)
                            .ok_or_else(|| Error::UnknownPack(pack_id.clone()))?;
                        Ok(self.ledger.approve_token_purchase(
                            request_id,
                            tokens,
                            format!("Token pack {}", pack_id),
                        )?)
                    }
                }
            }
        }
    }

    /// List requests for the review surface
    pub fn list_requests(
        &self,
        user_id: Option<&UserId>,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>> {
        Ok(self.ledger.list_requests(user_id, status)?)
    }

    /// Get a single request
    pub fn get_request(&self, request_id: Uuid) -> Result<ApprovalRequest> {
        Ok(self.ledger.get_request(request_id)?)
    }
}
