//! The three record kinds the convergence engine mutates: payments,
//! subscriptions and refunds. Each carries the invariants these types
//! must uphold and is mutated only by the convergence engine.

use serde::{Deserialize, Serialize};

use crate::time::UnixTime;

/// A payment staged at outbound Checkout time and converged by inbound
/// webhook events.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub struct PaymentRecord {
    pub user_id: String,
    pub business_payment_id: String,
    pub status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub charge_id: Option<String>,
    pub promotion_outcome: Option<String>,
    pub promotion_coupon_id: Option<String>,
    pub promotion_code_id: Option<String>,
    pub last_event_created_at: Option<UnixTime>,
}

impl PaymentRecord {
    /// Creates the `Pending` record staged when an outbound Checkout for a
    /// payment is created. Never called by the engine itself; the engine
    /// only ever mutates an existing record.
    pub fn new_pending(
        user_id: impl Into<String>,
        business_payment_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            business_payment_id: business_payment_id.into(),
            status: PaymentStatus::Pending,
            payment_intent_id: None,
            charge_id: None,
            promotion_outcome: None,
            promotion_coupon_id: None,
            promotion_code_id: None,
            last_event_created_at: None,
        }
    }

    /// Debug-only consistency check, run after every successor write.
    /// Public (not `pub(crate)`) since store implementations outside this
    /// crate call it from their own `save`; a no-op in release builds.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        debug_assert!(
            !self.user_id.is_empty() && !self.business_payment_id.is_empty(),
            "PaymentRecord must have non-empty ids"
        );
    }
}

/// General payment lifecycle status. Ordered by the precedence
/// ladder in the admission predicate: `Pending < Failed < Succeeded
/// < Canceled`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub enum PaymentStatus {
    Pending,
    Failed,
    Succeeded,
    Canceled,
}

impl PaymentStatus {
    /// The payment precedence ladder: `Pending=0, Failed=1,
    /// Succeeded=2, Canceled=3`.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Failed => 1,
            Self::Succeeded => 2,
            Self::Canceled => 3,
        }
    }

    /// Whether this status is terminal: once reached, the admission
    /// predicate only allows further transitions to the same status
    /// (`Succeeded` and `Canceled` are both dead ends).
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled)
    }
}

/// A subscription staged `Incomplete` at subscription Checkout time and
/// converged by inbound webhook events.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub struct SubscriptionRecord {
    pub user_id: String,
    pub business_subscription_id: String,
    pub status: SubscriptionStatus,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub promotion_outcome: Option<String>,
    pub promotion_coupon_id: Option<String>,
    pub promotion_code_id: Option<String>,
    pub last_event_created_at: Option<UnixTime>,
}

impl SubscriptionRecord {
    pub fn new_incomplete(
        user_id: impl Into<String>,
        business_subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            business_subscription_id: business_subscription_id.into(),
            status: SubscriptionStatus::Incomplete,
            customer_id: None,
            subscription_id: None,
            promotion_outcome: None,
            promotion_coupon_id: None,
            promotion_code_id: None,
            last_event_created_at: None,
        }
    }

    /// Debug-only consistency check, run after every successor write.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        debug_assert!(
            !self.user_id.is_empty() && !self.business_subscription_id.is_empty(),
            "SubscriptionRecord must have non-empty ids"
        );
    }
}

/// Subscription lifecycle status. Ordered by the subscription
/// precedence ladder: `Incomplete < PastDue < Active <
/// Canceled`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub enum SubscriptionStatus {
    Incomplete,
    PastDue,
    Active,
    Canceled,
}

impl SubscriptionStatus {
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Incomplete => 0,
            Self::PastDue => 1,
            Self::Active => 2,
            Self::Canceled => 3,
        }
    }

    /// `Canceled` is terminal: no transition out.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// A refund, created `Pending` by the refund-creator collaborator and
/// converged by inbound webhook events. References a [`PaymentRecord`] by
/// id value only; no foreign-key is enforced.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub struct RefundRecord {
    pub user_id: String,
    pub business_refund_id: String,
    pub business_payment_id: String,
    pub status: RefundStatus,
    pub payment_intent_id: Option<String>,
    pub refund_id: Option<String>,
}

impl RefundRecord {
    pub fn new_pending(
        user_id: impl Into<String>,
        business_refund_id: impl Into<String>,
        business_payment_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            business_refund_id: business_refund_id.into(),
            business_payment_id: business_payment_id.into(),
            status: RefundStatus::Pending,
            payment_intent_id: None,
            refund_id: None,
        }
    }

    /// Debug-only consistency check, run after every successor write.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        debug_assert!(
            !self.user_id.is_empty()
                && !self.business_refund_id.is_empty()
                && !self.business_payment_id.is_empty(),
            "RefundRecord must have non-empty ids"
        );
    }
}

/// Refund lifecycle status. Unlike payments/subscriptions, refunds
/// have no precedence ladder: the refund lifecycle is not re-entrant in v1,
/// so every resolved event applies unconditionally.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(any(test, feature = "test-utils"), derive(proptest_derive::Arbitrary))]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_precedence_ladder_is_monotonic() {
        assert!(PaymentStatus::Pending.precedence() < PaymentStatus::Failed.precedence());
        assert!(PaymentStatus::Failed.precedence() < PaymentStatus::Succeeded.precedence());
        assert!(PaymentStatus::Succeeded.precedence() < PaymentStatus::Canceled.precedence());
    }

    #[test]
    fn subscription_precedence_ladder_is_monotonic() {
        assert!(
            SubscriptionStatus::Incomplete.precedence() < SubscriptionStatus::PastDue.precedence()
        );
        assert!(
            SubscriptionStatus::PastDue.precedence() < SubscriptionStatus::Active.precedence()
        );
        assert!(
            SubscriptionStatus::Active.precedence() < SubscriptionStatus::Canceled.precedence()
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Canceled.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Failed.is_terminal());

        assert!(SubscriptionStatus::Canceled.is_terminal());
        assert!(!SubscriptionStatus::Active.is_terminal());
    }
}
