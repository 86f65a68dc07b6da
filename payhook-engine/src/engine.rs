//! The convergence engine. Applies a [`ParsedEvent`] to the target
//! record under the monotonic precedence + timestamp guards.
//! This is the hard part of the system: the only place correctness-under-
//! retry, record lookup and the precedence ladder interact.

use payhook_core::event::ParsedEvent;
use payhook_core::record::{PaymentStatus, RefundStatus, SubscriptionStatus};
use payhook_core::time::UnixTime;
use payhook_store::lookup::ObjectLookup;
use payhook_store::records::{PaymentStore, RefundStore, SubscriptionStore};
use tracing::{debug, instrument, warn};

use crate::config::{EngineConfig, Module};
use crate::error::EngineError;

/// The convergence engine. Generic over the store/lookup traits so
/// tests can instantiate it against the in-memory reference implementations
/// in `payhook-store` while a production deployment wires in persistent
/// ones.
pub struct Engine<Pay, Sub, Ref, Lookup> {
    config: EngineConfig,
    pub payments: Pay,
    pub subscriptions: Sub,
    pub refunds: Ref,
    pub lookup: Lookup,
}

/// The successor status a dispatched event resolves to, tagged by the
/// record kind it targets.
enum Dispatch {
    Payment(PaymentStatus),
    Subscription(SubscriptionStatus),
    Refund(RefundStatus),
}

impl Dispatch {
    fn module(&self) -> Module {
        match self {
            Self::Payment(_) => Module::Payments,
            Self::Subscription(_) => Module::Subscriptions,
            Self::Refund(_) => Module::Refunds,
        }
    }
}

impl<Pay, Sub, Ref, Lookup> Engine<Pay, Sub, Ref, Lookup>
where
    Pay: PaymentStore,
    Sub: SubscriptionStore,
    Ref: RefundStore,
    Lookup: ObjectLookup,
{
    pub fn new(config: EngineConfig, payments: Pay, subscriptions: Sub, refunds: Ref, lookup: Lookup) -> Self {
        Self {
            config,
            payments,
            subscriptions,
            refunds,
            lookup,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Entry point: dispatch, id resolution, record
    /// lookup, admission and apply. `Ok(())` covers both a successful apply
    /// and an ignored no-op (unhandled event type, disabled module, or a
    /// transition the admission predicate rejected); every `Err` here is
    /// recorded as a `Failed` dedupe outcome by the caller.
    #[instrument(skip_all, fields(event_id = %event.id, event_type = %event.raw_type))]
    pub async fn process(&self, event: &ParsedEvent) -> Result<(), EngineError> {
        let Some(dispatch) = dispatch_target(event) else {
            debug!("event type not in the dispatch table, ignoring");
            return Ok(());
        };

        if !self.config.enabled_modules.is_enabled(dispatch.module()) {
            debug!(module = ?dispatch.module(), "target module disabled, treating as no-op");
            return Ok(());
        }

        match dispatch {
            Dispatch::Payment(successor) => self.apply_payment(event, successor).await,
            Dispatch::Subscription(successor) => self.apply_subscription(event, successor).await,
            Dispatch::Refund(successor) => self.apply_refund(event, successor).await,
        }
    }

    async fn apply_payment(&self, event: &ParsedEvent, successor: PaymentStatus) -> Result<(), EngineError> {
        let provider_id = self.resolve_payment_intent_id(event).await?;

        let current = match self.payments.get_by_provider_id(&provider_id).await? {
            Some(record) => record,
            None => match &event.business_ids.business_payment_id {
                Some(business_id) => self
                    .payments
                    .get_by_business_id(business_id)
                    .await?
                    .ok_or(EngineError::RecordNotFound)?,
                None => return Err(EngineError::RecordNotFound),
            },
        };

        if !payment_admits(current.status, successor, current.last_event_created_at, event.created_at) {
            warn!(
                current = ?current.status,
                incoming = ?successor,
                "admission predicate rejected transition, leaving record unchanged"
            );
            return Ok(());
        }

        let mut next = current;
        next.status = successor;
        next.payment_intent_id = Some(provider_id);
        next.last_event_created_at = merge_timestamp(next.last_event_created_at, event.created_at);
        self.payments.save(next).await?;
        Ok(())
    }

    async fn apply_subscription(&self, event: &ParsedEvent, successor: SubscriptionStatus) -> Result<(), EngineError> {
        let provider_id = self.resolve_subscription_id(event).await?;

        let current = match self.subscriptions.get_by_provider_id(&provider_id).await? {
            Some(record) => record,
            None => match &event.business_ids.business_subscription_id {
                Some(business_id) => self
                    .subscriptions
                    .get_by_business_id(business_id)
                    .await?
                    .ok_or(EngineError::RecordNotFound)?,
                None => return Err(EngineError::RecordNotFound),
            },
        };

        if !subscription_admits(current.status, successor, current.last_event_created_at, event.created_at) {
            warn!(
                current = ?current.status,
                incoming = ?successor,
                "admission predicate rejected transition, leaving record unchanged"
            );
            return Ok(());
        }

        let mut next = current;
        next.status = successor;
        next.subscription_id = Some(provider_id);
        if let Some(customer_id) = &event.linked_ids.customer_id {
            next.customer_id = Some(customer_id.clone());
        }
        next.last_event_created_at = merge_timestamp(next.last_event_created_at, event.created_at);
        self.subscriptions.save(next).await?;
        Ok(())
    }

    /// Refunds have no precedence ladder: every resolved event applies
    /// unconditionally, since the refund lifecycle is not re-entrant.
    async fn apply_refund(&self, event: &ParsedEvent, successor: RefundStatus) -> Result<(), EngineError> {
        let provider_id = event
            .linked_ids
            .refund_id
            .clone()
            .or_else(|| event.object_id.clone())
            .ok_or(EngineError::MissingLinkedId)?;

        let mut current = self
            .refunds
            .get_by_provider_id(&provider_id)
            .await?
            .ok_or(EngineError::RecordNotFound)?;

        current.status = successor;
        current.refund_id = Some(provider_id);
        if let Some(payment_intent_id) = &event.linked_ids.payment_intent_id {
            current.payment_intent_id = Some(payment_intent_id.clone());
        }
        self.refunds.save(current).await?;
        Ok(())
    }

    /// Id resolution for the payment target: direct
    /// linkage first, falling back to the object lookup when the event is a
    /// thin event.
    async fn resolve_payment_intent_id(&self, event: &ParsedEvent) -> Result<String, EngineError> {
        if let Some(id) = &event.linked_ids.payment_intent_id {
            return Ok(id.clone());
        }
        if let Some(object_id) = &event.object_id {
            if let Some(id) = self.lookup.get_payment_intent_id(object_id).await? {
                return Ok(id);
            }
        }
        Err(EngineError::MissingLinkedId)
    }

    async fn resolve_subscription_id(&self, event: &ParsedEvent) -> Result<String, EngineError> {
        if let Some(id) = &event.linked_ids.subscription_id {
            return Ok(id.clone());
        }
        if let Some(object_id) = &event.object_id {
            if let Some(id) = self.lookup.get_subscription_id(object_id).await? {
                return Ok(id);
            }
        }
        Err(EngineError::MissingLinkedId)
    }
}

/// `last_event_created_at = max(current, incoming)` when `incoming` is
/// present; otherwise left unchanged.
fn merge_timestamp(current: Option<UnixTime>, incoming: Option<UnixTime>) -> Option<UnixTime> {
    match (current, incoming) {
        (Some(current), Some(incoming)) => Some(current.max(incoming)),
        (None, Some(incoming)) => Some(incoming),
        (current, None) => current,
    }
}

/// The admission predicate shared shape: terminal-state guard plus the
/// timestamp/precedence tiebreak. `precedence_of` and
/// `is_terminal` are supplied per record kind since payments and
/// subscriptions have distinct ladders.
fn admits<T: Copy + Eq>(
    current: T,
    incoming: T,
    current_created_at: Option<UnixTime>,
    incoming_created_at: Option<UnixTime>,
    is_terminal_violation: impl Fn(T, T) -> bool,
    precedence_of: impl Fn(T) -> u8,
) -> bool {
    if is_terminal_violation(current, incoming) {
        return false;
    }
    match (current_created_at, incoming_created_at) {
        (Some(current_ts), Some(incoming_ts)) => {
            if incoming_ts < current_ts {
                false
            } else if incoming_ts == current_ts {
                precedence_of(incoming) >= precedence_of(current)
            } else {
                true
            }
        }
        _ => true,
    }
}

/// `Succeeded` never transitions to anything else; `Canceled` is only
/// reachable from non-terminal states, i.e. it too is terminal once reached.
fn payment_admits(
    current: PaymentStatus,
    incoming: PaymentStatus,
    current_created_at: Option<UnixTime>,
    incoming_created_at: Option<UnixTime>,
) -> bool {
    admits(
        current,
        incoming,
        current_created_at,
        incoming_created_at,
        |current, incoming| current.is_terminal() && current != incoming,
        PaymentStatus::precedence,
    )
}

/// `Canceled` is terminal for subscriptions; no transition out.
fn subscription_admits(
    current: SubscriptionStatus,
    incoming: SubscriptionStatus,
    current_created_at: Option<UnixTime>,
    incoming_created_at: Option<UnixTime>,
) -> bool {
    admits(
        current,
        incoming,
        current_created_at,
        incoming_created_at,
        |current, incoming| current.is_terminal() && current != incoming,
        SubscriptionStatus::precedence,
    )
}

/// Maps an event to its target record kind and the status it carries.
/// Returns `None` for an event type with no dispatch rule (silently
/// ignored), or for a recognized `customer.subscription.*`/`refund.*`
/// event whose `object_status` doesn't map to anything (also a silent
/// no-op).
fn dispatch_target(event: &ParsedEvent) -> Option<Dispatch> {
    use payhook_core::event::EventType::*;
    match event.event_type {
        PaymentIntentSucceeded => Some(Dispatch::Payment(PaymentStatus::Succeeded)),
        PaymentIntentPaymentFailed => Some(Dispatch::Payment(PaymentStatus::Failed)),
        InvoicePaymentSucceeded => Some(Dispatch::Subscription(SubscriptionStatus::Active)),
        InvoicePaymentFailed => Some(Dispatch::Subscription(SubscriptionStatus::PastDue)),
        CustomerSubscriptionDeleted => Some(Dispatch::Subscription(SubscriptionStatus::Canceled)),
        CustomerSubscriptionCreated | CustomerSubscriptionUpdated => {
            map_subscription_status(event.object_status.as_deref()).map(Dispatch::Subscription)
        }
        RefundCreated | RefundUpdated => map_refund_status(event.object_status.as_deref()).map(Dispatch::Refund),
        RefundFailed => Some(Dispatch::Refund(RefundStatus::Failed)),
        Other => None,
    }
}

/// §4.7a: `active|trialing -> Active; past_due -> PastDue; incomplete ->
/// Incomplete; canceled -> Canceled`; otherwise a no-op.
fn map_subscription_status(status: Option<&str>) -> Option<SubscriptionStatus> {
    match status? {
        "active" | "trialing" => Some(SubscriptionStatus::Active),
        "past_due" => Some(SubscriptionStatus::PastDue),
        "incomplete" => Some(SubscriptionStatus::Incomplete),
        "canceled" => Some(SubscriptionStatus::Canceled),
        _ => None,
    }
}

/// §4.7b: `succeeded -> Succeeded; failed -> Failed; pending -> Pending`;
/// otherwise a no-op.
fn map_refund_status(status: Option<&str>) -> Option<RefundStatus> {
    match status? {
        "succeeded" => Some(RefundStatus::Succeeded),
        "failed" => Some(RefundStatus::Failed),
        "pending" => Some(RefundStatus::Pending),
        _ => None,
    }
}
