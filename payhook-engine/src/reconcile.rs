//! The reconciler. Pulls one page of recent events straight from the
//! provider's event-list API and feeds each through the same
//! `try_begin -> process -> record_outcome` pipeline a live webhook
//! delivery uses, classifying results into the four counters.
//!
//! Unlike [`crate::pipeline::ingest`], there is no signature check here:
//! the events arrive over an authenticated pull against the provider, not
//! an inbound webhook delivery, so nothing needs to be verified against a
//! shared secret.

use payhook_core::dedupe::WebhookEventOutcome;
use payhook_core::error::StoreError;
use payhook_core::provider::EventListParams;
use payhook_core::time::UnixTime;
use payhook_store::dedupe::EventDedupeStore;
use payhook_store::events::EventSource;
use payhook_store::lookup::ObjectLookup;
use payhook_store::records::{PaymentStore, RefundStore, SubscriptionStore};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::cancel::CancelToken;
use crate::engine::Engine;

/// One page's worth of reconciliation counters.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub total: u32,
    pub processed: u32,
    pub duplicates: u32,
    pub failed: u32,
    pub last_event_id: Option<String>,
    pub has_more: bool,
}

/// Fetches and processes a single page of events. `limit` is
/// clamped into `[1, 100]`. Returns as soon as the page is exhausted or
/// `cancel` is signaled; `has_more`/`last_event_id` in that case describe
/// the remaining work so the caller can resume with another call.
#[instrument(skip_all, fields(created_after = %created_after, limit))]
pub async fn reconcile<Pay, Sub, Ref, Lookup, Dedupe, Source>(
    engine: &Engine<Pay, Sub, Ref, Lookup>,
    dedupe: &Dedupe,
    source: &Source,
    limit: u32,
    created_after: UnixTime,
    starting_after_event_id: Option<String>,
    now: UnixTime,
    cancel: &CancelToken,
) -> Result<ReconciliationResult, StoreError>
where
    Pay: PaymentStore,
    Sub: SubscriptionStore,
    Ref: RefundStore,
    Lookup: ObjectLookup,
    Dedupe: EventDedupeStore,
    Source: EventSource,
{
    let limit = limit.clamp(1, 100);
    let params = EventListParams {
        limit,
        created_after,
        starting_after_event_id,
    };
    let page = source.list_events(&params).await?;

    let mut result = ReconciliationResult::default();
    let mut cancelled_early = false;
    let mut last_seen_event_id = None;

    for event in &page.events {
        if cancel.is_cancelled() {
            cancelled_early = true;
            break;
        }
        result.total += 1;

        let parsed = match payhook_verify::parse_from_envelope(event) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "provider returned a malformed event, counting as failed");
                result.failed += 1;
                continue;
            }
        };
        last_seen_event_id = Some(parsed.id.clone());

        let started = dedupe
            .try_begin(&parsed.id, now, engine.config().lease_duration)
            .await?;
        if !started {
            result.duplicates += 1;
            continue;
        }

        let outcome = match engine.process(&parsed).await {
            Ok(()) => WebhookEventOutcome::success(now),
            Err(err) => {
                warn!(event_id = %parsed.id, error = %err, "convergence engine rejected event during reconciliation");
                WebhookEventOutcome::failure(err.to_string(), now)
            }
        };
        let succeeded = outcome.succeeded;
        dedupe.record_outcome(&parsed.id, outcome).await?;
        if succeeded {
            result.processed += 1;
        } else {
            result.failed += 1;
        }
    }

    result.has_more = page.has_more || cancelled_early;
    result.last_event_id = if cancelled_early {
        last_seen_event_id.or(page.last_event_id)
    } else {
        page.last_event_id
    };
    Ok(result)
}
