//! The full ingestion pipeline: wires signature verification, the dedupe
//! store and event parsing around [`crate::engine::Engine::process`] so a
//! webhook delivery's signature is checked, the delivery is deduplicated,
//! and the outcome is durably recorded, all before the caller ever sees a
//! result.

use payhook_core::dedupe::WebhookEventOutcome;
use payhook_core::error::StoreError;
use payhook_core::time::UnixTime;
use payhook_store::dedupe::EventDedupeStore;
use payhook_store::lookup::ObjectLookup;
use payhook_store::records::{PaymentStore, RefundStore, SubscriptionStore};
use payhook_verify::{parse_from_raw_body, verify, VerifyError};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::engine::Engine;

/// The result of a single call to [`ingest`]. Distinguishes a fresh delivery
/// that ran to completion from the two duplicate-delivery cases the dedupe
/// state machine can report.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IngestOutcome {
    /// The convergence engine ran (or the event was a no-op) and the
    /// terminal outcome is now durably recorded.
    Processed {
        event_id: String,
        succeeded: bool,
        error_message: Option<String>,
    },
    /// A `Succeeded` dedupe entry already existed: a replay of a delivery
    /// this pipeline has already completed successfully. The convergence
    /// engine was not invoked.
    Duplicate {
        event_id: String,
        outcome: WebhookEventOutcome,
    },
    /// `try_begin` lost the race: either another delivery currently holds
    /// an unexpired processing lease (`outcome: None`), or a previous
    /// attempt is recorded `Failed` and a fresh `try_begin` should have
    /// admitted this one — the latter case does not arise against
    /// [`payhook_store::dedupe::InMemoryDedupeStore`] (see `DESIGN.md`) but
    /// is represented here for store implementations with different
    /// concurrency behavior.
    NonTerminalDuplicate {
        event_id: String,
        outcome: Option<WebhookEventOutcome>,
    },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs a single webhook delivery through verify → dedupe → parse → process
/// → record_outcome. `now` is passed in
/// explicitly so the signature tolerance check and the dedupe lease are
/// deterministically testable.
#[instrument(skip_all)]
pub async fn ingest<Pay, Sub, Ref, Lookup, Dedupe>(
    engine: &Engine<Pay, Sub, Ref, Lookup>,
    dedupe: &Dedupe,
    raw_body: &[u8],
    signature_header: &str,
    secret: &[u8],
    now: UnixTime,
) -> Result<IngestOutcome, IngestError>
where
    Pay: PaymentStore,
    Sub: SubscriptionStore,
    Ref: RefundStore,
    Lookup: ObjectLookup,
    Dedupe: EventDedupeStore,
{
    let header = verify(raw_body, signature_header, secret, now, engine.config().signature_tolerance)?;

    let started = dedupe
        .try_begin(&header.id, now, engine.config().lease_duration)
        .await?;
    if !started {
        let existing = dedupe.get_outcome(&header.id).await?;
        return Ok(match existing {
            Some(outcome) if outcome.succeeded => {
                info!(event_id = %header.id, "duplicate delivery of an already-succeeded event");
                IngestOutcome::Duplicate {
                    event_id: header.id,
                    outcome,
                }
            }
            outcome => {
                warn!(event_id = %header.id, "delivery raced an in-flight or failed-and-unclaimed attempt");
                IngestOutcome::NonTerminalDuplicate {
                    event_id: header.id,
                    outcome,
                }
            }
        });
    }

    let outcome = match parse_from_raw_body(raw_body) {
        Ok(parsed) => match engine.process(&parsed).await {
            Ok(()) => WebhookEventOutcome::success(now),
            Err(err) => {
                warn!(event_id = %header.id, error = %err, "convergence engine rejected event");
                WebhookEventOutcome::failure(err.to_string(), now)
            }
        },
        Err(err) => {
            warn!(event_id = %header.id, error = %err, "event body failed to parse after verification");
            WebhookEventOutcome::failure(err.to_string(), now)
        }
    };

    dedupe.record_outcome(&header.id, outcome.clone()).await?;
    info!(event_id = %header.id, succeeded = outcome.succeeded, "ingestion complete");

    Ok(IngestOutcome::Processed {
        event_id: header.id,
        succeeded: outcome.succeeded,
        error_message: outcome.error_message,
    })
}
