//! Enrichment of decoded transfers with time estimates and address
//! provenance.
//!
//! Each stage is a pure function over the output of the previous one:
//!
//! ```text
//! events ──estimate──► [DateTime]            (one per event, index-aligned)
//!        ──first_seen─► {Address → DateTime}  (earliest estimate per address)
//!        ──ordinals───► {DateTime → usize}    (dense rank of distinct times)
//!        ──enrich─────► [EnrichedTransfer]
//! ```
//!
//! The ordinal of a timestamp depends on every other timestamp in the batch,
//! so enrichment needs the whole event set before it can emit anything.

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::Address;
use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::timing::BlockTimeline;
use crate::types::{EnrichedTransfer, FirstSeen, TransferEvent};

/// Estimated timestamp of every event, index-aligned with `events`.
pub fn estimate_all(
    events: &[TransferEvent],
    timeline: &BlockTimeline,
) -> Result<Vec<DateTime<Utc>>, PipelineError> {
    events.iter().map(|e| timeline.estimate(e)).collect()
}

/// Earliest estimate at which each address appears on either side of a
/// transfer.
///
/// Two appearances with the same millisecond produce the same value, so the
/// result does not depend on event order.
pub fn first_seen(
    events: &[TransferEvent],
    estimates: &[DateTime<Utc>],
) -> HashMap<Address, DateTime<Utc>> {
    let mut seen: HashMap<Address, DateTime<Utc>> = HashMap::new();
    for (event, &at) in events.iter().zip(estimates) {
        for address in [event.from, event.to] {
            seen.entry(address)
                .and_modify(|earliest| {
                    if at < *earliest {
                        *earliest = at;
                    }
                })
                .or_insert(at);
        }
    }
    seen
}

/// Zero-based dense rank of every distinct timestamp, ascending.
pub fn ordinals(
    timestamps: impl IntoIterator<Item = DateTime<Utc>>,
) -> HashMap<DateTime<Utc>, usize> {
    timestamps
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, t)| (t, i))
        .collect()
}

/// Run every stage and produce the enriched event set.
///
/// Fails if an event references a block absent from `timeline` or a block
/// that reports no transactions.
pub fn enrich(
    events: Vec<TransferEvent>,
    timeline: &BlockTimeline,
) -> Result<Vec<EnrichedTransfer>, PipelineError> {
    let estimates = estimate_all(&events, timeline)?;
    let first = first_seen(&events, &estimates);
    // First-seen values are drawn from `estimates`, so the estimates alone
    // span the whole timestamp domain.
    let ranks = ordinals(estimates.iter().copied());

    let provenance = |address: &Address| -> FirstSeen {
        let timestamp = first[address];
        FirstSeen { timestamp, index: ranks[&timestamp] }
    };

    events
        .into_iter()
        .zip(estimates)
        .map(|(transfer, estimate)| {
            Ok(EnrichedTransfer {
                block_timestamp: timeline.block_timestamp(transfer.block_number)?,
                timestamp_estimate: estimate,
                timestamp_index: ranks[&estimate],
                from_first_seen: provenance(&transfer.from),
                to_first_seen: provenance(&transfer.to),
                transfer,
            })
        })
        .collect()
}
