//! Watermark-based deduplication of polled trigger records.
//!
//! Each polling trigger keeps a high-water mark: the newest event
//! timestamp it has already delivered. A poll cycle fetches a batch of
//! candidate records and this filter decides which are genuinely new.
//!
//! Records are sorted ascending by extracted timestamp before filtering,
//! so out-of-order pages from the external API cannot produce
//! non-deterministic watermark advancement. Records with no extractable
//! timestamp cannot be deduplicated and always pass through; they never
//! influence the watermark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The result of one filter pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    /// Records not yet delivered, ascending by timestamp (timestampless
    /// records first).
    pub new_records: Vec<JsonValue>,
    /// The advanced watermark: the maximum of the input watermark and
    /// every fetched record's timestamp. Never moves backward.
    pub watermark: Option<DateTime<Utc>>,
}

/// Filters a fetched batch against the trigger's watermark.
///
/// A record is new when it has no timestamp, or when its timestamp is
/// strictly newer than the watermark. Calling `filter` again with the
/// returned watermark and the same records yields no new records.
#[must_use]
pub fn filter(
    records: Vec<JsonValue>,
    watermark: Option<DateTime<Utc>>,
    extract: impl Fn(&JsonValue) -> Option<DateTime<Utc>>,
) -> FilterOutcome {
    let mut stamped: Vec<(Option<DateTime<Utc>>, JsonValue)> = records
        .into_iter()
        .map(|record| (extract(&record), record))
        .collect();
    stamped.sort_by_key(|(timestamp, _)| *timestamp);

    let mut advanced = watermark;
    let mut new_records = Vec::new();

    for (timestamp, record) in stamped {
        match timestamp {
            // No timestamp means no dedup handle: always deliver.
            None => new_records.push(record),
            Some(at) => {
                if watermark.is_none_or(|mark| at > mark) {
                    new_records.push(record);
                }
                if advanced.is_none_or(|mark| at > mark) {
                    advanced = Some(at);
                }
            }
        }
    }

    FilterOutcome {
        new_records,
        watermark: advanced,
    }
}
