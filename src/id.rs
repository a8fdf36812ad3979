//! ID generation utilities for Cadence
//!
//! Items created by the user get a timestamp-based id. Materialized
//! occurrences get an id derived from `(template_id, occurrence)`, so the
//! same occurrence always maps to the same record.

use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::ItemKind;

/// Separator between template id and occurrence in a derived id
const OCCURRENCE_SEPARATOR: char = '@';

static SEQUENCE: AtomicU16 = AtomicU16::new(0);

/// Generate an id for a new user-created item
///
/// Format: `{kind}-{timestamp_ms}-{seq_hex}`
/// Example: `task-1738300800123-0001`
pub fn generate_item_id(kind: ItemKind, now: DateTime<Utc>) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{:04x}", kind, now.timestamp_millis(), seq)
}

/// Derive the id of the instance of `template_id` at `occurrence`
///
/// Format: `{template_id}@{rfc3339}`
/// Example: `task-1738300800123-0001@2024-03-04T09:00:00Z`
pub fn occurrence_id(template_id: &str, occurrence: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        template_id,
        OCCURRENCE_SEPARATOR,
        occurrence.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Split a derived id back into its key
pub fn parse_occurrence_id(id: &str) -> Option<(&str, DateTime<Utc>)> {
    let (template_id, stamp) = id.rsplit_once(OCCURRENCE_SEPARATOR)?;
    let occurrence = DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Utc);
    Some((template_id, occurrence))
}
