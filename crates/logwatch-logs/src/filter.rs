use chrono::{DateTime, Utc};

use logwatch_types::{LogEntry, MarkerSet};

/// Check whether an entry belongs to the window and carries a marker
///
/// The window start is inclusive. Markers match as plain case-insensitive
/// substrings, so "error" also matches "terrorize".
pub fn matches(entry: &LogEntry<'_>, window_start: DateTime<Utc>, markers: &MarkerSet) -> bool {
    if entry.instant < window_start || markers.is_empty() {
        return false;
    }

    let message = entry.message.to_lowercase();
    markers.iter().any(|marker| message.contains(marker))
}

/// A window start and marker set applied to many entries
#[derive(Clone, Debug)]
pub struct LineFilter<'a> {
    window_start: DateTime<Utc>,
    markers: &'a MarkerSet,
}

impl<'a> LineFilter<'a> {
    pub fn new(window_start: DateTime<Utc>, markers: &'a MarkerSet) -> Self {
        Self {
            window_start,
            markers,
        }
    }

    pub fn matches(&self, entry: &LogEntry<'_>) -> bool {
        matches(entry, self.window_start, self.markers)
    }
}
