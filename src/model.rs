use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical rendering of every appointment timestamp, whatever the page printed.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %I:%M %p";

const UNKNOWN: &str = "Unknown";

/// Next available slot for a location. `Unknown` is kept and displayed but never
/// takes part in deduplication replacement, cutoff checks or novelty checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextAvailable {
    At(NaiveDateTime),
    Unknown,
}

impl NextAvailable {
    pub fn known(&self) -> Option<NaiveDateTime> {
        match self {
            NextAvailable::At(ts) => Some(*ts),
            NextAvailable::Unknown => None,
        }
    }

    /// Parses the canonical form. Anything else is `Unknown`.
    pub fn from_canonical(text: &str) -> Self {
        parse_canonical(text).map_or(NextAvailable::Unknown, NextAvailable::At)
    }

    /// True when the slot is known and its date falls strictly before `cutoff`.
    pub fn is_before(&self, cutoff: NaiveDate) -> bool {
        self.known().is_some_and(|ts| ts.date() < cutoff)
    }

    /// Known timestamps ascending, then `Unknown`.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NextAvailable::At(a), NextAvailable::At(b)) => a.cmp(b),
            (NextAvailable::At(_), NextAvailable::Unknown) => Ordering::Less,
            (NextAvailable::Unknown, NextAvailable::At(_)) => Ordering::Greater,
            (NextAvailable::Unknown, NextAvailable::Unknown) => Ordering::Equal,
        }
    }
}

pub fn parse_canonical(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), CANONICAL_FORMAT).ok()
}

impl fmt::Display for NextAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextAvailable::At(ts) => write!(f, "{}", ts.format(CANONICAL_FORMAT)),
            NextAvailable::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for NextAvailable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NextAvailable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(NextAvailable::from_canonical(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub location: String,
    pub next_available: NextAvailable,
    pub map_link: Option<String>,
}

impl AppointmentRecord {
    pub fn new(location: impl Into<String>, next_available: NextAvailable, map_link: Option<String>) -> Self {
        Self {
            location: location.into(),
            next_available,
            map_link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NextAvailable {
        NextAvailable::At(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        )
    }

    #[test]
    fn renders_canonical_twelve_hour_form() {
        assert_eq!(ts(2025, 7, 15, 10, 0).to_string(), "2025-07-15 10:00 AM");
        assert_eq!(ts(2025, 7, 15, 14, 5).to_string(), "2025-07-15 02:05 PM");
        assert_eq!(NextAvailable::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn canonical_text_parses_back() {
        assert_eq!(
            NextAvailable::from_canonical("2025-07-15 10:00 AM"),
            ts(2025, 7, 15, 10, 0)
        );
        assert_eq!(NextAvailable::from_canonical("07/15/2025"), NextAvailable::Unknown);
    }

    #[test]
    fn unknown_sorts_after_known() {
        let known = ts(2030, 1, 1, 9, 0);
        assert_eq!(known.sort_cmp(&NextAvailable::Unknown), Ordering::Less);
        assert_eq!(NextAvailable::Unknown.sort_cmp(&known), Ordering::Greater);
    }

    #[test]
    fn cutoff_compares_date_only() {
        let cutoff = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
        assert!(ts(2025, 8, 14, 23, 59).is_before(cutoff));
        assert!(!ts(2025, 8, 15, 0, 0).is_before(cutoff));
        assert!(!NextAvailable::Unknown.is_before(cutoff));
    }

    #[test]
    fn record_serializes_as_display_row() {
        let record = AppointmentRecord::new("Bayonne", ts(2025, 7, 15, 10, 0), None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["next_available"], "2025-07-15 10:00 AM");
        assert!(json["map_link"].is_null());
    }
}
