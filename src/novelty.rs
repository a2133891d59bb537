use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{parse_canonical, AppointmentRecord};
use crate::state::NotificationState;

/// Locations allowed to trigger an alert, matched case-insensitively on the whole name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchList {
    All,
    Only(BTreeSet<String>),
}

impl WatchList {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        WatchList::Only(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, location: &str) -> bool {
        match self {
            WatchList::All => true,
            WatchList::Only(names) => names.contains(&location.trim().to_lowercase()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, WatchList::Only(names) if names.is_empty())
    }
}

/// Watched records whose known slot falls strictly before the cutoff date. Keeps input order.
pub fn select_candidates<'a>(
    records: &'a [AppointmentRecord],
    cutoff: NaiveDate,
    watch: &WatchList,
) -> Vec<&'a AppointmentRecord> {
    records
        .iter()
        .filter(|r| watch.matches(&r.location) && r.next_available.is_before(cutoff))
        .collect()
}

/// Candidates not yet covered by a notification: no prior entry, a strictly earlier slot,
/// or a prior entry that no longer parses.
pub fn filter_novel(candidates: &[&AppointmentRecord], state: &NotificationState) -> Vec<AppointmentRecord> {
    candidates
        .iter()
        .filter(|r| is_novel(r, state))
        .map(|r| (*r).clone())
        .collect()
}

fn is_novel(record: &AppointmentRecord, state: &NotificationState) -> bool {
    let Some(current) = record.next_available.known() else {
        return false;
    };
    match state.get(&record.location) {
        None => true,
        Some(prior) => parse_canonical(prior).is_none_or(|prior| current < prior),
    }
}
