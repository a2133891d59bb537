use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{AppointmentRecord, NextAvailable};

/// Collapses duplicate locations to their earliest known slot and sorts ascending,
/// `Unknown` last.
///
/// Names are compared exactly. A known timestamp always beats `Unknown`; between two
/// known timestamps the strictly earlier one wins, so ties keep the first-seen record.
/// The sort is stable, so equal keys stay in first-seen order.
pub fn reduce(records: Vec<AppointmentRecord>) -> Vec<AppointmentRecord> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut kept: Vec<AppointmentRecord> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&record.location) {
            Some(&slot) => {
                if replaces(&record.next_available, &kept[slot].next_available) {
                    kept[slot] = record;
                }
            }
            None => {
                index.insert(record.location.clone(), kept.len());
                kept.push(record);
            }
        }
    }

    kept.sort_by(|a, b| a.next_available.sort_cmp(&b.next_available));
    kept
}

fn replaces(candidate: &NextAvailable, existing: &NextAvailable) -> bool {
    match (candidate.known(), existing.known()) {
        (Some(new), Some(old)) => new < old,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// One row handed to the display consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    pub location: String,
    pub next_available: NextAvailable,
    pub map_link: Option<String>,
    /// Known and strictly before the cutoff date; drives highlighting.
    pub early: bool,
}

pub fn display_rows(records: &[AppointmentRecord], cutoff: NaiveDate) -> Vec<DisplayRow> {
    records
        .iter()
        .map(|r| DisplayRow {
            location: r.location.clone(),
            next_available: r.next_available,
            map_link: r.map_link.clone(),
            early: r.next_available.is_before(cutoff),
        })
        .collect()
}
