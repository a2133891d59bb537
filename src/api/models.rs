use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};

use crate::monitor::CycleReport;
use crate::reducer::DisplayRow;

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub rows: Vec<DisplayRow>,
    pub loaded_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub cutoff: NaiveDate,
    pub booking_url: String,
    pub notified: usize,
    pub email_error: Option<String>,
}

impl AppointmentsResponse {
    pub fn new(report: CycleReport, booking_url: &str) -> Self {
        Self {
            rows: report.rows,
            loaded_at: report.loaded_at,
            scraped_at: report.scraped_at,
            cutoff: report.cutoff,
            booking_url: booking_url.to_string(),
            notified: report.notified,
            email_error: report.email_error,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Completed,
    Skipped,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub status: RefreshStatus,
    pub appointments: Option<AppointmentsResponse>,
}
