use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::mailer::Mailer;
use crate::model::AppointmentRecord;
use crate::state::{NotificationState, NotificationStore};

pub const SUBJECT: &str = "Earlier Appointment Found";

pub fn build_body(records: &[AppointmentRecord], cutoff: NaiveDate, booking_url: &str) -> String {
    let mut lines = vec![
        format!("Early NJ MVC Appointments before {}:", cutoff.format("%Y-%m-%d")),
        String::new(),
    ];
    for r in records {
        lines.push(format!(
            "- {}: {} | Map: {}",
            r.location,
            r.next_available,
            r.map_link.as_deref().unwrap_or("n/a")
        ));
    }
    lines.push(String::new());
    lines.push(format!("Book here: {}", booking_url));
    lines.push("Automated notice.".to_string());
    lines.join("\n")
}

pub struct Notifier<M> {
    mailer: M,
    store: NotificationStore,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: M, store: NotificationStore) -> Self {
        Self { mailer, store }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// Emails the novel records and, only once the send succeeded, commits their
    /// timestamps to `state` and rewrites the state file. Returns how many were sent.
    ///
    /// A state file that cannot be written after delivery is logged, not returned:
    /// the email went out and the in-memory state already reflects it.
    pub async fn notify(
        &self,
        novel: &[AppointmentRecord],
        cutoff: NaiveDate,
        booking_url: &str,
        state: &mut NotificationState,
    ) -> Result<usize> {
        if novel.is_empty() {
            return Ok(0);
        }

        let body = build_body(novel, cutoff, booking_url);
        if let Err(err) = self.mailer.send(SUBJECT, &body).await {
            error!(error = %err, candidates = novel.len(), "Email failed, state left unchanged");
            return Err(err.into());
        }

        state.record_sent(novel);
        if let Err(err) = self.store.save(state) {
            warn!(
                error = %err,
                path = %self.store.path().display(),
                count = novel.len(),
                "Email delivered but notification state could not be saved"
            );
        }
        info!(count = novel.len(), "Notified about earlier appointments");
        Ok(novel.len())
    }
}
