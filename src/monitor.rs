//! One evaluation cycle: scrape (through the cache), reduce, build display rows and,
//! when alerts are on, send one email about newly improved slots.
//!
//! At most one cycle runs at a time. A trigger that arrives while a cycle is in
//! flight is skipped, and the state file's read-modify-write happens entirely inside
//! the cycle.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CachedScrape, ScrapeCache};
use crate::card::CardSelectors;
use crate::mailer::Mailer;
use crate::model::AppointmentRecord;
use crate::notifier::Notifier;
use crate::novelty::{filter_novel, select_candidates, WatchList};
use crate::reducer::{display_rows, reduce, DisplayRow};
use crate::scraper::{scrape_cards, PageSource};

/// Values the user may change while the monitor runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub cutoff: NaiveDate,
    pub watch: WatchList,
    pub send_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub cutoff: Option<NaiveDate>,
    pub watch: Option<WatchList>,
    pub send_enabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub appointment_url: String,
    pub scrape_timeout: Duration,
    pub cache_ttl: chrono::Duration,
    pub enable_email: bool,
    pub selectors: CardSelectors,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub rows: Vec<DisplayRow>,
    pub loaded_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub cutoff: NaiveDate,
    pub notified: usize,
    pub email_error: Option<String>,
    #[serde(skip)]
    pub records: Vec<AppointmentRecord>,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Skipped,
}

pub struct Monitor<S, M> {
    options: MonitorOptions,
    source: S,
    notifier: Notifier<M>,
    cache: ScrapeCache,
    settings: RwLock<Settings>,
    latest: RwLock<Option<CycleReport>>,
    cycle: Mutex<()>,
}

impl<S: PageSource, M: Mailer> Monitor<S, M> {
    pub fn new(options: MonitorOptions, settings: Settings, source: S, notifier: Notifier<M>) -> Self {
        Self {
            cache: ScrapeCache::new(options.cache_ttl),
            options,
            source,
            notifier,
            settings: RwLock::new(settings),
            latest: RwLock::new(None),
            cycle: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Applies the changed fields and re-marks the latest rows against the new cutoff.
    pub fn update_settings(&self, update: SettingsUpdate) -> Settings {
        let updated = {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(cutoff) = update.cutoff {
                settings.cutoff = cutoff;
            }
            if let Some(watch) = update.watch {
                settings.watch = match watch {
                    WatchList::All => WatchList::All,
                    WatchList::Only(names) => WatchList::only(names),
                };
            }
            if let Some(send_enabled) = update.send_enabled {
                settings.send_enabled = send_enabled;
            }
            settings.clone()
        };

        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(report) = latest.as_mut() {
            report.cutoff = updated.cutoff;
            report.rows = display_rows(&report.records, updated.cutoff);
        }
        info!(cutoff = %updated.cutoff, send_enabled = updated.send_enabled, "Settings updated");
        updated
    }

    pub fn latest(&self) -> Option<CycleReport> {
        self.latest.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The latest report, running a first cycle (or waiting for the one in flight) if needed.
    pub async fn current_report(&self, now: DateTime<Utc>) -> Option<CycleReport> {
        if let Some(report) = self.latest() {
            return Some(report);
        }
        match self.run_cycle(now, false).await {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Skipped => {
                let _wait = self.cycle.lock().await;
                self.latest()
            }
        }
    }

    /// Timer-driven cycle. Always scrapes, so a tick landing a hair before the cache
    /// expires still sees the current page.
    pub async fn scheduled_cycle(&self, now: DateTime<Utc>) -> CycleOutcome {
        self.run_cycle(now, true).await
    }

    /// Runs one cycle unless another is in flight. `force` bypasses the scrape cache.
    pub async fn run_cycle(&self, now: DateTime<Utc>, force: bool) -> CycleOutcome {
        let Ok(_cycle) = self.cycle.try_lock() else {
            debug!("Cycle already in flight, skipping trigger");
            return CycleOutcome::Skipped;
        };

        let scrape = self.scrape(now, force).await;
        let settings = self.settings();
        let (notified, email_error) = self.maybe_notify(&scrape.records, &settings).await;

        let report = CycleReport {
            rows: display_rows(&scrape.records, settings.cutoff),
            loaded_at: now,
            scraped_at: scrape.fetched_at,
            cutoff: settings.cutoff,
            notified,
            email_error,
            records: scrape.records,
        };
        if report.rows.is_empty() {
            warn!("No appointments found right now");
        }
        info!(
            locations = report.rows.len(),
            early = report.rows.iter().filter(|r| r.early).count(),
            notified = report.notified,
            "Cycle complete"
        );

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        CycleOutcome::Completed(report)
    }

    async fn scrape(&self, now: DateTime<Utc>, force: bool) -> CachedScrape {
        let fetch = move || async move {
            let cards = scrape_cards(
                &self.source,
                &self.options.appointment_url,
                self.options.scrape_timeout,
                &self.options.selectors,
            )
            .await;
            reduce(cards)
        };
        if force {
            self.cache.refresh(now, fetch).await
        } else {
            self.cache.get_or_refresh(now, fetch).await
        }
    }

    async fn maybe_notify(&self, records: &[AppointmentRecord], settings: &Settings) -> (usize, Option<String>) {
        if !self.options.enable_email || !settings.send_enabled || settings.watch.is_empty() || records.is_empty() {
            return (0, None);
        }

        let candidates = select_candidates(records, settings.cutoff, &settings.watch);
        if candidates.is_empty() {
            return (0, None);
        }

        let mut state = self.notifier.store().load();
        let novel = filter_novel(&candidates, &state);
        debug!(candidates = candidates.len(), novel = novel.len(), "Evaluated early appointments");
        if novel.is_empty() {
            return (0, None);
        }

        match self
            .notifier
            .notify(&novel, settings.cutoff, &self.options.appointment_url, &mut state)
            .await
        {
            Ok(sent) => (sent, None),
            Err(err) => (0, Some(err.to_string())),
        }
    }
}
