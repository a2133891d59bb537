use std::future::Future;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use tracing::{info, warn};

use crate::card::{parse_cards, CardSelectors};
use crate::error::{AppError, Result};
use crate::model::AppointmentRecord;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

// Create a static client to reuse connections
static CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build HTTP client")
});

/// Something that can render the appointment page to HTML.
pub trait PageSource: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Plain HTTP GET through the shared client.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpPageSource;

impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = CLIENT.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchError(format!("{} returned {}", url, status)));
        }
        Ok(response.text().await?)
    }
}

/// Fetches the page within `timeout` and parses its cards in page order.
///
/// Timeouts and fetch errors give an empty list, never an error.
pub async fn scrape_cards<S: PageSource>(
    source: &S,
    url: &str,
    timeout: Duration,
    selectors: &CardSelectors,
) -> Vec<AppointmentRecord> {
    let start = Instant::now();

    let html = match tokio::time::timeout(timeout, source.fetch(url)).await {
        Ok(Ok(html)) => html,
        Ok(Err(err)) => {
            warn!(url, error = %err, "Page fetch failed");
            return Vec::new();
        }
        Err(_) => {
            warn!(url, ?timeout, "Page fetch timed out");
            return Vec::new();
        }
    };

    let records = parse_cards(&html, selectors);
    info!(url, cards = records.len(), elapsed = ?start.elapsed(), "Scraped appointment page");
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl PageSource for Fixed {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl PageSource for Failing {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(AppError::FetchError(format!("{} unreachable", url)))
        }
    }

    struct Slow;

    impl PageSource for Slow {
        async fn fetch(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    const PAGE: &str = r#"<div class="locationCard"><div class="AppointcardHeader">Bayonne</div>
        <div id="cardFooter">Next Available: 08/01/2025 09:00 AM</div></div>"#;

    #[tokio::test]
    async fn parses_fetched_page() {
        let records = scrape_cards(&Fixed(PAGE), "u", Duration::from_secs(1), &CardSelectors::default()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, "Bayonne");
    }

    #[tokio::test]
    async fn fetch_error_is_empty() {
        let records = scrape_cards(&Failing, "u", Duration::from_secs(1), &CardSelectors::default()).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn timeout_is_empty() {
        let records = scrape_cards(&Slow, "u", Duration::from_millis(50), &CardSelectors::default()).await;
        assert!(records.is_empty());
    }
}
