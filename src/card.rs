//! Card parsing: one location card's header/footer text into an [`AppointmentRecord`].
//!
//! Every field is looked up through a prioritized list of selectors and degrades on its
//! own: a missing footer gives `Unknown`, a missing link gives no map link, and only a
//! missing location name drops the card.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::model::{AppointmentRecord, NextAvailable};

/// Source formats tried in order; the first that parses wins.
pub const SOURCE_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%B %d, %Y %I:%M %p",
];

static NEXT_AVAILABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Next\s+Available:[ \t]*([^\r\n]*)").expect("Failed to compile label pattern")
});

static CARD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.locationCard").expect("Failed to parse card selector")
});

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to parse link selector")
});

/// What the browsing side exposes for one card.
pub trait CardHandle {
    /// Text of the first element matching `selector`, `None` when absent or blank.
    fn text(&self, selector: &str) -> Option<String>;

    /// `href` of the first link, in document order, whose target contains any of `fragments`.
    fn link_matching(&self, fragments: &[String]) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct CardSelectors {
    pub header: Vec<String>,
    pub footer: Vec<String>,
    pub map_hosts: Vec<String>,
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self {
            header: vec![".AppointcardHeader".into()],
            footer: vec!["#cardFooter".into(), ".cardFooter".into(), ".footer".into()],
            map_hosts: vec![
                "maps.google".into(),
                "google.com/maps".into(),
                "goo.gl/maps".into(),
            ],
        }
    }
}

fn first_text<C: CardHandle + ?Sized>(card: &C, selectors: &[String]) -> Option<String> {
    selectors.iter().find_map(|sel| card.text(sel))
}

pub fn parse_card<C: CardHandle + ?Sized>(card: &C, selectors: &CardSelectors) -> Option<AppointmentRecord> {
    let Some(location) = first_text(card, &selectors.header).as_deref().and_then(first_line) else {
        debug!("Skipping card without a location header");
        return None;
    };

    let next_available = match first_text(card, &selectors.footer) {
        Some(footer) => parse_next_available(&footer),
        None => {
            debug!(location = %location, "No footer text found");
            NextAvailable::Unknown
        }
    };

    let map_link = card.link_matching(&selectors.map_hosts);

    Some(AppointmentRecord {
        location,
        next_available,
        map_link,
    })
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Finds the `Next Available:` line and parses what follows it on that line.
pub fn parse_next_available(text: &str) -> NextAvailable {
    let Some(caps) = NEXT_AVAILABLE.captures(text) else {
        return NextAvailable::Unknown;
    };
    let raw = caps.get(1).map_or("", |m| m.as_str());
    match parse_source_timestamp(raw) {
        Some(ts) => NextAvailable::At(ts),
        None => {
            debug!(raw = %raw.trim(), "Unrecognized appointment date");
            NextAvailable::Unknown
        }
    }
}

pub fn parse_source_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    SOURCE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&collapsed, fmt).ok())
}

/// Trims every line and drops the blank ones.
pub fn normalize_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(trimmed);
        }
    }

    result
}

impl CardHandle for ElementRef<'_> {
    fn text(&self, selector: &str) -> Option<String> {
        let selector = match Selector::parse(selector) {
            Ok(selector) => selector,
            Err(err) => {
                debug!(selector, error = ?err, "Invalid card selector");
                return None;
            }
        };
        let element = self.select(&selector).next()?;
        let text = normalize_text(&inner_text(element));
        (!text.is_empty()).then_some(text)
    }

    fn link_matching(&self, fragments: &[String]) -> Option<String> {
        self.select(&LINK_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| fragments.iter().any(|f| href.contains(f.as_str())))
            .map(str::to_string)
    }
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "section",
    "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// Rendered-ish text: `<br>` and block boundaries become line breaks, scripts are skipped.
pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_inner_text(element, &mut out);
    out
}

fn push_inner_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        match child.value().name() {
            "br" => out.push('\n'),
            "script" | "style" | "template" => {}
            name if BLOCK_ELEMENTS.contains(&name) => {
                out.push('\n');
                push_inner_text(child, out);
                out.push('\n');
            }
            _ => push_inner_text(child, out),
        }
    }
}

/// Parses every location card in document order.
pub fn parse_cards(html: &str, selectors: &CardSelectors) -> Vec<AppointmentRecord> {
    let document = Html::parse_document(html);

    document
        .select(&CARD_SELECTOR)
        .filter_map(|card| parse_card(&card, selectors))
        .collect()
}
