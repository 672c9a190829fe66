//! HTTP marker source for Statsguru-style innings lists.
//!
//! A statistic's locator is the URL of a filtered innings list (for example
//! every Test innings of 100 or more by one player). The page holds a
//! results table with one row per qualifying innings; the latest marker is
//! the greatest date in the configured date column.
//!
//! Parsing is a separate, synchronous function so it can be tested against
//! fixed HTML and so the parsed document never lives across an await.

use centurywatch_core::source::{FetchFailure, MarkerSource};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

/// Date format used in the results table, e.g. `8 Dec 2024`.
const ROW_DATE_FORMAT: &str = "%d %b %Y";

/// Marker source that scrapes result pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMarkerSource {
    client: reqwest::Client,
    date_column: String,
}

impl HttpMarkerSource {
    /// Create a source reading `date_column` from pages fetched with `client`.
    pub fn new(client: reqwest::Client, date_column: impl Into<String>) -> Self {
        Self {
            client,
            date_column: date_column.into(),
        }
    }
}

impl MarkerSource for HttpMarkerSource {
    async fn fetch_latest_marker(&self, locator: &str) -> Result<NaiveDate, FetchFailure> {
        tracing::trace!(locator, "Fetching source page");

        let response = self
            .client
            .get(locator)
            .header("Accept-Language", "en-GB,en;q=0.9")
            .send()
            .await
            .map_err(|e| FetchFailure::Http(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                status: status.as_u16(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchFailure::Http(format!("response read failed: {e}")))?;

        tracing::trace!(locator, bytes = html.len(), "Source page received");

        parse_latest_marker(&html, &self.date_column)
    }
}

/// Find the latest date in the `date_column` of the page's results table.
///
/// The first table whose header row names `date_column` is used. Rows
/// without a cell in that column (such as a "no records" banner) are
/// ignored; rows whose date does not parse are skipped as long as at least
/// one row parses.
pub fn parse_latest_marker(html: &str, date_column: &str) -> Result<NaiveDate, FetchFailure> {
    let document = Html::parse_document(html);

    let table_sel = selector("table")?;
    let header_sel = selector("th")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let (table, column) = document
        .select(&table_sel)
        .find_map(|table| {
            table
                .select(&header_sel)
                .position(|th| cell_text(th) == date_column)
                .map(|column| (table, column))
        })
        .ok_or_else(|| FetchFailure::Parse(format!("no table with a `{date_column}` column")))?;

    let mut latest: Option<NaiveDate> = None;
    let mut unparsed: Vec<String> = Vec::new();

    for row in table.select(&row_sel) {
        let Some(cell) = row.select(&cell_sel).nth(column) else {
            continue;
        };
        let text = cell_text(cell);
        match NaiveDate::parse_from_str(&text, ROW_DATE_FORMAT) {
            Ok(date) => latest = latest.max(Some(date)),
            Err(_parse_err) => unparsed.push(text),
        }
    }

    match (latest, unparsed.first()) {
        (Some(date), _) => {
            if !unparsed.is_empty() {
                tracing::debug!(
                    skipped = unparsed.len(),
                    "Skipped rows with unparseable dates"
                );
            }
            Ok(date)
        }
        (None, Some(sample)) => Err(FetchFailure::Parse(format!(
            "no parseable `{date_column}` value, e.g. `{sample}`"
        ))),
        (None, None) => Err(FetchFailure::NoMarker),
    }
}

fn selector(css: &str) -> Result<Selector, FetchFailure> {
    Selector::parse(css)
        .map_err(|e| FetchFailure::Parse(format!("invalid selector `{css}`: {e:?}")))
}

/// Cell text with whitespace collapsed.
fn cell_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}
