// src/extract/mod.rs
// Row extraction for the portal's notices and job-listings tables.
// One bad row never aborts the batch: each row yields a
// Result<CandidateItem, ExtractError> and the engine drops the failures.

pub mod portal;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

/// Which portal listing a row came from. Dedup treats both uniformly; the
/// category only flavors the fingerprint and the rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Category {
    Notice,
    Job,
}

impl Category {
    pub fn tag(&self) -> &'static str {
        match self {
            Category::Notice => "notice",
            Category::Job => "job",
        }
    }
}

/// One scraped row, alive for a single detection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub category: Category,
    pub title: String,
    pub link: String,
    /// Publish time as reported by the portal, converted to UTC.
    pub published_at: DateTime<Utc>,
    /// Free-text extras (eligibility, venue, ...); display only, never hashed.
    pub details: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("row has no date cell")]
    MissingDate,
    #[error("unparseable date {0:?}")]
    BadDate(String),
    #[error("row has no title link")]
    MissingTitle,
}

/// Supplies one batch of candidate rows per cycle. The outer error means the
/// fetch itself failed and the cycle must abort; inner errors drop single rows.
#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Result<CandidateItem, ExtractError>>>;
    fn name(&self) -> &'static str;
}

/// The portal reports wall-clock IST; UTC everywhere past this boundary.
pub fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
}

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

static RE_ROW: OnceCell<Regex> = OnceCell::new();
static RE_TD: OnceCell<Regex> = OnceCell::new();
static RE_DATA_ORDER: OnceCell<Regex> = OnceCell::new();
static RE_TITLE_LINK: OnceCell<Regex> = OnceCell::new();
static RE_ANY_LINK: OnceCell<Regex> = OnceCell::new();
static RE_SMALL: OnceCell<Regex> = OnceCell::new();
static RE_TAGS: OnceCell<Regex> = OnceCell::new();
static RE_WS: OnceCell<Regex> = OnceCell::new();

/// Strip tags, decode entities, collapse whitespace.
pub fn text_content(fragment: &str) -> String {
    let no_tags = re(&RE_TAGS, r"(?is)</?[^>]+>").replace_all(fragment, " ");
    let decoded = html_escape::decode_html_entities(&no_tags).to_string();
    re(&RE_WS, r"\s+")
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}

/// Slice out `<tbody>` of the table with the given id attribute, if present.
fn table_body<'a>(html: &'a str, table_id: &str) -> Option<&'a str> {
    let marker = format!("id=\"{table_id}\"");
    let start = html.find(&marker)?;
    let rest = &html[start..];
    let end = rest.find("</table>").unwrap_or(rest.len());
    Some(&rest[..end])
}

fn row_cells(row: &str) -> Vec<&str> {
    re(&RE_TD, r"(?is)<td[^>]*>.*?</td>")
        .find_iter(row)
        .map(|m| m.as_str())
        .collect()
}

fn data_order(cell: &str) -> Option<&str> {
    re(&RE_DATA_ORDER, r#"data-order\s*=\s*"([^"]*)""#)
        .captures(cell)
        .map(|c| c.get(1).unwrap().as_str())
}

fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rel) = href.strip_prefix('/') {
        format!("{}/{rel}", base.trim_end_matches('/'))
    } else {
        format!("{}/{href}", base.trim_end_matches('/'))
    }
}

fn ist_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>, ExtractError> {
    ist_offset()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ExtractError::BadDate(naive.to_string()))
}

/// Notice dates come as `data-order="YYYY/MM/DD HH:MM:SS"`, with the visible
/// `DD/MM/YYYY HH:MM` text as fallback for rows missing the attribute.
fn parse_notice_date(cell: &str) -> Result<DateTime<Utc>, ExtractError> {
    if let Some(raw) = data_order(cell) {
        let naive = NaiveDateTime::parse_from_str(raw, "%Y/%m/%d %H:%M:%S")
            .map_err(|_| ExtractError::BadDate(raw.to_string()))?;
        return ist_to_utc(naive);
    }
    let mut visible = text_content(cell);
    if let Some(stripped) = visible.strip_suffix(" IST") {
        visible = stripped.to_string();
    }
    if visible.is_empty() {
        return Err(ExtractError::MissingDate);
    }
    let naive = NaiveDateTime::parse_from_str(&visible, "%d/%m/%Y %H:%M")
        .map_err(|_| ExtractError::BadDate(visible.clone()))?;
    ist_to_utc(naive)
}

/// Job dates are date-only `data-order="YYYY/MM/DD"`, occasionally with a
/// time suffix. Midnight IST is assumed for date-only rows.
fn parse_job_date(cell: &str) -> Result<DateTime<Utc>, ExtractError> {
    let raw = data_order(cell).ok_or(ExtractError::MissingDate)?;
    let naive = NaiveDate::parse_from_str(raw, "%Y/%m/%d")
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y/%m/%d %H:%M:%S"))
        .map_err(|_| ExtractError::BadDate(raw.to_string()))?;
    ist_to_utc(naive)
}

/// Parse the `#newsevents` table. Structural filler rows (no cells) are
/// skipped outright; rows that look like notices but fail to parse come back
/// as errors so the caller can log the reason.
pub fn extract_notices(html: &str, base_url: &str) -> Vec<Result<CandidateItem, ExtractError>> {
    let Some(body) = table_body(html, "newsevents") else {
        tracing::warn!("notices table not found in page");
        return Vec::new();
    };
    let mut out = Vec::new();
    for row in re(&RE_ROW, r"(?is)<tr[^>]*>.*?</tr>").find_iter(body) {
        let row = row.as_str();
        let cells = row_cells(row);
        if cells.len() < 2 {
            continue;
        }
        out.push(parse_notice_row(row, &cells, base_url));
    }
    out
}

fn parse_notice_row(
    row: &str,
    cells: &[&str],
    base_url: &str,
) -> Result<CandidateItem, ExtractError> {
    let published_at = parse_notice_date(cells[1])?;

    let caps = re(
        &RE_TITLE_LINK,
        r#"(?is)<h6[^>]*>.*?<a[^>]*href\s*=\s*"([^"]*)"[^>]*>(.*?)</a>"#,
    )
    .captures(row)
    .ok_or(ExtractError::MissingTitle)?;
    let link = absolutize(base_url, caps.get(1).unwrap().as_str());
    let title = text_content(caps.get(2).unwrap().as_str());
    if title.is_empty() {
        return Err(ExtractError::MissingTitle);
    }

    let details = re(&RE_SMALL, r"(?is)<small[^>]*>(.*?)</small>")
        .captures(row)
        .map(|c| text_content(c.get(1).unwrap().as_str()))
        .unwrap_or_default();

    Ok(CandidateItem {
        category: Category::Notice,
        title,
        link,
        published_at,
        details,
    })
}

/// Parse the `#job-listings` table: company name in the first cell, posting
/// date in the second, and an "Apply" link somewhere in the row.
pub fn extract_jobs(html: &str, base_url: &str) -> Vec<Result<CandidateItem, ExtractError>> {
    let Some(body) = table_body(html, "job-listings") else {
        tracing::warn!("job listings table not found in page");
        return Vec::new();
    };
    let mut out = Vec::new();
    for row in re(&RE_ROW, r"(?is)<tr[^>]*>.*?</tr>").find_iter(body) {
        let row = row.as_str();
        let cells = row_cells(row);
        if cells.len() < 2 {
            continue;
        }
        out.push(parse_job_row(row, &cells, base_url));
    }
    out
}

fn parse_job_row(row: &str, cells: &[&str], base_url: &str) -> Result<CandidateItem, ExtractError> {
    let published_at = parse_job_date(cells[1])?;

    let company = text_content(cells[0]);
    if company.is_empty() {
        return Err(ExtractError::MissingTitle);
    }

    let link_re = re(&RE_ANY_LINK, r#"(?is)<a[^>]*href\s*=\s*"([^"]*)"[^>]*>(.*?)</a>"#);
    let apply_link = link_re
        .captures_iter(row)
        .find(|c| {
            text_content(c.get(2).unwrap().as_str())
                .to_ascii_lowercase()
                .contains("apply")
        })
        .map(|c| absolutize(base_url, c.get(1).unwrap().as_str()))
        .unwrap_or_else(|| "No link available".to_string());

    Ok(CandidateItem {
        category: Category::Job,
        title: company,
        link: apply_link,
        published_at,
        details: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const BASE: &str = "https://tp.bitmesra.co.in";

    const NOTICES_HTML: &str = r#"
    <table id="newsevents"><thead><tr><th>Notice</th><th>Date</th></tr></thead>
    <tbody>
      <tr>
        <td><h6><a href="/notice/42.html">Campus Drive &amp; PPT</a></h6>
            <small>Eligibility: CSE, IT</small></td>
        <td data-order="2025/03/01 09:30:00">01/03/2025 09:30 IST</td>
      </tr>
      <tr>
        <td><h6><a href="/notice/43.html">Results Declared</a></h6></td>
        <td>02/03/2025 10:00 IST</td>
      </tr>
      <tr>
        <td><h6><a href="/notice/44.html">Broken Row</a></h6></td>
        <td data-order="not-a-date">garbage</td>
      </tr>
    </tbody></table>"#;

    const JOBS_HTML: &str = r#"
    <table id="job-listings"><tbody>
      <tr>
        <td>Acme Corp</td>
        <td data-order="2025/03/01">01/03/2025</td>
        <td><a href="/job/apply/7">Apply</a></td>
      </tr>
      <tr>
        <td>NoDate Ltd</td>
        <td>01/03/2025</td>
      </tr>
    </tbody></table>"#;

    #[test]
    fn notices_parse_data_order_and_fallback() {
        let rows = extract_notices(NOTICES_HTML, BASE);
        assert_eq!(rows.len(), 3);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.title, "Campus Drive & PPT");
        assert_eq!(first.link, "https://tp.bitmesra.co.in/notice/42.html");
        assert_eq!(first.details, "Eligibility: CSE, IT");
        // 09:30 IST == 04:00 UTC
        assert_eq!(first.published_at.hour(), 4);
        assert_eq!(first.published_at.minute(), 0);

        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.title, "Results Declared");
        assert_eq!(second.published_at.hour(), 4);
        assert_eq!(second.published_at.minute(), 30);

        assert!(matches!(rows[2], Err(ExtractError::BadDate(_))));
    }

    #[test]
    fn jobs_require_data_order() {
        let rows = extract_jobs(JOBS_HTML, BASE);
        assert_eq!(rows.len(), 2);

        let job = rows[0].as_ref().unwrap();
        assert_eq!(job.category, Category::Job);
        assert_eq!(job.title, "Acme Corp");
        assert_eq!(job.link, "https://tp.bitmesra.co.in/job/apply/7");

        assert!(matches!(rows[1], Err(ExtractError::MissingDate)));
    }

    #[test]
    fn missing_table_yields_empty_batch() {
        assert!(extract_notices("<html><body>maintenance</body></html>", BASE).is_empty());
        assert!(extract_jobs("<html></html>", BASE).is_empty());
    }

    #[test]
    fn text_content_strips_and_decodes() {
        assert_eq!(
            text_content("  <b>Hello,&nbsp;&nbsp;world</b>  "),
            "Hello, world"
        );
    }
}
