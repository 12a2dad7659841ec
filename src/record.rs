//! Record extraction — pulls the three numbered fields out of a notification
//! body and shapes the row that goes to the remote table.
//!
//! Pure string parsing, no I/O.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Output layout for the send time column.
pub const SENT_AT_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// The three fields carried by one payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingRecord {
    /// Payment account number, separators removed.
    pub account_id: String,
    pub bill_id: String,
    /// Link to the payment detail page.
    pub detail_link: String,
}

/// One row as submitted to the remote table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "IDSMS")]
    pub message_id: String,
    #[serde(rename = "MaThanhToan")]
    pub account_id: String,
    #[serde(rename = "IDthanhtoan")]
    pub bill_id: String,
    #[serde(rename = "Linkcheck")]
    pub detail_link: String,
    /// `MM/DD/YYYY HH:MM:SS` in the target zone, or empty when unknown.
    #[serde(rename = "ThoiGianThanhToan")]
    pub sent_at: String,
}

impl TableRow {
    pub fn new(message_id: impl Into<String>, record: BillingRecord, sent_at: String) -> Self {
        Self {
            message_id: message_id.into(),
            account_id: record.account_id,
            bill_id: record.bill_id,
            detail_link: record.detail_link,
            sent_at,
        }
    }
}

/// Extract a [`BillingRecord`] from a plain-text body.
///
/// Lines are trimmed and matched on the `1.`, `2.`, `3.` prefixes; a later
/// line with the same prefix replaces an earlier one. Returns `None` unless
/// all three fields are present and non-empty.
pub fn extract_record(body: &str) -> Option<BillingRecord> {
    let mut account = None;
    let mut bill = None;
    let mut link = None;

    for line in body.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("1.") {
            account = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("2.") {
            bill = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("3.") {
            link = Some(rest.trim());
        }
    }

    let (account, bill, link) = (account?, bill?, link?);
    if account.is_empty() || bill.is_empty() || link.is_empty() {
        return None;
    }

    Some(BillingRecord {
        account_id: account.replace('-', ""),
        bill_id: bill.to_string(),
        detail_link: link.to_string(),
    })
}

/// Reformat an RFC 2822 `Date` header into the target zone.
pub fn format_sent_at(date_header: &str, zone: &FixedOffset) -> Result<String, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc2822(strip_trailing_comment(date_header))?;
    Ok(parsed.with_timezone(zone).format(SENT_AT_FORMAT).to_string())
}

/// Drop a trailing `(UTC)`-style comment, which some mailers append.
fn strip_trailing_comment(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.ends_with(')')
        && let Some(open) = trimmed.rfind('(')
    {
        return trimmed[..open].trim_end();
    }
    trimmed
}
