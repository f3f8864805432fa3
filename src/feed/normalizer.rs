use chrono::{DateTime, Utc};
use thiserror::Error;

use super::parser::RawEntry;

/// RFC 1123 with a numeric zone offset, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";

/// [`RFC1123Z`] after the leading `Ddd, ` token.
const RFC1123Z_DATE: &str = "%d %b %Y %H:%M:%S %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Why a single entry could not become a post.
///
/// These never fail a document: the entry is logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("Unparseable publish date {raw:?}: {reason}")]
    InvalidPublishDate { raw: String, reason: String },

    /// The link is the dedup key, so an entry without one cannot be stored.
    #[error("Entry {title:?} has no link")]
    MissingLink { title: String },
}

/// A feed entry ready to be stored as a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCandidate {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Turn a raw entry into a [`PostCandidate`].
///
/// Fields are trimmed, a blank description becomes `None` and a blank title
/// becomes "Untitled". An entry whose `pubDate` does not parse is rejected
/// rather than stored with a made-up timestamp.
pub fn normalize(entry: &RawEntry) -> Result<PostCandidate, NormalizationError> {
    let title = match entry.title.trim() {
        "" => "Untitled".to_string(),
        t => t.to_string(),
    };

    let url = entry.link.trim();
    if url.is_empty() {
        return Err(NormalizationError::MissingLink { title });
    }

    let published_at = parse_pub_date(&entry.pub_date)?;

    let description = Some(entry.description.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(PostCandidate {
        title,
        url: url.to_string(),
        description,
        published_at,
    })
}

/// Parse an RSS `pubDate` in [`RFC1123Z`] form into a UTC instant.
///
/// The weekday must be a valid day name but is not checked against the
/// date: feeds often get it wrong while the date itself is right.
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>, NormalizationError> {
    let invalid = |reason: String| NormalizationError::InvalidPublishDate {
        raw: raw.to_string(),
        reason,
    };

    let (weekday, rest) = raw
        .trim()
        .split_once(", ")
        .ok_or_else(|| invalid("missing weekday".to_string()))?;
    if !WEEKDAYS.iter().any(|day| day.eq_ignore_ascii_case(weekday)) {
        return Err(invalid(format!("unknown weekday {weekday:?}")));
    }

    DateTime::parse_from_str(rest, RFC1123Z_DATE)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(e.to_string()))
}
