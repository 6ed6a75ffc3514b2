// Event normalizer — raw capture records in, validated ActivityEvents out.
//
// The only gate between untrusted input and the detection pipeline. A
// record that fails here is rejected with a typed MalformedEvent and never
// reaches fusion; the caller owns the rejection counter and any retry
// semantics.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::{ActivityEvent, EventKind, HttpMethod};

/// A raw activity record as received from the capture agent.
///
/// Every field is optional at this layer; the normalizer decides what is
/// required, what defaults, and what rejects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub ts: Option<String>,
    pub user_id: Option<String>,
    pub domain: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub upload_size_bytes: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Why a raw record was rejected. These terminate processing for the
/// single record only; they are counted, not retried.
#[derive(Debug, Error)]
pub enum MalformedEvent {
    #[error("record has no timestamp")]
    MissingTimestamp,
    #[error("timestamp is not RFC 3339: {0:?}")]
    BadTimestamp(String),
    #[error("record has no domain")]
    MissingDomain,
    #[error("domain is not a hostname: {0:?}")]
    BadDomain(String),
}

/// Validate and canonicalize a raw record into an ActivityEvent.
///
/// Required: a parseable RFC 3339 timestamp and a non-empty hostname.
/// Defaulted: method (GET), upload size (0), kind (page-navigation),
/// user_id ("unknown"; the capture agent occasionally loses session
/// attribution and those events still get a verdict).
pub fn normalize(raw: &RawRecord) -> Result<ActivityEvent, MalformedEvent> {
    let ts = raw
        .ts
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(MalformedEvent::MissingTimestamp)?;
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(ts)
        .map_err(|_| MalformedEvent::BadTimestamp(ts.to_string()))?
        .with_timezone(&Utc);

    let domain = raw
        .domain
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(MalformedEvent::MissingDomain)?;
    if domain.contains(char::is_whitespace) || domain.contains('/') || domain.contains(':') {
        return Err(MalformedEvent::BadDomain(domain.to_string()));
    }
    let domain = domain.trim_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return Err(MalformedEvent::BadDomain(".".to_string()));
    }

    let upload_size_bytes = raw.upload_size_bytes.unwrap_or(0).max(0) as u64;

    Ok(ActivityEvent {
        timestamp,
        user_id: raw
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string(),
        domain,
        path: raw.url.clone().unwrap_or_default(),
        method: HttpMethod::parse(raw.method.as_deref().unwrap_or("")),
        upload_size_bytes,
        kind: EventKind::parse(raw.kind.as_deref()),
    })
}
