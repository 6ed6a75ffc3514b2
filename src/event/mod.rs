// Activity events — the normalized records that flow through the engine.
//
// ActivityEvent is immutable and only constructed by the normalizer;
// everything downstream can rely on its fields being validated.

pub mod normalize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTTP method of the observed request. Unknown methods normalize to GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            _ => HttpMethod::Get,
        }
    }

    /// Whether this method can carry outbound data (drives the intent
    /// multiplier in fusion).
    pub fn is_egress(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

/// What kind of browser activity produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PageNavigation,
    ApiCall,
    Socket,
    Heartbeat,
}

impl EventKind {
    /// Parse the optional `type` field; anything unknown is treated as a
    /// page navigation rather than rejected.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("api-call") => EventKind::ApiCall,
            Some("socket") => EventKind::Socket,
            Some("heartbeat") => EventKind::Heartbeat,
            _ => EventKind::PageNavigation,
        }
    }
}

/// A validated, canonicalized network-activity event.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    /// Lowercased hostname, guaranteed non-empty
    pub domain: String,
    pub path: String,
    pub method: HttpMethod,
    pub upload_size_bytes: u64,
    pub kind: EventKind,
}
