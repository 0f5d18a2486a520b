/// file: src/types.rs
/// description: wire payloads, REST bodies and shared value types of the skill swap platform
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

// Platform timestamps are naive ISO-8601 in UTC; accept offsets too and drop
// anything unparseable instead of rejecting the whole payload.
mod lenient_timestamp {
    use super::*;
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Alert severity, mirroring the four alert styles the platform renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSeverity(pub String);

impl fmt::Display for UnknownSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown severity '{}'", self.0)
    }
}

impl std::error::Error for UnknownSeverity {}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "success" => Ok(Severity::Success),
            "warning" => Ok(Severity::Warning),
            "danger" => Ok(Severity::Danger),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

impl Severity {
    /// Parse a severity, falling back to [`Severity::Info`] when it is missing
    /// or not one of the known values.
    pub fn lenient(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two server-backed counters shown to a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    Pending,
    Active,
}

impl CounterKind {
    /// REST path returning `{"count": n}` for this counter.
    pub fn endpoint(&self) -> &'static str {
        match self {
            CounterKind::Pending => "api/swaps/pending-count",
            CounterKind::Active => "api/swaps/active-count",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            CounterKind::Pending => 0,
            CounterKind::Active => 1,
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKind::Pending => f.write_str("pending"),
            CounterKind::Active => f.write_str("active"),
        }
    }
}

// Event channel frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl WireFrame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequestPayload {
    pub receiver_id: i64,
    pub requester_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapDecisionPayload {
    pub requester_id: i64,
    pub receiver_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMessagePayload {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp::deserialize")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// An operator announcement as shown in the message region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformBroadcast {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl From<PlatformMessagePayload> for PlatformBroadcast {
    fn from(payload: PlatformMessagePayload) -> Self {
        Self {
            severity: Severity::lenient(payload.kind.as_deref()),
            timestamp: payload.timestamp.unwrap_or_else(Utc::now),
            title: payload.title,
            message: payload.message,
        }
    }
}

// REST bodies
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSearchRequest<'a> {
    pub search: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSearchResponse {
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCheckRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAvailability {
    pub available: bool,
    #[serde(default)]
    pub message: String,
}
