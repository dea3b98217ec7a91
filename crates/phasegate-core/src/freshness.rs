use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD_DAYS: u32 = 7;

/// Research recency for one workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    /// RFC 3339 (or naive ISO 8601) timestamp of the last research source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_researched: Option<String>,
    /// Per-instance override of the configured threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_days: Option<u32>,
    #[serde(default = "default_enforce")]
    pub enforce: bool,
}

fn default_enforce() -> bool {
    true
}

impl Default for Freshness {
    fn default() -> Self {
        Self {
            last_researched: None,
            threshold_days: None,
            enforce: default_enforce(),
        }
    }
}

impl Freshness {
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_researched = Some(at.to_rfc3339());
    }

    pub fn threshold(&self, configured: u32) -> u32 {
        self.threshold_days.unwrap_or(configured)
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

/// Whole days elapsed since `timestamp`, or `None` when it is missing or malformed.
pub fn days_old(timestamp: Option<&str>, now: DateTime<Utc>) -> Option<i64> {
    let ts = parse_timestamp(timestamp?)?;
    Some((now - ts).num_days())
}

/// `now - timestamp > threshold_days`. Missing or malformed timestamps are never stale.
pub fn is_stale(timestamp: Option<&str>, threshold_days: u32, now: DateTime<Utc>) -> bool {
    days_old(timestamp, now)
        .map(|days| days > i64::from(threshold_days))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stale_only_past_threshold() {
        let now = Utc::now();
        let eight = (now - Duration::days(8)).to_rfc3339();
        let seven = (now - Duration::days(7)).to_rfc3339();
        assert!(is_stale(Some(&eight), 7, now));
        assert!(!is_stale(Some(&seven), 7, now));
        assert!(!is_stale(Some(&eight), 10, now));
    }

    #[test]
    fn missing_or_malformed_is_fresh() {
        let now = Utc::now();
        assert!(!is_stale(None, 0, now));
        assert!(!is_stale(Some("last tuesday"), 0, now));
        assert_eq!(days_old(Some(""), now), None);
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let now = parse_timestamp("2026-01-20T00:00:00Z").unwrap();
        assert_eq!(days_old(Some("2026-01-10T12:30:00.123456"), now), Some(9));
    }

    #[test]
    fn instance_override_wins() {
        let f = Freshness {
            threshold_days: Some(30),
            ..Default::default()
        };
        assert_eq!(f.threshold(DEFAULT_THRESHOLD_DAYS), 30);
        assert_eq!(Freshness::default().threshold(DEFAULT_THRESHOLD_DAYS), 7);
    }
}
