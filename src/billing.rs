//! # Billing Lock Checker
//!
//! Decides whether a candidate reading date falls inside a closed billing
//! period for a building.
//!
//! The default posture is deliberately asymmetric. When no period metadata
//! has been loaded at all, every date reads as unlocked, so a metadata
//! fetch failure never blocks field work. Once metadata exists, a header
//! with a missing or unrecognized status reads as locked: a period that
//! might be closed cannot be confirmed open.
//!
//! Headers are loaded once per session from the billing-headers endpoint;
//! there is no per-operation probing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive date range of a billing period
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodRange {
    /// First day of the period
    pub start: NaiveDate,
    /// Last day of the period
    pub end: NaiveDate,
}

impl PeriodRange {
    /// Whether `date` falls inside this range
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// One billing-period header from the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BillingPeriodHeader {
    /// Building the period applies to
    pub building_id: String,
    /// The period's date range
    pub period: PeriodRange,
    /// Period status as reported by the server; absent means indeterminate
    #[serde(default)]
    pub status: Option<String>,
}

impl BillingPeriodHeader {
    /// A period is only open when the server says so explicitly.
    pub fn is_open(&self) -> bool {
        matches!(&self.status, Some(s) if s.eq_ignore_ascii_case("open"))
    }
}

/// Session-scoped view of billing-period locks.
#[derive(Debug, Default)]
pub struct BillingLockChecker {
    /// `None` until the first successful metadata load
    headers: Option<Vec<BillingPeriodHeader>>,
}

impl BillingLockChecker {
    /// Checker with no metadata loaded; everything reads unlocked
    pub fn new() -> Self {
        Self::default()
    }

    /// Checker seeded with period headers
    pub fn with_headers(headers: Vec<BillingPeriodHeader>) -> Self {
        Self {
            headers: Some(headers),
        }
    }

    /// Record the session's period headers.
    pub fn load_headers(&mut self, headers: Vec<BillingPeriodHeader>) {
        tracing::debug!(count = headers.len(), "billing period headers loaded");
        self.headers = Some(headers);
    }

    /// Whether metadata has been loaded this session
    pub fn is_loaded(&self) -> bool {
        self.headers.is_some()
    }

    /// Whether `date` is inside a closed period for `building_id`.
    pub fn is_locked(&self, building_id: &str, date: NaiveDate) -> bool {
        let Some(headers) = &self.headers else {
            // Metadata unavailable: stay writable.
            return false;
        };
        headers
            .iter()
            .any(|h| h.building_id == building_id && h.period.contains(date) && !h.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn header(
        building: &str,
        start: NaiveDate,
        end: NaiveDate,
        status: Option<&str>,
    ) -> BillingPeriodHeader {
        BillingPeriodHeader {
            building_id: building.to_string(),
            period: PeriodRange { start, end },
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn test_unloaded_metadata_defaults_to_unlocked() {
        let checker = BillingLockChecker::new();
        assert!(!checker.is_locked("BLD-1", date(2024, 1, 15)));
        assert!(!checker.is_loaded());
    }

    #[test]
    fn test_closed_period_locks_contained_dates() {
        let checker = BillingLockChecker::with_headers(vec![header(
            "BLD-1",
            date(2024, 1, 1),
            date(2024, 1, 31),
            Some("closed"),
        )]);

        assert!(checker.is_locked("BLD-1", date(2024, 1, 15)));
        assert!(checker.is_locked("BLD-1", date(2024, 1, 1)));
        assert!(checker.is_locked("BLD-1", date(2024, 1, 31)));
        assert!(!checker.is_locked("BLD-1", date(2024, 2, 1)));
        assert!(!checker.is_locked("BLD-2", date(2024, 1, 15)));
    }

    #[test]
    fn test_missing_status_defaults_to_locked_once_loaded() {
        let checker = BillingLockChecker::with_headers(vec![header(
            "BLD-1",
            date(2024, 1, 1),
            date(2024, 1, 31),
            None,
        )]);
        assert!(checker.is_locked("BLD-1", date(2024, 1, 15)));
    }

    #[test]
    fn test_unrecognized_status_defaults_to_locked() {
        let checker = BillingLockChecker::with_headers(vec![header(
            "BLD-1",
            date(2024, 1, 1),
            date(2024, 1, 31),
            Some("finalizing"),
        )]);
        assert!(checker.is_locked("BLD-1", date(2024, 1, 15)));
    }

    #[test]
    fn test_open_period_does_not_lock() {
        let checker = BillingLockChecker::with_headers(vec![header(
            "BLD-1",
            date(2024, 1, 1),
            date(2024, 1, 31),
            Some("open"),
        )]);
        assert!(!checker.is_locked("BLD-1", date(2024, 1, 15)));

        // Case-insensitive status match
        let checker = BillingLockChecker::with_headers(vec![header(
            "BLD-1",
            date(2024, 1, 1),
            date(2024, 1, 31),
            Some("OPEN"),
        )]);
        assert!(!checker.is_locked("BLD-1", date(2024, 1, 15)));
    }

    #[test]
    fn test_header_wire_shape() {
        let json = r#"{"buildingId":"BLD-3","period":{"start":"2024-03-01","end":"2024-03-31"},"status":"closed"}"#;
        let header: BillingPeriodHeader = serde_json::from_str(json).unwrap();
        assert_eq!(header.building_id, "BLD-3");
        assert!(header.period.contains(date(2024, 3, 10)));
        assert!(!header.is_open());
    }

    #[test]
    fn test_header_wire_shape_without_status() {
        let json = r#"{"buildingId":"BLD-3","period":{"start":"2024-03-01","end":"2024-03-31"}}"#;
        let header: BillingPeriodHeader = serde_json::from_str(json).unwrap();
        assert_eq!(header.status, None);
    }
}
