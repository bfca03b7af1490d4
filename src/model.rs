//! # Queue Data Model
//!
//! Types for locally captured meter readings awaiting confirmed delivery to
//! the billing backend, plus the wire DTOs the submission client uses.
//!
//! Serialized entries must tolerate legacy records missing newer optional
//! fields, so optional fields carry `#[serde(default)]`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a queued reading
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    /// Waiting to be submitted
    Pending,
    /// Last submission attempt failed; `error` holds the reason
    Failed,
    /// Confirmed persisted on the server; eligible for purge
    Approved,
}

/// A locally captured meter reading not yet confirmed on the server.
///
/// The queue holding these entries is the single source of truth for what
/// is still owed to the server; UI views are derived snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedReading {
    /// Locally generated identifier, unique across restarts and clock skew
    pub id: Uuid,
    /// The meter this reading belongs to
    pub meter_id: String,
    /// Building the meter belongs to, used for billing-lock checks
    pub building_id: String,
    /// Numeric meter value at capture time
    pub reading_value: f64,
    /// Calendar date the reading applies to (no time component)
    pub read_date: NaiveDate,
    /// Optional free text; required when the value is a large jump
    #[serde(default)]
    pub remarks: Option<String>,
    /// Base64-encoded photo evidence, already size-fitted
    pub image: String,
    /// Timestamp the entry was queued; immutable
    pub created_at: DateTime<Utc>,
    /// Current lifecycle state
    pub status: ReadingStatus,
    /// Last failure reason, present only while `status` is `Failed`
    #[serde(default)]
    pub error: Option<String>,
}

impl QueuedReading {
    /// Whether this entry is eligible for a submission attempt
    pub fn is_submittable(&self) -> bool {
        matches!(self.status, ReadingStatus::Pending | ReadingStatus::Failed)
    }
}

/// Capture-time input for a new reading.
///
/// Carries the context the engine needs for pre-queue validation: the
/// building for the billing-lock check and the meter's last known reading
/// for the large-jump remarks rule.
#[derive(Debug, Clone)]
pub struct ReadingDraft {
    /// The meter being read
    pub meter_id: String,
    /// Building the meter belongs to
    pub building_id: String,
    /// Captured meter value
    pub reading_value: f64,
    /// Date the reading applies to
    pub read_date: NaiveDate,
    /// Optional operator remarks
    pub remarks: Option<String>,
    /// Size-fitted base64 photo evidence
    pub image: String,
    /// Last known reading for this meter, if any
    pub last_reading: Option<f64>,
}

/// Wire payload for `POST /readings`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReadingRequest<'a> {
    pub meter_id: &'a str,
    pub reading_value: f64,
    pub read_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<&'a str>,
    pub image: &'a str,
}

impl<'a> SubmitReadingRequest<'a> {
    pub fn from_reading(reading: &'a QueuedReading) -> Self {
        Self {
            meter_id: &reading.meter_id,
            reading_value: reading.reading_value,
            read_date: reading.read_date,
            remarks: reading.remarks.as_deref(),
            image: &reading.image,
        }
    }
}

/// Structured error body returned by the backend (`{error | message}`)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Best available reason text, if the body carried one
    pub fn reason(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Queue statistics for UI display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total entries in the queue
    pub total: usize,
    /// Entries waiting for submission
    pub pending: usize,
    /// Entries whose last attempt failed
    pub failed: usize,
    /// Entries confirmed on the server
    pub approved: usize,
}
