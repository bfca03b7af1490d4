//! Fieldmeter - Offline-First Reading Capture & Sync Engine
//!
//! Fieldmeter is the synchronization core of a field-metering and billing
//! client: operators scan meter QR codes, capture readings with photo
//! evidence, and submit them to a central billing service. Connectivity in
//! the field is unreliable, so readings are captured, validated, and queued
//! locally, then reconciled with the server once a connection exists,
//! without losing data, double-submitting, or bypassing billing-period
//! locks.
//!
//! # Module Structure
//!
//! - **`engine`** - the offline sync engine: owns the durable queue, drives
//!   submissions, and enforces the `pending | failed | approved` state
//!   machine with serialized per-entry attempts and FIFO retry sweeps
//! - **`store`** - durable queue persistence: one atomically written JSON
//!   document; corruption loads as an empty queue instead of crash-looping
//! - **`client`** - the reading submission client: POSTs readings with a
//!   per-call bearer credential and classifies outcomes into submitted,
//!   rejected, unauthorized, and transient network failure
//! - **`imagefit`** - the image size-fitter: deterministic re-encoding
//!   ladder that guarantees photo evidence fits a hard payload cap
//! - **`billing`** - billing-period lock checks with the asymmetric
//!   default (no metadata: open; ambiguous status: locked)
//! - **`connectivity`** - reachability signal and change notifications
//! - **`auth`** - credential provider port and a fail-closed JWT claims
//!   decoder
//! - **`model`**, **`config`**, **`error`** - queue data model, engine
//!   configuration, and the crate error taxonomy
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fieldmeter::auth::StaticCredentials;
//! use fieldmeter::client::ReadingClient;
//! use fieldmeter::config::Config;
//! use fieldmeter::connectivity::ConnectivityMonitor;
//! use fieldmeter::engine::SyncEngine;
//! use fieldmeter::store::JsonFileStore;
//!
//! # async fn example() -> Result<(), fieldmeter::error::SyncError> {
//! let config = Config::new();
//! let credentials = Arc::new(StaticCredentials::new("bearer-token"));
//! let client = Arc::new(ReadingClient::new(config, credentials));
//! let store = Arc::new(JsonFileStore::at_default_location()?);
//!
//! let engine = Arc::new(SyncEngine::new(store, client).await);
//!
//! let monitor = ConnectivityMonitor::new();
//! engine.clone().spawn_retry_on_reconnect(&monitor);
//!
//! // The platform feeds reachability changes in; offline -> online
//! // transitions sweep the queue automatically.
//! monitor.set_online(true);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency Model
//!
//! The queue is the one shared mutable resource; only the engine writes to
//! it. Submission attempts are serialized per entry, sweeps never overlap,
//! and the persisted queue reflects the in-memory queue after every
//! mutation. All slow work (network, store IO, re-encoding) happens at
//! async suspension points.
//!
//! # Error Handling
//!
//! Local failures (validation, billing lock, store, image fitting) fail
//! fast before an entry enters the queue. Remote failures are recorded on
//! the entry (`status = failed`, `error = reason`) so it survives for
//! retry; see [`error::SyncError`] for the taxonomy.

/// Credential access and claims decoding
pub mod auth;

/// Billing-period lock checks
pub mod billing;

/// Reading submission client
pub mod client;

/// Engine configuration
pub mod config;

/// Network reachability monitoring
pub mod connectivity;

/// Offline sync engine
pub mod engine;

/// Crate error taxonomy
pub mod error;

/// Image size-fitting
pub mod imagefit;

/// Queue data model
pub mod model;

/// Durable queue persistence
pub mod store;

pub use billing::{BillingLockChecker, BillingPeriodHeader, PeriodRange};
pub use client::{ReadingClient, SubmitOutcome, SubmitReading};
pub use config::Config;
pub use connectivity::ConnectivityMonitor;
pub use engine::{SweepReport, SyncEngine};
pub use error::SyncError;
pub use imagefit::{fit, fit_bytes, FitError, FittedImage};
pub use model::{QueueStats, QueuedReading, ReadingDraft, ReadingStatus};
pub use store::{JsonFileStore, MemoryStore, QueueStore};
