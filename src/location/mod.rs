//! Location acquisition
//!
//! A [`LocationAcquirer`] runs a fixed, ordered list of strategies against a
//! [`LocationSource`] and returns the first fix any of them produces:
//!
//! 1. a fresh high-accuracy one-shot request,
//! 2. the source's last known fix,
//! 3. a single-update subscription.
//!
//! Strategy failures never escape; only running out of strategies does.

pub mod ip;
mod strategy;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use crate::data::GeoFix;
pub use ip::IpLocationSource;
pub use strategy::{HighAccuracyOneShot, LastKnown, LocationStrategy, SingleUpdateRequest};

/// Errors surfaced by [`LocationAcquirer::acquire`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The caller has not been granted location access
    #[error("location permission not granted")]
    PermissionDenied,

    /// Every strategy finished without a fix
    #[error("no location available")]
    Unavailable,

    /// The acquisition was superseded
    #[error("location request cancelled")]
    Cancelled,
}

/// Failures reported by a [`LocationSource`]. Strategies absorb these.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("location lookup failed: {0}")]
    Lookup(String),

    #[error("location updates unavailable: {0}")]
    Updates(String),
}

/// The acquisition techniques, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionAttempt {
    HighAccuracyOneShot,
    LastKnown,
    SingleUpdateRequest,
}

/// Identifies an update registration so it can be removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// An active update registration. Each message is one location result,
/// which may carry no fix.
#[derive(Debug)]
pub struct UpdateSubscription {
    pub id: SubscriptionId,
    pub updates: mpsc::Receiver<Option<GeoFix>>,
}

/// The platform's location subsystem
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Requests a fresh high-accuracy fix. The source must stop work when
    /// `cancel` fires.
    async fn current_fix(&self, cancel: CancellationToken) -> Result<Option<GeoFix>, SourceError>;

    /// Returns the most recent fix the subsystem knows about, however old.
    async fn last_known(&self) -> Result<Option<GeoFix>, SourceError>;

    /// Registers for location updates delivered roughly every `interval`.
    fn request_updates(&self, interval: Duration) -> Result<UpdateSubscription, SourceError>;

    /// Removes a registration made by [`request_updates`](Self::request_updates).
    fn remove_updates(&self, id: SubscriptionId);
}

/// Shared, mutable record of whether location access has been granted
#[derive(Debug, Clone, Default)]
pub struct PermissionFlag(Arc<AtomicBool>);

impl PermissionFlag {
    pub fn new(granted: bool) -> Self {
        Self(Arc::new(AtomicBool::new(granted)))
    }

    pub fn is_granted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, granted: bool) {
        self.0.store(granted, Ordering::SeqCst);
    }
}

/// Runs location strategies in priority order.
pub struct LocationAcquirer {
    strategies: Vec<Box<dyn LocationStrategy>>,
    permission: PermissionFlag,
    timeout: Duration,
}

impl LocationAcquirer {
    /// Builds the standard strategy chain over `source`.
    ///
    /// `timeout` bounds each strategy; `update_interval` is the interval
    /// requested by the single-update strategy.
    pub fn new(
        source: Arc<dyn LocationSource>,
        permission: PermissionFlag,
        timeout: Duration,
        update_interval: Duration,
    ) -> Self {
        let strategies: Vec<Box<dyn LocationStrategy>> = vec![
            Box::new(HighAccuracyOneShot::new(Arc::clone(&source))),
            Box::new(LastKnown::new(Arc::clone(&source))),
            Box::new(SingleUpdateRequest::new(source, update_interval)),
        ];
        Self::with_strategies(strategies, permission, timeout)
    }

    /// Uses a custom strategy list, tried in the given order.
    pub fn with_strategies(
        strategies: Vec<Box<dyn LocationStrategy>>,
        permission: PermissionFlag,
        timeout: Duration,
    ) -> Self {
        Self {
            strategies,
            permission,
            timeout,
        }
    }

    pub fn permission(&self) -> &PermissionFlag {
        &self.permission
    }

    /// Returns the first fix produced by any strategy.
    ///
    /// Fails fast with [`LocationError::PermissionDenied`] before touching the
    /// source when permission is missing. Cancelling `cancel` stops the
    /// strategy in progress and skips the rest.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GeoFix, LocationError> {
        if !self.permission.is_granted() {
            return Err(LocationError::PermissionDenied);
        }

        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                return Err(LocationError::Cancelled);
            }
            match strategy.attempt(self.timeout, cancel.child_token()).await {
                Some(fix) => {
                    info!(
                        strategy = ?strategy.kind(),
                        lat = fix.latitude,
                        lon = fix.longitude,
                        "Acquired location"
                    );
                    return Ok(fix);
                }
                None => debug!(strategy = ?strategy.kind(), "Location strategy produced no fix"),
            }
        }

        if cancel.is_cancelled() {
            Err(LocationError::Cancelled)
        } else {
            Err(LocationError::Unavailable)
        }
    }
}
