//! The individual acquisition strategies.
//!
//! Each strategy resolves exactly once, to a fix or to `None`. Source errors,
//! timeouts, and cancellation all resolve to `None`; none of them propagate.
//! Any native request a strategy starts is released on every exit path,
//! including when the strategy's future is dropped mid-flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AcquisitionAttempt, GeoFix, LocationSource, SubscriptionId, UpdateSubscription};

/// One technique for obtaining a position fix
#[async_trait]
pub trait LocationStrategy: Send + Sync {
    fn kind(&self) -> AcquisitionAttempt;

    /// Tries to produce a fix within `timeout`, giving up early if `cancel`
    /// fires.
    async fn attempt(&self, timeout: Duration, cancel: CancellationToken) -> Option<GeoFix>;
}

/// Requests a fresh high-accuracy fix.
pub struct HighAccuracyOneShot {
    source: Arc<dyn LocationSource>,
}

impl HighAccuracyOneShot {
    pub fn new(source: Arc<dyn LocationSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl LocationStrategy for HighAccuracyOneShot {
    fn kind(&self) -> AcquisitionAttempt {
        AcquisitionAttempt::HighAccuracyOneShot
    }

    async fn attempt(&self, timeout: Duration, cancel: CancellationToken) -> Option<GeoFix> {
        let native = CancellationToken::new();
        // Cancels the native request on every path that does not disarm it,
        // including this future being dropped.
        let guard = native.clone().drop_guard();

        let request = tokio::time::timeout(timeout, self.source.current_fix(native.clone()));
        let outcome = tokio::select! {
            result = request => match result {
                Ok(Ok(fix)) => fix,
                Ok(Err(e)) => {
                    debug!(error = %e, "High-accuracy fix failed");
                    None
                }
                Err(_) => {
                    debug!(?timeout, "High-accuracy fix timed out");
                    None
                }
            },
            _ = cancel.cancelled() => None,
        };

        if outcome.is_some() {
            guard.disarm();
        }
        outcome
    }
}

/// Returns the source's cached fix, with no freshness guarantee.
pub struct LastKnown {
    source: Arc<dyn LocationSource>,
}

impl LastKnown {
    pub fn new(source: Arc<dyn LocationSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl LocationStrategy for LastKnown {
    fn kind(&self) -> AcquisitionAttempt {
        AcquisitionAttempt::LastKnown
    }

    async fn attempt(&self, timeout: Duration, cancel: CancellationToken) -> Option<GeoFix> {
        tokio::select! {
            result = tokio::time::timeout(timeout, self.source.last_known()) => match result {
                Ok(Ok(fix)) => fix,
                Ok(Err(e)) => {
                    debug!(error = %e, "Last known location lookup failed");
                    None
                }
                Err(_) => None,
            },
            _ = cancel.cancelled() => None,
        }
    }
}

/// Registers for exactly one location update and deregisters afterwards.
pub struct SingleUpdateRequest {
    source: Arc<dyn LocationSource>,
    interval: Duration,
}

impl SingleUpdateRequest {
    pub fn new(source: Arc<dyn LocationSource>, interval: Duration) -> Self {
        Self { source, interval }
    }
}

/// Removes an update registration when dropped.
struct Registration<'a> {
    source: &'a dyn LocationSource,
    id: SubscriptionId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.source.remove_updates(self.id);
    }
}

#[async_trait]
impl LocationStrategy for SingleUpdateRequest {
    fn kind(&self) -> AcquisitionAttempt {
        AcquisitionAttempt::SingleUpdateRequest
    }

    async fn attempt(&self, timeout: Duration, cancel: CancellationToken) -> Option<GeoFix> {
        let subscription = self.source.request_updates(self.interval);
        let UpdateSubscription { id, mut updates } = match subscription {
            Ok(subscription) => subscription,
            Err(e) => {
                debug!(error = %e, "Could not register for location updates");
                return None;
            }
        };
        let _registration = Registration {
            source: self.source.as_ref(),
            id,
        };

        tokio::select! {
            result = tokio::time::timeout(timeout, updates.recv()) => match result {
                Ok(Some(fix)) => fix,
                Ok(None) => None,
                Err(_) => {
                    debug!(?timeout, "No location update before timeout");
                    None
                }
            },
            _ = cancel.cancelled() => None,
        }
    }
}
