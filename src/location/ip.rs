//! IP geolocation source
//!
//! Terminals have no positioning hardware, so the current fix comes from the
//! public address of the machine. Accuracy is city-level at best.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{GeoFix, LocationSource, SourceError, SubscriptionId, UpdateSubscription};

/// Lookup endpoint; only the fields we read are requested
const IP_API_URL: &str = "http://ip-api.com/json/?fields=status,message,lat,lon";

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Parses an ip-api.com response body into a fix.
///
/// A `"fail"` status is reported as an error; a success without coordinates
/// yields `None`.
pub fn parse_ip_response(body: &str) -> Result<Option<GeoFix>, SourceError> {
    let response: IpApiResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Lookup(e.to_string()))?;
    if response.status != "success" {
        return Err(SourceError::Lookup(
            response.message.unwrap_or_else(|| response.status.clone()),
        ));
    }
    Ok(match (response.lat, response.lon) {
        (Some(lat), Some(lon)) => Some(GeoFix::new(lat, lon)),
        _ => None,
    })
}

struct Shared {
    client: Client,
    url: String,
    last: Mutex<Option<GeoFix>>,
}

impl Shared {
    async fn lookup(&self) -> Result<Option<GeoFix>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Lookup(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Lookup(e.to_string()))?;
        let fix = parse_ip_response(&body)?;
        if let Some(fix) = fix {
            *self.last.lock() = Some(fix);
        }
        Ok(fix)
    }
}

/// [`LocationSource`] backed by an IP geolocation service
pub struct IpLocationSource {
    shared: Arc<Shared>,
    subscriptions: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl IpLocationSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Lookup(e.to_string()))?;
        Ok(Self::with_client(client, IP_API_URL))
    }

    /// Uses a custom client and endpoint (for testing)
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                url: url.into(),
                last: Mutex::new(None),
            }),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of update registrations that have not been removed
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

#[async_trait]
impl LocationSource for IpLocationSource {
    async fn current_fix(&self, cancel: CancellationToken) -> Result<Option<GeoFix>, SourceError> {
        tokio::select! {
            result = self.shared.lookup() => result,
            _ = cancel.cancelled() => {
                debug!("IP location lookup cancelled");
                Ok(None)
            }
        }
    }

    async fn last_known(&self) -> Result<Option<GeoFix>, SourceError> {
        Ok(*self.shared.last.lock())
    }

    fn request_updates(&self, interval: Duration) -> Result<UpdateSubscription, SourceError> {
        let (tx, rx) = mpsc::channel(1);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let fix = match shared.lookup().await {
                Ok(fix) => fix,
                Err(e) => {
                    warn!(error = %e, "IP location update failed");
                    None
                }
            };
            let _ = tx.send(fix).await;
        });

        let id = SubscriptionId::next();
        self.subscriptions.lock().insert(id, handle);
        Ok(UpdateSubscription { id, updates: rx })
    }

    fn remove_updates(&self, id: SubscriptionId) {
        if let Some(handle) = self.subscriptions.lock().remove(&id) {
            handle.abort();
        }
    }
}
