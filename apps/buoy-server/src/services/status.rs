use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::services::cache::TtlCache;
use crate::services::vendor::{VendorClient, VendorError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub memory: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance: Option<f64>,
    pub alarms: Option<f64>,
    pub last_update: Option<String>,
}

fn status_entries(payload: &JsonValue) -> Vec<&JsonValue> {
    match payload.get("data") {
        Some(JsonValue::Object(map)) => map.values().collect(),
        Some(JsonValue::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn numeric_field(entry: Option<&JsonValue>) -> Option<f64> {
    let value = match entry?.get("value")? {
        JsonValue::Number(num) => num.as_f64(),
        JsonValue::String(raw) if !raw.trim().is_empty() => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Builds a snapshot from the vendor's flat list of named status fields.
pub fn snapshot_from_payload(payload: &JsonValue) -> StatusSnapshot {
    let entries = status_entries(payload);
    let find = |name: &str| {
        entries
            .iter()
            .copied()
            .find(|entry| entry.get("name").and_then(JsonValue::as_str) == Some(name))
    };

    let latitude = find("Latitude");
    StatusSnapshot {
        voltage: numeric_field(find("V2")),
        current: numeric_field(find("Input Total")),
        memory: numeric_field(find("Memory")),
        latitude: numeric_field(latitude),
        longitude: numeric_field(find("Longitude")),
        distance: numeric_field(find("Distance from anchor")),
        alarms: numeric_field(find("Alarms")),
        last_update: latitude
            .and_then(|entry| entry.get("date_time_data"))
            .and_then(JsonValue::as_str)
            .map(str::to_string),
    }
}

/// Buoy status with a short-lived cache. The cache absorbs vendor rate
/// limiting: when the vendor answers 429, an empty body or non-JSON, the last
/// good snapshot is served regardless of age.
pub struct StatusService {
    vendor: VendorClient,
    station: String,
    timeout: Duration,
    cache: TtlCache<StatusSnapshot>,
}

impl StatusService {
    pub fn new(vendor: VendorClient, station: String, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            vendor,
            station,
            timeout,
            cache: TtlCache::new(cache_ttl),
        }
    }

    pub async fn snapshot(&self, now: Instant) -> StatusSnapshot {
        if let Some(hit) = self.cache.fresh(now).await {
            tracing::debug!("serving cached buoy status");
            return hit;
        }
        let fetched = self.vendor.fetch_status(&self.station, self.timeout).await;
        self.resolve(fetched, now).await
    }

    pub async fn resolve(
        &self,
        fetched: Result<JsonValue, VendorError>,
        now: Instant,
    ) -> StatusSnapshot {
        match fetched {
            Ok(payload) => {
                let snapshot = snapshot_from_payload(&payload);
                if snapshot.latitude.is_some() {
                    self.cache.store(snapshot.clone(), now).await;
                } else {
                    tracing::info!("vendor status carried no position; not caching");
                }
                snapshot
            }
            Err(err) if err.is_degraded_answer() => match self.cache.last().await {
                Some(cached) => {
                    tracing::warn!(error = %err, "vendor status unusable; serving last cached snapshot");
                    cached
                }
                None => {
                    tracing::warn!(error = %err, "vendor status unusable and nothing cached");
                    StatusSnapshot::default()
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "vendor status fetch failed");
                StatusSnapshot::default()
            }
        }
    }
}
