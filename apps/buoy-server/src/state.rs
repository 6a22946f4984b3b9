use crate::config::BuoyConfig;
use crate::services::cache::TtlMap;
use crate::services::gps::GpsStabilityFilter;
use crate::services::status::StatusService;
use crate::services::vendor::VendorClient;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: BuoyConfig,
    pub vendor: VendorClient,
    pub status: Arc<StatusService>,
    /// Raw wave count payloads keyed by window length in hours.
    pub wave_count_cache: Arc<TtlMap<i64, JsonValue>>,
    pub gps: Arc<Mutex<GpsStabilityFilter>>,
}

impl AppState {
    pub fn new(config: BuoyConfig, http: Client) -> Self {
        let vendor = VendorClient::new(
            http,
            config.vendor_base_url.clone(),
            config.device_id.clone(),
            config.vendor_token.clone(),
            config.vendor_timeout,
        );
        let status = StatusService::new(
            vendor.clone(),
            config.status_station.clone(),
            config.status_timeout,
            config.status_cache_ttl,
        );
        Self {
            vendor,
            status: Arc::new(status),
            wave_count_cache: Arc::new(TtlMap::new(config.wave_count_cache_ttl)),
            gps: Arc::new(Mutex::new(GpsStabilityFilter::new(config.gps))),
            config,
        }
    }
}
